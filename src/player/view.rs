//! What the player chrome shows, derived from the engine after every change.

use crate::api::models::Song;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaLink {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRow {
    pub index: usize,
    pub name: String,
    pub artist: String,
    pub cover_art_url: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerView {
    pub current: Option<Song>,
    pub is_playing: bool,
    /// License button target; the button is hidden when `None`.
    pub license_href: Option<String>,
    pub artist_link: Option<MetaLink>,
    pub album_link: Option<MetaLink>,
    pub rows: Vec<QueueRow>,
}

impl PlayerView {
    /// Full rebuild from the engine's song list and active index.
    pub fn derive(songs: &[Song], active_index: Option<usize>, is_playing: bool) -> Self {
        let active = active_index.filter(|index| *index < songs.len());
        let current = active.and_then(|index| songs.get(index)).cloned();

        let license_href = current
            .as_ref()
            .and_then(|song| song.permalink())
            .map(str::to_string);
        let artist_link = current.as_ref().and_then(|song| {
            song.artist_permalink().map(|href| MetaLink {
                label: song.artist.trim().to_string(),
                href: href.to_string(),
            })
        });
        let album_link = current.as_ref().and_then(|song| {
            song.album_permalink().map(|href| MetaLink {
                label: song.album.trim().to_string(),
                href: href.to_string(),
            })
        });

        let rows = songs
            .iter()
            .enumerate()
            .map(|(index, song)| QueueRow {
                index,
                name: song.display_name().to_string(),
                artist: song.artist.clone(),
                cover_art_url: song.cover_art_url.clone(),
                active: Some(index) == active,
            })
            .collect();

        Self {
            current,
            is_playing,
            license_href,
            artist_link,
            album_link,
            rows,
        }
    }

    /// The separator between artist and album is shown only with both.
    pub fn show_meta_separator(&self) -> bool {
        self.artist_link.is_some() && self.album_link.is_some()
    }

    pub fn active_url(&self) -> Option<&str> {
        self.current.as_ref().map(|song| song.url.as_str())
    }
}

/// Receives a fresh view after every state change.
pub trait ViewSink {
    fn render(&self, view: PlayerView);
}
