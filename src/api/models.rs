use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const ATTR_NAME: &str = "data-song-name";
pub const ATTR_ARTIST: &str = "data-song-artist";
pub const ATTR_ALBUM: &str = "data-song-album";
pub const ATTR_URL: &str = "data-song-url";
pub const ATTR_COVER_ART_URL: &str = "data-song-cover-art-url";
pub const ATTR_SONG_ID: &str = "data-song-id";
pub const ATTR_PERMALINK: &str = "data-song-permalink";
pub const ATTR_ARTIST_PERMALINK: &str = "data-song-artist-permalink";
pub const ATTR_ALBUM_PERMALINK: &str = "data-song-album-permalink";

/// Every attribute a play affordance may carry, in the order they are scraped.
pub const SONG_ATTRIBUTES: [&str; 9] = [
    ATTR_NAME,
    ATTR_ARTIST,
    ATTR_ALBUM,
    ATTR_URL,
    ATTR_COVER_ART_URL,
    ATTR_SONG_ID,
    ATTR_PERMALINK,
    ATTR_ARTIST_PERMALINK,
    ATTR_ALBUM_PERMALINK,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SongError {
    #[error("play affordance has no audio source url")]
    MissingUrl,
}

/// A playable track. Field names match the object shape the audio engine
/// expects, so the same JSON is used for storage and for engine init.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Song {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    pub url: String,
    #[serde(default)]
    pub cover_art_url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub song_id: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub artist_permalink: String,
    #[serde(default)]
    pub album_permalink: String,
}

impl Song {
    /// Build a song from scraped `data-song-*` attributes.
    pub fn from_attributes(attributes: &HashMap<String, String>) -> Result<Self, SongError> {
        let pick = |key: &str| {
            attributes
                .get(key)
                .map(|value| value.trim().to_string())
                .unwrap_or_default()
        };

        let url = pick(ATTR_URL);
        if url.is_empty() {
            return Err(SongError::MissingUrl);
        }

        Ok(Self {
            name: pick(ATTR_NAME),
            artist: pick(ATTR_ARTIST),
            album: pick(ATTR_ALBUM),
            url,
            cover_art_url: pick(ATTR_COVER_ART_URL),
            song_id: pick(ATTR_SONG_ID),
            permalink: pick(ATTR_PERMALINK),
            artist_permalink: pick(ATTR_ARTIST_PERMALINK),
            album_permalink: pick(ATTR_ALBUM_PERMALINK),
        })
    }

    /// Two entries are the same track when their audio urls match.
    pub fn same_track(&self, other: &Song) -> bool {
        self.url == other.url
    }

    pub fn permalink(&self) -> Option<&str> {
        non_blank(&self.permalink)
    }

    pub fn artist_permalink(&self) -> Option<&str> {
        non_blank(&self.artist_permalink)
    }

    pub fn album_permalink(&self) -> Option<&str> {
        non_blank(&self.album_permalink)
    }

    pub fn display_name(&self) -> &str {
        non_blank(&self.name).unwrap_or("Untitled")
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

// Older snapshots stored the post id as a bare number.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(text) => text,
        serde_json::Value::Number(number) => number.to_string(),
        serde_json::Value::Bool(boolean) => boolean.to_string(),
        _ => String::new(),
    })
}
