//! The seam between the player and the third-party audio engine.
//!
//! The engine cannot edit its song list in place: every structural change
//! goes through [`AudioEngine::reload`] with the full list.

#[cfg(target_arch = "wasm32")]
pub mod amplitude;
#[cfg(test)]
pub mod testing;

use crate::api::models::Song;
use crate::signal::FrequencySource;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("audio engine has no song list yet")]
    NotInitialized,
    #[error("audio engine rejected `{call}`: {message}")]
    Rejected { call: &'static str, message: String },
}

/// Notifications the engine raises while playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    Stop,
    Play,
    Pause,
    SongChange,
    TimeUpdate,
}

pub type EngineHandler = Rc<dyn Fn(EngineEvent)>;

/// Desired engine configuration after a queue mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReloadRequest {
    pub songs: Vec<Song>,
    pub start_song: Option<usize>,
    pub autoplay: bool,
}

impl ReloadRequest {
    pub fn new(songs: Vec<Song>, start_song: Option<usize>, autoplay: bool) -> Self {
        Self {
            songs,
            start_song,
            autoplay,
        }
    }

    /// Index the engine will report as active once the reload lands.
    #[cfg(test)]
    pub fn resulting_index(&self) -> Option<usize> {
        if self.songs.is_empty() {
            None
        } else {
            Some(self.start_song.unwrap_or(0).min(self.songs.len() - 1))
        }
    }
}

pub trait AudioEngine {
    /// Registered once; handed to the engine on every reload.
    fn register_handler(&mut self, handler: EngineHandler);
    fn reload(&mut self, request: &ReloadRequest) -> Result<(), EngineError>;
    fn songs(&self) -> Vec<Song>;
    fn active_index(&self) -> Option<usize>;
    fn played_seconds(&self) -> f64;
    fn played_percentage(&self) -> f64;
    fn is_playing(&self) -> bool;
    fn seek(&mut self, seconds: f64, index: usize) -> Result<(), EngineError>;
    fn play(&mut self) -> Result<(), EngineError>;
    fn pause(&mut self) -> Result<(), EngineError>;
    /// `volume` in `[0, 1]`.
    fn set_volume(&mut self, volume: f64);
    /// Appends without touching current playback; returns the new index.
    fn append(&mut self, song: &Song) -> Result<usize, EngineError>;
    /// Stops and unloads the current audio so two sources never overlap.
    fn stop_and_unload(&mut self);
    /// Re-attaches the engine's DOM listeners to new markup. Idempotent.
    fn rebind_elements(&mut self);
    fn frequency_source(&self) -> Option<Rc<dyn FrequencySource>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resulting_index_clamps_to_list() {
        let songs = vec![Song::default(), Song::default()];
        assert_eq!(ReloadRequest::new(songs.clone(), None, true).resulting_index(), Some(0));
        assert_eq!(ReloadRequest::new(songs.clone(), Some(1), true).resulting_index(), Some(1));
        assert_eq!(ReloadRequest::new(songs, Some(9), true).resulting_index(), Some(1));
        assert_eq!(ReloadRequest::new(Vec::new(), Some(0), true).resulting_index(), None);
    }
}
