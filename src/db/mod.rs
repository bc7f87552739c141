//! Persisted queue store.
//!
//! The snapshot lives under fixed browser storage keys so it survives full
//! page loads as well as PJAX navigations.

use crate::api::models::Song;
use std::cell::RefCell;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[cfg(target_arch = "wasm32")]
use gloo_storage::{LocalStorage, Storage};

pub const QUEUE_KEY: &str = "fml_queue";
pub const SONG_LIST_KEY: &str = "songList";
pub const SONG_INDEX_KEY: &str = "songIndex";
pub const TIME_UPDATE_KEY: &str = "timeUpdate";
pub const PERCENTAGE_KEY: &str = "percentage";
pub const PLAYING_KEY: &str = "playing";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage write failed for `{key}`: {message}")]
    Write { key: String, message: String },
    #[error("failed to serialize queue: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Raw string key-value storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// `window.localStorage`.
#[cfg(target_arch = "wasm32")]
pub struct BrowserStore {
    storage: web_sys::Storage,
}

#[cfg(target_arch = "wasm32")]
impl BrowserStore {
    /// `None` when storage is disabled (private browsing, sandboxed frames).
    pub fn open() -> Option<Self> {
        let marker = "__fml_storage_check";
        let storage = LocalStorage::raw();
        storage.set_item(marker, "1").ok()?;
        let _ = storage.remove_item(marker);
        Some(Self { storage })
    }
}

#[cfg(target_arch = "wasm32")]
impl KeyValueStore for BrowserStore {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.storage
            .set_item(key, value)
            .map_err(|err| StoreError::Write {
                key: key.to_string(),
                message: format!("{err:?}"),
            })
    }
}

/// In-memory storage for when the browser refuses `localStorage`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Where playback stands inside the queue.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackPosition {
    pub active_index: Option<usize>,
    pub played_seconds: f64,
    pub played_percentage: f64,
    pub is_playing: bool,
}

/// A session that passed the restoration checks.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredSession {
    pub queue: Vec<Song>,
    pub active_index: usize,
    pub played_seconds: f64,
    pub played_percentage: f64,
    pub playing: bool,
}

/// Why a persisted snapshot was not restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreRejection {
    NoQueue,
    InvalidIndex,
    IndexOutOfRange,
    NoPosition,
}

pub struct QueueStore {
    backend: Box<dyn KeyValueStore>,
}

impl QueueStore {
    pub fn new(backend: Box<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Position-only write used on every time update.
    pub fn save_position(&self, position: &PlaybackPosition) -> Result<(), StoreError> {
        if let Some(index) = position.active_index {
            self.backend.set(SONG_INDEX_KEY, &index.to_string())?;
        }
        self.backend
            .set(TIME_UPDATE_KEY, &position.played_seconds.to_string())?;
        self.backend
            .set(PERCENTAGE_KEY, &position.played_percentage.to_string())?;
        self.backend
            .set(PLAYING_KEY, if position.is_playing { "true" } else { "false" })?;
        Ok(())
    }

    /// Full snapshot: queue, current song and position.
    pub fn save_snapshot(&self, queue: &[Song], position: &PlaybackPosition) -> Result<(), StoreError> {
        if queue.is_empty() {
            return Ok(());
        }
        self.backend.set(QUEUE_KEY, &serde_json::to_string(queue)?)?;
        let current = position
            .active_index
            .and_then(|index| queue.get(index))
            .unwrap_or(&queue[0]);
        self.backend
            .set(SONG_LIST_KEY, &serde_json::to_string(current)?)?;
        self.save_position(position)
    }

    /// Read once at bootstrap. Any problem means "nothing to restore".
    pub fn restore(&self) -> Option<RestoredSession> {
        match self.try_restore() {
            Ok(session) => Some(session),
            Err(reason) => {
                debug!(?reason, "no playback session to restore");
                None
            }
        }
    }

    pub fn try_restore(&self) -> Result<RestoredSession, RestoreRejection> {
        let index = self
            .backend
            .get(SONG_INDEX_KEY)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite() && *value >= 0.0)
            .ok_or(RestoreRejection::InvalidIndex)?;

        let played_seconds = self
            .backend
            .get(TIME_UPDATE_KEY)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite() && *value != 0.0)
            .ok_or(RestoreRejection::NoPosition)?;

        let (queue, active_index) = match self.read_queue() {
            Some(queue) => {
                let index = index as usize;
                if index >= queue.len() {
                    return Err(RestoreRejection::IndexOutOfRange);
                }
                (queue, index)
            }
            None => (
                vec![self.read_single_song().ok_or(RestoreRejection::NoQueue)?],
                0,
            ),
        };

        let played_percentage = self
            .backend
            .get(PERCENTAGE_KEY)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .map(|value| value.clamp(0.0, 100.0))
            .unwrap_or(0.0);
        let playing = self
            .backend
            .get(PLAYING_KEY)
            .is_some_and(|raw| raw.trim() == "true");

        Ok(RestoredSession {
            queue,
            active_index,
            played_seconds,
            played_percentage,
            playing,
        })
    }

    fn read_queue(&self) -> Option<Vec<Song>> {
        let raw = self.backend.get(QUEUE_KEY)?;
        let queue: Vec<Song> = serde_json::from_str(&raw).ok()?;
        (!queue.is_empty()).then_some(queue)
    }

    fn read_single_song(&self) -> Option<Song> {
        let raw = self.backend.get(SONG_LIST_KEY)?;
        serde_json::from_str(&raw).ok()
    }
}
