//! Playback session controller.
//!
//! Single owner of the queue. Every queue operation is expressed as the next
//! `(songs, start index, autoplay)` tuple and pushed through
//! [`AudioEngine::reload`]; the view and the persisted snapshot are
//! re-derived afterwards.

pub mod plan;
pub mod view;

use crate::api::models::Song;
use crate::db::{PlaybackPosition, QueueStore};
use crate::engine::{AudioEngine, EngineEvent, EngineHandler, ReloadRequest};
use crate::session::SessionContext;
use crate::signal::FrequencySource;
use std::rc::Rc;
use tracing::{debug, error, warn};

pub use view::{PlayerView, ViewSink};

pub struct PlayerController {
    engine: Box<dyn AudioEngine>,
    store: QueueStore,
    view: Rc<dyn ViewSink>,
    session: Rc<SessionContext>,
    queue: Vec<Song>,
    pending: Option<PendingPosition>,
}

/// Restored position the engine has not caught up with yet. The engine may
/// apply a seek a few ticks after it is asked to.
#[derive(Debug, Clone, Copy)]
struct PendingPosition {
    active_index: usize,
    played_seconds: f64,
    played_percentage: f64,
}

impl PlayerController {
    pub fn new(
        engine: Box<dyn AudioEngine>,
        store: QueueStore,
        view: Rc<dyn ViewSink>,
        session: Rc<SessionContext>,
    ) -> Self {
        Self {
            engine,
            store,
            view,
            session,
            queue: Vec::new(),
            pending: None,
        }
    }

    pub fn register_engine_handler(&mut self, handler: EngineHandler) {
        self.engine.register_handler(handler);
    }

    #[cfg(test)]
    pub fn queue(&self) -> &[Song] {
        &self.queue
    }

    pub fn active_index(&self) -> Option<usize> {
        if self.queue.is_empty() {
            None
        } else {
            self.engine.active_index()
        }
    }

    /// Restore the persisted session, if it is usable. Returns whether the
    /// engine was initialized.
    pub fn bootstrap(&mut self) -> bool {
        self.engine.set_volume(self.session.config().ui.volume.clamp(0.0, 1.0));

        let Some(restored) = self.store.restore() else {
            self.refresh_view();
            return false;
        };

        debug!(
            songs = restored.queue.len(),
            index = restored.active_index,
            seconds = restored.played_seconds,
            "restoring playback session"
        );
        // Nothing is written here. The stored position stays authoritative
        // until the engine reports it has seeked.
        let request = ReloadRequest::new(restored.queue, None, false);
        if let Err(err) = self.engine.reload(&request) {
            error!(error = %err, "audio engine rejected the restored queue");
            return false;
        }
        self.queue = request.songs;
        if let Err(err) = self
            .engine
            .seek(restored.played_seconds, restored.active_index)
        {
            warn!(error = %err, "could not seek to the restored position");
        }
        self.pending = Some(PendingPosition {
            active_index: restored.active_index,
            played_seconds: restored.played_seconds,
            played_percentage: restored.played_percentage,
        });

        let resumed = if restored.playing {
            self.engine.play()
        } else {
            self.engine.pause()
        };
        if let Err(err) = resumed {
            warn!(error = %err, "could not restore the play state");
        }
        self.session.set_playing(restored.playing && self.engine.is_playing());
        self.refresh_view();
        true
    }

    /// Play `song` immediately from the top of the queue.
    pub fn play_at_top(&mut self, song: Song) {
        self.engine.stop_and_unload();
        let request = if self.queue.is_empty() {
            ReloadRequest::new(vec![song], None, true)
        } else {
            ReloadRequest::new(plan::promote_to_top(&self.queue, song), Some(0), true)
        };
        self.apply(request);
    }

    /// Append `song` without interrupting playback. Returns its index.
    pub fn add_to_queue(&mut self, song: Song) -> Option<usize> {
        if self.queue.is_empty() {
            return self
                .apply(ReloadRequest::new(vec![song], None, false))
                .then_some(0);
        }

        match self.engine.append(&song) {
            Ok(index) => {
                self.queue = self.engine.songs();
                self.refresh_view();
                self.persist_snapshot();
                Some(index)
            }
            Err(err) => {
                error!(error = %err, url = %song.url, "could not append song to the queue");
                None
            }
        }
    }

    /// Remove the entry at `index`. Refuses to empty the queue. Playback
    /// restarts paused afterwards.
    pub fn remove_from_queue(&mut self, index: usize) -> bool {
        if self.queue.len() <= 1 {
            warn!(index, "refusing to remove the last song in the queue");
            return false;
        }
        if index >= self.queue.len() {
            warn!(index, len = self.queue.len(), "queue index out of range");
            return false;
        }

        let active = self.engine.active_index().unwrap_or(0);
        if index == active {
            if let Err(err) = self.engine.pause() {
                warn!(error = %err, "could not pause before removing the playing song");
            }
        }

        let mut songs = self.queue.clone();
        songs.remove(index);
        let next_index = plan::index_after_removal(index, active, songs.len());
        self.apply(ReloadRequest::new(songs, Some(next_index), false))
    }

    /// Replace the queue with `songs` and start from the first one.
    pub fn play_all(&mut self, songs: Vec<Song>) {
        if songs.is_empty() {
            warn!("play all requested with no songs");
            return;
        }
        self.engine.stop_and_unload();
        self.apply(ReloadRequest::new(songs, Some(0), true));
    }

    /// Jump to an entry that is already queued.
    pub fn play_index(&mut self, index: usize) {
        if index >= self.queue.len() {
            warn!(index, "queue index out of range");
            return;
        }
        let played = self
            .engine
            .seek(0.0, index)
            .and_then(|_| self.engine.play());
        if let Err(err) = played {
            error!(error = %err, index, "could not jump to queued song");
            return;
        }
        self.pending = None;
        self.refresh_view();
        self.persist_snapshot();
    }

    /// Play/pause button in the player chrome.
    pub fn toggle_playback(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let result = if self.engine.is_playing() {
            self.engine.pause()
        } else {
            self.engine.play()
        };
        if let Err(err) = result {
            warn!(error = %err, "could not toggle playback");
        }
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.engine.set_volume(volume.clamp(0.0, 1.0));
    }

    pub fn rebind_elements(&mut self) {
        self.engine.rebind_elements();
    }

    pub fn frequency_source(&self) -> Option<Rc<dyn FrequencySource>> {
        self.engine.frequency_source()
    }

    /// React to an engine callback.
    pub fn handle_event(&mut self, event: EngineEvent) {
        self.settle_pending(event);
        match event {
            EngineEvent::Play => self.session.set_playing(true),
            EngineEvent::Pause | EngineEvent::Stop => self.session.set_playing(false),
            EngineEvent::SongChange | EngineEvent::TimeUpdate => {}
        }

        match event {
            EngineEvent::TimeUpdate => {
                if let Err(err) = self.store.save_position(&self.position()) {
                    debug!(error = %err, "could not persist playback position");
                }
            }
            EngineEvent::SongChange => {
                self.queue = self.engine.songs();
                self.refresh_view();
                self.persist_snapshot();
            }
            EngineEvent::Play | EngineEvent::Pause | EngineEvent::Stop => {
                self.refresh_view();
                self.persist_snapshot();
            }
        }
    }

    /// Current position. Until a restored seek lands the engine reports zero,
    /// so the restored values are reported instead.
    pub fn position(&self) -> PlaybackPosition {
        let seconds = finite_or_zero(self.engine.played_seconds()).max(0.0);
        let percentage = finite_or_zero(self.engine.played_percentage()).clamp(0.0, 100.0);
        let (played_seconds, played_percentage) = match self.pending {
            Some(pending) if seconds <= 0.0 => (pending.played_seconds, pending.played_percentage),
            _ => (seconds, percentage),
        };
        PlaybackPosition {
            active_index: self.active_index(),
            played_seconds,
            played_percentage,
            is_playing: self.engine.is_playing(),
        }
    }

    /// Drop the restored position once the engine has moved past it: it
    /// reports a time of its own, or it changed to another song.
    fn settle_pending(&mut self, event: EngineEvent) {
        let Some(pending) = self.pending else {
            return;
        };
        let seeked = finite_or_zero(self.engine.played_seconds()) > 0.0;
        let moved = matches!(event, EngineEvent::SongChange)
            && self.engine.active_index() != Some(pending.active_index);
        if seeked || moved {
            debug!(seeked, moved, "restored position settled");
            self.pending = None;
        }
    }

    /// Write queue and position. Called on engine events, before PJAX
    /// navigations and when the page is torn down.
    pub fn persist_snapshot(&self) {
        if let Err(err) = self.store.save_snapshot(&self.queue, &self.position()) {
            warn!(error = %err, "could not persist playback snapshot");
        }
    }

    pub fn refresh_view(&self) {
        let view = PlayerView::derive(
            &self.engine.songs(),
            self.active_index(),
            self.engine.is_playing(),
        );
        self.view.render(view);
    }

    fn apply(&mut self, request: ReloadRequest) -> bool {
        if let Err(err) = self.engine.reload(&request) {
            error!(error = %err, songs = request.songs.len(), "audio engine reload failed");
            return false;
        }
        debug!(
            songs = request.songs.len(),
            start = ?request.start_song,
            autoplay = request.autoplay,
            "audio engine reloaded"
        );
        self.queue = request.songs;
        self.pending = None;
        self.refresh_view();
        self.persist_snapshot();
        true
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
