//! In-memory engine used by the controller tests.

use super::{AudioEngine, EngineError, EngineHandler, ReloadRequest};
use crate::api::models::Song;
use crate::signal::FrequencySource;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
pub struct FakeState {
    pub songs: Vec<Song>,
    pub active: usize,
    pub playing: bool,
    pub seconds: f64,
    pub volume: f64,
    pub reloads: Vec<ReloadRequest>,
    pub appends: usize,
    pub stops: usize,
    pub pauses: usize,
    pub rebinds: usize,
    pub fail_reload: bool,
    /// Model an engine whose seek lands later: only the index moves.
    pub defer_seek: bool,
    pub handler: Option<EngineHandler>,
}

#[derive(Clone, Default)]
pub struct FakeEngine {
    pub state: Rc<RefCell<FakeState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn urls(&self) -> Vec<String> {
        self.state
            .borrow()
            .songs
            .iter()
            .map(|song| song.url.clone())
            .collect()
    }

    pub fn reload_count(&self) -> usize {
        self.state.borrow().reloads.len()
    }

    pub fn last_reload(&self) -> Option<ReloadRequest> {
        self.state.borrow().reloads.last().cloned()
    }
}

impl AudioEngine for FakeEngine {
    fn register_handler(&mut self, handler: EngineHandler) {
        self.state.borrow_mut().handler = Some(handler);
    }

    fn reload(&mut self, request: &ReloadRequest) -> Result<(), EngineError> {
        let mut state = self.state.borrow_mut();
        if state.fail_reload {
            return Err(EngineError::Rejected {
                call: "init",
                message: "fake failure".to_string(),
            });
        }
        state.songs = request.songs.clone();
        state.active = request.resulting_index().unwrap_or(0);
        state.playing = request.autoplay;
        state.seconds = 0.0;
        state.reloads.push(request.clone());
        Ok(())
    }

    fn songs(&self) -> Vec<Song> {
        self.state.borrow().songs.clone()
    }

    fn active_index(&self) -> Option<usize> {
        let state = self.state.borrow();
        (!state.songs.is_empty()).then_some(state.active)
    }

    fn played_seconds(&self) -> f64 {
        self.state.borrow().seconds
    }

    fn played_percentage(&self) -> f64 {
        0.0
    }

    fn is_playing(&self) -> bool {
        self.state.borrow().playing
    }

    fn seek(&mut self, seconds: f64, index: usize) -> Result<(), EngineError> {
        let mut state = self.state.borrow_mut();
        if index >= state.songs.len() {
            return Err(EngineError::NotInitialized);
        }
        state.active = index;
        if !state.defer_seek {
            state.seconds = seconds;
        }
        Ok(())
    }

    fn play(&mut self) -> Result<(), EngineError> {
        self.state.borrow_mut().playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        let mut state = self.state.borrow_mut();
        state.playing = false;
        state.pauses += 1;
        Ok(())
    }

    fn set_volume(&mut self, volume: f64) {
        self.state.borrow_mut().volume = volume;
    }

    fn append(&mut self, song: &Song) -> Result<usize, EngineError> {
        let mut state = self.state.borrow_mut();
        state.songs.push(song.clone());
        state.appends += 1;
        Ok(state.songs.len() - 1)
    }

    fn stop_and_unload(&mut self) {
        let mut state = self.state.borrow_mut();
        state.playing = false;
        state.stops += 1;
    }

    fn rebind_elements(&mut self) {
        self.state.borrow_mut().rebinds += 1;
    }

    fn frequency_source(&self) -> Option<Rc<dyn FrequencySource>> {
        None
    }
}
