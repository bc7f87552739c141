//! The single per-page session context shared by the player controller and
//! the signal bridge. Built once at startup and passed around by `Rc`.

use crate::config::PlayerConfig;
use crate::signal::{AudioSignal, BandLevels};
use std::cell::Cell;
use std::rc::Rc;

pub struct SessionContext {
    config: PlayerConfig,
    audio: Cell<AudioSignal>,
}

impl SessionContext {
    pub fn new(config: PlayerConfig) -> Rc<Self> {
        Rc::new(Self {
            config,
            audio: Cell::new(AudioSignal::default()),
        })
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Latest published intensities. Last write wins.
    pub fn audio(&self) -> AudioSignal {
        self.audio.get()
    }

    pub fn is_playing(&self) -> bool {
        self.audio.get().is_playing
    }

    pub fn set_playing(&self, playing: bool) {
        let mut audio = self.audio.get();
        audio.is_playing = playing;
        if !playing {
            audio.bass = 0.0;
            audio.mid = 0.0;
            audio.treble = 0.0;
            audio.intensity = 0.0;
        }
        self.audio.set(audio);
    }

    pub fn publish_levels(&self, levels: BandLevels) {
        let mut audio = self.audio.get();
        audio.bass = levels.bass;
        audio.mid = levels.mid;
        audio.treble = levels.treble;
        audio.intensity = levels.intensity;
        self.audio.set(audio);
    }
}
