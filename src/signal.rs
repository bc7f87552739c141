//! Audio-reactive signal bridge.
//!
//! Samples the engine's frequency analyser once per animation frame while
//! playback is running and publishes raw band intensities into the session
//! context, where visual renderers read them.

use crate::session::SessionContext;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::debug;

/// Shared intensity snapshot read by renderers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AudioSignal {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub intensity: f32,
    #[serde(rename = "isPlaying")]
    pub is_playing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BandLevels {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub intensity: f32,
}

const MAX_SAMPLE: f32 = 255.0;

/// Split byte frequency bins into bass (first 10%), mid (next 40%) and
/// treble (rest), averaging each band and the whole array into `[0, 1]`.
pub fn measure_bands(bins: &[u8]) -> BandLevels {
    if bins.is_empty() {
        return BandLevels::default();
    }
    let bass_end = bins.len() / 10;
    let mid_end = bins.len() / 2;

    BandLevels {
        bass: band_average(&bins[..bass_end]),
        mid: band_average(&bins[bass_end..mid_end]),
        treble: band_average(&bins[mid_end..]),
        intensity: band_average(bins),
    }
}

fn band_average(band: &[u8]) -> f32 {
    if band.is_empty() {
        return 0.0;
    }
    let sum: u32 = band.iter().map(|&bin| u32::from(bin)).sum();
    (sum as f32 / band.len() as f32 / MAX_SAMPLE).clamp(0.0, 1.0)
}

/// The engine's frequency analyser.
pub trait FrequencySource {
    /// Fill `bins` with the current byte magnitudes. `false` when the
    /// analyser cannot be read.
    fn fill(&self, bins: &mut Vec<u8>) -> bool;
}

/// Animation-frame scheduling primitive.
pub trait FrameScheduler {
    fn request_frame(&self, callback: Box<dyn FnOnce()>);
}

/// Where renderers outside the island read the signal from.
pub trait SignalPublisher {
    fn publish(&self, signal: &AudioSignal);
}

pub struct SignalBridge {
    session: Rc<SessionContext>,
    scheduler: Rc<dyn FrameScheduler>,
    publisher: Rc<dyn SignalPublisher>,
    source: RefCell<Option<Rc<dyn FrequencySource>>>,
    running: Cell<bool>,
    bins: RefCell<Vec<u8>>,
}

impl SignalBridge {
    pub fn new(
        session: Rc<SessionContext>,
        scheduler: Rc<dyn FrameScheduler>,
        publisher: Rc<dyn SignalPublisher>,
    ) -> Rc<Self> {
        Rc::new(Self {
            session,
            scheduler,
            publisher,
            source: RefCell::new(None),
            running: Cell::new(false),
            bins: RefCell::new(Vec::new()),
        })
    }

    pub fn attach_source(&self, source: Option<Rc<dyn FrequencySource>>) {
        *self.source.borrow_mut() = source;
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Called whenever the play state changes. Publishes the current signal
    /// and starts the sampling loop if playback is running and nothing is
    /// scheduled yet.
    pub fn sync(self: &Rc<Self>) {
        self.publish();
        if self.running.get() || !self.session.is_playing() || self.source.borrow().is_none() {
            return;
        }
        debug!("audio signal loop started");
        self.running.set(true);
        self.schedule();
    }

    fn schedule(self: &Rc<Self>) {
        let bridge = Rc::clone(self);
        self.scheduler
            .request_frame(Box::new(move || bridge.tick()));
    }

    fn tick(self: &Rc<Self>) {
        if !self.session.is_playing() {
            debug!("audio signal loop stopped");
            self.running.set(false);
            self.publish();
            return;
        }

        let source = self.source.borrow().clone();
        let Some(source) = source else {
            self.running.set(false);
            return;
        };

        let mut bins = self.bins.borrow_mut();
        if source.fill(&mut bins) {
            self.session.publish_levels(measure_bands(&bins));
            self.publish();
        }
        drop(bins);

        self.schedule();
    }

    fn publish(&self) {
        self.publisher.publish(&self.session.audio());
    }
}

#[cfg(target_arch = "wasm32")]
pub mod browser {
    use super::{AudioSignal, FrameScheduler, FrequencySource, SignalPublisher};
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{JsCast, JsValue};
    use web_sys::{window, AnalyserNode};

    /// Global renderers read from.
    const WINDOW_KEY: &str = "fmlAudioData";

    pub struct AnalyserSource {
        node: AnalyserNode,
    }

    impl AnalyserSource {
        pub fn new(node: AnalyserNode) -> Self {
            Self { node }
        }
    }

    impl FrequencySource for AnalyserSource {
        fn fill(&self, bins: &mut Vec<u8>) -> bool {
            let len = self.node.frequency_bin_count() as usize;
            if len == 0 {
                return false;
            }
            bins.resize(len, 0);
            self.node.get_byte_frequency_data(bins.as_mut_slice());
            true
        }
    }

    pub struct AnimationFrameScheduler;

    impl FrameScheduler for AnimationFrameScheduler {
        fn request_frame(&self, callback: Box<dyn FnOnce()>) {
            let Some(window) = window() else {
                return;
            };
            let closure = Closure::once_into_js(move || callback());
            let _ = window.request_animation_frame(closure.unchecked_ref());
        }
    }

    /// Mirrors the signal to `window.fmlAudioData`.
    pub struct WindowMirror;

    impl SignalPublisher for WindowMirror {
        fn publish(&self, signal: &AudioSignal) {
            let Some(window) = window() else {
                return;
            };
            let Ok(json) = serde_json::to_string(signal) else {
                return;
            };
            if let Ok(value) = js_sys::JSON::parse(&json) {
                let _ = js_sys::Reflect::set(&window, &JsValue::from_str(WINDOW_KEY), &value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlayerConfig;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ManualFrames {
        pending: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    }

    impl ManualFrames {
        fn pending(&self) -> usize {
            self.pending.borrow().len()
        }

        fn run_next(&self) -> bool {
            let next = self.pending.borrow_mut().pop_front();
            match next {
                Some(callback) => {
                    callback();
                    true
                }
                None => false,
            }
        }
    }

    impl FrameScheduler for ManualFrames {
        fn request_frame(&self, callback: Box<dyn FnOnce()>) {
            self.pending.borrow_mut().push_back(callback);
        }
    }

    #[derive(Default)]
    struct Published(RefCell<Vec<AudioSignal>>);

    impl Published {
        fn last(&self) -> Option<AudioSignal> {
            self.0.borrow().last().copied()
        }
    }

    impl SignalPublisher for Published {
        fn publish(&self, signal: &AudioSignal) {
            self.0.borrow_mut().push(*signal);
        }
    }

    struct Constant(Vec<u8>);

    impl FrequencySource for Constant {
        fn fill(&self, bins: &mut Vec<u8>) -> bool {
            bins.clear();
            bins.extend_from_slice(&self.0);
            true
        }
    }

    struct Rig {
        bridge: Rc<SignalBridge>,
        frames: Rc<ManualFrames>,
        session: Rc<SessionContext>,
        published: Rc<Published>,
    }

    fn rig() -> Rig {
        let session = SessionContext::new(PlayerConfig::default());
        let frames = Rc::new(ManualFrames::default());
        let published = Rc::new(Published::default());
        let bridge = SignalBridge::new(session.clone(), frames.clone(), published.clone());
        bridge.attach_source(Some(Rc::new(Constant(vec![255; 20]))));
        Rig {
            bridge,
            frames,
            session,
            published,
        }
    }

    #[test]
    fn bands_follow_bin_partition() {
        let mut bins = vec![0u8; 100];
        bins[..10].fill(255);
        bins[10..50].fill(51);
        let levels = measure_bands(&bins);
        assert_eq!(levels.bass, 1.0);
        assert!((levels.mid - 0.2).abs() < 1e-6);
        assert_eq!(levels.treble, 0.0);
        assert!((levels.intensity - 0.18).abs() < 1e-6);
    }

    #[test]
    fn empty_analyser_gives_silence() {
        assert_eq!(measure_bands(&[]), BandLevels::default());
        let tiny = measure_bands(&[255, 255]);
        assert_eq!(tiny.bass, 0.0);
        assert_eq!(tiny.mid, 1.0);
        assert_eq!(tiny.treble, 1.0);
    }

    #[test]
    fn loop_does_not_start_while_paused() {
        let rig = rig();
        rig.bridge.sync();
        assert!(!rig.bridge.is_running());
        assert_eq!(rig.frames.pending(), 0);
    }

    #[test]
    fn loop_reschedules_every_frame_while_playing() {
        let rig = rig();
        rig.session.set_playing(true);
        rig.bridge.sync();
        rig.bridge.sync();
        assert_eq!(rig.frames.pending(), 1);

        for _ in 0..3 {
            assert!(rig.frames.run_next());
            assert_eq!(rig.frames.pending(), 1);
        }
        assert_eq!(rig.session.audio().intensity, 1.0);
        assert_eq!(rig.published.last(), Some(rig.session.audio()));
    }

    #[test]
    fn loop_stops_once_playback_stops_and_resumes_on_sync() {
        let rig = rig();
        rig.session.set_playing(true);
        rig.bridge.sync();
        assert!(rig.frames.run_next());

        rig.session.set_playing(false);
        assert!(rig.frames.run_next());
        assert_eq!(rig.frames.pending(), 0);
        assert!(!rig.bridge.is_running());

        rig.session.set_playing(true);
        rig.bridge.sync();
        assert_eq!(rig.frames.pending(), 1);
        assert!(rig.bridge.is_running());
    }

    #[test]
    fn pausing_publishes_silence() {
        let rig = rig();
        rig.session.set_playing(true);
        rig.bridge.sync();
        assert!(rig.frames.run_next());
        let playing = rig.published.last().unwrap();
        assert!(playing.is_playing);
        assert_eq!(playing.intensity, 1.0);

        rig.session.set_playing(false);
        rig.bridge.sync();
        assert_eq!(rig.published.last(), Some(AudioSignal::default()));

        // The pending frame ends the loop and publishes the same silence.
        assert!(rig.frames.run_next());
        assert_eq!(rig.published.last(), Some(AudioSignal::default()));
    }

    #[test]
    fn play_state_is_published_without_an_analyser() {
        let rig = rig();
        rig.bridge.attach_source(None);
        rig.session.set_playing(true);
        rig.bridge.sync();
        assert_eq!(rig.frames.pending(), 0);
        assert!(rig.published.last().unwrap().is_playing);

        rig.session.set_playing(false);
        rig.bridge.sync();
        assert!(!rig.published.last().unwrap().is_playing);
    }
}
