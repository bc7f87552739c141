//! Amplitude.js, loaded by the host page, behind [`AudioEngine`].

use super::{AudioEngine, EngineError, EngineEvent, EngineHandler, ReloadRequest};
use crate::api::models::Song;
use crate::signal::browser::AnalyserSource;
use crate::signal::FrequencySource;
use std::rc::Rc;
use tracing::{debug, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::wasm_bindgen;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{AnalyserNode, HtmlAudioElement};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = Amplitude, js_name = init)]
    fn amplitude_init(config: &JsValue) -> Result<(), JsValue>;
    #[wasm_bindgen(catch, js_namespace = Amplitude, js_name = getSongs)]
    fn amplitude_songs() -> Result<JsValue, JsValue>;
    #[wasm_bindgen(catch, js_namespace = Amplitude, js_name = getActiveIndex)]
    fn amplitude_active_index() -> Result<JsValue, JsValue>;
    #[wasm_bindgen(catch, js_namespace = Amplitude, js_name = getSongPlayedSeconds)]
    fn amplitude_played_seconds() -> Result<JsValue, JsValue>;
    #[wasm_bindgen(catch, js_namespace = Amplitude, js_name = getSongPlayedPercentage)]
    fn amplitude_played_percentage() -> Result<JsValue, JsValue>;
    #[wasm_bindgen(catch, js_namespace = Amplitude, js_name = getPlayerState)]
    fn amplitude_player_state() -> Result<JsValue, JsValue>;
    #[wasm_bindgen(catch, js_namespace = Amplitude, js_name = skipTo)]
    fn amplitude_skip_to(seconds: f64, index: u32) -> Result<(), JsValue>;
    #[wasm_bindgen(catch, js_namespace = Amplitude, js_name = play)]
    fn amplitude_play() -> Result<(), JsValue>;
    #[wasm_bindgen(catch, js_namespace = Amplitude, js_name = pause)]
    fn amplitude_pause() -> Result<(), JsValue>;
    #[wasm_bindgen(catch, js_namespace = Amplitude, js_name = stop)]
    fn amplitude_stop() -> Result<(), JsValue>;
    #[wasm_bindgen(catch, js_namespace = Amplitude, js_name = setVolume)]
    fn amplitude_set_volume(volume: f64) -> Result<(), JsValue>;
    #[wasm_bindgen(catch, js_namespace = Amplitude, js_name = addSong)]
    fn amplitude_add_song(song: &JsValue) -> Result<JsValue, JsValue>;
    #[wasm_bindgen(catch, js_namespace = Amplitude, js_name = getAudio)]
    fn amplitude_audio() -> Result<JsValue, JsValue>;
    #[wasm_bindgen(catch, js_namespace = Amplitude, js_name = getAnalyser)]
    fn amplitude_analyser() -> Result<JsValue, JsValue>;
    #[wasm_bindgen(catch, js_namespace = Amplitude, js_name = bindNewElements)]
    fn amplitude_bind_new_elements() -> Result<(), JsValue>;
}

/// Amplitude's callback names and the events they raise.
const CALLBACKS: [(&str, EngineEvent); 5] = [
    ("play", EngineEvent::Play),
    ("pause", EngineEvent::Pause),
    ("stop", EngineEvent::Stop),
    ("song_change", EngineEvent::SongChange),
    ("timeupdate", EngineEvent::TimeUpdate),
];

fn rejected(call: &'static str) -> impl FnOnce(JsValue) -> EngineError {
    move |err| EngineError::Rejected {
        call,
        message: err
            .as_string()
            .unwrap_or_else(|| format!("{err:?}")),
    }
}

fn to_js<T: serde::Serialize>(value: &T, call: &'static str) -> Result<JsValue, EngineError> {
    let json = serde_json::to_string(value).map_err(|err| EngineError::Rejected {
        call,
        message: err.to_string(),
    })?;
    js_sys::JSON::parse(&json).map_err(rejected(call))
}

pub struct AmplitudeEngine {
    callbacks: Vec<(&'static str, Closure<dyn FnMut()>)>,
    initialized: bool,
    /// `[0, 1]`; reapplied on every init.
    volume: f64,
}

impl AmplitudeEngine {
    /// `None` when the page did not load Amplitude.
    pub fn detect() -> Option<Self> {
        let window = web_sys::window()?;
        let namespace = js_sys::Reflect::get(&window, &JsValue::from_str("Amplitude")).ok()?;
        if namespace.is_undefined() || namespace.is_null() {
            return None;
        }
        Some(Self {
            callbacks: Vec::new(),
            initialized: false,
            volume: 0.8,
        })
    }

    fn ensure_initialized(&self) -> Result<(), EngineError> {
        if self.initialized {
            Ok(())
        } else {
            Err(EngineError::NotInitialized)
        }
    }

    fn init_config(&self, request: &ReloadRequest) -> Result<JsValue, EngineError> {
        let mut config = serde_json::json!({
            "songs": request.songs,
            "autoplay": request.autoplay,
            "volume": (self.volume * 100.0).round(),
            "debug": false,
        });
        if let Some(start) = request.start_song {
            config["start_song"] = start.into();
        }
        let config = to_js(&config, "init")?;

        let callbacks = js_sys::Object::new();
        for (name, closure) in &self.callbacks {
            js_sys::Reflect::set(&callbacks, &JsValue::from_str(name), closure.as_ref())
                .map_err(rejected("init"))?;
        }
        js_sys::Reflect::set(&config, &JsValue::from_str("callbacks"), &callbacks)
            .map_err(rejected("init"))?;
        Ok(config)
    }

    fn number(value: Result<JsValue, JsValue>) -> Option<f64> {
        value
            .ok()
            .and_then(|value| value.as_f64())
            .filter(|value| value.is_finite())
    }
}

impl AudioEngine for AmplitudeEngine {
    fn register_handler(&mut self, handler: EngineHandler) {
        self.callbacks = CALLBACKS
            .iter()
            .map(|(name, event)| {
                let handler = handler.clone();
                let event = *event;
                let closure = Closure::wrap(Box::new(move || handler(event)) as Box<dyn FnMut()>);
                (*name, closure)
            })
            .collect();
    }

    fn reload(&mut self, request: &ReloadRequest) -> Result<(), EngineError> {
        let config = self.init_config(request)?;
        amplitude_init(&config).map_err(rejected("init"))?;
        self.initialized = true;
        debug!(songs = request.songs.len(), "amplitude initialized");
        Ok(())
    }

    fn songs(&self) -> Vec<Song> {
        if !self.initialized {
            return Vec::new();
        }
        let Some(json) = amplitude_songs()
            .ok()
            .and_then(|songs| js_sys::JSON::stringify(&songs).ok())
            .and_then(|json| json.as_string())
        else {
            return Vec::new();
        };
        let entries: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap_or_default();
        entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect()
    }

    fn active_index(&self) -> Option<usize> {
        if !self.initialized {
            return None;
        }
        Self::number(amplitude_active_index())
            .filter(|index| *index >= 0.0)
            .map(|index| index as usize)
    }

    fn played_seconds(&self) -> f64 {
        Self::number(amplitude_played_seconds()).unwrap_or(0.0)
    }

    fn played_percentage(&self) -> f64 {
        Self::number(amplitude_played_percentage()).unwrap_or(0.0)
    }

    fn is_playing(&self) -> bool {
        self.initialized
            && amplitude_player_state()
                .ok()
                .and_then(|state| state.as_string())
                .is_some_and(|state| state == "playing")
    }

    fn seek(&mut self, seconds: f64, index: usize) -> Result<(), EngineError> {
        self.ensure_initialized()?;
        let index = u32::try_from(index).map_err(|_| EngineError::Rejected {
            call: "skipTo",
            message: format!("index {index} out of range"),
        })?;
        amplitude_skip_to(seconds.max(0.0), index).map_err(rejected("skipTo"))
    }

    fn play(&mut self) -> Result<(), EngineError> {
        self.ensure_initialized()?;
        amplitude_play().map_err(rejected("play"))
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.ensure_initialized()?;
        amplitude_pause().map_err(rejected("pause"))
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
        if self.initialized {
            if let Err(err) = amplitude_set_volume((self.volume * 100.0).round()) {
                warn!(error = ?err, "could not set volume");
            }
        }
    }

    fn append(&mut self, song: &Song) -> Result<usize, EngineError> {
        self.ensure_initialized()?;
        let value = to_js(song, "addSong")?;
        let index = amplitude_add_song(&value).map_err(rejected("addSong"))?;
        match index.as_f64() {
            Some(index) if index.is_finite() && index >= 0.0 => Ok(index as usize),
            _ => Ok(self.songs().len().saturating_sub(1)),
        }
    }

    fn stop_and_unload(&mut self) {
        if !self.initialized {
            return;
        }
        if let Err(err) = amplitude_stop() {
            warn!(error = ?err, "could not stop playback");
        }
        let audio = amplitude_audio()
            .ok()
            .and_then(|audio| audio.dyn_into::<HtmlAudioElement>().ok());
        if let Some(audio) = audio {
            let _ = audio.remove_attribute("src");
            audio.load();
        }
    }

    fn rebind_elements(&mut self) {
        if !self.initialized {
            return;
        }
        if let Err(err) = amplitude_bind_new_elements() {
            warn!(error = ?err, "could not rebind player elements");
        }
    }

    fn frequency_source(&self) -> Option<Rc<dyn FrequencySource>> {
        if !self.initialized {
            return None;
        }
        let node = amplitude_analyser()
            .ok()?
            .dyn_into::<AnalyserNode>()
            .ok()?;
        Some(Rc::new(AnalyserSource::new(node)))
    }
}
