//! Wires the player into the host page: storage, engine, controller, signal
//! bridge, PJAX navigator and the document listeners that drive them.

use crate::api::models::{Song, ATTR_URL, SONG_ATTRIBUTES};
use crate::config::{PlayerConfig, CONFIG_ATTRIBUTE, PLAYER_ROOT_ID};
use crate::db::{BrowserStore, KeyValueStore, MemoryStore, QueueStore};
use crate::engine::amplitude::AmplitudeEngine;
use crate::engine::{EngineEvent, EngineHandler};
use crate::pjax::dom::{current_url, history_state, BrowserDocument};
use crate::pjax::{
    eligible_target, history_target, HttpPageFetcher, LinkCandidate, Modifiers, NavState,
    NavigationHooks, Navigator, Outcome, Trigger,
};
use crate::player::{PlayerController, ViewSink};
use crate::session::SessionContext;
use crate::signal::browser::{AnimationFrameScheduler, WindowMirror};
use crate::signal::SignalBridge;
use reqwest::Url;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use tracing::{debug, error, info, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{window, Document, Element, Event, MouseEvent, PopStateEvent};

const ACTION_ATTRIBUTE: &str = "data-fml-action";
const PLAYLIST_ATTRIBUTE: &str = "data-fml-playlist";

type PageNavigator = Navigator<BrowserDocument, HttpPageFetcher>;

/// Run `f` on the next event-loop turn so engine callbacks never re-enter a
/// controller borrow.
fn defer<F>(f: F)
where
    F: FnOnce() + 'static,
{
    wasm_bindgen_futures::spawn_local(async move {
        gloo_timers::future::TimeoutFuture::new(0).await;
        f();
    });
}

pub fn load_config(document: &Document) -> PlayerConfig {
    let raw = document
        .get_element_by_id(PLAYER_ROOT_ID)
        .and_then(|root| root.get_attribute(CONFIG_ATTRIBUTE))
        .unwrap_or_default();
    match PlayerConfig::from_json(&raw) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "ignoring player config");
            PlayerConfig::default()
        }
    }
}

struct PlayerHooks {
    controller: Weak<RefCell<PlayerController>>,
}

impl NavigationHooks for PlayerHooks {
    fn before_navigate(&self) {
        let Some(controller) = self.controller.upgrade() else {
            return;
        };
        if let Ok(controller) = controller.try_borrow() {
            controller.persist_snapshot();
        };
    }

    fn after_swap(&self) {
        let Some(controller) = self.controller.upgrade() else {
            return;
        };
        if let Ok(mut controller) = controller.try_borrow_mut() {
            controller.rebind_elements();
            controller.refresh_view();
        };
    }
}

pub struct PlayerRuntime {
    session: Rc<SessionContext>,
    controller: Rc<RefCell<PlayerController>>,
    navigator: Rc<PageNavigator>,
    bridge: Rc<SignalBridge>,
    loaded_url: Rc<RefCell<Option<Url>>>,
}

impl PlayerRuntime {
    /// `None` when the page has no document or did not load the audio engine.
    pub fn start(config: PlayerConfig, view: Rc<dyn ViewSink>) -> Option<Rc<Self>> {
        let document = window()?.document()?;
        let session = SessionContext::new(config.clone());

        let Some(engine) = AmplitudeEngine::detect() else {
            error!("audio engine is not loaded on this page, player disabled");
            return None;
        };

        let backend: Box<dyn KeyValueStore> = match BrowserStore::open() {
            Some(store) => Box::new(store),
            None => {
                warn!("localStorage unavailable, playback will not survive reloads");
                Box::new(MemoryStore::default())
            }
        };

        let controller = Rc::new(RefCell::new(PlayerController::new(
            Box::new(engine),
            QueueStore::new(backend),
            view,
            session.clone(),
        )));
        let bridge = SignalBridge::new(
            session.clone(),
            Rc::new(AnimationFrameScheduler),
            Rc::new(WindowMirror),
        );

        let host = BrowserDocument::new(config.pjax.clone())?;
        let hooks = Rc::new(PlayerHooks {
            controller: Rc::downgrade(&controller),
        });
        let navigator = Rc::new(Navigator::new(
            host,
            HttpPageFetcher,
            hooks,
            config.pjax.clone(),
        ));

        let runtime = Rc::new(Self {
            session,
            controller,
            navigator,
            bridge,
            loaded_url: Rc::new(RefCell::new(current_url())),
        });

        runtime.register_engine_handler();
        let resumed = runtime.controller.borrow_mut().bootstrap();
        runtime.start_signal();

        runtime.mark_initial_entry();
        runtime.listen_for_clicks(&document);
        runtime.listen_for_history();
        runtime.listen_for_unload();
        info!(resumed, pjax = config.pjax.enabled, "player ready");
        Some(runtime)
    }

    pub fn session(&self) -> &Rc<SessionContext> {
        &self.session
    }

    pub fn play_index(&self, index: usize) {
        self.with_controller(|controller| controller.play_index(index));
    }

    pub fn remove_from_queue(&self, index: usize) {
        self.with_controller(|controller| {
            controller.remove_from_queue(index);
        });
    }

    pub fn toggle_playback(&self) {
        self.with_controller(PlayerController::toggle_playback);
    }

    pub fn set_volume(&self, volume: f64) {
        self.with_controller(|controller| controller.set_volume(volume));
    }

    fn with_controller(&self, f: impl FnOnce(&mut PlayerController)) {
        match self.controller.try_borrow_mut() {
            Ok(mut controller) => f(&mut controller),
            Err(_) => warn!("player is busy, dropping request"),
        }
    }

    fn register_engine_handler(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let handler: EngineHandler = Rc::new(move |event: EngineEvent| {
            let weak = weak.clone();
            defer(move || {
                if let Some(runtime) = weak.upgrade() {
                    runtime.on_engine_event(event);
                }
            });
        });
        self.controller.borrow_mut().register_engine_handler(handler);
    }

    fn on_engine_event(&self, event: EngineEvent) {
        self.with_controller(|controller| controller.handle_event(event));
        match event {
            EngineEvent::Play => self.start_signal(),
            EngineEvent::Pause | EngineEvent::Stop => self.bridge.sync(),
            EngineEvent::SongChange | EngineEvent::TimeUpdate => {}
        }
    }

    fn start_signal(&self) {
        let source = match self.controller.try_borrow() {
            Ok(controller) => controller.frequency_source(),
            Err(_) => return,
        };
        if source.is_none() {
            debug!("no analyser available, audio signal stays idle");
        }
        self.bridge.attach_source(source);
        self.bridge.sync();
    }

    fn handle_action(&self, element: &Element) {
        let action = element.get_attribute(ACTION_ATTRIBUTE).unwrap_or_default();
        match action.as_str() {
            "play" | "queue" => {
                let song = match Song::from_attributes(&song_attributes(element)) {
                    Ok(song) => song,
                    Err(err) => {
                        warn!(error = %err, "ignoring play affordance");
                        return;
                    }
                };
                self.with_controller(|controller| {
                    if action == "play" {
                        controller.play_at_top(song);
                    } else {
                        controller.add_to_queue(song);
                    }
                });
            }
            "play-all" => {
                let songs = playlist_songs(element);
                self.with_controller(|controller| controller.play_all(songs));
            }
            other => debug!(action = other, "unknown player action"),
        }
    }

    fn navigate(&self, url: Url, trigger: Trigger) {
        let navigator = self.navigator.clone();
        let loaded = self.loaded_url.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let outcome = navigator.navigate(url.clone(), trigger).await;
            debug!(%url, ?outcome, "navigation finished");
            if outcome == Outcome::Swapped {
                *loaded.borrow_mut() = Some(url);
            }
        });
    }

    fn on_click(&self, event: MouseEvent) {
        let Some(target) = event
            .target()
            .and_then(|target| target.dyn_into::<Element>().ok())
        else {
            return;
        };

        if let Ok(Some(affordance)) = target.closest(&format!("[{ACTION_ATTRIBUTE}]")) {
            event.prevent_default();
            self.handle_action(&affordance);
            return;
        }

        if !self.session.config().pjax.enabled || event.button() != 0 || event.default_prevented()
        {
            return;
        }
        let Ok(Some(anchor)) = target.closest("a[href]") else {
            return;
        };
        let Some(current) = current_url() else {
            return;
        };

        let modifiers = Modifiers {
            ctrl: event.ctrl_key(),
            meta: event.meta_key(),
            shift: event.shift_key(),
            alt: event.alt_key(),
        };
        match eligible_target(&link_candidate(&anchor), modifiers, &current, &self.session.config().pjax) {
            Ok(url) => {
                event.prevent_default();
                if self.navigator.state() == NavState::Navigating {
                    debug!(%url, "navigation in flight, ignoring click");
                    return;
                }
                self.navigate(url, Trigger::Click);
            }
            Err(reason) => debug!(?reason, "link left to the browser"),
        }
    }

    fn on_popstate(&self, _event: PopStateEvent) {
        if !self.session.config().pjax.enabled {
            return;
        }
        let Some(target) = current_url() else {
            return;
        };
        let loaded = self.loaded_url.borrow().clone();
        let next = match &loaded {
            Some(loaded) => history_target(&target, loaded),
            None => Some(target.clone()),
        };
        match next {
            Some(url) => self.navigate(url, Trigger::HistoryPop),
            None => *self.loaded_url.borrow_mut() = Some(target),
        }
    }

    /// Give the landing entry the same state shape PJAX entries carry.
    fn mark_initial_entry(&self) {
        let (Some(window), Some(url)) = (window(), current_url()) else {
            return;
        };
        if let Ok(history) = window.history() {
            let _ = history.replace_state_with_url(&history_state(&url), "", Some(url.as_str()));
        }
    }

    fn listen_for_clicks(self: &Rc<Self>, document: &Document) {
        let weak = Rc::downgrade(self);
        let on_click = Closure::wrap(Box::new(move |event: MouseEvent| {
            if let Some(runtime) = weak.upgrade() {
                runtime.on_click(event);
            }
        }) as Box<dyn FnMut(_)>);
        let _ = document.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref());
        on_click.forget();
    }

    fn listen_for_history(self: &Rc<Self>) {
        let Some(window) = window() else {
            return;
        };
        let weak = Rc::downgrade(self);
        let on_pop = Closure::wrap(Box::new(move |event: PopStateEvent| {
            if let Some(runtime) = weak.upgrade() {
                runtime.on_popstate(event);
            }
        }) as Box<dyn FnMut(_)>);
        let _ = window.add_event_listener_with_callback("popstate", on_pop.as_ref().unchecked_ref());
        on_pop.forget();
    }

    fn listen_for_unload(self: &Rc<Self>) {
        let Some(window) = window() else {
            return;
        };
        for name in ["beforeunload", "pagehide"] {
            let weak = Rc::downgrade(self);
            let persist = Closure::wrap(Box::new(move |_event: Event| {
                let Some(runtime) = weak.upgrade() else {
                    return;
                };
                if let Ok(controller) = runtime.controller.try_borrow() {
                    controller.persist_snapshot();
                };
            }) as Box<dyn FnMut(_)>);
            let _ = window.add_event_listener_with_callback(name, persist.as_ref().unchecked_ref());
            persist.forget();
        }
    }
}

fn song_attributes(element: &Element) -> HashMap<String, String> {
    SONG_ATTRIBUTES
        .iter()
        .filter_map(|name| {
            element
                .get_attribute(name)
                .map(|value| (name.to_string(), value))
        })
        .collect()
}

/// Songs listed inside the affordance's playlist container, in order.
fn playlist_songs(element: &Element) -> Vec<Song> {
    let container = element
        .closest(&format!("[{PLAYLIST_ATTRIBUTE}]"))
        .ok()
        .flatten();
    let Some(container) = container else {
        warn!("play all affordance is not inside a playlist");
        return Vec::new();
    };
    let Ok(list) = container.query_selector_all(&format!("[{ATTR_URL}]")) else {
        return Vec::new();
    };
    (0..list.length())
        .filter_map(|index| list.item(index))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .filter(|entry| entry.get_attribute(ACTION_ATTRIBUTE).as_deref() != Some("play-all"))
        .filter_map(|entry| Song::from_attributes(&song_attributes(&entry)).ok())
        .collect()
}

fn link_candidate(anchor: &Element) -> LinkCandidate {
    LinkCandidate {
        href: anchor.get_attribute("href").unwrap_or_default(),
        target: anchor.get_attribute("target"),
        classes: anchor
            .class_name()
            .split_whitespace()
            .map(str::to_string)
            .collect(),
        attributes: anchor
            .get_attribute_names()
            .iter()
            .filter_map(|name| name.as_string())
            .collect(),
    }
}
