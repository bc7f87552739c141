use crate::bootstrap::{load_config, PlayerRuntime};
use crate::components::PlayerPanel;
use crate::pjax::dom::sync_active_affordances;
use crate::player::{PlayerView, ViewSink};
use dioxus::core::{Runtime, RuntimeGuard};
use dioxus::prelude::*;
use std::rc::Rc;
use web_sys::window;

/// Shared with every component below [`App`]. Empty when the player could
/// not start on this page.
#[derive(Clone)]
pub struct PlayerHandle(pub Option<Rc<PlayerRuntime>>);

impl PlayerHandle {
    pub fn play_index(&self, index: usize) {
        if let Some(runtime) = &self.0 {
            runtime.play_index(index);
        }
    }

    pub fn remove_from_queue(&self, index: usize) {
        if let Some(runtime) = &self.0 {
            runtime.remove_from_queue(index);
        }
    }

    pub fn toggle_playback(&self) {
        if let Some(runtime) = &self.0 {
            runtime.toggle_playback();
        }
    }

    pub fn set_volume(&self, volume: f64) {
        if let Some(runtime) = &self.0 {
            runtime.set_volume(volume);
        }
    }

    pub fn initial_volume(&self) -> f64 {
        self.0
            .as_ref()
            .map(|runtime| runtime.session().config().ui.volume)
            .unwrap_or(0.8)
    }
}

/// Pushes controller views into the UI signal and mirrors the active song
/// onto play affordances in the page content.
struct BrowserViewSink {
    view: Signal<PlayerView>,
    runtime: Rc<Runtime>,
    active_class: String,
}

impl ViewSink for BrowserViewSink {
    fn render(&self, view: PlayerView) {
        if let Some(document) = window().and_then(|window| window.document()) {
            sync_active_affordances(&document, view.active_url(), &self.active_class);
        }

        // Controller calls can come from outside a render scope, so the
        // write is deferred and run under the captured runtime.
        let mut signal = self.view;
        let runtime = self.runtime.clone();
        wasm_bindgen_futures::spawn_local(async move {
            gloo_timers::future::TimeoutFuture::new(0).await;
            let _guard = RuntimeGuard::new(runtime);
            signal.set(view);
        });
    }
}

#[component]
pub fn App() -> Element {
    let view = use_signal(PlayerView::default);

    let handle = use_hook(move || {
        let config = window()
            .and_then(|window| window.document())
            .map(|document| load_config(&document))
            .unwrap_or_default();
        let sink = Rc::new(BrowserViewSink {
            view,
            runtime: Runtime::current(),
            active_class: config.ui.active_song_class.clone(),
        });
        PlayerHandle(PlayerRuntime::start(config, sink))
    });
    let ready = handle.0.is_some();
    use_context_provider(|| handle);

    rsx! {
        if ready {
            PlayerPanel { view }
        }
    }
}
