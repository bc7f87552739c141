// Native test builds leave out the browser glue that calls into the core.
#![cfg_attr(all(test, not(target_arch = "wasm32")), allow(dead_code))]

#[cfg(any(target_arch = "wasm32", test))]
mod api;
#[cfg(any(target_arch = "wasm32", test))]
mod config;
#[cfg(any(target_arch = "wasm32", test))]
mod db;
#[cfg(any(target_arch = "wasm32", test))]
mod diagnostics;
#[cfg(any(target_arch = "wasm32", test))]
mod engine;
#[cfg(any(target_arch = "wasm32", test))]
mod pjax;
#[cfg(any(target_arch = "wasm32", test))]
mod player;
#[cfg(any(target_arch = "wasm32", test))]
mod session;
#[cfg(any(target_arch = "wasm32", test))]
mod signal;

#[cfg(target_arch = "wasm32")]
mod bootstrap;
#[cfg(target_arch = "wasm32")]
mod components;

#[cfg(target_arch = "wasm32")]
fn main() {
    diagnostics::init_logging();
    dioxus::LaunchBuilder::new()
        .with_cfg(dioxus::web::Config::new().rootname(config::PLAYER_ROOT_ID))
        .launch(components::App);
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    eprintln!("fml-player runs in the browser; build it for wasm32-unknown-unknown.");
}
