//! Same-origin link interception with in-place content swaps, so the player
//! chrome and its audio survive page changes.

#[cfg(target_arch = "wasm32")]
pub mod dom;
pub mod fetch;
pub mod links;
pub mod navigator;
pub mod swap;
pub mod zone;

pub use fetch::{FetchError, HttpPageFetcher, PageFetcher};
pub use links::{eligible_target, history_target, LinkCandidate, Modifiers, Rejection};
pub use navigator::{DocumentHost, NavState, NavigationHooks, Navigator, Outcome, Trigger};
