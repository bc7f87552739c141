/// Install the tracing subscriber. In the browser Dioxus routes it to the
/// devtools console.
#[cfg(target_arch = "wasm32")]
pub fn init_logging() {
    // A second call only fails because a subscriber already exists.
    let _ = dioxus::logger::init(tracing::Level::INFO);
}

/// Milliseconds from an arbitrary but fixed origin.
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

#[inline]
pub fn log_perf(scope: &str, started_at_ms: f64, details: &str) {
    let elapsed_ms = (now_ms() - started_at_ms).max(0.0).round() as u64;
    if details.trim().is_empty() {
        tracing::debug!("[perf] {scope} took {elapsed_ms}ms");
    } else {
        tracing::debug!("[perf] {scope} took {elapsed_ms}ms | {details}");
    }
}
