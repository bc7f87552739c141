//! Player configuration.
//!
//! Read once at startup from the JSON in the player root's `data-config`
//! attribute. Every field has a default, so a partial object is enough.

use crate::pjax::zone::ChromeRule;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Element the player island mounts into. It is persistent chrome.
pub const PLAYER_ROOT_ID: &str = "sticky-player";
pub const CONFIG_ATTRIBUTE: &str = "data-config";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid player config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PlayerConfig {
    pub pjax: PjaxConfig,
    pub ui: UiConfig,
}

impl PlayerConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PjaxConfig {
    pub enabled: bool,
    pub fetch_timeout_ms: u64,
    /// Delay before the second round of synthetic resize/scroll events.
    pub settle_delay_ms: u64,
    pub denied_extensions: Vec<String>,
    pub admin_paths: Vec<String>,
    pub opt_out_class: String,
    pub opt_out_attribute: String,
    /// Inline scripts containing this text are never re-executed.
    pub engine_init_marker: String,
    pub loader_id: String,
    pub sticky_selector: String,
    pub datatable_selector: String,
    pub modal_selector: String,
    pub zones: ZoneRules,
}

impl PjaxConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for PjaxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fetch_timeout_ms: 15_000,
            settle_delay_ms: 150,
            denied_extensions: [
                "pdf", "zip", "rar", "mp3", "mp4", "wav", "doc", "docx", "xls", "xlsx", "jpg",
                "jpeg", "png", "gif", "webp", "svg", "bmp",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            admin_paths: vec!["/wp-admin".to_string(), "/wp-login.php".to_string()],
            opt_out_class: "no-pjax".to_string(),
            opt_out_attribute: "data-no-pjax".to_string(),
            engine_init_marker: "Amplitude.init".to_string(),
            loader_id: "loading-screen".to_string(),
            sticky_selector: ".is-sticky, .sticky-top, [data-sticky]".to_string(),
            datatable_selector: "table.fml-datatable".to_string(),
            modal_selector: "[data-fml-modal]".to_string(),
            zones: ZoneRules::default(),
        }
    }
}

/// Declarative exclusion predicate for the content zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneRules {
    /// Tags that are never content regardless of markers.
    pub ignored_tags: Vec<String>,
    /// Persistent chrome markers, checked in order.
    pub chrome: Vec<ChromeRule>,
    /// Markers for the node fetched content is inserted before.
    pub footer_anchor: Vec<ChromeRule>,
}

impl Default for ZoneRules {
    fn default() -> Self {
        Self {
            ignored_tags: ["script", "style", "link", "noscript"]
                .into_iter()
                .map(String::from)
                .collect(),
            chrome: vec![
                ChromeRule::Tag("header".to_string()),
                ChromeRule::Tag("footer".to_string()),
                ChromeRule::Role("banner".to_string()),
                ChromeRule::Role("contentinfo".to_string()),
                ChromeRule::Id("masthead".to_string()),
                ChromeRule::Id("colophon".to_string()),
                ChromeRule::Id("webgl-background".to_string()),
                ChromeRule::Id("loading-screen".to_string()),
                ChromeRule::Id(PLAYER_ROOT_ID.to_string()),
            ],
            footer_anchor: vec![
                ChromeRule::Tag("footer".to_string()),
                ChromeRule::Role("contentinfo".to_string()),
                ChromeRule::Id("colophon".to_string()),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Class toggled on play affordances whose song is the active one.
    pub active_song_class: String,
    pub volume: f64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            active_song_class: "is-active-song".to_string(),
            volume: 0.8,
        }
    }
}
