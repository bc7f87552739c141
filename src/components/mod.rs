mod app;
mod icons;
mod player_panel;

pub use app::{App, PlayerHandle};
pub use icons::{Glyph, Icon};
pub use player_panel::PlayerPanel;
