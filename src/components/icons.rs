use dioxus::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    Play,
    Pause,
    Queue,
    Remove,
    License,
    Volume,
}

#[component]
pub fn Icon(glyph: Glyph, class: String) -> Element {
    match glyph {
        Glyph::Play => rsx! {
            svg { class: "{class}", view_box: "0 0 24 24", fill: "currentColor",
                polygon { points: "6 4 20 12 6 20 6 4" }
            }
        },
        Glyph::Pause => rsx! {
            svg { class: "{class}", view_box: "0 0 24 24", fill: "currentColor",
                rect { x: "6", y: "4", width: "4", height: "16" }
                rect { x: "14", y: "4", width: "4", height: "16" }
            }
        },
        Glyph::Queue => rsx! {
            svg {
                class: "{class}",
                view_box: "0 0 24 24",
                fill: "none",
                stroke: "currentColor",
                stroke_width: "2",
                path { d: "M4 6h16M4 12h16M4 18h10" }
            }
        },
        Glyph::Remove => rsx! {
            svg {
                class: "{class}",
                view_box: "0 0 24 24",
                fill: "none",
                stroke: "currentColor",
                stroke_width: "2",
                path { d: "M6 6l12 12M18 6L6 18" }
            }
        },
        Glyph::License => rsx! {
            svg {
                class: "{class}",
                view_box: "0 0 24 24",
                fill: "none",
                stroke: "currentColor",
                stroke_width: "2",
                path { d: "M14 3H7a2 2 0 0 0-2 2v14a2 2 0 0 0 2 2h10a2 2 0 0 0 2-2V8z" }
                path { d: "M14 3v5h5M9 13h6M9 17h4" }
            }
        },
        Glyph::Volume => rsx! {
            svg {
                class: "{class}",
                view_box: "0 0 24 24",
                fill: "none",
                stroke: "currentColor",
                stroke_width: "2",
                polygon { points: "11 5 6 9 2 9 2 15 6 15 11 19 11 5" }
                path { d: "M15.5 8.5a5 5 0 0 1 0 7" }
            }
        },
    }
}
