use crate::components::{Glyph, Icon, PlayerHandle};
use crate::player::PlayerView;
use dioxus::prelude::*;

#[component]
pub fn PlayerPanel(view: Signal<PlayerView>) -> Element {
    let handle = use_context::<PlayerHandle>();
    let mut queue_open = use_signal(|| false);
    let mut volume = use_signal({
        let handle = handle.clone();
        move || (handle.initial_volume() * 100.0).round()
    });

    let current = view();
    let song = current.current.clone();
    let has_song = song.is_some();
    let title = song
        .as_ref()
        .map(|song| song.display_name().to_string())
        .unwrap_or_else(|| "Nothing playing".to_string());
    let cover = song
        .as_ref()
        .map(|song| song.cover_art_url.clone())
        .filter(|url| !url.trim().is_empty());
    let show_separator = current.show_meta_separator();

    let on_toggle = {
        let handle = handle.clone();
        move |_| handle.toggle_playback()
    };
    let on_volume = {
        let handle = handle.clone();
        move |e: Event<FormData>| {
            if let Ok(value) = e.value().parse::<f64>() {
                volume.set(value);
                handle.set_volume((value / 100.0).clamp(0.0, 1.0));
            }
        }
    };

    rsx! {
        div { class: "fml-player",
            div { class: "fml-player__now-playing",
                if let Some(cover) = cover {
                    img { class: "fml-player__cover", src: "{cover}", alt: "" }
                }
                div { class: "fml-player__meta",
                    span { class: "fml-player__title", "{title}" }
                    div { class: "fml-player__links",
                        if let Some(link) = current.artist_link.clone() {
                            a { class: "fml-player__artist", href: "{link.href}", "{link.label}" }
                        }
                        if show_separator {
                            span { class: "fml-player__separator", " / " }
                        }
                        if let Some(link) = current.album_link.clone() {
                            a { class: "fml-player__album", href: "{link.href}", "{link.label}" }
                        }
                    }
                }
            }

            div { class: "fml-player__controls",
                button {
                    r#type: "button",
                    class: "fml-player__play-pause",
                    disabled: !has_song,
                    aria_label: if current.is_playing { "Pause" } else { "Play" },
                    onclick: on_toggle,
                    if current.is_playing {
                        Icon { glyph: Glyph::Pause, class: "w-5 h-5".to_string() }
                    } else {
                        Icon { glyph: Glyph::Play, class: "w-5 h-5".to_string() }
                    }
                }
                if let Some(href) = current.license_href.clone() {
                    a {
                        class: "fml-player__license",
                        href: "{href}",
                        title: "License this track",
                        Icon { glyph: Glyph::License, class: "w-5 h-5".to_string() }
                    }
                }
                label { class: "fml-player__volume",
                    Icon { glyph: Glyph::Volume, class: "w-4 h-4".to_string() }
                    input {
                        r#type: "range",
                        min: "0",
                        max: "100",
                        value: "{volume}",
                        oninput: on_volume,
                    }
                }
                button {
                    r#type: "button",
                    class: if queue_open() { "fml-player__queue-toggle is-open" } else { "fml-player__queue-toggle" },
                    aria_label: "Queue",
                    onclick: move |_| queue_open.set(!queue_open()),
                    Icon { glyph: Glyph::Queue, class: "w-5 h-5".to_string() }
                    span { class: "fml-player__queue-count", "{current.rows.len()}" }
                }
            }

            if queue_open() {
                ol { class: "fml-player__queue",
                    for row in current.rows.clone() {
                        li {
                            key: "{row.index}",
                            class: if row.active { "fml-queue-row is-active" } else { "fml-queue-row" },
                            button {
                                r#type: "button",
                                class: "fml-queue-row__jump",
                                onclick: {
                                    let handle = handle.clone();
                                    move |_| handle.play_index(row.index)
                                },
                                if !row.cover_art_url.is_empty() {
                                    img { class: "fml-queue-row__cover", src: "{row.cover_art_url}", alt: "" }
                                }
                                span { class: "fml-queue-row__name", "{row.name}" }
                                span { class: "fml-queue-row__artist", "{row.artist}" }
                            }
                            button {
                                r#type: "button",
                                class: "fml-queue-row__remove",
                                aria_label: "Remove from queue",
                                disabled: current.rows.len() <= 1,
                                onclick: {
                                    let handle = handle.clone();
                                    move |_| handle.remove_from_queue(row.index)
                                },
                                Icon { glyph: Glyph::Remove, class: "w-4 h-4".to_string() }
                            }
                        }
                    }
                }
            }
        }
    }
}
