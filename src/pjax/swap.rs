//! Computes what a content swap changes, independent of the DOM.

use crate::config::ZoneRules;
use crate::pjax::zone::{find_anchor, partition, NodeInfo};
use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("fetched page has no swappable content")]
    NoContent,
    #[error("could not parse fetched page: {0}")]
    Parse(String),
    #[error("document update failed: {0}")]
    Dom(String),
    #[error("inline script failed: {0}")]
    Script(String),
}

/// The parts of a document the swap reads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageSnapshot {
    pub body_nodes: Vec<NodeInfo>,
    pub body_class: String,
    pub title: String,
    /// `href` of every `<link rel="stylesheet">` in the head.
    pub stylesheets: Vec<String>,
    /// Address relative hrefs resolve against.
    pub url: Option<Url>,
}

impl PageSnapshot {
    /// Stylesheet hrefs made absolute where possible, so `/css/a.css` and
    /// `https://host/css/a.css` compare equal.
    fn resolved_stylesheets(&self) -> impl Iterator<Item = String> + '_ {
        self.stylesheets
            .iter()
            .map(|href| href.trim())
            .filter(|href| !href.is_empty())
            .map(|href| {
                match &self.url {
                    Some(base) => base.join(href),
                    None => Url::parse(href),
                }
                .map(|url| url.to_string())
                .unwrap_or_else(|_| href.to_string())
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInfo {
    pub external: bool,
    pub source: String,
}

#[cfg(test)]
impl ScriptInfo {
    pub fn inline(source: &str) -> Self {
        Self {
            external: false,
            source: source.to_string(),
        }
    }
}

/// Indices refer to the body child lists of the snapshots the plan was
/// computed from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SwapPlan {
    pub remove: Vec<usize>,
    pub insert: Vec<usize>,
    /// Live node to insert before; `None` appends to the body.
    pub anchor: Option<usize>,
    pub body_class: String,
    pub title: Option<String>,
    pub new_stylesheets: Vec<String>,
}

pub fn plan_swap(
    live: &PageSnapshot,
    fetched: &PageSnapshot,
    rules: &ZoneRules,
) -> Result<SwapPlan, SwapError> {
    let incoming = partition(&fetched.body_nodes, rules);
    if incoming.content.is_empty() {
        return Err(SwapError::NoContent);
    }
    let outgoing = partition(&live.body_nodes, rules);

    let title = fetched.title.trim();
    let loaded: Vec<String> = live.resolved_stylesheets().collect();
    let mut new_stylesheets: Vec<String> = Vec::new();
    for href in fetched.resolved_stylesheets() {
        if loaded.contains(&href) || new_stylesheets.contains(&href) {
            continue;
        }
        new_stylesheets.push(href);
    }

    let anchor = find_anchor(&live.body_nodes, &outgoing, rules);
    Ok(SwapPlan {
        remove: outgoing.content,
        insert: incoming.content,
        anchor,
        body_class: fetched.body_class.clone(),
        title: (!title.is_empty()).then(|| title.to_string()),
        new_stylesheets,
    })
}

/// Inline scripts that are safe to re-run, in document order. Scripts that
/// would re-initialize the audio engine are skipped.
pub fn runnable_scripts<'a>(
    scripts: &'a [ScriptInfo],
    engine_init_marker: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    scripts
        .iter()
        .filter(|script| !script.external && !script.source.trim().is_empty())
        .filter(move |script| {
            engine_init_marker.is_empty() || !script.source.contains(engine_init_marker)
        })
        .map(|script| script.source.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_page() -> PageSnapshot {
        PageSnapshot {
            body_nodes: vec![
                NodeInfo::element("header").with_id("masthead"),
                NodeInfo::element("main"),
                NodeInfo::element("aside"),
                NodeInfo::element("div").with_id("sticky-player"),
                NodeInfo::element("footer").with_id("colophon"),
            ],
            body_class: "home".into(),
            title: "Home".into(),
            stylesheets: vec!["/css/theme.css".into()],
            url: None,
        }
    }

    fn fetched_page() -> PageSnapshot {
        PageSnapshot {
            body_nodes: vec![
                NodeInfo::element("header").with_id("masthead"),
                NodeInfo::text(),
                NodeInfo::element("main"),
                NodeInfo::element("script"),
                NodeInfo::element("footer").with_id("colophon"),
            ],
            body_class: "single single-song".into(),
            title: "  Night Drive  ".into(),
            stylesheets: vec![
                "/css/theme.css".into(),
                "/css/song.css".into(),
                "/css/song.css".into(),
            ],
            url: None,
        }
    }

    #[test]
    fn plans_content_replacement() {
        let plan = plan_swap(&live_page(), &fetched_page(), &ZoneRules::default()).unwrap();
        assert_eq!(plan.remove, vec![1, 2]);
        assert_eq!(plan.insert, vec![2]);
        assert_eq!(plan.anchor, Some(4));
        assert_eq!(plan.body_class, "single single-song");
        assert_eq!(plan.title.as_deref(), Some("Night Drive"));
        assert_eq!(plan.new_stylesheets, vec!["/css/song.css".to_string()]);
    }

    #[test]
    fn stylesheets_match_across_href_spellings() {
        let site = Url::parse("https://music.example.com/songs/night-drive").ok();
        let live = PageSnapshot {
            stylesheets: vec![
                "https://music.example.com/css/theme.css".into(),
                "../css/base.css".into(),
            ],
            url: Url::parse("https://music.example.com/albums/dusk").ok(),
            ..live_page()
        };
        let fetched = PageSnapshot {
            stylesheets: vec![
                "/css/theme.css".into(),
                " /css/base.css ".into(),
                "song.css".into(),
                "https://cdn.example.com/fonts.css".into(),
            ],
            url: site,
            ..fetched_page()
        };
        let plan = plan_swap(&live, &fetched, &ZoneRules::default()).unwrap();
        assert_eq!(
            plan.new_stylesheets,
            vec![
                "https://music.example.com/songs/song.css".to_string(),
                "https://cdn.example.com/fonts.css".to_string(),
            ]
        );
    }

    #[test]
    fn empty_content_zone_is_rejected() {
        let fetched = PageSnapshot {
            body_nodes: vec![
                NodeInfo::element("header"),
                NodeInfo::element("script"),
                NodeInfo::element("footer"),
            ],
            ..PageSnapshot::default()
        };
        assert!(matches!(
            plan_swap(&live_page(), &fetched, &ZoneRules::default()),
            Err(SwapError::NoContent)
        ));
    }

    #[test]
    fn blank_title_is_not_copied() {
        let fetched = PageSnapshot {
            title: "   ".into(),
            ..fetched_page()
        };
        let plan = plan_swap(&live_page(), &fetched, &ZoneRules::default()).unwrap();
        assert_eq!(plan.title, None);
    }

    #[test]
    fn engine_init_scripts_are_skipped() {
        let scripts = vec![
            ScriptInfo::inline("window.pageId = 7;"),
            ScriptInfo {
                external: true,
                source: String::new(),
            },
            ScriptInfo::inline("Amplitude.init({ songs: [] });"),
            ScriptInfo::inline("   "),
            ScriptInfo::inline("initGallery();"),
        ];
        let runnable: Vec<&str> = runnable_scripts(&scripts, "Amplitude.init").collect();
        assert_eq!(runnable, vec!["window.pageId = 7;", "initGallery();"]);
    }
}
