//! Content-zone classification for top-level body children.
//!
//! Works on plain [`NodeInfo`] descriptions so the same rules apply to the
//! live document and to a freshly parsed response.

use crate::config::ZoneRules;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    #[default]
    Element,
    Text,
    Comment,
    Other,
}

/// What the classifier needs to know about one body child.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeInfo {
    pub kind: NodeKind,
    /// Lowercase local name; empty for non-elements.
    pub tag: String,
    pub id: Option<String>,
    pub role: Option<String>,
    pub classes: Vec<String>,
}

#[cfg(test)]
impl NodeInfo {
    pub fn element(tag: &str) -> Self {
        Self {
            kind: NodeKind::Element,
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn text() -> Self {
        Self {
            kind: NodeKind::Text,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }
}

/// One persistent-chrome marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChromeRule {
    Tag(String),
    Id(String),
    Role(String),
    Class(String),
}

impl ChromeRule {
    pub fn matches(&self, node: &NodeInfo) -> bool {
        if node.kind != NodeKind::Element {
            return false;
        }
        match self {
            Self::Tag(tag) => node.tag.eq_ignore_ascii_case(tag),
            Self::Id(id) => node.id.as_deref() == Some(id.as_str()),
            Self::Role(role) => node
                .role
                .as_deref()
                .is_some_and(|value| value.eq_ignore_ascii_case(role)),
            Self::Class(class) => node.classes.iter().any(|c| c == class),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    NotElement,
    IgnoredTag,
    Chrome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Excluded(Exclusion),
    Content,
}

pub fn classify(node: &NodeInfo, rules: &ZoneRules) -> Zone {
    if node.kind != NodeKind::Element {
        return Zone::Excluded(Exclusion::NotElement);
    }
    if rules
        .ignored_tags
        .iter()
        .any(|tag| node.tag.eq_ignore_ascii_case(tag))
    {
        return Zone::Excluded(Exclusion::IgnoredTag);
    }
    if rules.chrome.iter().any(|rule| rule.matches(node)) {
        return Zone::Excluded(Exclusion::Chrome);
    }
    Zone::Content
}

/// Indices into the body child list, split into the two zones.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Partition {
    pub content: Vec<usize>,
    pub excluded: Vec<usize>,
}

pub fn partition(nodes: &[NodeInfo], rules: &ZoneRules) -> Partition {
    let mut split = Partition::default();
    for (index, node) in nodes.iter().enumerate() {
        match classify(node, rules) {
            Zone::Content => split.content.push(index),
            Zone::Excluded(_) => split.excluded.push(index),
        }
    }
    split
}

/// First excluded node (document order) matching a footer-anchor rule.
/// Only excluded nodes qualify because content nodes are removed before
/// insertion. `split` must be the partition of `nodes`.
pub fn find_anchor(nodes: &[NodeInfo], split: &Partition, rules: &ZoneRules) -> Option<usize> {
    split.excluded.iter().copied().find(|&index| {
        nodes.get(index).is_some_and(|node| {
            matches!(classify(node, rules), Zone::Excluded(Exclusion::Chrome))
                && rules.footer_anchor.iter().any(|rule| rule.matches(node))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn themed_body() -> Vec<NodeInfo> {
        vec![
            NodeInfo::element("div").with_id("webgl-background"),
            NodeInfo::text(),
            NodeInfo::element("header").with_id("masthead"),
            NodeInfo::element("main").with_class("site-main"),
            NodeInfo::element("script"),
            NodeInfo::element("section").with_class("related"),
            NodeInfo::element("div").with_id("sticky-player"),
            NodeInfo::element("footer").with_id("colophon"),
            NodeInfo::element("div").with_id("loading-screen"),
            NodeInfo::element("noscript"),
        ]
    }

    #[test]
    fn separates_content_from_chrome() {
        let rules = ZoneRules::default();
        let split = partition(&themed_body(), &rules);
        assert_eq!(split.content, vec![3, 5]);
        assert_eq!(split.excluded, vec![0, 1, 2, 4, 6, 7, 8, 9]);
    }

    #[test]
    fn partition_is_disjoint_and_stable() {
        let rules = ZoneRules::default();
        let nodes = themed_body();
        let first = partition(&nodes, &rules);
        let second = partition(&nodes, &rules);
        assert_eq!(first, second);

        let mut all: Vec<usize> = first.content.iter().chain(&first.excluded).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..nodes.len()).collect::<Vec<_>>());
        assert!(first.content.iter().all(|i| !first.excluded.contains(i)));
    }

    #[test]
    fn role_markers_exclude_regions() {
        let rules = ZoneRules::default();
        let banner = NodeInfo::element("div").with_role("banner");
        let footer = NodeInfo::element("div").with_role("ContentInfo");
        assert_eq!(classify(&banner, &rules), Zone::Excluded(Exclusion::Chrome));
        assert_eq!(classify(&footer, &rules), Zone::Excluded(Exclusion::Chrome));
        assert_eq!(
            classify(&NodeInfo::element("LINK"), &rules),
            Zone::Excluded(Exclusion::IgnoredTag)
        );
    }

    #[test]
    fn anchor_is_first_footer_marker() {
        let rules = ZoneRules::default();
        let body = themed_body();
        assert_eq!(find_anchor(&body, &partition(&body, &rules), &rules), Some(7));

        let no_footer = vec![
            NodeInfo::element("main"),
            NodeInfo::element("div").with_id("sticky-player"),
        ];
        assert_eq!(find_anchor(&no_footer, &partition(&no_footer, &rules), &rules), None);
    }

    #[test]
    fn rules_deserialize_from_config_json() {
        let rule: ChromeRule = serde_json::from_str(r#"{"class":"site-header"}"#).unwrap();
        assert!(rule.matches(&NodeInfo::element("div").with_class("site-header")));
        assert!(!rule.matches(&NodeInfo::text()));
    }
}
