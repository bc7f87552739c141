//! Which link clicks are eligible for PJAX navigation.

use crate::config::PjaxConfig;
use reqwest::Url;

/// Anchor attributes relevant to the eligibility decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkCandidate {
    pub href: String,
    pub target: Option<String>,
    pub classes: Vec<String>,
    /// Names of attributes present on the anchor.
    pub attributes: Vec<String>,
}

impl LinkCandidate {
    #[cfg(test)]
    pub fn new(href: &str) -> Self {
        Self {
            href: href.to_string(),
            ..Self::default()
        }
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.attributes
            .iter()
            .any(|attribute| attribute.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn any(self) -> bool {
        self.ctrl || self.meta || self.shift || self.alt
    }
}

/// Why a click is left to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    EmptyHref,
    FragmentOnly,
    Scheme,
    Unparsable,
    CrossHost,
    AdminPath,
    Logout,
    NewWindow,
    OptedOut,
    Download,
    ModifierKey,
    DeniedExtension,
}

/// Resolve `link` against the current page and decide whether PJAX may
/// handle it. Pure: identical inputs always give the same answer.
pub fn eligible_target(
    link: &LinkCandidate,
    modifiers: Modifiers,
    current: &Url,
    config: &PjaxConfig,
) -> Result<Url, Rejection> {
    let href = link.href.trim();
    if href.is_empty() {
        return Err(Rejection::EmptyHref);
    }
    if href.starts_with('#') {
        return Err(Rejection::FragmentOnly);
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return Err(Rejection::Scheme);
    }

    let resolved = current.join(href).map_err(|_| Rejection::Unparsable)?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return Err(Rejection::Scheme);
    }
    if resolved.host_str() != current.host_str() || resolved.port() != current.port() {
        return Err(Rejection::CrossHost);
    }
    if resolved.fragment().is_some() && same_document(&resolved, current) {
        return Err(Rejection::FragmentOnly);
    }

    let path = resolved.path();
    if config
        .admin_paths
        .iter()
        .any(|prefix| path.starts_with(prefix.as_str()))
    {
        return Err(Rejection::AdminPath);
    }
    if requests_logout(&resolved) {
        return Err(Rejection::Logout);
    }

    if link
        .target
        .as_deref()
        .is_some_and(|target| target.trim().eq_ignore_ascii_case("_blank"))
    {
        return Err(Rejection::NewWindow);
    }
    if link.classes.iter().any(|class| *class == config.opt_out_class)
        || link.has_attribute(&config.opt_out_attribute)
    {
        return Err(Rejection::OptedOut);
    }
    if link.has_attribute("download") {
        return Err(Rejection::Download);
    }
    if modifiers.any() {
        return Err(Rejection::ModifierKey);
    }
    if let Some(extension) = extension_of(path) {
        if config
            .denied_extensions
            .iter()
            .any(|denied| denied.eq_ignore_ascii_case(&extension))
        {
            return Err(Rejection::DeniedExtension);
        }
    }

    Ok(resolved)
}

fn same_document(a: &Url, b: &Url) -> bool {
    a.path() == b.path() && a.query() == b.query()
}

/// Page to load when history moves to `target` while `loaded` is on
/// screen. `None` when only the fragment changed; the browser scrolls.
pub fn history_target(target: &Url, loaded: &Url) -> Option<Url> {
    let same_origin = target.host_str() == loaded.host_str() && target.port() == loaded.port();
    if same_origin && same_document(target, loaded) {
        return None;
    }
    Some(target.clone())
}

fn requests_logout(url: &Url) -> bool {
    url.path().to_ascii_lowercase().contains("logout")
        || url
            .query_pairs()
            .any(|(key, value)| key == "action" && value.eq_ignore_ascii_case("logout"))
}

fn extension_of(path: &str) -> Option<String> {
    let file = path.rsplit('/').next()?;
    let (_, extension) = file.rsplit_once('.')?;
    if extension.is_empty() {
        None
    } else {
        Some(extension.to_ascii_lowercase())
    }
}
