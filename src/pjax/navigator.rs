//! The PJAX navigation state machine: `Idle -> Navigating -> Idle`.

use crate::config::PjaxConfig;
use crate::diagnostics::{log_perf, now_ms};
use crate::pjax::fetch::{with_timeout, FetchError, PageFetcher};
use crate::pjax::swap::{plan_swap, runnable_scripts, PageSnapshot, ScriptInfo, SwapError, SwapPlan};
use reqwest::Url;
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Idle,
    Navigating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Click,
    HistoryPop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    Transport,
    Timeout,
    NoContent,
    SwapFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Swapped,
    /// A navigation was already in flight; nothing happened.
    Ignored,
    /// Full browser navigation was requested instead.
    Native(Fallback),
}

/// The document the navigator mutates.
pub trait DocumentHost {
    /// A parsed, off-document response page.
    type Page;

    fn show_loader(&self);
    fn hide_loader(&self);
    fn snapshot_live(&self) -> PageSnapshot;
    fn parse(&self, html: &str) -> Result<(Self::Page, PageSnapshot), SwapError>;
    /// Applies the plan and returns the scripts found in the inserted
    /// content, in document order.
    fn apply(&self, page: Self::Page, plan: &SwapPlan) -> Result<Vec<ScriptInfo>, SwapError>;
    fn push_history(&self, url: &Url) -> Result<(), SwapError>;
    fn scroll_to_top(&self);
    fn run_script(&self, source: &str) -> Result<(), SwapError>;
    /// Re-runs the "page is ready" side effects for new markup.
    fn page_ready(&self);
    /// Full page load. A history move replaces the current entry so the
    /// back stack is not duplicated.
    fn navigate_natively(&self, url: &Url, trigger: Trigger);
}

/// Player-side callbacks around a navigation.
pub trait NavigationHooks {
    /// Runs before the fetch is issued.
    fn before_navigate(&self);
    /// Runs after a successful swap.
    fn after_swap(&self);
}

pub struct Navigator<H: DocumentHost, F: PageFetcher> {
    host: H,
    fetcher: F,
    hooks: Rc<dyn NavigationHooks>,
    config: PjaxConfig,
    state: Cell<NavState>,
}

/// Returns the machine to `Idle` and hides the loader on every exit path.
struct InFlight<'a, H: DocumentHost> {
    state: &'a Cell<NavState>,
    host: &'a H,
}

impl<H: DocumentHost> Drop for InFlight<'_, H> {
    fn drop(&mut self) {
        self.host.hide_loader();
        self.state.set(NavState::Idle);
    }
}

impl<H: DocumentHost, F: PageFetcher> Navigator<H, F> {
    pub fn new(host: H, fetcher: F, hooks: Rc<dyn NavigationHooks>, config: PjaxConfig) -> Self {
        Self {
            host,
            fetcher,
            hooks,
            config,
            state: Cell::new(NavState::Idle),
        }
    }

    pub fn state(&self) -> NavState {
        self.state.get()
    }

    #[cfg(test)]
    pub fn host(&self) -> &H {
        &self.host
    }

    fn begin(&self) -> Option<InFlight<'_, H>> {
        if self.state.get() == NavState::Navigating {
            return None;
        }
        self.state.set(NavState::Navigating);
        Some(InFlight {
            state: &self.state,
            host: &self.host,
        })
    }

    pub async fn navigate(&self, url: Url, trigger: Trigger) -> Outcome {
        let Some(_in_flight) = self.begin() else {
            debug!(%url, "navigation already in flight, ignoring");
            return Outcome::Ignored;
        };

        self.host.show_loader();
        self.hooks.before_navigate();

        let started = now_ms();
        let html = match with_timeout(self.fetcher.fetch(&url), self.config.fetch_timeout()).await {
            Ok(html) => html,
            Err(err) => {
                warn!(%url, error = %err, "page fetch failed, falling back to full load");
                self.host.navigate_natively(&url, trigger);
                let reason = match err {
                    FetchError::Timeout(_) => Fallback::Timeout,
                    _ => Fallback::Transport,
                };
                return Outcome::Native(reason);
            }
        };

        match self.swap(&url, &html, trigger) {
            Ok(()) => {
                log_perf("pjax.navigate", started, url.as_str());
                Outcome::Swapped
            }
            Err(SwapError::NoContent) => {
                warn!(%url, "fetched page has no content zone, falling back to full load");
                self.host.navigate_natively(&url, trigger);
                Outcome::Native(Fallback::NoContent)
            }
            Err(err) => {
                error!(%url, error = %err, "content swap failed, falling back to full load");
                self.host.navigate_natively(&url, trigger);
                Outcome::Native(Fallback::SwapFailed)
            }
        }
    }

    fn swap(&self, url: &Url, html: &str, trigger: Trigger) -> Result<(), SwapError> {
        let (page, mut fetched) = self.host.parse(html)?;
        fetched.url = Some(url.clone());
        let live = self.host.snapshot_live();
        let plan = plan_swap(&live, &fetched, &self.config.zones)?;
        debug!(
            removed = plan.remove.len(),
            inserted = plan.insert.len(),
            stylesheets = plan.new_stylesheets.len(),
            "applying content swap"
        );

        let scripts = self.host.apply(page, &plan)?;
        if trigger == Trigger::Click {
            self.host.push_history(url)?;
        }
        self.host.scroll_to_top();

        for source in runnable_scripts(&scripts, &self.config.engine_init_marker) {
            if let Err(err) = self.host.run_script(source) {
                warn!(error = %err, "inline script from swapped content failed");
            }
        }

        self.host.page_ready();
        self.hooks.after_swap();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pjax::zone::NodeInfo;
    use std::cell::RefCell;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeHost {
        calls: RefCell<Vec<String>>,
        fail_apply: bool,
        body: RefCell<Vec<NodeInfo>>,
    }

    impl FakeHost {
        fn with_body(body: Vec<NodeInfo>) -> Self {
            Self {
                body: RefCell::new(body),
                ..Self::default()
            }
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.borrow_mut().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.calls().iter().filter(|c| c.starts_with(prefix)).count()
        }
    }

    // Fetched pages are written as `tag,tag,...|title`.
    impl DocumentHost for FakeHost {
        type Page = Vec<NodeInfo>;

        fn show_loader(&self) {
            self.record("show_loader");
        }

        fn hide_loader(&self) {
            self.record("hide_loader");
        }

        fn snapshot_live(&self) -> PageSnapshot {
            PageSnapshot {
                body_nodes: self.body.borrow().clone(),
                ..PageSnapshot::default()
            }
        }

        fn parse(&self, html: &str) -> Result<(Self::Page, PageSnapshot), SwapError> {
            let (tags, title) = html
                .split_once('|')
                .ok_or_else(|| SwapError::Parse("missing title".into()))?;
            let nodes: Vec<NodeInfo> = tags
                .split(',')
                .filter(|tag| !tag.is_empty())
                .map(NodeInfo::element)
                .collect();
            let snapshot = PageSnapshot {
                body_nodes: nodes.clone(),
                title: title.to_string(),
                ..PageSnapshot::default()
            };
            Ok((nodes, snapshot))
        }

        fn apply(&self, page: Self::Page, plan: &SwapPlan) -> Result<Vec<ScriptInfo>, SwapError> {
            if self.fail_apply {
                return Err(SwapError::Dom("insertBefore threw".into()));
            }
            let mut body = self.body.borrow_mut();
            let anchor = plan.anchor.map(|i| body[i].clone());
            let mut kept: Vec<NodeInfo> = body
                .iter()
                .enumerate()
                .filter(|(i, _)| !plan.remove.contains(i))
                .map(|(_, node)| node.clone())
                .collect();
            let at = anchor
                .and_then(|a| kept.iter().position(|n| *n == a))
                .unwrap_or(kept.len());
            for (offset, index) in plan.insert.iter().enumerate() {
                kept.insert(at + offset, page[*index].clone());
            }
            *body = kept;
            self.record("apply");
            Ok(vec![
                ScriptInfo::inline("setup()"),
                ScriptInfo::inline("Amplitude.init({})"),
            ])
        }

        fn push_history(&self, url: &Url) -> Result<(), SwapError> {
            self.record(format!("push_history {url}"));
            Ok(())
        }

        fn scroll_to_top(&self) {
            self.record("scroll_to_top");
        }

        fn run_script(&self, source: &str) -> Result<(), SwapError> {
            self.record(format!("run_script {source}"));
            Ok(())
        }

        fn page_ready(&self) {
            self.record("page_ready");
        }

        fn navigate_natively(&self, url: &Url, trigger: Trigger) {
            match trigger {
                Trigger::Click => self.record(format!("native {url}")),
                Trigger::HistoryPop => self.record(format!("native-replace {url}")),
            }
        }
    }

    #[derive(Default)]
    struct CountingHooks {
        before: Cell<usize>,
        after: Cell<usize>,
    }

    impl NavigationHooks for CountingHooks {
        fn before_navigate(&self) {
            self.before.set(self.before.get() + 1);
        }

        fn after_swap(&self) {
            self.after.set(self.after.get() + 1);
        }
    }

    enum Response {
        Html(&'static str),
        Fail,
        Stall,
        Slow(&'static str),
    }

    struct ScriptedFetcher(Response);

    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&self, _url: &Url) -> Result<String, FetchError> {
            match self.0 {
                Response::Html(html) => Ok(html.to_string()),
                Response::Fail => Err(FetchError::Status(502)),
                Response::Stall => futures_util::future::pending().await,
                Response::Slow(html) => {
                    crate::pjax::fetch::sleep(Duration::from_secs(1)).await;
                    Ok(html.to_string())
                }
            }
        }
    }

    fn live_body() -> Vec<NodeInfo> {
        vec![
            NodeInfo::element("header"),
            NodeInfo::element("main").with_id("old"),
            NodeInfo::element("div").with_id("sticky-player"),
            NodeInfo::element("footer"),
        ]
    }

    fn navigator(
        response: Response,
        host: FakeHost,
    ) -> (Navigator<FakeHost, ScriptedFetcher>, Rc<CountingHooks>) {
        let hooks = Rc::new(CountingHooks::default());
        let nav = Navigator::new(
            host,
            ScriptedFetcher(response),
            hooks.clone(),
            PjaxConfig::default(),
        );
        (nav, hooks)
    }

    fn target() -> Url {
        Url::parse("https://music.example.com/songs/track-1").unwrap()
    }

    #[tokio::test]
    async fn click_swaps_content_and_keeps_chrome() {
        let (nav, hooks) = navigator(
            Response::Html("header,main,section,footer|Track 1"),
            FakeHost::with_body(live_body()),
        );

        assert_eq!(nav.navigate(target(), Trigger::Click).await, Outcome::Swapped);
        assert_eq!(nav.state(), NavState::Idle);

        let tags: Vec<String> = nav.host().body.borrow().iter().map(|n| n.tag.clone()).collect();
        assert_eq!(tags, vec!["header", "div", "main", "section", "footer"]);
        assert!(nav.host().body.borrow().iter().all(|n| n.id.as_deref() != Some("old")));

        let calls = nav.host().calls();
        assert_eq!(
            calls,
            vec![
                "show_loader".to_string(),
                "apply".into(),
                "push_history https://music.example.com/songs/track-1".into(),
                "scroll_to_top".into(),
                "run_script setup()".into(),
                "page_ready".into(),
                "hide_loader".into(),
            ]
        );
        assert_eq!(hooks.before.get(), 1);
        assert_eq!(hooks.after.get(), 1);
    }

    #[tokio::test]
    async fn history_pop_does_not_push_a_new_entry() {
        let (nav, _) = navigator(
            Response::Html("main|Back"),
            FakeHost::with_body(live_body()),
        );
        assert_eq!(nav.navigate(target(), Trigger::HistoryPop).await, Outcome::Swapped);
        assert_eq!(nav.host().count("push_history"), 0);
    }

    #[tokio::test]
    async fn fetch_failure_falls_back_once() {
        let (nav, hooks) = navigator(Response::Fail, FakeHost::with_body(live_body()));
        assert_eq!(
            nav.navigate(target(), Trigger::Click).await,
            Outcome::Native(Fallback::Transport)
        );
        assert_eq!(nav.host().count("native"), 1);
        assert_eq!(nav.host().count("hide_loader"), 1);
        assert_eq!(nav.state(), NavState::Idle);
        assert_eq!(hooks.after.get(), 0);
    }

    #[tokio::test]
    async fn history_pop_fallback_replaces_the_entry() {
        let (nav, _) = navigator(Response::Fail, FakeHost::with_body(live_body()));
        assert_eq!(
            nav.navigate(target(), Trigger::HistoryPop).await,
            Outcome::Native(Fallback::Transport)
        );
        assert_eq!(nav.host().count("native-replace"), 1);
        assert!(nav
            .host()
            .calls()
            .contains(&format!("native-replace {}", target())));
        assert_eq!(nav.host().count("push_history"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_fetch_times_out_into_native_navigation() {
        let (nav, _) = navigator(Response::Stall, FakeHost::with_body(live_body()));
        assert_eq!(
            nav.navigate(target(), Trigger::Click).await,
            Outcome::Native(Fallback::Timeout)
        );
        assert_eq!(nav.host().count("native"), 1);
        assert_eq!(nav.host().count("apply"), 0);
        assert_eq!(nav.state(), NavState::Idle);
    }

    #[tokio::test]
    async fn page_without_content_falls_back() {
        let (nav, _) = navigator(
            Response::Html("header,script,footer|Empty"),
            FakeHost::with_body(live_body()),
        );
        assert_eq!(
            nav.navigate(target(), Trigger::Click).await,
            Outcome::Native(Fallback::NoContent)
        );
        assert_eq!(nav.host().count("native"), 1);
        assert_eq!(nav.host().count("apply"), 0);
        assert_eq!(nav.host().body.borrow().len(), 4);
    }

    #[tokio::test]
    async fn dom_failure_falls_back_and_clears_state() {
        let host = FakeHost {
            fail_apply: true,
            ..FakeHost::with_body(live_body())
        };
        let (nav, _) = navigator(Response::Html("main|Broken"), host);
        assert_eq!(
            nav.navigate(target(), Trigger::Click).await,
            Outcome::Native(Fallback::SwapFailed)
        );
        assert_eq!(nav.host().count("native"), 1);
        assert_eq!(nav.host().count("hide_loader"), 1);
        assert_eq!(nav.state(), NavState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn second_click_while_navigating_is_ignored() {
        let (nav, hooks) = navigator(
            Response::Slow("main|Slow"),
            FakeHost::with_body(live_body()),
        );
        let other = Url::parse("https://music.example.com/albums/").unwrap();

        let (first, second) = tokio::join!(
            nav.navigate(target(), Trigger::Click),
            nav.navigate(other, Trigger::Click)
        );
        assert_eq!(first, Outcome::Swapped);
        assert_eq!(second, Outcome::Ignored);
        assert_eq!(hooks.before.get(), 1);
        assert_eq!(nav.host().count("push_history"), 1);
        assert_eq!(nav.state(), NavState::Idle);
    }
}
