//! The live browser document behind [`DocumentHost`].

use crate::config::PjaxConfig;
use crate::pjax::navigator::{DocumentHost, Trigger};
use crate::pjax::swap::{PageSnapshot, ScriptInfo, SwapError, SwapPlan};
use crate::pjax::zone::{NodeInfo, NodeKind};
use reqwest::Url;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    window, CustomEvent, CustomEventInit, Document, DomParser, Element, Event, HtmlDialogElement,
    HtmlElement, Node, NodeList, SupportedType,
};

pub const PJAX_COMPLETE_EVENT: &str = "fml:pjax-complete";
const MODAL_READY_ATTRIBUTE: &str = "data-fml-modal-ready";
const LOADER_VISIBLE_CLASS: &str = "is-visible";

fn dom_error(err: JsValue) -> SwapError {
    SwapError::Dom(format!("{err:?}"))
}

pub struct BrowserDocument {
    document: Document,
    config: PjaxConfig,
}

impl BrowserDocument {
    pub fn new(config: PjaxConfig) -> Option<Self> {
        let document = window()?.document()?;
        Some(Self { document, config })
    }

    fn loader(&self) -> Option<Element> {
        self.document.get_element_by_id(&self.config.loader_id)
    }

    fn reflow_sticky(&self) {
        let Ok(list) = self.document.query_selector_all(&self.config.sticky_selector) else {
            return;
        };
        for element in elements(&list) {
            let Ok(element) = element.dyn_into::<HtmlElement>() else {
                continue;
            };
            let style = element.style();
            let previous = style.get_property_value("display").unwrap_or_default();
            let _ = style.set_property("display", "none");
            // Reading layout forces the reflow.
            let _ = element.offset_height();
            let _ = style.set_property("display", &previous);
        }
    }

    fn bind_modals(&self) {
        let Ok(list) = self.document.query_selector_all(&self.config.modal_selector) else {
            return;
        };
        for trigger in elements(&list) {
            if trigger.has_attribute(MODAL_READY_ATTRIBUTE) {
                continue;
            }
            let Some(dialog_id) = trigger.get_attribute("data-fml-modal") else {
                continue;
            };
            let document = self.document.clone();
            let on_click = Closure::wrap(Box::new(move |event: Event| {
                let dialog = document
                    .get_element_by_id(&dialog_id)
                    .and_then(|element| element.dyn_into::<HtmlDialogElement>().ok());
                if let Some(dialog) = dialog {
                    event.prevent_default();
                    if let Err(err) = dialog.show_modal() {
                        tracing::warn!(error = ?err, "could not open modal dialog");
                    }
                }
            }) as Box<dyn FnMut(_)>);
            let _ = trigger
                .add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref());
            on_click.forget();
            let _ = trigger.set_attribute(MODAL_READY_ATTRIBUTE, "true");
        }
    }

    fn init_datatables(&self) {
        let Ok(selector) = serde_json::to_string(&self.config.datatable_selector) else {
            return;
        };
        let _ = js_sys::eval(&format!(
            r#"(() => {{
  const $ = window.jQuery;
  if (!$ || !$.fn || !$.fn.DataTable) return false;
  $({selector}).not('.dataTable').DataTable();
  return true;
}})()"#
        ));
    }
}

impl DocumentHost for BrowserDocument {
    type Page = Document;

    fn show_loader(&self) {
        if let Some(loader) = self.loader() {
            let _ = loader.class_list().add_1(LOADER_VISIBLE_CLASS);
        }
    }

    fn hide_loader(&self) {
        if let Some(loader) = self.loader() {
            let _ = loader.class_list().remove_1(LOADER_VISIBLE_CLASS);
        }
    }

    fn snapshot_live(&self) -> PageSnapshot {
        snapshot(&self.document)
    }

    fn parse(&self, html: &str) -> Result<(Document, PageSnapshot), SwapError> {
        let parser = DomParser::new().map_err(|err| SwapError::Parse(format!("{err:?}")))?;
        let page = parser
            .parse_from_string(html, SupportedType::TextHtml)
            .map_err(|err| SwapError::Parse(format!("{err:?}")))?;
        let fetched = snapshot(&page);
        Ok((page, fetched))
    }

    fn apply(&self, page: Document, plan: &SwapPlan) -> Result<Vec<ScriptInfo>, SwapError> {
        let body = self
            .document
            .body()
            .ok_or_else(|| SwapError::Dom("live document has no body".to_string()))?;
        let fetched_body = page.body().ok_or(SwapError::NoContent)?;

        // Both lists are captured before mutating so plan indices stay valid.
        let live = children(&body);
        let incoming = children(&fetched_body);
        let anchor = plan.anchor.and_then(|index| live.get(index).cloned());

        for index in &plan.remove {
            if let Some(node) = live.get(*index) {
                body.remove_child(node).map_err(dom_error)?;
            }
        }

        let mut scripts = Vec::new();
        for index in &plan.insert {
            let Some(node) = incoming.get(*index) else {
                continue;
            };
            let adopted = self.document.adopt_node(node).map_err(dom_error)?;
            body.insert_before(&adopted, anchor.as_ref())
                .map_err(dom_error)?;
            if let Some(element) = adopted.dyn_ref::<Element>() {
                collect_scripts(element, &mut scripts);
            }
        }

        body.set_class_name(&plan.body_class);
        if let Some(title) = &plan.title {
            self.document.set_title(title);
        }

        if !plan.new_stylesheets.is_empty() {
            let head = self
                .document
                .head()
                .ok_or_else(|| SwapError::Dom("live document has no head".to_string()))?;
            for href in &plan.new_stylesheets {
                let link = self.document.create_element("link").map_err(dom_error)?;
                link.set_attribute("rel", "stylesheet").map_err(dom_error)?;
                link.set_attribute("href", href).map_err(dom_error)?;
                head.append_child(&link).map_err(dom_error)?;
            }
        }

        Ok(scripts)
    }

    fn push_history(&self, url: &Url) -> Result<(), SwapError> {
        let history = window()
            .ok_or_else(|| SwapError::Dom("no window".to_string()))?
            .history()
            .map_err(dom_error)?;
        history
            .push_state_with_url(&history_state(url), "", Some(url.as_str()))
            .map_err(dom_error)
    }

    fn scroll_to_top(&self) {
        if let Some(window) = window() {
            window.scroll_to_with_x_and_y(0.0, 0.0);
        }
    }

    fn run_script(&self, source: &str) -> Result<(), SwapError> {
        js_sys::eval(source)
            .map(|_| ())
            .map_err(|err| SwapError::Script(format!("{err:?}")))
    }

    fn page_ready(&self) {
        let _ = js_sys::eval(
            r#"(() => {
  if (window.componentHandler && typeof componentHandler.upgradeDom === "function") {
    componentHandler.upgradeDom();
  }
  if (window.jQuery) {
    window.jQuery(document).trigger("pjax:complete");
  } else {
    document.dispatchEvent(new Event("pjax:complete"));
  }
})()"#,
        );

        self.reflow_sticky();
        dispatch_layout_events();
        let settle = self.config.settle_delay();
        wasm_bindgen_futures::spawn_local(async move {
            crate::pjax::fetch::sleep(settle).await;
            dispatch_layout_events();
        });

        let init = CustomEventInit::new();
        init.set_bubbles(true);
        if let Ok(event) = CustomEvent::new_with_event_init_dict(PJAX_COMPLETE_EVENT, &init) {
            let _ = self.document.dispatch_event(&event);
        }

        self.init_datatables();
        self.bind_modals();
    }

    fn navigate_natively(&self, url: &Url, trigger: Trigger) {
        let Some(window) = window() else {
            return;
        };
        let location = window.location();
        let loaded = match trigger {
            // The browser already moved to this entry.
            Trigger::HistoryPop => location.replace(url.as_str()),
            Trigger::Click => location.set_href(url.as_str()),
        };
        if let Err(err) = loaded {
            tracing::error!(%url, error = ?err, "native navigation failed");
        }
    }
}

/// `{ "pjax": true, "url": .. }`, the marker popstate handling looks for.
pub fn history_state(url: &Url) -> JsValue {
    let state = serde_json::json!({ "pjax": true, "url": url.as_str() });
    js_sys::JSON::parse(&state.to_string()).unwrap_or(JsValue::NULL)
}

pub fn current_url() -> Option<Url> {
    let href = window()?.location().href().ok()?;
    Url::parse(&href).ok()
}

/// Flag every play affordance for `active_url` with `class`, and clear it
/// everywhere else.
pub fn sync_active_affordances(document: &Document, active_url: Option<&str>, class: &str) {
    let selector = format!("[{}]", crate::api::models::ATTR_URL);
    let Ok(list) = document.query_selector_all(&selector) else {
        return;
    };
    for element in elements(&list) {
        let url = element.get_attribute(crate::api::models::ATTR_URL);
        let active = active_url.is_some() && url.as_deref() == active_url;
        let _ = element.class_list().toggle_with_force(class, active);
    }
}

fn dispatch_layout_events() {
    let Some(window) = window() else {
        return;
    };
    for name in ["resize", "scroll"] {
        if let Ok(event) = Event::new(name) {
            let _ = window.dispatch_event(&event);
        }
    }
}

fn snapshot(document: &Document) -> PageSnapshot {
    let Some(body) = document.body() else {
        return PageSnapshot {
            title: document.title(),
            ..PageSnapshot::default()
        };
    };
    let body_nodes = children(&body).iter().map(describe).collect();
    let stylesheets = document
        .query_selector_all("head link[rel~=\"stylesheet\"]")
        .map(|list| {
            elements(&list)
                .filter_map(|link| link.get_attribute("href"))
                .collect()
        })
        .unwrap_or_default();

    PageSnapshot {
        body_nodes,
        body_class: body.class_name(),
        title: document.title(),
        stylesheets,
        url: document.url().ok().and_then(|href| Url::parse(&href).ok()),
    }
}

fn children(parent: &Node) -> Vec<Node> {
    let list = parent.child_nodes();
    (0..list.length()).filter_map(|index| list.item(index)).collect()
}

fn elements(list: &NodeList) -> impl Iterator<Item = Element> + '_ {
    (0..list.length())
        .filter_map(|index| list.item(index))
        .filter_map(|node| node.dyn_into::<Element>().ok())
}

fn describe(node: &Node) -> NodeInfo {
    let Some(element) = node.dyn_ref::<Element>() else {
        let kind = match node.node_type() {
            Node::TEXT_NODE => NodeKind::Text,
            Node::COMMENT_NODE => NodeKind::Comment,
            _ => NodeKind::Other,
        };
        return NodeInfo {
            kind,
            ..NodeInfo::default()
        };
    };

    let id = element.id();
    NodeInfo {
        kind: NodeKind::Element,
        tag: element.local_name().to_ascii_lowercase(),
        id: (!id.is_empty()).then_some(id),
        role: element.get_attribute("role"),
        classes: element
            .class_name()
            .split_whitespace()
            .map(str::to_string)
            .collect(),
    }
}

fn collect_scripts(root: &Element, scripts: &mut Vec<ScriptInfo>) {
    let mut found = Vec::new();
    if root.local_name().eq_ignore_ascii_case("script") {
        found.push(root.clone());
    }
    if let Ok(list) = root.query_selector_all("script") {
        found.extend(elements(&list));
    }
    scripts.extend(found.into_iter().map(|script| ScriptInfo {
        external: script.has_attribute("src"),
        source: script.text_content().unwrap_or_default(),
    }));
}
