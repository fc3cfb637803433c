//! Browser side of link propagation: `web_sys` anchors, the document sweep
//! and the `MutationObserver` subscription.

use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{
    AddEventListenerOptions, Document, Element, MutationObserver, MutationObserverInit,
    MutationRecord, Node, NodeList,
};

use super::propagator::{Anchor, LinkDocument, PageContext};
use crate::error::RelayError;

const ANCHOR_SELECTOR: &str = "a[href]";

impl Anchor for Element {
    fn href(&self) -> Option<String> {
        self.get_attribute("href")
    }

    fn set_href(&self, href: &str) {
        if let Err(e) = self.set_attribute("href", href) {
            warn_log!("failed to set href: {}", crate::utils::js_error_text(&e));
        }
    }

    fn has_attribute(&self, name: &str) -> bool {
        !name.is_empty() && Element::has_attribute(self, name)
    }

    fn has_class(&self, class: &str) -> bool {
        !class.is_empty() && self.class_list().contains(class)
    }
}

pub struct WebDocument {
    document: Document,
}

impl WebDocument {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    /// `<base href>` for resolving relative links, the document's own URL
    /// for deciding which links are ours.
    pub fn page_context(&self) -> Result<PageContext, RelayError> {
        let location = self.document.url().map_err(|e| RelayError::js(&e))?;
        let base = match self.document.base_uri() {
            Ok(Some(uri)) => uri,
            _ => location.clone(),
        };
        PageContext::new(&base, &location)
    }
}

impl LinkDocument for WebDocument {
    type Node = Node;
    type Anchor = Element;

    fn anchors(&self, scope: Option<&Node>) -> Vec<Element> {
        let list = match scope {
            None => self.document.query_selector_all(ANCHOR_SELECTOR),
            Some(node) => match node.dyn_ref::<Element>() {
                Some(el) => el.query_selector_all(ANCHOR_SELECTOR),
                None => return Vec::new(),
            },
        };
        match list {
            Ok(list) => elements(&list),
            Err(e) => {
                warn_log!("anchor query failed: {}", crate::utils::js_error_text(&e));
                Vec::new()
            }
        }
    }

    fn as_anchor(&self, node: &Node) -> Option<Element> {
        let el = node.dyn_ref::<Element>()?;
        if el.tag_name().eq_ignore_ascii_case("a") && Element::has_attribute(el, "href") {
            Some(el.clone())
        } else {
            None
        }
    }

    fn observe(&self, mut on_added: Box<dyn FnMut(Vec<Node>)>) -> Result<(), RelayError> {
        let target = self
            .document
            .document_element()
            .ok_or(RelayError::NoDocument)?;

        let callback = Closure::wrap(Box::new(move |records: js_sys::Array, _: MutationObserver| {
            let mut added = Vec::new();
            for record in records.iter() {
                let record: MutationRecord = match record.dyn_into() {
                    Ok(r) => r,
                    Err(_) => continue,
                };
                let nodes = record.added_nodes();
                for i in 0..nodes.length() {
                    if let Some(node) = nodes.get(i) {
                        if node.node_type() == Node::ELEMENT_NODE {
                            added.push(node);
                        }
                    }
                }
            }
            if !added.is_empty() {
                on_added(added);
            }
        }) as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

        let observer =
            MutationObserver::new(callback.as_ref().unchecked_ref()).map_err(|e| RelayError::js(&e))?;
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        observer
            .observe_with_options(&target, &init)
            .map_err(|e| RelayError::js(&e))?;

        // Observation lasts for the page's lifetime.
        callback.forget();
        Ok(())
    }
}

fn elements(list: &NodeList) -> Vec<Element> {
    (0..list.length())
        .filter_map(|i| list.get(i))
        .filter_map(|n| n.dyn_into::<Element>().ok())
        .collect()
}

/// Run `f` once the DOM has been parsed: right away if it already has been,
/// otherwise on `DOMContentLoaded`.
pub fn on_dom_ready(document: &Document, f: impl FnOnce() + 'static) -> Result<(), RelayError> {
    if document.ready_state() != "loading" {
        f();
        return Ok(());
    }

    let opts = AddEventListenerOptions::new();
    opts.set_once(true);
    let cb = Closure::once_into_js(f);
    document
        .add_event_listener_with_callback_and_add_event_listener_options(
            "DOMContentLoaded",
            cb.unchecked_ref(),
            &opts,
        )
        .map_err(|e| RelayError::js(&e))
}
