//! In-memory `LinkDocument` for native tests.
//!
//! Insertions made through `FakeDocument::insert` are queued once an observer
//! is registered and handed over as one batch by `flush`, mimicking how
//! `MutationObserver` delivers records.

use std::cell::RefCell;
use std::rc::Rc;

use super::propagator::{Anchor, LinkDocument};
use crate::error::RelayError;

struct FakeElement {
    tag: String,
    attrs: RefCell<Vec<(String, String)>>,
    classes: RefCell<Vec<String>>,
    children: RefCell<Vec<FakeNode>>,
}

#[derive(Clone)]
pub struct FakeNode(Rc<FakeElement>);

impl FakeNode {
    pub fn element(tag: &str) -> Self {
        Self(Rc::new(FakeElement {
            tag: tag.to_string(),
            attrs: RefCell::new(Vec::new()),
            classes: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
        }))
    }

    pub fn anchor(href: &str) -> Self {
        Self::element("a").with_attr("href", href)
    }

    pub fn with_attr(self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_class(self, class: &str) -> Self {
        self.0.classes.borrow_mut().push(class.to_string());
        self
    }

    pub fn append(&self, child: FakeNode) {
        self.0.children.borrow_mut().push(child);
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        self.0
            .attrs
            .borrow()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    fn set_attr(&self, name: &str, value: &str) {
        let mut attrs = self.0.attrs.borrow_mut();
        match attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => attrs.push((name.to_string(), value.to_string())),
        }
    }

    fn is_anchor(&self) -> bool {
        self.0.tag == "a" && self.attr("href").is_some()
    }

    fn collect_descendants(&self, out: &mut Vec<FakeNode>) {
        for child in self.0.children.borrow().iter() {
            out.push(child.clone());
            child.collect_descendants(out);
        }
    }
}

impl Anchor for FakeNode {
    fn href(&self) -> Option<String> {
        self.attr("href")
    }

    fn set_href(&self, href: &str) {
        self.set_attr("href", href);
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    fn has_class(&self, class: &str) -> bool {
        self.0.classes.borrow().iter().any(|c| c == class)
    }
}

struct Inner {
    root: FakeNode,
    listener: RefCell<Option<Box<dyn FnMut(Vec<FakeNode>)>>>,
    pending: RefCell<Vec<FakeNode>>,
}

#[derive(Clone)]
pub struct FakeDocument(Rc<Inner>);

impl FakeDocument {
    pub fn new() -> Self {
        Self(Rc::new(Inner {
            root: FakeNode::element("html"),
            listener: RefCell::new(None),
            pending: RefCell::new(Vec::new()),
        }))
    }

    pub fn root(&self) -> FakeNode {
        self.0.root.clone()
    }

    /// Append `child` under `parent`; recorded only while observed.
    pub fn insert(&self, parent: &FakeNode, child: FakeNode) {
        parent.append(child.clone());
        if self.0.listener.borrow().is_some() {
            self.0.pending.borrow_mut().push(child);
        }
    }

    /// Deliver everything inserted since the last flush as one batch.
    pub fn flush(&self) {
        let batch: Vec<FakeNode> = self.0.pending.borrow_mut().drain(..).collect();
        if batch.is_empty() {
            return;
        }
        if let Some(listener) = self.0.listener.borrow_mut().as_mut() {
            listener(batch);
        }
    }
}

impl LinkDocument for FakeDocument {
    type Node = FakeNode;
    type Anchor = FakeNode;

    fn anchors(&self, scope: Option<&FakeNode>) -> Vec<FakeNode> {
        let root = scope.cloned().unwrap_or_else(|| self.root());
        let mut all = Vec::new();
        root.collect_descendants(&mut all);
        all.into_iter().filter(FakeNode::is_anchor).collect()
    }

    fn as_anchor(&self, node: &FakeNode) -> Option<FakeNode> {
        node.is_anchor().then(|| node.clone())
    }

    fn observe(&self, on_added: Box<dyn FnMut(Vec<FakeNode>)>) -> Result<(), RelayError> {
        *self.0.listener.borrow_mut() = Some(on_added);
        Ok(())
    }
}
