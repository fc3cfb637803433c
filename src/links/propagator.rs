//! Carry `?token=…&api=…` onto navigation links.
//!
//! A link qualifies when it points at the page's own origin, starts with one
//! of the whitelisted host prefixes, or carries the opt-in marker. Nothing
//! else ever sees the token.
//!
//! Coverage is two-phase: `start()` sweeps every anchor already in the
//! document and only then subscribes to insertions, so an anchor is either
//! present for the sweep or reported in a later batch.

use std::rc::Rc;

use url::{Origin, Position, Url};

use crate::constants::{QUERY_PARAM_API, QUERY_PARAM_TOKEN};
use crate::error::RelayError;
use crate::network::config::HostWhitelist;
use crate::state::{AuthContext, SharedAuth, SharedConfig};

/// An `<a>` element as far as propagation is concerned.
pub trait Anchor {
    /// Raw `href` attribute, `None` when absent.
    fn href(&self) -> Option<String>;
    fn set_href(&self, href: &str);
    fn has_attribute(&self, name: &str) -> bool;
    fn has_class(&self, class: &str) -> bool;
}

/// The document the propagator sweeps and watches.
pub trait LinkDocument {
    type Node;
    type Anchor: Anchor;

    /// Every anchor with an `href` below `scope`, or in the whole document
    /// when `scope` is `None`.
    fn anchors(&self, scope: Option<&Self::Node>) -> Vec<Self::Anchor>;

    /// `node` itself, if it is an anchor with an `href`.
    fn as_anchor(&self, node: &Self::Node) -> Option<Self::Anchor>;

    /// Register `on_added` to receive every batch of element nodes inserted
    /// anywhere in the document from now on.
    fn observe(&self, on_added: Box<dyn FnMut(Vec<Self::Node>)>) -> Result<(), RelayError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkDecision {
    Rewritten(String),
    /// The href could not be parsed; parameters were appended textually.
    Concatenated(String),
    Skipped(LinkSkip),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSkip {
    NoHref,
    /// Neither token nor base is set.
    NoContext,
    /// Cross-origin, not whitelisted, not opted in.
    Untrusted,
    /// Already carries the current values.
    UpToDate,
}

impl LinkDecision {
    pub fn new_href(&self) -> Option<&str> {
        match self {
            LinkDecision::Rewritten(h) | LinkDecision::Concatenated(h) => Some(h),
            LinkDecision::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub rewritten: usize,
    pub skipped: usize,
}

impl SweepReport {
    fn record(&mut self, decision: &LinkDecision) {
        if decision.new_href().is_some() {
            self.rewritten += 1;
        } else {
            self.skipped += 1;
        }
    }

    fn merge(&mut self, other: SweepReport) {
        self.rewritten += other.rewritten;
        self.skipped += other.skipped;
    }
}

/// Where a page's links start from. Relative hrefs resolve against `base`
/// (`document.baseURI`, which a `<base>` element may move to another host);
/// only the origin of the page's own `location` counts as "ours".
#[derive(Debug, Clone)]
pub struct PageContext {
    base: Url,
    origin: Origin,
}

impl PageContext {
    pub fn new(base_url: &str, location: &str) -> Result<Self, RelayError> {
        let base = Url::parse(base_url).map_err(|e| RelayError::invalid_url(base_url, e))?;
        let location_url =
            Url::parse(location).map_err(|e| RelayError::invalid_url(location, e))?;
        Ok(Self {
            base,
            origin: location_url.origin(),
        })
    }

    /// A page without a `<base>` element.
    pub fn at(url: &str) -> Result<Self, RelayError> {
        Self::new(url, url)
    }

    fn resolve(&self, href: &str) -> Result<Url, url::ParseError> {
        self.base.join(href)
    }

    fn is_own_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin
    }
}

/// Whether `href` may receive the token without an explicit opt-in.
/// Unparseable hrefs are treated as relative and allowed.
pub fn qualifies(href: &str, page: &PageContext, hosts: &HostWhitelist) -> bool {
    match page.resolve(href) {
        Ok(dest) => page.is_own_origin(&dest) || hosts.matches(dest.as_str()),
        Err(_) => true,
    }
}

/// Set or replace the `token` and `api` parameters on `href`.
///
/// Only non-empty values are written. Other parameters keep their order.
/// Relative same-origin hrefs stay root-relative.
pub fn add_params(href: &str, page: &PageContext, ctx: &AuthContext) -> LinkDecision {
    let params: Vec<(&str, &str)> = [
        (QUERY_PARAM_TOKEN, ctx.token.as_str()),
        (QUERY_PARAM_API, ctx.base.as_str()),
    ]
    .into_iter()
    .filter(|(_, v)| !v.is_empty())
    .collect();

    if params.is_empty() {
        return LinkDecision::Skipped(LinkSkip::NoContext);
    }

    let mut dest = match page.resolve(href) {
        Ok(u) => u,
        Err(_) => return LinkDecision::Concatenated(concat_params(href, &params)),
    };
    set_query_params(&mut dest, &params);

    let out = if is_relative_reference(href) && page.is_own_origin(&dest) {
        dest[Position::BeforePath..].to_string()
    } else {
        dest.to_string()
    };

    if out == href {
        LinkDecision::Skipped(LinkSkip::UpToDate)
    } else {
        LinkDecision::Rewritten(out)
    }
}

/// Full decision for one link: the opt-in marker overrides the whitelist.
pub fn decide(
    href: &str,
    opted_in: bool,
    page: &PageContext,
    hosts: &HostWhitelist,
    ctx: &AuthContext,
) -> LinkDecision {
    if !opted_in && !qualifies(href, page, hosts) {
        return LinkDecision::Skipped(LinkSkip::Untrusted);
    }
    add_params(href, page, ctx)
}

/// `URLSearchParams::set` for each pair: the first occurrence is replaced in
/// place, later duplicates dropped, missing keys appended.
fn set_query_params(url: &mut Url, params: &[(&str, &str)]) {
    let mut seen = vec![false; params.len()];
    let mut pairs: Vec<(String, String)> = Vec::new();

    for (key, value) in url.query_pairs() {
        match params.iter().position(|(name, _)| *name == key) {
            Some(i) if !seen[i] => {
                seen[i] = true;
                pairs.push((key.into_owned(), params[i].1.to_string()));
            }
            Some(_) => {}
            None => pairs.push((key.into_owned(), value.into_owned())),
        }
    }
    for (i, (name, value)) in params.iter().enumerate() {
        if !seen[i] {
            pairs.push((name.to_string(), value.to_string()));
        }
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
}

fn concat_params(href: &str, params: &[(&str, &str)]) -> String {
    let sep = if href.contains('?') { '&' } else { '?' };
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}{}{}", href, sep, query)
}

fn is_relative_reference(href: &str) -> bool {
    !href.trim_start().starts_with("//")
        && matches!(Url::parse(href), Err(url::ParseError::RelativeUrlWithoutBase))
}

pub struct LinkPropagator<D: LinkDocument> {
    document: D,
    page: PageContext,
    auth: SharedAuth,
    config: SharedConfig,
}

impl<D: LinkDocument + 'static> LinkPropagator<D> {
    pub fn new(
        document: D,
        page: PageContext,
        auth: SharedAuth,
        config: SharedConfig,
    ) -> Self {
        Self {
            document,
            page,
            auth,
            config,
        }
    }

    /// Decide for one anchor against the current context and apply the result.
    pub fn propagate(&self, anchor: &D::Anchor) -> LinkDecision {
        let href = match anchor.href() {
            Some(h) => h,
            None => return LinkDecision::Skipped(LinkSkip::NoHref),
        };

        let ctx = self.auth.get();
        let decision = self.config.with(|cfg| {
            let opted_in =
                anchor.has_attribute(&cfg.opt_in_attribute) || anchor.has_class(&cfg.opt_in_class);
            decide(&href, opted_in, &self.page, &cfg.pass_hosts, &ctx)
        });

        match &decision {
            LinkDecision::Rewritten(new_href) => anchor.set_href(new_href),
            LinkDecision::Concatenated(new_href) => {
                warn_log!("could not parse link `{}`, appended parameters as text", href);
                anchor.set_href(new_href);
            }
            LinkDecision::Skipped(_) => {}
        }
        decision
    }

    /// Rewrite every qualifying anchor currently in the document.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_anchors(self.document.anchors(None))
    }

    pub fn sweep_node(&self, node: &D::Node) -> SweepReport {
        match self.document.as_anchor(node) {
            Some(anchor) => {
                let mut report = SweepReport::default();
                report.record(&self.propagate(&anchor));
                report
            }
            None => self.sweep_anchors(self.document.anchors(Some(node))),
        }
    }

    pub fn handle_added(&self, nodes: Vec<D::Node>) -> SweepReport {
        let mut report = SweepReport::default();
        for node in &nodes {
            report.merge(self.sweep_node(node));
        }
        report
    }

    /// Initial sweep, then observe insertions for the rest of the page's life.
    pub fn start(self: &Rc<Self>) -> Result<SweepReport, RelayError> {
        let report = self.sweep();
        debug_log!(
            "initial sweep: {} rewritten, {} skipped",
            report.rewritten,
            report.skipped
        );

        let this = Rc::clone(self);
        self.document.observe(Box::new(move |nodes| {
            let report = this.handle_added(nodes);
            if report.rewritten > 0 {
                debug_log!("rewrote {} inserted link(s)", report.rewritten);
            }
        }))?;
        Ok(report)
    }

    fn sweep_anchors(&self, anchors: Vec<D::Anchor>) -> SweepReport {
        let mut report = SweepReport::default();
        for anchor in &anchors {
            report.record(&self.propagate(anchor));
        }
        report
    }
}
