//! The per-call redirection decision behind the `fetch` wrapper.
//!
//! Pure and synchronous: given a target URL string, the page URL and the
//! resolved base, decide whether the call goes to the base instead. Nothing
//! is remembered between calls.

use std::borrow::Cow;

use url::Url;

use super::base::ResolvedBase;
use super::config::PathWhitelist;
use crate::error::RelayError;
use crate::utils::join_base;

/// Paths under this mount already go through the API gateway.
const API_MOUNT: &str = "/api/";

/// The three independent axes every candidate URL is sorted along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Carries its own scheme (or is protocol-relative).
    pub absolute: bool,
    pub same_origin: bool,
    /// Path matches the path-prefix whitelist.
    pub whitelisted: bool,
}

/// A classified target together with the parts a rewrite needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedTarget {
    pub class: Classification,
    pub path: String,
    /// Including the leading `?`, empty when there is no query.
    pub search: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    CrossOrigin,
    NotRootRelative,
    AlreadyRewritten,
    UnderApiMount,
    NotWhitelisted,
    Unparseable(RelayError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteDecision {
    Rewritten(String),
    Unchanged(SkipReason),
}

pub struct RequestRewriter {
    base: ResolvedBase,
    /// Path of the base when it lives on the page's own origin, so already
    /// redirected same-origin URLs are recognised however they are spelled.
    base_path: Option<String>,
    prefixes: PathWhitelist,
    /// Root of the page's origin; relative targets resolve against it.
    origin_root: Url,
}

impl RequestRewriter {
    pub fn new(
        base: ResolvedBase,
        prefixes: PathWhitelist,
        page_url: &str,
    ) -> Result<Self, RelayError> {
        let page = Url::parse(page_url).map_err(|e| RelayError::invalid_url(page_url, e))?;
        let origin_root = page
            .join("/")
            .map_err(|e| RelayError::invalid_url(page_url, e))?;

        let base_path = origin_root
            .join(base.as_str())
            .ok()
            .filter(|u| same_origin(u, &origin_root))
            .map(|u| u.path().trim_end_matches('/').to_string())
            .filter(|p| !p.is_empty());

        Ok(Self {
            base,
            base_path,
            prefixes,
            origin_root,
        })
    }

    pub fn base(&self) -> &ResolvedBase {
        &self.base
    }

    pub fn prefixes(&self) -> &PathWhitelist {
        &self.prefixes
    }

    pub fn classify(&self, target: &str) -> Result<ClassifiedTarget, RelayError> {
        let resolved = self
            .origin_root
            .join(target)
            .map_err(|e| RelayError::invalid_url(target, e))?;

        let path = resolved.path().to_string();
        let search = match resolved.query() {
            Some(q) if !q.is_empty() => format!("?{}", q),
            _ => String::new(),
        };

        Ok(ClassifiedTarget {
            class: Classification {
                absolute: target.starts_with("//") || Url::parse(target).is_ok(),
                same_origin: same_origin(&resolved, &self.origin_root),
                whitelisted: self.prefixes.matches(&path),
            },
            path,
            search,
        })
    }

    pub fn decide(&self, target: &str) -> RewriteDecision {
        let classified = match self.classify(target) {
            Ok(c) => c,
            Err(e) => return RewriteDecision::Unchanged(SkipReason::Unparseable(e)),
        };
        let ClassifiedTarget {
            class,
            path,
            search,
        } = classified;

        if !class.same_origin {
            return RewriteDecision::Unchanged(SkipReason::CrossOrigin);
        }
        if !path.starts_with('/') {
            return RewriteDecision::Unchanged(SkipReason::NotRootRelative);
        }
        if self.is_already_rewritten(&path) {
            return RewriteDecision::Unchanged(SkipReason::AlreadyRewritten);
        }
        if path.starts_with(API_MOUNT) {
            return RewriteDecision::Unchanged(SkipReason::UnderApiMount);
        }
        if !class.whitelisted {
            return RewriteDecision::Unchanged(SkipReason::NotWhitelisted);
        }

        RewriteDecision::Rewritten(join_base(self.base.as_str(), &format!("{}{}", path, search)))
    }

    /// The destination to actually call: the rewritten URL, or `target`
    /// itself when the call is not ours to redirect.
    pub fn rewrite<'a>(&self, target: &'a str) -> Cow<'a, str> {
        match self.decide(target) {
            RewriteDecision::Rewritten(url) => Cow::Owned(url),
            RewriteDecision::Unchanged(_) => Cow::Borrowed(target),
        }
    }

    fn is_already_rewritten(&self, path: &str) -> bool {
        let under = |prefix: &str| {
            path.strip_prefix(prefix)
                .map_or(false, |rest| rest.starts_with('/'))
        };
        under(self.base.as_str()) || self.base_path.as_deref().map_or(false, under)
    }
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin().ascii_serialization() == b.origin().ascii_serialization()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_PATH_PREFIXES;

    const PAGE: &str = "https://ui.example/rulebook/index.html?token=t";

    fn rewriter(base: &str) -> RequestRewriter {
        RequestRewriter::new(
            ResolvedBase::normalize(base, "/api"),
            PathWhitelist::new(DEFAULT_PATH_PREFIXES.iter().copied()),
            PAGE,
        )
        .unwrap()
    }

    #[test]
    fn rewrites_whitelisted_relative_path_under_base() {
        let rw = rewriter("/api");
        assert_eq!(
            rw.decide("/duel/state?x=1"),
            RewriteDecision::Rewritten("/api/duel/state?x=1".into())
        );
    }

    #[test]
    fn rewrites_same_origin_absolute_urls() {
        let rw = rewriter("https://host.example/svc");
        assert_eq!(
            rw.rewrite("https://ui.example/user/7?full=1#top"),
            "https://host.example/svc/user/7?full=1"
        );
    }

    #[test]
    fn bare_relative_paths_resolve_against_the_origin() {
        let rw = rewriter("/api");
        assert_eq!(rw.rewrite("bot/move"), "/api/bot/move");
    }

    #[test]
    fn leaves_other_calls_alone() {
        let rw = rewriter("/api");
        assert_eq!(
            rw.decide("https://cdn.example/duel/x"),
            RewriteDecision::Unchanged(SkipReason::CrossOrigin)
        );
        assert_eq!(
            rw.decide("//cdn.example/duel/x"),
            RewriteDecision::Unchanged(SkipReason::CrossOrigin)
        );
        assert_eq!(
            rw.decide("/rules"),
            RewriteDecision::Unchanged(SkipReason::NotWhitelisted)
        );
        assert_eq!(
            rw.decide("/api/duel/state"),
            RewriteDecision::Unchanged(SkipReason::AlreadyRewritten)
        );
        assert_eq!(
            rw.decide("data:text/plain,duel"),
            RewriteDecision::Unchanged(SkipReason::CrossOrigin)
        );
    }

    #[test]
    fn api_mount_is_never_rewritten_even_with_custom_base() {
        let rw = rewriter("https://host.example/svc");
        assert_eq!(
            rw.decide("/api/duel/state"),
            RewriteDecision::Unchanged(SkipReason::UnderApiMount)
        );
    }

    #[test]
    fn unparseable_targets_fall_back_to_original() {
        let rw = rewriter("/api");
        let decision = rw.decide("http://[::1/duel");
        assert!(matches!(
            decision,
            RewriteDecision::Unchanged(SkipReason::Unparseable(RelayError::InvalidUrl { .. }))
        ));
        assert_eq!(rw.rewrite("http://[::1/duel"), "http://[::1/duel");
    }

    #[test]
    fn second_pass_is_a_no_op() {
        for base in ["/api", "/duel", "/gateway/v1", "https://ui.example/svc", "https://host.example/svc"] {
            let rw = rewriter(base);
            let once = rw.rewrite("/duel/state?x=1").into_owned();
            let twice = rw.rewrite(&once).into_owned();
            assert_eq!(once, twice, "base {}", base);
        }
    }

    #[test]
    fn same_origin_absolute_base_is_recognised_by_path() {
        // "/duel-api/duel/state" starts with the "/duel" prefix; only the base
        // path check keeps it from being redirected a second time.
        let rw = rewriter("https://ui.example/duel-api");
        let once = rw.rewrite("/duel/state").into_owned();
        assert_eq!(once, "https://ui.example/duel-api/duel/state");
        assert_eq!(
            rw.decide("/duel-api/duel/state"),
            RewriteDecision::Unchanged(SkipReason::AlreadyRewritten)
        );
    }

    #[test]
    fn classification_axes_are_independent() {
        let rw = rewriter("/api");

        let c = rw.classify("/duel/x").unwrap().class;
        assert_eq!(c, Classification { absolute: false, same_origin: true, whitelisted: true });

        let c = rw.classify("https://ui.example/rules").unwrap().class;
        assert_eq!(c, Classification { absolute: true, same_origin: true, whitelisted: false });

        let c = rw.classify("https://elsewhere.example/duel").unwrap().class;
        assert_eq!(c, Classification { absolute: true, same_origin: false, whitelisted: true });
    }

    #[test]
    fn rejects_unparseable_page_url() {
        assert!(RequestRewriter::new(
            ResolvedBase::normalize("/api", "/api"),
            PathWhitelist::default(),
            "not a url",
        )
        .is_err());
    }
}
