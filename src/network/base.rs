//! API base resolution.
//!
//! The base is picked once per page load from, in order: the `api` query
//! parameter, a `window.API_BASE` set by the host page, the value persisted by
//! an earlier visit, and finally the default mount. A query-string override is
//! persisted so later pages opened without the parameter keep using it.
//!
//! The player token follows the same scheme minus the global source.

use std::fmt;

use serde::Serialize;

use super::config::RelayConfig;
use crate::constants::{QUERY_PARAM_API, QUERY_PARAM_TOKEN};
use crate::error::StorageError;
use crate::storage::KeyValueStore;
use crate::utils::{is_http_absolute, join_base, query_param};

/// Normalized API base: no whitespace, no trailing slash, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedBase(String);

impl ResolvedBase {
    /// Strip every whitespace character and all trailing slashes, falling back
    /// to `default` (normalized the same way, then to `/api`) when nothing is
    /// left.
    pub fn normalize(raw: &str, default: &str) -> Self {
        fn clean(s: &str) -> String {
            let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
            compact.trim_end_matches('/').to_string()
        }

        let base = clean(raw);
        if !base.is_empty() {
            return Self(base);
        }
        let fallback = clean(default);
        if fallback.is_empty() {
            Self(crate::constants::DEFAULT_API_BASE.to_string())
        } else {
            Self(fallback)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build a full API URL for `path`.
    ///
    /// Absolute `http(s)` URLs pass through untouched; everything else is
    /// mounted under the base with exactly one slash in between. A missing or
    /// empty path yields the base followed by `/`.
    pub fn build_url(&self, path: Option<&str>) -> String {
        match path {
            None | Some("") => format!("{}/", self.0),
            Some(p) if is_http_absolute(p) => p.to_string(),
            Some(p) => join_base(&self.0, p),
        }
    }
}

impl fmt::Display for ResolvedBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the winning base came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseSource {
    Query,
    Global,
    Stored,
    Default,
}

impl BaseSource {
    /// Anything but the default mount was chosen on purpose by someone.
    pub fn is_explicit(self) -> bool {
        self != BaseSource::Default
    }
}

/// Raw inputs read off the page before resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    /// `location.search`, leading `?` optional.
    pub search: String,
    /// `window.API_BASE` as left by the host page, if it was a string.
    pub global_base: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseResolution {
    pub base: ResolvedBase,
    pub source: BaseSource,
    /// Storage failures that were stepped over on the way.
    pub storage_errors: Vec<StorageError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResolution {
    pub token: String,
    pub from_query: bool,
    pub storage_errors: Vec<StorageError>,
}

/// Resolves the base and token against one key-value store using the keys
/// and default mount from the relay configuration.
pub struct BaseResolver<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
    config: &'a RelayConfig,
}

impl<'a, S: KeyValueStore + ?Sized> BaseResolver<'a, S> {
    pub fn new(store: &'a S, config: &'a RelayConfig) -> Self {
        Self { store, config }
    }

    pub fn resolve_base(&self, page: &PageSnapshot) -> BaseResolution {
        let mut storage_errors = Vec::new();

        let from_query = non_empty(query_param(&page.search, QUERY_PARAM_API));
        let from_global = non_empty(page.global_base.clone());

        let (raw, source) = if let Some(v) = from_query {
            (v, BaseSource::Query)
        } else if let Some(v) = from_global {
            (v, BaseSource::Global)
        } else {
            match self.stored(&self.config.api_key, &mut storage_errors) {
                Some(v) => (v, BaseSource::Stored),
                None => (String::new(), BaseSource::Default),
            }
        };

        let base = ResolvedBase::normalize(&raw, &self.config.default_base);

        if source == BaseSource::Query {
            if let Err(e) = self.store.set(&self.config.api_key, base.as_str()) {
                storage_errors.push(e);
            }
        }

        BaseResolution {
            base,
            source,
            storage_errors,
        }
    }

    pub fn resolve_token(&self, page: &PageSnapshot) -> TokenResolution {
        let mut storage_errors = Vec::new();

        if let Some(token) = non_empty(query_param(&page.search, QUERY_PARAM_TOKEN)) {
            if let Err(e) = self.store.set(&self.config.token_key, &token) {
                storage_errors.push(e);
            }
            return TokenResolution {
                token,
                from_query: true,
                storage_errors,
            };
        }

        let token = self
            .stored(&self.config.token_key, &mut storage_errors)
            .unwrap_or_default();
        TokenResolution {
            token,
            from_query: false,
            storage_errors,
        }
    }

    fn stored(&self, key: &str, errors: &mut Vec<StorageError>) -> Option<String> {
        match self.store.get(key) {
            Ok(v) => non_empty(v),
            Err(e) => {
                errors.push(e);
                None
            }
        }
    }
}

/// Trimmed value, or `None` when blank.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
