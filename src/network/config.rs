use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_BASE, DEFAULT_API_STORAGE_KEY, DEFAULT_OPT_IN_ATTRIBUTE, DEFAULT_OPT_IN_CLASS,
    DEFAULT_PASS_HOSTS, DEFAULT_PATH_PREFIXES, DEFAULT_TOKEN_STORAGE_KEY,
};
use crate::utils::starts_with_any;

/// Relay configuration
///
/// Host pages override parts of it either by setting
/// `window.PAGE_RELAY_CONFIG` before the module loads or by calling
/// `configure()` afterwards. Keys are camelCase on the JS side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelayConfig {
    pub api_key: String,
    pub token_key: String,
    pub default_base: String,
    pub path_prefixes: PathWhitelist,
    pub pass_hosts: HostWhitelist,
    pub opt_in_attribute: String,
    pub opt_in_class: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_STORAGE_KEY.to_string(),
            token_key: DEFAULT_TOKEN_STORAGE_KEY.to_string(),
            default_base: DEFAULT_API_BASE.to_string(),
            path_prefixes: PathWhitelist::new(DEFAULT_PATH_PREFIXES.iter().copied()),
            pass_hosts: HostWhitelist::new(DEFAULT_PASS_HOSTS.iter().copied()),
            opt_in_attribute: DEFAULT_OPT_IN_ATTRIBUTE.to_string(),
            opt_in_class: DEFAULT_OPT_IN_CLASS.to_string(),
        }
    }
}

impl RelayConfig {
    /// Shallow merge: every field present in `patch` replaces ours wholesale.
    pub fn apply(&mut self, patch: RelayConfigPatch) {
        let RelayConfigPatch {
            api_key,
            token_key,
            default_base,
            path_prefixes,
            pass_hosts,
            opt_in_attribute,
            opt_in_class,
        } = patch;

        if let Some(v) = api_key {
            self.api_key = v;
        }
        if let Some(v) = token_key {
            self.token_key = v;
        }
        if let Some(v) = default_base {
            self.default_base = v;
        }
        if let Some(v) = path_prefixes {
            self.path_prefixes = PathWhitelist::new(v);
        }
        if let Some(v) = pass_hosts {
            self.pass_hosts = HostWhitelist::new(v);
        }
        if let Some(v) = opt_in_attribute {
            self.opt_in_attribute = v;
        }
        if let Some(v) = opt_in_class {
            self.opt_in_class = v;
        }
    }
}

/// Partial configuration as handed over by the host page. Unknown keys are
/// ignored so pages can keep passing their own settings in the same object.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelayConfigPatch {
    pub api_key: Option<String>,
    pub token_key: Option<String>,
    pub default_base: Option<String>,
    pub path_prefixes: Option<Vec<String>>,
    pub pass_hosts: Option<Vec<String>>,
    pub opt_in_attribute: Option<String>,
    pub opt_in_class: Option<String>,
}

impl RelayConfigPatch {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Root-relative path prefixes whose `fetch` calls are redirected to the base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathWhitelist(Vec<String>);

impl PathWhitelist {
    /// Empty entries would match every path, so they are dropped.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        )
    }

    pub fn matches(&self, path: &str) -> bool {
        starts_with_any(path, &self.0)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Full origin+path prefixes that may receive the token on cross-origin links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostWhitelist(Vec<String>);

impl HostWhitelist {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        )
    }

    /// `href` must be the serialized absolute URL.
    pub fn matches(&self, href: &str) -> bool {
        starts_with_any(href, &self.0)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}
