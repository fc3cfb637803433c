//! Shared relay state.
//!
//! Everything mutable lives here:
//!
//! * `SharedAuth` / `SharedConfig` are handed to the components when they are
//!   built. Only `set_auth_context()` and `configure()` write to them; readers
//!   must call `get()` for every decision instead of keeping a copy, because
//!   the host page may change either at any time.
//! * `InstallGuard` is the one-way `uninstalled -> installed` switch used for
//!   every piece that must run at most once per page.
//! * `STAGED_CONFIG` holds configuration handed over before bootstrap and
//!   `RUNTIME` the live handles after it.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use lazy_static::lazy_static;
use serde::Serialize;

use crate::links::dom::WebDocument;
use crate::links::propagator::LinkPropagator;
use crate::network::base::ResolvedBase;
use crate::network::config::{RelayConfig, RelayConfigPatch};

/// Identity and endpoint context carried onto links. Either part may be
/// empty, in which case it is simply not propagated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    pub token: String,
    #[serde(rename = "api")]
    pub base: String,
}

impl AuthContext {
    pub fn new(token: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base: base.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SharedAuth(Rc<RefCell<AuthContext>>);

impl SharedAuth {
    pub fn new(ctx: AuthContext) -> Self {
        Self(Rc::new(RefCell::new(ctx)))
    }

    pub fn get(&self) -> AuthContext {
        self.0.borrow().clone()
    }

    pub fn set(&self, ctx: AuthContext) {
        *self.0.borrow_mut() = ctx;
    }
}

#[derive(Debug, Clone, Default)]
pub struct SharedConfig(Rc<RefCell<RelayConfig>>);

impl SharedConfig {
    pub fn new(config: RelayConfig) -> Self {
        Self(Rc::new(RefCell::new(config)))
    }

    /// Read a single field without cloning the whole configuration.
    pub fn with<R>(&self, f: impl FnOnce(&RelayConfig) -> R) -> R {
        f(&self.0.borrow())
    }

    pub fn apply(&self, patch: RelayConfigPatch) {
        self.0.borrow_mut().apply(patch);
    }
}

/// One-shot installation switch.
pub struct InstallGuard {
    installed: AtomicBool,
}

impl InstallGuard {
    pub const fn new() -> Self {
        Self {
            installed: AtomicBool::new(false),
        }
    }

    /// Flip to installed. Returns `true` exactly once; every later call (and
    /// any call racing the first one) gets `false` and must do nothing.
    pub fn try_install(&self) -> bool {
        self.installed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }
}

impl Default for InstallGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Live handles once the relay has bootstrapped.
pub struct Runtime {
    pub base: ResolvedBase,
    pub auth: SharedAuth,
    pub config: SharedConfig,
    pub links: Option<Rc<LinkPropagator<WebDocument>>>,
}

lazy_static! {
    static ref STAGED_CONFIG: RwLock<RelayConfig> = RwLock::new(RelayConfig::default());
}

thread_local! {
    pub static RUNTIME: RefCell<Option<Runtime>> = RefCell::new(None);
}

/// Merge `patch` into the configuration used by the next bootstrap.
pub fn stage_config(patch: RelayConfigPatch) {
    let mut staged = STAGED_CONFIG.write().unwrap_or_else(|e| e.into_inner());
    staged.apply(patch);
}

pub fn staged_config() -> RelayConfig {
    STAGED_CONFIG
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// Run `f` against the runtime, or return `None` before bootstrap.
pub fn with_runtime<R>(f: impl FnOnce(&Runtime) -> R) -> Option<R> {
    RUNTIME.with(|cell| cell.borrow().as_ref().map(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_guard_opens_once() {
        let guard = InstallGuard::new();
        assert!(!guard.is_installed());
        assert!(guard.try_install());
        assert!(!guard.try_install());
        assert!(!guard.try_install());
        assert!(guard.is_installed());
    }

    #[test]
    fn shared_auth_readers_see_updates() {
        let auth = SharedAuth::new(AuthContext::new("t1", ""));
        let reader = auth.clone();
        auth.set(AuthContext::new("t2", "/svc"));
        assert_eq!(reader.get(), AuthContext::new("t2", "/svc"));
    }

    #[test]
    fn auth_context_serializes_base_as_api() {
        let json = serde_json::to_value(AuthContext::new("abc", "/svc")).unwrap();
        assert_eq!(json, serde_json::json!({"token": "abc", "api": "/svc"}));
    }

    #[test]
    fn staged_patches_accumulate() {
        stage_config(RelayConfigPatch {
            opt_in_class: Some("relay-link".into()),
            ..Default::default()
        });
        stage_config(RelayConfigPatch {
            token_key: Some("relay.token".into()),
            ..Default::default()
        });
        let cfg = staged_config();
        assert_eq!(cfg.opt_in_class, "relay-link");
        assert_eq!(cfg.token_key, "relay.token");
    }

    #[test]
    fn no_runtime_before_bootstrap() {
        assert!(with_runtime(|rt| rt.base.clone()).is_none());
    }
}
