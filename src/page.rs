//! Page bootstrap and the JS-facing API.
//!
//! `bootstrap()` runs once per page: resolve base and token, publish the
//! window globals, install the fetch wrapper, and once the DOM is parsed start
//! link propagation. Every failure is logged and the page carries on as if
//! the relay were not there.

use std::rc::Rc;

use js_sys::Reflect;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Window};

use crate::constants::{
    GLOBAL_API_BASE, GLOBAL_API_URL_FN, GLOBAL_PLAYER_TOKEN, GLOBAL_STAGED_CONFIG, GLOBAL_UI_BASE,
};
use crate::error::RelayError;
use crate::links::dom::{self, WebDocument};
use crate::links::propagator::{LinkPropagator, SweepReport};
use crate::network::base::{BaseResolver, PageSnapshot, ResolvedBase};
use crate::network::config::RelayConfigPatch;
use crate::network::fetch_shim::{self, InstallOutcome};
use crate::network::rewriter::RequestRewriter;
use crate::state::{self, AuthContext, InstallGuard, Runtime, SharedAuth, SharedConfig, RUNTIME};
use crate::storage::LocalStore;

static BOOTSTRAP: InstallGuard = InstallGuard::new();

pub fn bootstrap() -> Result<(), RelayError> {
    if !BOOTSTRAP.try_install() {
        return Ok(());
    }

    let window = web_sys::window().ok_or(RelayError::NoWindow)?;
    relay_window(&window)
}

/// Resolve, publish and wire up the relay for `window`, replacing whatever
/// runtime an earlier call left behind. The `fetch` wrapper is still only
/// installed once.
pub fn relay_window(window: &Window) -> Result<(), RelayError> {
    let document = window.document().ok_or(RelayError::NoDocument)?;

    match Reflect::get(window, &JsValue::from_str(GLOBAL_STAGED_CONFIG)) {
        Ok(value) => match patch_from_js(value) {
            Ok(Some(patch)) => state::stage_config(patch),
            Ok(None) => {}
            Err(e) => warn_log!("ignoring window.{}: {}", GLOBAL_STAGED_CONFIG, e),
        },
        Err(e) => warn_log!("cannot read window.{}: {}", GLOBAL_STAGED_CONFIG, crate::utils::js_error_text(&e)),
    }
    let config = state::staged_config();

    // --- 1) Resolve base and token
    let store = LocalStore::from_window(window);
    let snapshot = read_snapshot(window);
    let resolver = BaseResolver::new(&store, &config);
    let base = resolver.resolve_base(&snapshot);
    let token = resolver.resolve_token(&snapshot);
    for e in base.storage_errors.iter().chain(token.storage_errors.iter()) {
        warn_log!("storage: {}", e);
    }
    info_log!("API_BASE = {} (from {:?})", base.base, base.source);

    let advertised_base = if base.source.is_explicit() {
        base.base.as_str()
    } else {
        ""
    };
    let runtime = Runtime {
        base: base.base.clone(),
        auth: SharedAuth::new(AuthContext::new(token.token, advertised_base)),
        config: SharedConfig::new(config.clone()),
        links: None,
    };

    // --- 2) Globals for non-module code
    if let Err(e) = expose_globals(window, &runtime) {
        warn_log!("failed to publish globals: {}", e);
    }
    RUNTIME.with(|cell| *cell.borrow_mut() = Some(runtime));

    // --- 3) fetch wrapper
    let installed = window
        .location()
        .href()
        .map_err(|e| RelayError::js(&e))
        .and_then(|page_url| RequestRewriter::new(base.base, config.path_prefixes, &page_url))
        .and_then(|rewriter| fetch_shim::install(window, rewriter));
    match installed {
        Ok(InstallOutcome::Installed) => {}
        Ok(InstallOutcome::AlreadyInstalled) => debug_log!("fetch shim already present"),
        Err(e) => warn_log!("fetch shim not installed: {}", e),
    }

    // --- 4) Links, once the DOM exists
    let doc = document.clone();
    dom::on_dom_ready(&document, move || {
        if let Err(e) = start_links(doc) {
            warn_log!("link propagation disabled: {}", e);
        }
    })
}

fn start_links(document: Document) -> Result<(), RelayError> {
    let propagator = Rc::new(build_propagator(document)?);
    let report = propagator.start()?;
    info_log!("links: {} rewritten on load, watching for more", report.rewritten);

    RUNTIME.with(|cell| {
        if let Some(rt) = cell.borrow_mut().as_mut() {
            rt.links = Some(propagator);
        }
    });
    Ok(())
}

fn build_propagator(document: Document) -> Result<LinkPropagator<WebDocument>, RelayError> {
    let (auth, config) = state::with_runtime(|rt| (rt.auth.clone(), rt.config.clone()))
        .ok_or(RelayError::NotBootstrapped)?;
    let web_doc = WebDocument::new(document);
    let page = web_doc.page_context()?;
    Ok(LinkPropagator::new(web_doc, page, auth, config))
}

fn read_snapshot(window: &Window) -> PageSnapshot {
    PageSnapshot {
        search: window.location().search().unwrap_or_default(),
        global_base: Reflect::get(window, &JsValue::from_str(GLOBAL_API_BASE))
            .ok()
            .and_then(|v| crate::utils::js_to_string(&v)),
    }
}

fn set_global(window: &Window, name: &str, value: &JsValue) -> Result<(), RelayError> {
    Reflect::set(window, &JsValue::from_str(name), value)
        .map(|_| ())
        .map_err(|e| RelayError::js(&e))
}

fn expose_globals(window: &Window, runtime: &Runtime) -> Result<(), RelayError> {
    let auth = runtime.auth.get();
    set_global(window, GLOBAL_API_BASE, &JsValue::from_str(runtime.base.as_str()))?;
    set_global(window, GLOBAL_PLAYER_TOKEN, &JsValue::from_str(&auth.token))?;
    if let Ok(origin) = window.location().origin() {
        set_global(window, GLOBAL_UI_BASE, &JsValue::from_str(&origin))?;
    }

    let base = runtime.base.clone();
    let api_url = Closure::wrap(Box::new(move |path: JsValue| -> String {
        base.build_url(path.as_string().as_deref())
    }) as Box<dyn Fn(JsValue) -> String>);
    set_global(window, GLOBAL_API_URL_FN, api_url.as_ref())?;
    api_url.forget();
    Ok(())
}

/// Accepts a plain object or a JSON string; `undefined`/`null` mean "nothing".
fn patch_from_js(value: JsValue) -> Result<Option<RelayConfigPatch>, RelayError> {
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    let patch = match value.as_string() {
        Some(json) => RelayConfigPatch::from_json(&json)
            .map_err(|e| RelayError::InvalidConfig(e.to_string()))?,
        None => serde_wasm_bindgen::from_value(value)
            .map_err(|e| RelayError::InvalidConfig(e.to_string()))?,
    };
    Ok(Some(patch))
}

fn default_base() -> ResolvedBase {
    let config = state::staged_config();
    ResolvedBase::normalize("", &config.default_base)
}

// ---------------------------------------------------------------------------
// Exported API
// ---------------------------------------------------------------------------

/// The resolved API base (the default mount before bootstrap).
#[wasm_bindgen]
pub fn api_base() -> String {
    state::with_runtime(|rt| rt.base.to_string()).unwrap_or_else(|| default_base().to_string())
}

#[wasm_bindgen]
pub fn player_token() -> String {
    state::with_runtime(|rt| rt.auth.get().token).unwrap_or_default()
}

/// Build a full API URL for `path` without going through the fetch wrapper.
#[wasm_bindgen]
pub fn api_url(path: Option<String>) -> String {
    let base = state::with_runtime(|rt| rt.base.clone()).unwrap_or_else(default_base);
    base.build_url(path.as_deref())
}

/// `{ token, api }` as currently propagated onto links.
#[wasm_bindgen]
pub fn current_params() -> Result<JsValue, JsValue> {
    let ctx = state::with_runtime(|rt| rt.auth.get()).unwrap_or_default();
    serde_wasm_bindgen::to_value(&ctx).map_err(JsValue::from)
}

/// Sweep every link in the document again; returns how many were rewritten.
#[wasm_bindgen]
pub fn rewrite_all_links() -> Result<u32, JsValue> {
    let live = state::with_runtime(|rt| rt.links.clone()).ok_or(RelayError::NotBootstrapped)?;
    let report: SweepReport = match live {
        Some(propagator) => propagator.sweep(),
        None => {
            // DOM still loading: sweep what exists without subscribing.
            let document = web_sys::window()
                .and_then(|w| w.document())
                .ok_or(RelayError::NoDocument)?;
            build_propagator(document)?.sweep()
        }
    };
    Ok(report.rewritten as u32)
}

/// Merge a partial configuration. Before bootstrap it is staged for it; after,
/// link decisions pick it up immediately while the fetch wrapper keeps the
/// prefixes it was installed with.
#[wasm_bindgen]
pub fn configure(patch: JsValue) -> Result<(), JsValue> {
    let patch = match patch_from_js(patch)? {
        Some(p) => p,
        None => return Ok(()),
    };
    state::stage_config(patch.clone());
    state::with_runtime(|rt| rt.config.apply(patch));
    Ok(())
}

/// Replace the propagated token and/or API base and re-sweep the links.
/// `undefined` keeps the current value, an empty string clears it.
#[wasm_bindgen]
pub fn set_auth_context(token: Option<String>, api: Option<String>) -> Result<u32, JsValue> {
    let auth = state::with_runtime(|rt| rt.auth.clone()).ok_or(RelayError::NotBootstrapped)?;
    let mut ctx = auth.get();
    if let Some(t) = token {
        ctx.token = t.trim().to_string();
    }
    if let Some(a) = api {
        ctx.base = a.trim().trim_end_matches('/').to_string();
    }
    auth.set(ctx.clone());

    if let Some(window) = web_sys::window() {
        if let Err(e) = set_global(&window, GLOBAL_PLAYER_TOKEN, &JsValue::from_str(&ctx.token)) {
            warn_log!("failed to publish token: {}", e);
        }
    }
    rewrite_all_links()
}
