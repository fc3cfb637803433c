//! `window.fetch` wrapper.
//!
//! Relative API calls like `/user/123` are sent to `${API_BASE}/user/123` for
//! the whitelisted prefixes; everything else, including anything the wrapper
//! fails to understand, goes to the original `fetch` untouched. Installing
//! twice is a no-op, also across two copies of the module on one page.

use js_sys::{Function, Promise, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Request, RequestInit, Window};

use super::rewriter::{RequestRewriter, RewriteDecision, SkipReason};
use crate::constants::GLOBAL_FETCH_MARKER;
use crate::error::RelayError;
use crate::state::InstallGuard;

static FETCH_SHIM: InstallGuard = InstallGuard::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    AlreadyInstalled,
}

pub fn is_installed() -> bool {
    FETCH_SHIM.is_installed()
}

pub fn install(window: &Window, rewriter: RequestRewriter) -> Result<InstallOutcome, RelayError> {
    if !FETCH_SHIM.try_install() {
        return Ok(InstallOutcome::AlreadyInstalled);
    }

    let win: &JsValue = window.as_ref();
    let marker = JsValue::from_str(GLOBAL_FETCH_MARKER);
    if Reflect::get(win, &marker).map_or(false, |v| v.is_truthy()) {
        return Ok(InstallOutcome::AlreadyInstalled);
    }

    let original: Function = Reflect::get(win, &JsValue::from_str("fetch"))
        .map_err(|e| RelayError::js(&e))?
        .dyn_into()
        .map_err(|_| RelayError::UnsupportedTarget("window.fetch is not a function".into()))?;
    let original = original.bind0(win);

    info_log!(
        "fetch shim active: API_BASE = {}, prefixes = {:?}",
        rewriter.base(),
        rewriter.prefixes().as_slice()
    );

    let shim = Closure::wrap(Box::new(move |input: JsValue, init: JsValue| -> JsValue {
        let target = match redirect(&rewriter, &input) {
            Ok(Some(rewritten)) => rewritten,
            Ok(None) => input,
            Err(e) => {
                warn_log!("rewrite warning: {}", e);
                input
            }
        };
        match original.call2(&JsValue::UNDEFINED, &target, &init) {
            Ok(response) => response,
            Err(e) => Promise::reject(&e).into(),
        }
    }) as Box<dyn FnMut(JsValue, JsValue) -> JsValue>);

    Reflect::set(win, &JsValue::from_str("fetch"), shim.as_ref()).map_err(|e| RelayError::js(&e))?;
    Reflect::set(win, &marker, &JsValue::TRUE).map_err(|e| RelayError::js(&e))?;
    shim.forget();

    Ok(InstallOutcome::Installed)
}

/// The replacement first argument for `fetch`, or `None` to keep the original.
/// Strings, `URL` objects and `Request`s are understood; anything else is an
/// `UnsupportedTarget` and the caller keeps the original argument.
pub fn redirect(rewriter: &RequestRewriter, input: &JsValue) -> Result<Option<JsValue>, RelayError> {
    if let Some(url) = input.as_string() {
        return Ok(decide(rewriter, &url)?.map(|u| JsValue::from_str(&u)));
    }

    if let Some(url) = input.dyn_ref::<web_sys::Url>() {
        return Ok(decide(rewriter, &url.href())?.map(|u| JsValue::from_str(&u)));
    }

    if let Some(request) = input.dyn_ref::<Request>() {
        let rewritten = match decide(rewriter, &request.url())? {
            Some(u) => u,
            None => return Ok(None),
        };
        // A Request reads as a RequestInit: method, headers, body, mode,
        // credentials and the rest carry over to the new destination.
        let init: &RequestInit = request.unchecked_ref();
        let moved = Request::new_with_str_and_init(&rewritten, init).map_err(|e| RelayError::js(&e))?;
        return Ok(Some(moved.into()));
    }

    Err(RelayError::UnsupportedTarget(
        input.js_typeof().as_string().unwrap_or_default(),
    ))
}

fn decide(rewriter: &RequestRewriter, url: &str) -> Result<Option<String>, RelayError> {
    match rewriter.decide(url) {
        RewriteDecision::Rewritten(to) => {
            debug_log!("fetch {} -> {}", url, to);
            Ok(Some(to))
        }
        RewriteDecision::Unchanged(SkipReason::Unparseable(e)) => Err(e),
        RewriteDecision::Unchanged(_) => Ok(None),
    }
}
