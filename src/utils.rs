//! Utility helpers shared across the relay.

use wasm_bindgen::JsValue;

/// `true` for `http://` and `https://` URLs, scheme matched case-insensitively.
pub fn is_http_absolute(s: &str) -> bool {
    fn has_prefix(s: &str, prefix: &str) -> bool {
        s.get(..prefix.len())
            .map_or(false, |head| head.eq_ignore_ascii_case(prefix))
    }
    has_prefix(s, "http://") || has_prefix(s, "https://")
}

/// Join `base` and `path` with exactly one `/` between them, whatever
/// slashes either side already carries.
pub fn join_base(base: &str, path: &str) -> String {
    let left = base.trim_end_matches('/');
    let right = path.trim_start_matches('/');
    format!("{}/{}", left, right)
}

/// First value of `name` in a `?a=1&b=2` style query string, decoded the way
/// `URLSearchParams::get` decodes it.
pub fn query_param(search: &str, name: &str) -> Option<String> {
    let query = search.strip_prefix('?').unwrap_or(search);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

pub fn starts_with_any<S: AsRef<str>>(s: &str, prefixes: &[S]) -> bool {
    prefixes.iter().any(|p| s.starts_with(p.as_ref()))
}

/// `String(value)` for anything but `undefined`/`null` (and symbols, which
/// refuse the conversion).
pub fn js_to_string(value: &JsValue) -> Option<String> {
    if value.is_undefined() || value.is_null() || value.is_symbol() {
        return None;
    }
    if let Some(s) = value.as_string() {
        return Some(s);
    }
    // Array.prototype.join applies ToString to its element.
    Some(String::from(js_sys::Array::of1(value).join("")))
}

/// Best-effort text for a thrown JS value (Error objects, strings, anything).
pub fn js_error_text(value: &JsValue) -> String {
    if let Some(s) = value.as_string() {
        return s;
    }
    js_sys::Reflect::get(value, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", value))
}


// wasm-bindgen tests ----------------------------------------------------------

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn js_to_string_coerces_like_string_constructor() {
        assert_eq!(js_to_string(&JsValue::from_str("/svc")).as_deref(), Some("/svc"));
        assert_eq!(js_to_string(&JsValue::from_f64(8080.0)).as_deref(), Some("8080"));
        assert_eq!(js_to_string(&JsValue::TRUE).as_deref(), Some("true"));
        assert_eq!(js_to_string(&JsValue::UNDEFINED), None);
        assert_eq!(js_to_string(&JsValue::NULL), None);
    }
}
