//! Error types for the relay.
//!
//! None of these ever reach the end user. Storage problems fall through to the
//! next configuration source, URL problems make the relay step aside, and the
//! `#[wasm_bindgen]` boundary converts whatever is left into a `JsValue`.

use thiserror::Error;
use wasm_bindgen::JsValue;

/// Failures of the best-effort key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// No storage on this page (disabled, sandboxed iframe, private mode, ...).
    #[error("storage unavailable")]
    Unavailable,

    /// The store exists but the browser refused the read or write.
    #[error("storage access denied: {0}")]
    Denied(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("invalid url `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("unsupported fetch target: {0}")]
    UnsupportedTarget(String),

    #[error("no global `window` exists")]
    NoWindow,

    #[error("window has no document")]
    NoDocument,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("relay has not been bootstrapped")]
    NotBootstrapped,

    #[error("javascript error: {0}")]
    Js(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RelayError {
    pub fn invalid_url(input: &str, err: impl std::fmt::Display) -> Self {
        RelayError::InvalidUrl {
            input: input.to_string(),
            reason: err.to_string(),
        }
    }

    /// Wrap an exception thrown by a JS API.
    pub fn js(value: &JsValue) -> Self {
        RelayError::Js(crate::utils::js_error_text(value))
    }
}

impl From<RelayError> for JsValue {
    fn from(err: RelayError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_converts_into_relay_error() {
        let err: RelayError = StorageError::Denied("SecurityError".into()).into();
        assert_eq!(err.to_string(), "storage access denied: SecurityError");
    }

    #[test]
    fn invalid_url_mentions_input() {
        let err = RelayError::invalid_url("http://[::1", "invalid IPv6 address");
        assert!(err.to_string().contains("http://[::1"));
    }
}
