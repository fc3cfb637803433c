//! Small crate-wide logging macros.
//!
//! All of them write to the browser console through `web_sys::console` and
//! expand to a no-op outside `wasm32`, so the decision logic can be unit
//! tested natively without ever calling into JS.

/// Verbose logging, compiled in for debug builds only.
///
/// ```rust,ignore
/// debug_log!("rewrote {} -> {}", from, to);
/// ```
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {{
        #[cfg(all(debug_assertions, target_arch = "wasm32"))]
        web_sys::console::log_1(&format!("{} {}", $crate::constants::LOG_PREFIX, format!($($arg)*)).into());
        #[cfg(not(all(debug_assertions, target_arch = "wasm32")))]
        {
            if false {
                let _ = format!($($arg)*);
            }
        };
    }};
}

#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {{
        #[cfg(target_arch = "wasm32")]
        web_sys::console::log_1(&format!("{} {}", $crate::constants::LOG_PREFIX, format!($($arg)*)).into());
        #[cfg(not(target_arch = "wasm32"))]
        {
            if false {
                let _ = format!($($arg)*);
            }
        };
    }};
}

/// Warnings are for fallbacks: the relay stepped aside and the page carried on.
#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)*) => {{
        #[cfg(target_arch = "wasm32")]
        web_sys::console::warn_1(&format!("{} {}", $crate::constants::LOG_PREFIX, format!($($arg)*)).into());
        #[cfg(not(target_arch = "wasm32"))]
        {
            if false {
                let _ = format!($($arg)*);
            }
        };
    }};
}
