use wasm_bindgen::prelude::*;

// Export convenience macros crate-wide
#[macro_use]
mod macros;

pub mod constants;
pub mod error;
pub mod links;
pub mod network;
mod page;
pub mod state;
pub mod storage;
pub mod utils;

pub use error::{RelayError, StorageError};
pub use page::{
    api_base, api_url, configure, current_params, player_token, relay_window,
    rewrite_all_links, set_auth_context,
};
pub use state::AuthContext;

// Main entry point for the WASM module
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    // Initialize better panic messages
    console_error_panic_hook::set_once();

    // A relay that cannot start must not take the page down with it.
    if let Err(e) = page::bootstrap() {
        warn_log!("disabled: {}", e);
    }
    Ok(())
}
