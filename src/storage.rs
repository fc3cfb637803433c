//! Best-effort key-value persistence.
//!
//! The relay only ever needs `get`/`set` on two string keys, so storage is a
//! small trait. `LocalStore` talks to `window.localStorage`; `MemoryStore`
//! backs tests and pages that want to opt out of persistence.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::StorageError;
use crate::utils::js_error_text;

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// `window.localStorage`, or nothing when the browser withholds it.
pub struct LocalStore {
    storage: Option<web_sys::Storage>,
}

impl LocalStore {
    /// Accessing `localStorage` itself can throw (e.g. cookies blocked), which
    /// is folded into "unavailable" here.
    pub fn from_window(window: &web_sys::Window) -> Self {
        Self {
            storage: window.local_storage().ok().flatten(),
        }
    }

    fn storage(&self) -> Result<&web_sys::Storage, StorageError> {
        self.storage.as_ref().ok_or(StorageError::Unavailable)
    }
}

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage()?
            .get_item(key)
            .map_err(|e| StorageError::Denied(js_error_text(&e)))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage()?
            .set_item(key, value)
            .map_err(|e| StorageError::Denied(js_error_text(&e)))
    }
}

/// In-memory store. Reads and writes can be switched off to simulate a
/// browser that denies storage access.
#[derive(Default)]
pub struct MemoryStore {
    items: RefCell<HashMap<String, String>>,
    deny_reads: bool,
    deny_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(self, key: &str, value: &str) -> Self {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn denying_reads(mut self) -> Self {
        self.deny_reads = true;
        self
    }

    pub fn denying_writes(mut self) -> Self {
        self.deny_writes = true;
        self
    }

    /// Direct look-up that bypasses the deny switches, for assertions.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.deny_reads {
            return Err(StorageError::Denied("reads disabled".into()));
        }
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.deny_writes {
            return Err(StorageError::Denied("writes disabled".into()));
        }
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::new();
        assert_eq!(store.get("sv13.api"), Ok(None));
        store.set("sv13.api", "/svc").unwrap();
        assert_eq!(store.get("sv13.api"), Ok(Some("/svc".to_string())));
    }

    #[test]
    fn denied_store_reports_errors_but_keeps_items() {
        let store = MemoryStore::new()
            .with_item("sv13.token", "abc")
            .denying_reads()
            .denying_writes();
        assert!(matches!(store.get("sv13.token"), Err(StorageError::Denied(_))));
        assert!(store.set("sv13.token", "xyz").is_err());
        assert_eq!(store.peek("sv13.token").as_deref(), Some("abc"));
    }
}
