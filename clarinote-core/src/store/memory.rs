use crate::store::StoreBackend;
use crate::CoreError;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Volatile backend, used in tests and as a scratch store.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a key with arbitrary text, valid JSON or not.
    pub fn with_raw(self, key: &str, value: &str) -> Self {
        self.entries.write().insert(key.to_string(), value.to_string());
        self
    }
}

impl StoreBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
