//! In-process key-value store.

use std::collections::HashMap;

use anyhow::anyhow;
use parking_lot::Mutex;

use super::{KeyValueStore, Result};

/// Volatile store, optionally limited to a byte quota across all values to mimic browser
/// storage limits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self { values: Mutex::new(HashMap::new()), quota_bytes: Some(quota_bytes) }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock();
        if let Some(quota) = self.quota_bytes {
            let others: usize = values
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(existing, stored)| existing.len() + stored.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(anyhow!("storage quota exceeded: {needed} of {quota} bytes"));
            }
        }
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_rejects_oversized_writes_and_keeps_old_value() {
        let store = MemoryStore::with_quota(16);
        store.set("k", "small").unwrap();
        let err = store.set("k", "a value that is far too long").unwrap_err();
        assert!(err.to_string().contains("quota"));
        assert_eq!(store.get("k").unwrap().as_deref(), Some("small"));
    }
}
