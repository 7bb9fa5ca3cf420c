//! Key-value stores.
//!
//! Keys are namespaced with a scope prefix (`<scope>:<key>`) so several
//! tools can share one backing file.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::KeyValueStore;
use crate::error::Result;

fn scoped(scope: &str, key: &str) -> String {
    format!("{}:{}", scope, key)
}

/// Process-local store.
pub struct MemoryStore {
    scope: String,
    values: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            values: Mutex::new(BTreeMap::new()),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.values.lock().get(&scoped(&self.scope, key)).cloned()
    }

    fn set(&self, key: &str, value: serde_json::Value) -> bool {
        self.values.lock().insert(scoped(&self.scope, key), value);
        true
    }
}

/// Store persisted as one JSON object on disk, rewritten on every `set`.
pub struct JsonFileStore {
    scope: String,
    path: PathBuf,
    values: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store file.
    pub fn open(path: impl AsRef<Path>, scope: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            scope: scope.into(),
            path,
            values: Mutex::new(values),
        })
    }

    fn flush(&self, values: &BTreeMap<String, serde_json::Value>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(values)?)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.values.lock().get(&scoped(&self.scope, key)).cloned()
    }

    fn set(&self, key: &str, value: serde_json::Value) -> bool {
        let mut values = self.values.lock();
        let full = scoped(&self.scope, key);
        let previous = values.insert(full.clone(), value);
        match self.flush(&values) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to persist store");
                // keep memory and disk consistent
                match previous {
                    Some(v) => values.insert(full, v),
                    None => values.remove(&full),
                };
                false
            }
        }
    }
}
