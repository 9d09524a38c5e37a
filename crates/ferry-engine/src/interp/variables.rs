//! Script variable access

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

/// Script variables the engine reads by-reference arguments from and writes
/// results back to
pub trait VariableStore: Send + Sync {
    /// Current value of a variable
    fn get(&self, name: &str) -> Option<String>;

    /// Assign a variable
    fn set(&self, name: &str, value: &str) -> Result<(), String>;

    /// Whether a variable exists
    fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// In-memory variable store
#[derive(Debug, Default)]
pub struct MemoryVariables {
    values: RwLock<FxHashMap<String, String>>,
    protected: RwLock<FxHashSet<String>>,
}

impl MemoryVariables {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a variable read-only; later assignments fail
    pub fn protect(&self, name: &str) {
        self.protected.write().insert(name.to_string());
    }

    /// Remove a variable
    pub fn unset(&self, name: &str) -> Option<String> {
        self.values.write().remove(name)
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VariableStore for MemoryVariables {
    fn get(&self, name: &str) -> Option<String> {
        self.values.read().get(name).cloned()
    }

    fn set(&self, name: &str, value: &str) -> Result<(), String> {
        if self.protected.read().contains(name) {
            return Err(format!("can't set \"{}\": variable is read-only", name));
        }
        self.values.write().insert(name.to_string(), value.to_string());
        Ok(())
    }
}
