use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use crate::ConfigValue;

/// `ResultCache` keeps the last value resolved from the server for each config name.
///
/// Last write wins. Entries never expire on their own; the whole cache is dropped when the
/// evaluation context changes. Values are not namespaced by type.
#[derive(Debug, Default)]
pub(crate) struct ResultCache {
    values: RwLock<HashMap<String, ConfigValue>>,
}

impl ResultCache {
    pub fn new() -> Self {
        ResultCache::default()
    }

    pub fn get(&self, name: &str) -> Option<ConfigValue> {
        // A writer can only panic inside HashMap::insert/clear, which leaves the map usable.
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.get(name).cloned()
    }

    /// Store `value`, returning the previous one.
    pub fn set(&self, name: &str, value: ConfigValue) -> Option<ConfigValue> {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(name.to_owned(), value)
    }

    pub fn clear(&self) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
