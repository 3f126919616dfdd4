use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

type ServiceValue = Arc<dyn Any + Send + Sync>;

/// Keyed side-channel store carried by a turn.
///
/// Keys are unique: inserting under an existing key replaces the value.
/// Values are opaque; consumers recover them by key and concrete type.
#[derive(Default, Clone)]
pub struct TurnServices {
    entries: HashMap<String, ServiceValue>,
}

impl TurnServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, returning whether a previous value was replaced.
    pub fn insert<T>(&mut self, key: impl Into<String>, value: Arc<T>) -> bool
    where
        T: Any + Send + Sync,
    {
        self.entries.insert(key.into(), value).is_some()
    }

    /// Returns the value under `key` when it exists and has type `T`.
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let value = Arc::clone(self.entries.get(key)?);
        value.downcast::<T>().ok()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for TurnServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys = self.keys().collect::<Vec<_>>();
        keys.sort_unstable();
        f.debug_struct("TurnServices").field("keys", &keys).finish()
    }
}
