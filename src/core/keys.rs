//! Purpose: Turn dictionary descriptions into stable, identifier-safe property keys.
//! Exports: `KeyStore`, `MemoryKeyStore`, `KeyNormalizer`, `global_store`.
//! Role: Label normalizer used by the decoder; the store doubles as an override table.
//! Invariants: Once a label has a key it is reused verbatim until `register` overwrites it.
//! Invariants: Every normalization writes its result back to the store (last write wins).
//! Notes: Concurrent first-time normalization of one label may race; results are identical.
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Mutable mapping from raw label to normalized key.
pub trait KeyStore: Send + Sync {
    fn get(&self, label: &str) -> Option<String>;
    fn set(&self, label: &str, key: &str);
    fn snapshot(&self) -> BTreeMap<String, String>;
}

#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: RwLock<HashMap<String, String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self, label: &str) -> Option<String> {
        let keys = self.keys.read().unwrap_or_else(|poison| poison.into_inner());
        keys.get(label).cloned()
    }

    fn set(&self, label: &str, key: &str) {
        let mut keys = self.keys.write().unwrap_or_else(|poison| poison.into_inner());
        keys.insert(label.to_string(), key.to_string());
    }

    fn snapshot(&self) -> BTreeMap<String, String> {
        let keys = self.keys.read().unwrap_or_else(|poison| poison.into_inner());
        keys.iter()
            .map(|(label, key)| (label.clone(), key.clone()))
            .collect()
    }
}

static GLOBAL_STORE: OnceLock<Arc<MemoryKeyStore>> = OnceLock::new();

/// Process-wide store shared by every normalizer built with `KeyNormalizer::global`.
pub fn global_store() -> Arc<MemoryKeyStore> {
    GLOBAL_STORE
        .get_or_init(|| Arc::new(MemoryKeyStore::new()))
        .clone()
}

#[derive(Clone)]
pub struct KeyNormalizer {
    store: Arc<dyn KeyStore>,
}

impl std::fmt::Debug for KeyNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyNormalizer").finish_non_exhaustive()
    }
}

impl Default for KeyNormalizer {
    fn default() -> Self {
        Self::global()
    }
}

impl KeyNormalizer {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store }
    }

    pub fn global() -> Self {
        Self::new(global_store())
    }

    /// Normalizer over a private, empty store.
    pub fn isolated() -> Self {
        Self::new(Arc::new(MemoryKeyStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }

    pub fn register(&self, label: &str, key: &str) {
        self.store.set(label, key);
    }

    pub fn normalize(&self, label: &str) -> String {
        if let Some(cached) = self.store.get(label) {
            return cached;
        }
        let key = derive_key(label);
        self.register(label, &key);
        key
    }
}

fn derive_key(label: &str) -> String {
    let stripped = label.replace('\'', "");
    let joined: String = stripped.split_whitespace().map(init_cap).collect();
    joined
        .replace("Date/Time", "DateTime")
        .replace("Date / Time", "DateTime")
        .chars()
        .map(|ch| match ch {
            '-' | '+' | '"' | '.' | '(' | ')' | '\\' | '/' => '_',
            other => other,
        })
        .collect()
}

fn init_cap(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
