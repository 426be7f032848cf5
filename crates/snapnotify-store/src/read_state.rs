//! Persisted local read-state.
//!
//! [`ReadStateStore`] is the load/save boundary over a [`KvStorage`] entry.
//! Neither direction ever fails the caller: a missing or malformed entry
//! loads as an empty set, and a failed write is logged and dropped.
//!
//! [`LocalReadState`] holds the in-memory set and writes it back after
//! every mutation.

use std::sync::Arc;

use snapnotify_core::ReadSet;
use tracing::{debug, error, warn};

use crate::{KvStorage, StoreError};

/// Storage key of the persisted read set.
pub const READ_STATE_KEY: &str = "readNotifications";

#[derive(Clone)]
pub struct ReadStateStore {
    storage: Arc<dyn KvStorage>,
    key: String,
}

impl ReadStateStore {
    pub fn new(storage: Arc<dyn KvStorage>) -> Self {
        Self::with_key(storage, READ_STATE_KEY)
    }

    pub fn with_key(storage: Arc<dyn KvStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the persisted set. Any storage or parse failure yields an empty set.
    pub fn load(&self) -> ReadSet {
        match self.try_load() {
            Ok(set) => {
                debug!(key = %self.key, count = set.len(), "loaded read state");
                set
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "discarding unreadable read state");
                ReadSet::new()
            }
        }
    }

    fn try_load(&self) -> Result<ReadSet, StoreError> {
        match self.storage.get(&self.key)? {
            Some(raw) => Ok(ReadSet::from_json(&raw)?),
            None => Ok(ReadSet::new()),
        }
    }

    /// Write the full set. Failures are logged, not returned.
    pub fn save(&self, set: &ReadSet) {
        if let Err(e) = self.storage.set(&self.key, &set.to_json()) {
            error!(key = %self.key, error = %e, "failed to persist read state");
        }
    }
}

/// In-memory read set that persists itself on every change.
pub struct LocalReadState {
    store: ReadStateStore,
    set: ReadSet,
}

impl LocalReadState {
    /// Load the persisted set once; subsequent mutations write through.
    pub fn load(store: ReadStateStore) -> Self {
        let set = store.load();
        Self { store, set }
    }

    pub fn set(&self) -> &ReadSet {
        &self.set
    }

    pub fn contains(&self, id: &str) -> bool {
        self.set.contains(id)
    }

    /// Returns `true` if the id was newly added.
    pub fn insert(&mut self, id: &str) -> bool {
        let added = self.set.add(id);
        self.store.save(&self.set);
        added
    }

    /// Add every id, returning the ones that were not already present.
    pub fn insert_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let added: Vec<String> = ids
            .into_iter()
            .filter(|id| self.set.add(*id))
            .map(str::to_string)
            .collect();
        self.store.save(&self.set);
        added
    }

    /// Returns `true` if the id was present.
    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.set.remove(id);
        self.store.save(&self.set);
        removed
    }

    pub fn remove_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        for id in ids {
            self.set.remove(id);
        }
        self.store.save(&self.set);
    }

    /// Forget every locally read id.
    pub fn clear(&mut self) {
        self.set.clear();
        self.store.save(&self.set);
    }

    /// Replace the in-memory set with whatever storage currently holds.
    pub fn reload(&mut self) {
        self.set = self.store.load();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileKv, MemoryKv};
    use tempfile::TempDir;

    struct BrokenKv;

    impl KvStorage for BrokenKv {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Other("disk on fire".into()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Other("disk on fire".into()))
        }
        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Other("disk on fire".into()))
        }
    }

    fn memory_store() -> (Arc<MemoryKv>, ReadStateStore) {
        let kv = Arc::new(MemoryKv::new());
        let store = ReadStateStore::new(kv.clone());
        (kv, store)
    }

    #[test]
    fn missing_entry_loads_empty() {
        let (_, store) = memory_store();
        assert!(store.load().is_empty());
    }

    #[test]
    fn corrupted_entry_loads_empty() {
        let (kv, store) = memory_store();
        for raw in ["{not json", r#"{"a":1}"#, "[1,2,3]", "null", ""] {
            kv.set(READ_STATE_KEY, raw).unwrap();
            assert!(store.load().is_empty(), "{raw:?} should load as empty");
        }
    }

    #[test]
    fn storage_errors_fail_soft() {
        let store = ReadStateStore::new(Arc::new(BrokenKv));
        assert!(store.load().is_empty());
        // Must not panic or propagate.
        store.save(&["a"].into_iter().collect());
    }

    #[test]
    fn save_writes_json_array() {
        let (kv, store) = memory_store();
        store.save(&["b", "a"].into_iter().collect());
        assert_eq!(
            kv.get(READ_STATE_KEY).unwrap().as_deref(),
            Some(r#"["a","b"]"#)
        );
    }

    #[test]
    fn local_state_writes_through() {
        let (kv, store) = memory_store();
        let mut local = LocalReadState::load(store);

        assert!(local.insert("a"));
        assert!(!local.insert("a"));
        assert_eq!(kv.get(READ_STATE_KEY).unwrap().as_deref(), Some(r#"["a"]"#));

        assert!(local.remove("a"));
        assert_eq!(kv.get(READ_STATE_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn insert_all_reports_only_new_ids() {
        let (kv, store) = memory_store();
        kv.set(READ_STATE_KEY, r#"["a"]"#).unwrap();
        let mut local = LocalReadState::load(store);

        let added = local.insert_all(["a", "b", "c"]);
        assert_eq!(added, ["b", "c"]);
        assert_eq!(local.set().len(), 3);

        local.remove_all(added.iter().map(String::as_str));
        assert_eq!(kv.get(READ_STATE_KEY).unwrap().as_deref(), Some(r#"["a"]"#));
    }

    #[test]
    fn clear_and_reload() {
        let (kv, store) = memory_store();
        let mut local = LocalReadState::load(store);
        local.insert("a");
        local.clear();
        assert!(local.set().is_empty());
        assert_eq!(kv.get(READ_STATE_KEY).unwrap().as_deref(), Some("[]"));

        kv.set(READ_STATE_KEY, r#"["x","y"]"#).unwrap();
        local.reload();
        assert!(local.contains("x"));
        assert!(local.contains("y"));
    }

    #[test]
    fn persists_across_restart_on_disk() {
        let tmp = TempDir::new().unwrap();
        {
            let kv = Arc::new(FileKv::open(tmp.path()).unwrap());
            let mut local = LocalReadState::load(ReadStateStore::new(kv));
            local.insert("violation_12");
            local.insert("detection_7");
        }
        let kv = Arc::new(FileKv::open(tmp.path()).unwrap());
        let local = LocalReadState::load(ReadStateStore::new(kv));
        assert!(local.contains("violation_12"));
        assert!(local.contains("detection_7"));
        assert_eq!(local.set().len(), 2);
    }

    #[test]
    fn custom_key_is_isolated() {
        let kv = Arc::new(MemoryKv::new());
        let a = ReadStateStore::with_key(kv.clone(), "profileA");
        let b = ReadStateStore::with_key(kv.clone(), "profileB");
        a.save(&["x"].into_iter().collect());
        assert!(b.load().is_empty());
        assert_eq!(a.key(), "profileA");
    }
}
