//! Memory Store Module
//!
//! Volatile backend keeping entries in a HashMap guarded by a single lock.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::value::apply_delta;
use crate::cache::{Backend, CacheEntry, Number, StorageIdentifier, Ttl, Value};
use crate::error::{CacheError, Result};

// == Memory Store ==
/// In-process backend. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Identifier to entry storage; one lock covers every compound operation
    entries: Mutex<HashMap<StorageIdentifier, CacheEntry>>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

// == Lazy Expiry ==
/// Returns the live entry for `id`, evicting it first if it has expired.
fn live<'a>(
    entries: &'a mut HashMap<StorageIdentifier, CacheEntry>,
    id: &StorageIdentifier,
) -> Option<&'a mut CacheEntry> {
    if entries.get(id).is_some_and(CacheEntry::is_expired) {
        entries.remove(id);
        return None;
    }
    entries.get_mut(id)
}

impl Backend for MemoryStore {
    fn write(&self, id: &StorageIdentifier, value: Value, ttl: Option<Duration>) -> Result<()> {
        let entry = CacheEntry::new(id.clone(), value, ttl);
        self.entries.lock().insert(id.clone(), entry);
        Ok(())
    }

    fn write_if_absent(
        &self,
        id: &StorageIdentifier,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let mut entries = self.entries.lock();
        if live(&mut entries, id).is_some() {
            return Ok(false);
        }
        entries.insert(id.clone(), CacheEntry::new(id.clone(), value, ttl));
        Ok(true)
    }

    fn read(&self, id: &StorageIdentifier) -> Result<Option<Value>> {
        let mut entries = self.entries.lock();
        Ok(live(&mut entries, id).map(|entry| entry.value.clone()))
    }

    fn take(&self, id: &StorageIdentifier) -> Result<Option<Value>> {
        let mut entries = self.entries.lock();
        Ok(entries
            .remove(id)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value))
    }

    fn remove(&self, id: &StorageIdentifier) -> Result<bool> {
        let mut entries = self.entries.lock();
        if live(&mut entries, id).is_none() {
            return Ok(false);
        }
        Ok(entries.remove(id).is_some())
    }

    fn contains(&self, id: &StorageIdentifier) -> Result<bool> {
        let mut entries = self.entries.lock();
        Ok(live(&mut entries, id).is_some())
    }

    fn increment(&self, id: &StorageIdentifier, delta: Number) -> Result<Number> {
        let mut entries = self.entries.lock();
        let entry =
            live(&mut entries, id).ok_or_else(|| CacheError::KeyNotFound(id.to_string()))?;

        let updated = apply_delta(&entry.value, delta, id.as_str())?;
        entry.value = Value::from(updated);
        Ok(updated)
    }

    fn touch(&self, id: &StorageIdentifier, ttl: Option<Duration>) -> Result<bool> {
        let mut entries = self.entries.lock();
        match live(&mut entries, id) {
            Some(entry) => {
                entry.reset_ttl(ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn ttl(&self, id: &StorageIdentifier) -> Result<Option<Ttl>> {
        let mut entries = self.entries.lock();
        Ok(live(&mut entries, id).map(|entry| entry.ttl()))
    }

    fn clear(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let entries = self.entries.lock();
        Ok(entries.values().filter(|entry| !entry.is_expired()).count())
    }

    fn purge_expired(&self) -> Result<usize> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        Ok(before - entries.len())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{encode, Key};
    use std::sync::Arc;
    use std::thread::{self, sleep};

    fn id(key: &str) -> StorageIdentifier {
        encode(&Key::from(key), None)
    }

    #[test]
    fn test_store_new() {
        let store = MemoryStore::new();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_store_write_and_read() {
        let store = MemoryStore::new();

        store.write(&id("key1"), Value::from("value1"), None).unwrap();

        assert_eq!(store.read(&id("key1")).unwrap(), Some(Value::from("value1")));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_store_read_nonexistent() {
        let store = MemoryStore::new();
        assert_eq!(store.read(&id("nonexistent")).unwrap(), None);
    }

    #[test]
    fn test_store_remove() {
        let store = MemoryStore::new();

        store.write(&id("key1"), Value::from("value1"), None).unwrap();
        assert!(store.remove(&id("key1")).unwrap());
        assert!(!store.remove(&id("key1")).unwrap());
        assert_eq!(store.read(&id("key1")).unwrap(), None);
    }

    #[test]
    fn test_remove_expired_reports_absent() {
        let store = MemoryStore::new();

        store
            .write(&id("key1"), Value::from(1i64), Some(Duration::from_millis(20)))
            .unwrap();
        sleep(Duration::from_millis(50));

        assert!(!store.remove(&id("key1")).unwrap());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_store_overwrite() {
        let store = MemoryStore::new();

        store.write(&id("key1"), Value::from("value1"), None).unwrap();
        store.write(&id("key1"), Value::from("value2"), None).unwrap();

        assert_eq!(store.read(&id("key1")).unwrap(), Some(Value::from("value2")));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_store_ttl_expiration() {
        let store = MemoryStore::new();

        store
            .write(&id("key1"), Value::from("value1"), Some(Duration::from_millis(50)))
            .unwrap();
        assert!(store.contains(&id("key1")).unwrap());

        sleep(Duration::from_millis(80));

        assert_eq!(store.count().unwrap(), 0);
        assert!(!store.contains(&id("key1")).unwrap());
        assert_eq!(store.read(&id("key1")).unwrap(), None);
    }

    #[test]
    fn test_write_if_absent_replaces_expired() {
        let store = MemoryStore::new();

        store
            .write(&id("k"), Value::from(1i64), Some(Duration::from_millis(30)))
            .unwrap();
        assert!(!store.write_if_absent(&id("k"), Value::from(2i64), None).unwrap());

        sleep(Duration::from_millis(50));

        assert!(store.write_if_absent(&id("k"), Value::from(3i64), None).unwrap());
        assert_eq!(store.read(&id("k")).unwrap(), Some(Value::from(3i64)));
    }

    #[test]
    fn test_increment_keeps_expiration() {
        let store = MemoryStore::new();

        store
            .write(&id("n"), Value::from(1i64), Some(Duration::from_secs(60)))
            .unwrap();
        assert_eq!(store.increment(&id("n"), Number::Int(4)).unwrap(), Number::Int(5));
        assert!(matches!(store.ttl(&id("n")).unwrap(), Some(Ttl::Remaining(_))));
    }

    #[test]
    fn test_increment_missing_and_non_numeric() {
        let store = MemoryStore::new();

        assert!(matches!(
            store.increment(&id("missing"), Number::Int(1)),
            Err(CacheError::KeyNotFound(_))
        ));

        store.write(&id("s"), Value::from("a"), None).unwrap();
        assert!(matches!(
            store.increment(&id("s"), Number::Int(1)),
            Err(CacheError::TypeMismatch { operand: "str" })
        ));
    }

    #[test]
    fn test_take_removes_entry() {
        let store = MemoryStore::new();

        store.write(&id("k"), Value::from("v"), None).unwrap();
        assert_eq!(store.take(&id("k")).unwrap(), Some(Value::from("v")));
        assert_eq!(store.take(&id("k")).unwrap(), None);
    }

    #[test]
    fn test_purge_expired() {
        let store = MemoryStore::new();

        store
            .write(&id("key1"), Value::from("v"), Some(Duration::from_millis(30)))
            .unwrap();
        store
            .write(&id("key2"), Value::from("v"), Some(Duration::from_secs(10)))
            .unwrap();

        sleep(Duration::from_millis(50));

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert!(store.contains(&id("key2")).unwrap());
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        store.write(&id("counter"), Value::from(0i64), None).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..250 {
                        store.increment(&id("counter"), Number::Int(1)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.read(&id("counter")).unwrap(), Some(Value::from(2000i64)));
    }

    #[test]
    fn test_concurrent_write_if_absent_single_winner() {
        let store = Arc::new(MemoryStore::new());

        let handles: Vec<_> = (0..8i64)
            .map(|n| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.write_if_absent(&id("once"), Value::from(n), None).unwrap())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
    }
}
