//! Cache Facade
//!
//! The public cache API, written once against the [`Backend`] contract.
//! Every call encodes `(key, tag)` exactly once and dispatches to the backend.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use crate::cache::{encode, Backend, CacheStats, Key, MemoryStore, Number, Ttl, Value};
use crate::config::{BackendKind, Config};
use crate::disk::DiskStore;
use crate::error::{CacheError, Result};

// == Cache ==
/// Handle to a named cache.
///
/// Cloning is cheap and every clone shares the same backend. For a disk
/// cache the directory lock is released when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Cache {
    name: Arc<str>,
    backend: Arc<dyn Backend>,
    /// TTL used by writes that pass `None`
    default_ttl: Option<Duration>,
    stats: Arc<Mutex<CacheStats>>,
}

impl Cache {
    // == Constructors ==
    /// Wraps an existing backend.
    pub fn with_backend(name: &str, backend: Arc<dyn Backend>) -> Self {
        Self {
            name: Arc::from(name),
            backend,
            default_ttl: None,
            stats: Arc::new(Mutex::new(CacheStats::new())),
        }
    }

    /// Creates a volatile in-process cache.
    pub fn memory(name: &str) -> Self {
        Self::with_backend(name, Arc::new(MemoryStore::new()))
    }

    /// Opens a persistent cache stored under `dir`.
    pub fn disk(name: &str, dir: impl AsRef<Path>) -> Result<Self> {
        let store = DiskStore::open(dir, name)?;
        Ok(Self::with_backend(name, Arc::new(store)))
    }

    /// Builds the cache described by `config`.
    pub fn open(config: &Config) -> Result<Self> {
        let backend: Arc<dyn Backend> = match config.backend {
            BackendKind::Memory => Arc::new(MemoryStore::new()),
            BackendKind::Disk => Arc::new(DiskStore::open_with_options(
                &config.directory,
                &config.name,
                config.disk_options(),
            )?),
        };
        info!("Opened {:?} cache '{}'", config.backend, config.name);

        Ok(Self::with_backend(&config.name, backend).with_default_ttl(config.default_ttl))
    }

    /// Sets the TTL applied to writes that do not pass one.
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn effective_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        ttl.or(self.default_ttl)
    }

    // == Set ==
    /// Stores `value`, overwriting any entry and restarting its expiration.
    pub fn set(
        &self,
        key: impl Into<Key>,
        value: impl Into<Value>,
        tag: Option<&str>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let id = encode(&key.into(), tag);
        self.backend.write(&id, value.into(), self.effective_ttl(ttl))
    }

    // == Ex Set ==
    /// Stores `value` only if no live entry exists. Returns whether it did.
    pub fn ex_set(
        &self,
        key: impl Into<Key>,
        value: impl Into<Value>,
        tag: Option<&str>,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let id = encode(&key.into(), tag);
        self.backend
            .write_if_absent(&id, value.into(), self.effective_ttl(ttl))
    }

    // == Get ==
    /// Returns the live value, or `None` when absent or expired.
    pub fn get(&self, key: impl Into<Key>, tag: Option<&str>) -> Result<Option<Value>> {
        let id = encode(&key.into(), tag);
        let value = self.backend.read(&id)?;
        self.stats.lock().record_lookup(value.is_some());
        Ok(value)
    }

    /// Returns the live value, or `default` when absent or expired.
    pub fn get_or(
        &self,
        key: impl Into<Key>,
        default: impl Into<Value>,
        tag: Option<&str>,
    ) -> Result<Value> {
        Ok(self.get(key, tag)?.unwrap_or_else(|| default.into()))
    }

    // == Pop ==
    /// Removes and returns the live value; `KeyNotFound` when there is none.
    pub fn pop(&self, key: impl Into<Key>, tag: Option<&str>) -> Result<Value> {
        let id = encode(&key.into(), tag);
        let value = self.backend.take(&id)?;
        self.stats.lock().record_lookup(value.is_some());
        value.ok_or_else(|| CacheError::KeyNotFound(id.to_string()))
    }

    /// Removes and returns the live value, or `default` when there is none.
    pub fn pop_or(
        &self,
        key: impl Into<Key>,
        default: impl Into<Value>,
        tag: Option<&str>,
    ) -> Result<Value> {
        match self.pop(key, tag) {
            Err(CacheError::KeyNotFound(_)) => Ok(default.into()),
            other => other,
        }
    }

    // == Delete ==
    /// Removes the entry. Returns whether one existed.
    pub fn delete(&self, key: impl Into<Key>, tag: Option<&str>) -> Result<bool> {
        self.backend.remove(&encode(&key.into(), tag))
    }

    // == Has Key ==
    pub fn has_key(&self, key: impl Into<Key>, tag: Option<&str>) -> Result<bool> {
        self.backend.contains(&encode(&key.into(), tag))
    }

    // == Incr / Decr ==
    /// Adds `delta` to a numeric entry and returns the new value.
    ///
    /// Fails with `KeyNotFound` when absent and `TypeMismatch` when the stored
    /// value is not numeric. The entry keeps its expiration.
    pub fn incr(
        &self,
        key: impl Into<Key>,
        delta: impl Into<Number>,
        tag: Option<&str>,
    ) -> Result<Number> {
        self.backend
            .increment(&encode(&key.into(), tag), delta.into())
    }

    /// Subtracts `delta`; an increment with the sign flipped.
    pub fn decr(
        &self,
        key: impl Into<Key>,
        delta: impl Into<Number>,
        tag: Option<&str>,
    ) -> Result<Number> {
        let id = encode(&key.into(), tag);
        let negated = delta
            .into()
            .checked_neg()
            .ok_or_else(|| CacheError::Overflow(id.to_string()))?;
        self.backend.increment(&id, negated)
    }

    // == Expiration ==
    /// Restarts the expiration of a live entry. Returns whether it exists.
    pub fn touch(&self, key: impl Into<Key>, ttl: Option<Duration>, tag: Option<&str>) -> Result<bool> {
        self.backend.touch(&encode(&key.into(), tag), ttl)
    }

    /// Remaining lifetime of a live entry, `None` when absent.
    pub fn ttl(&self, key: impl Into<Key>, tag: Option<&str>) -> Result<Option<Ttl>> {
        self.backend.ttl(&encode(&key.into(), tag))
    }

    // == Clear ==
    /// Removes every entry. Returns `true` on success.
    pub fn clear(&self) -> Result<bool> {
        self.backend.clear()?;
        Ok(true)
    }

    // == Length ==
    /// Number of live entries.
    pub fn len(&self) -> Result<usize> {
        self.backend.count()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // == Purge ==
    /// Evicts every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let purged = self.backend.purge_expired()?;
        self.stats.lock().record_purged(purged);
        Ok(purged)
    }

    // == Stats ==
    /// Snapshot of lookup counters and the live entry count.
    pub fn stats(&self) -> Result<CacheStats> {
        let total = self.len()?;
        Ok(self.stats.lock().snapshot(total))
    }
}
