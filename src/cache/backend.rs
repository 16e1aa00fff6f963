//! Backend Contract
//!
//! The operation set every storage backend implements. [`Cache`](crate::Cache)
//! is written once against this trait, so the memory and disk stores plug into
//! it identically.

use std::fmt::Debug;
use std::time::Duration;

use crate::cache::{Number, StorageIdentifier, Ttl, Value};
use crate::error::Result;

/// Storage backend contract.
///
/// Every read-path operation (`read`, `take`, `contains`, `increment`,
/// `touch`, `ttl`) treats an expired entry as absent and evicts it first.
/// `write_if_absent` and `increment` are atomic per identifier.
pub trait Backend: Send + Sync + Debug {
    /// Stores or overwrites an entry, restarting its expiration.
    fn write(&self, id: &StorageIdentifier, value: Value, ttl: Option<Duration>) -> Result<()>;

    /// Stores an entry only when no live entry exists. Returns whether it wrote.
    fn write_if_absent(
        &self,
        id: &StorageIdentifier,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<bool>;

    /// Returns the live value, or `None` when absent or expired.
    fn read(&self, id: &StorageIdentifier) -> Result<Option<Value>>;

    /// Atomically reads and removes a live entry.
    fn take(&self, id: &StorageIdentifier) -> Result<Option<Value>>;

    /// Removes an entry. Returns whether one was present.
    fn remove(&self, id: &StorageIdentifier) -> Result<bool>;

    /// Checks for a live entry.
    fn contains(&self, id: &StorageIdentifier) -> Result<bool>;

    /// Adds `delta` to a numeric entry in place, keeping its expiration.
    ///
    /// Fails with `KeyNotFound` when absent and `TypeMismatch` when the value
    /// is not numeric.
    fn increment(&self, id: &StorageIdentifier, delta: Number) -> Result<Number>;

    /// Restarts the expiration of a live entry. Returns whether it exists.
    fn touch(&self, id: &StorageIdentifier, ttl: Option<Duration>) -> Result<bool>;

    /// Remaining lifetime of a live entry.
    fn ttl(&self, id: &StorageIdentifier) -> Result<Option<Ttl>>;

    /// Removes every entry.
    fn clear(&self) -> Result<()>;

    /// Number of live entries.
    fn count(&self) -> Result<usize>;

    /// Evicts every expired entry. Returns how many were removed.
    fn purge_expired(&self) -> Result<usize>;
}
