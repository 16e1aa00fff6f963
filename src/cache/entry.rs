//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::cache::{StorageIdentifier, Value};

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Identifier the entry is stored under
    pub id: StorageIdentifier,
    /// The stored value
    pub value: Value,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

// == Ttl ==
/// Remaining lifetime of a live entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Entry never expires
    Never,
    /// Entry expires after the given duration
    Remaining(Duration),
}

impl Ttl {
    /// Builds the remaining lifetime from an absolute expiration timestamp.
    pub fn from_expires_at(expires_at: Option<u64>) -> Self {
        match expires_at {
            None => Ttl::Never,
            Some(expires) => {
                Ttl::Remaining(Duration::from_millis(expires.saturating_sub(current_timestamp_ms())))
            }
        }
    }
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL.
    ///
    /// # Arguments
    /// * `id` - Storage identifier
    /// * `value` - The value to store
    /// * `ttl` - Optional time-to-live
    pub fn new(id: StorageIdentifier, value: Value, ttl: Option<Duration>) -> Self {
        let now = current_timestamp_ms();

        Self {
            id,
            value,
            created_at: now,
            expires_at: expiry_from_ttl(now, ttl),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time is greater than or equal to
    /// its expiration time.
    pub fn is_expired(&self) -> bool {
        is_expired_at(self.expires_at, current_timestamp_ms())
    }

    // == Touch ==
    /// Restarts the expiration countdown with a new TTL.
    pub fn reset_ttl(&mut self, ttl: Option<Duration>) {
        self.expires_at = expiry_from_ttl(current_timestamp_ms(), ttl);
    }

    // == Time To Live ==
    /// Returns the remaining lifetime of the entry.
    pub fn ttl(&self) -> Ttl {
        Ttl::from_expires_at(self.expires_at)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
///
/// A clock set before the epoch reads as zero.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Absolute expiration for a TTL starting at `now`.
pub fn expiry_from_ttl(now: u64, ttl: Option<Duration>) -> Option<u64> {
    ttl.map(|ttl| now.saturating_add(ttl.as_millis().min(u128::from(u64::MAX)) as u64))
}

/// Shared expiration rule for every backend.
pub fn is_expired_at(expires_at: Option<u64>, now: u64) -> bool {
    match expires_at {
        Some(expires) => now >= expires,
        None => false,
    }
}
