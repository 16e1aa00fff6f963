//! Disk persistence module
//!
//! Durable backend built on an append-only data log. Each operation is written
//! in a compact binary format with checksums and replayed on open to rebuild
//! an in-memory index of record offsets.

mod record;
mod store;

pub use record::{LogOperation, LogRecord, RecordError};
pub use store::DiskStore;

use std::str::FromStr;

use crate::error::CacheError;

/// Log sync policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// Sync after every write; a returned write survives a crash
    #[default]
    Always,
    /// Let the OS decide when to sync (fastest, least safe)
    Never,
}

impl FromStr for SyncPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(SyncPolicy::Always),
            "never" | "no" => Ok(SyncPolicy::Never),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown sync policy '{}', expected 'always' or 'never'",
                other
            ))),
        }
    }
}

/// Disk store tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskOptions {
    /// Sync policy for appended records
    pub sync_policy: SyncPolicy,
    /// Stale bytes tolerated before an automatic compaction
    pub compaction_min_bytes: u64,
}

impl Default for DiskOptions {
    fn default() -> Self {
        DiskOptions {
            sync_policy: SyncPolicy::Always,
            compaction_min_bytes: 1024 * 1024,
        }
    }
}
