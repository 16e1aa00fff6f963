//! Configuration Module
//!
//! Handles loading cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::disk::{DiskOptions, SyncPolicy};
use crate::error::{CacheError, Result};

// == Backend Kind ==
/// Which storage backend a configured cache uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Memory,
    Disk,
}

impl FromStr for BackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(BackendKind::Memory),
            "disk" => Ok(BackendKind::Disk),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown backend '{}', expected 'memory' or 'disk'",
                other
            ))),
        }
    }
}

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache name, also the disk store's file stem
    pub name: String,
    /// Storage backend
    pub backend: BackendKind,
    /// Directory used by the disk backend
    pub directory: PathBuf,
    /// TTL applied to writes that do not pass one; None = never expire
    pub default_ttl: Option<Duration>,
    /// Background sweep interval in seconds
    pub sweep_interval: u64,
    /// When disk writes are flushed to stable storage
    pub sync_policy: SyncPolicy,
    /// Stale log bytes tolerated before the disk store compacts
    pub compaction_min_bytes: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `KEYSTASH_NAME` - Cache name (default: default)
    /// - `KEYSTASH_BACKEND` - `memory` or `disk` (default: memory)
    /// - `KEYSTASH_DIR` - Disk store directory (default: ./keystash-data)
    /// - `KEYSTASH_DEFAULT_TTL` - Default TTL in seconds, 0 = never (default: 0)
    /// - `KEYSTASH_SWEEP_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `KEYSTASH_SYNC` - `always` or `never` (default: always)
    /// - `KEYSTASH_COMPACTION_MIN_BYTES` - Compaction threshold (default: 1 MiB)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let backend = match env::var("KEYSTASH_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.backend,
        };
        let sync_policy = match env::var("KEYSTASH_SYNC") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.sync_policy,
        };

        Ok(Self {
            name: env::var("KEYSTASH_NAME").unwrap_or(defaults.name),
            backend,
            directory: env::var("KEYSTASH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.directory),
            default_ttl: env::var("KEYSTASH_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            sweep_interval: env::var("KEYSTASH_SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sweep_interval),
            sync_policy,
            compaction_min_bytes: env::var("KEYSTASH_COMPACTION_MIN_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.compaction_min_bytes),
        })
    }

    /// Disk store options derived from this configuration.
    pub fn disk_options(&self) -> DiskOptions {
        DiskOptions {
            sync_policy: self.sync_policy,
            compaction_min_bytes: self.compaction_min_bytes,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            backend: BackendKind::Memory,
            directory: PathBuf::from("./keystash-data"),
            default_ttl: None,
            sweep_interval: 60,
            sync_policy: SyncPolicy::Always,
            compaction_min_bytes: 1024 * 1024,
        }
    }
}
