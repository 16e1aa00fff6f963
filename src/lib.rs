//! Keystash - a key/value cache library
//!
//! One API over interchangeable backends: a volatile in-memory store and a
//! durable disk store. Entries are addressed by a key plus an optional tag
//! and may carry a TTL.
//!
//! ```
//! use keystash::{Cache, Value};
//!
//! let cache = Cache::memory("example");
//! cache.set("visits", 0i64, None, None).unwrap();
//! cache.incr("visits", 1i64, None).unwrap();
//! assert_eq!(cache.get("visits", None).unwrap(), Some(Value::Int(1)));
//! ```

pub mod cache;
pub mod config;
pub mod disk;
pub mod error;
pub mod tasks;

pub use cache::{Backend, Cache, CacheStats, Key, MemoryStore, Number, Ttl, Value};
pub use config::Config;
pub use disk::DiskStore;
pub use error::{CacheError, Result};
pub use tasks::spawn_cleanup_task;
