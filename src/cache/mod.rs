//! Cache Module
//!
//! Key encoding, the entry model, the backend contract with its in-memory
//! implementation, and the [`Cache`] facade on top.

mod backend;
pub(crate) mod entry;
mod facade;
mod key;
mod memory;
mod stats;
pub(crate) mod value;


// Re-export public types
pub use backend::Backend;
pub use entry::{CacheEntry, Ttl};
pub use facade::Cache;
pub use key::{encode, Key, StorageIdentifier};
pub use memory::MemoryStore;
pub use stats::CacheStats;
pub use value::{Number, Value};
