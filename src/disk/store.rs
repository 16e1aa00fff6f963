//! Disk Store
//!
//! Durable backend. Every mutation is appended to `<name>.log` and synced
//! before returning; an in-memory index maps identifiers to the offset of
//! their latest record. A `<name>.lock` file holds an exclusive advisory lock
//! for as long as the store is open, so only one instance owns the log.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{DiskOptions, LogOperation, LogRecord, SyncPolicy};
use crate::cache::entry::{current_timestamp_ms, expiry_from_ttl, is_expired_at};
use crate::cache::value::apply_delta;
use crate::cache::{Backend, Number, StorageIdentifier, Ttl, Value};
use crate::error::{CacheError, Result};

// == Slot ==
/// Location of an identifier's latest record in the log.
#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: u64,
    len: u64,
    payload_offset: u64,
    payload_len: u64,
    expires_at: Option<u64>,
}

impl Slot {
    fn for_record(record: &LogRecord, offset: u64, len: u64) -> Self {
        Slot {
            offset,
            len,
            payload_offset: offset + record.payload_offset() as u64,
            payload_len: record.payload.len() as u64,
            expires_at: record.expires_at,
        }
    }

    fn is_expired(&self, now: u64) -> bool {
        is_expired_at(self.expires_at, now)
    }

    /// Same record, moved to `offset` by compaction.
    fn relocated(&self, offset: u64) -> Self {
        Slot {
            offset,
            payload_offset: offset + (self.payload_offset - self.offset),
            ..*self
        }
    }
}

// == Log State ==
/// Open log file plus the index built from it.
#[derive(Debug)]
struct LogState {
    file: File,
    index: HashMap<StorageIdentifier, Slot>,
    /// Length of the valid log
    end: u64,
    /// Bytes occupied by records the index still points at
    live_bytes: u64,
}

impl LogState {
    fn new(file: File) -> Self {
        LogState {
            file,
            index: HashMap::new(),
            end: 0,
            live_bytes: 0,
        }
    }

    // == Replay ==
    /// Rebuilds the index from the log, cutting off a damaged tail.
    ///
    /// Returns the number of records replayed.
    fn replay(&mut self, log_path: &Path) -> Result<usize> {
        let mut data = Vec::new();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_end(&mut data)?;

        let now = current_timestamp_ms();
        let mut pos = 0;
        let mut records = 0;

        while pos < data.len() {
            match LogRecord::from_bytes(&data[pos..]) {
                Ok((record, size)) => {
                    self.apply_replayed(record, pos as u64, size as u64, now);
                    pos += size;
                    records += 1;
                }
                Err(e) => {
                    warn!(
                        "Discarding {} bytes of damaged log tail at offset {} in {}: {}",
                        data.len() - pos,
                        pos,
                        log_path.display(),
                        e
                    );
                    self.file.set_len(pos as u64)?;
                    self.file.sync_all()?;
                    break;
                }
            }
        }

        self.end = pos as u64;
        Ok(records)
    }

    fn apply_replayed(&mut self, record: LogRecord, offset: u64, len: u64, now: u64) {
        match record.op {
            LogOperation::Put => {
                let slot = Slot::for_record(&record, offset, len);
                if slot.is_expired(now) {
                    self.drop_slot(&record.id);
                } else {
                    self.insert_slot(record.id, slot);
                }
            }
            LogOperation::Remove => {
                self.drop_slot(&record.id);
            }
        }
    }

    // == Index Maintenance ==
    fn insert_slot(&mut self, id: StorageIdentifier, slot: Slot) {
        if let Some(old) = self.index.insert(id, slot) {
            self.live_bytes -= old.len;
        }
        self.live_bytes += slot.len;
    }

    fn drop_slot(&mut self, id: &StorageIdentifier) -> bool {
        match self.index.remove(id) {
            Some(old) => {
                self.live_bytes -= old.len;
                true
            }
            None => false,
        }
    }

    /// Returns the slot of a live entry. Expired entries leave the index here;
    /// their records stay expired on replay, so no tombstone is needed.
    fn live_slot(&mut self, id: &StorageIdentifier) -> Option<Slot> {
        let slot = *self.index.get(id)?;
        if slot.is_expired(current_timestamp_ms()) {
            self.drop_slot(id);
            return None;
        }
        Some(slot)
    }

    fn stale_bytes(&self) -> u64 {
        self.end - self.live_bytes
    }

    // == Append ==
    fn append(&mut self, record: &LogRecord, sync: SyncPolicy) -> Result<Slot> {
        let bytes = record.to_bytes()?;
        let offset = self.end;

        let written = self.file.write_all(&bytes).and_then(|()| match sync {
            SyncPolicy::Always => self.file.sync_data(),
            SyncPolicy::Never => Ok(()),
        });
        if let Err(e) = written {
            // The record is not committed: cut off whatever part reached the
            // file so replay never applies it
            if let Err(trunc) = self.file.set_len(offset) {
                warn!("Failed to roll back partial log write at offset {}: {}", offset, trunc);
            }
            return Err(e.into());
        }
        self.end += bytes.len() as u64;

        Ok(Slot::for_record(record, offset, bytes.len() as u64))
    }

    fn put_payload(
        &mut self,
        id: &StorageIdentifier,
        payload: Vec<u8>,
        expires_at: Option<u64>,
        sync: SyncPolicy,
    ) -> Result<()> {
        let record = LogRecord::put(id.clone(), payload, expires_at);
        let slot = self.append(&record, sync)?;
        self.insert_slot(id.clone(), slot);
        Ok(())
    }

    fn put(
        &mut self,
        id: &StorageIdentifier,
        value: &Value,
        expires_at: Option<u64>,
        sync: SyncPolicy,
    ) -> Result<()> {
        let payload = bincode::serialize(value)?;
        self.put_payload(id, payload, expires_at, sync)
    }

    fn delete(&mut self, id: &StorageIdentifier, sync: SyncPolicy) -> Result<bool> {
        if self.live_slot(id).is_none() {
            return Ok(false);
        }
        self.append(&LogRecord::remove(id.clone()), sync)?;
        Ok(self.drop_slot(id))
    }

    // == Read ==
    fn read_payload(&mut self, slot: Slot) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; slot.payload_len as usize];
        self.file.seek(SeekFrom::Start(slot.payload_offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_value(&mut self, slot: Slot) -> Result<Value> {
        let payload = self.read_payload(slot)?;
        Ok(bincode::deserialize(&payload)?)
    }

    // == Clear ==
    fn clear(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.index.clear();
        self.end = 0;
        self.live_bytes = 0;
        Ok(())
    }

    // == Compaction ==
    /// Rewrites the log with only the records the index points at.
    fn compact(&mut self, log_path: &Path) -> Result<()> {
        let now = current_timestamp_ms();
        self.index.retain(|_, slot| !slot.is_expired(now));
        self.live_bytes = self.index.values().map(|slot| slot.len).sum();

        let mut live: Vec<(StorageIdentifier, Slot)> = self
            .index
            .iter()
            .map(|(id, slot)| (id.clone(), *slot))
            .collect();
        live.sort_by_key(|(_, slot)| slot.offset);

        let tmp_path = log_path.with_extension("log.compact");
        let (file, index, written) = match self.write_compacted(&tmp_path, live) {
            Ok(compacted) => compacted,
            Err(e) => {
                if tmp_path.is_file() {
                    if let Err(rm) = fs::remove_file(&tmp_path) {
                        debug!("Failed to remove {}: {}", tmp_path.display(), rm);
                    }
                }
                return Err(e);
            }
        };

        fs::rename(&tmp_path, log_path)?;

        // The rename is committed: the compacted file is now the log, so
        // switch to it before anything else can fail
        let reclaimed = self.end - written;
        self.file = file;
        self.index = index;
        self.end = written;
        self.live_bytes = written;

        sync_parent_dir(log_path)?;

        info!(
            "Compacted {}: {} entries, reclaimed {} bytes",
            log_path.display(),
            self.index.len(),
            reclaimed
        );
        Ok(())
    }

    /// Copies the live records into a fresh file at `tmp_path`, returning it
    /// opened the same way as the log along with the relocated index.
    fn write_compacted(
        &mut self,
        tmp_path: &Path,
        live: Vec<(StorageIdentifier, Slot)>,
    ) -> Result<(File, HashMap<StorageIdentifier, Slot>, u64)> {
        let mut tmp = open_log(tmp_path)?;
        tmp.set_len(0)?;

        let mut index = HashMap::with_capacity(live.len());
        let mut written = 0u64;
        for (id, slot) in live {
            let mut buf = vec![0u8; slot.len as usize];
            self.file.seek(SeekFrom::Start(slot.offset))?;
            self.file.read_exact(&mut buf)?;
            tmp.write_all(&buf)?;
            index.insert(id, slot.relocated(written));
            written += slot.len;
        }
        tmp.sync_all()?;
        Ok((tmp, index, written))
    }
}

fn open_log(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)?)
}

/// Makes a rename in `path`'s directory durable.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}

// == Disk Store ==
/// Durable backend persisting entries in a checksummed append-only log.
#[derive(Debug)]
pub struct DiskStore {
    name: String,
    log_path: PathBuf,
    options: DiskOptions,
    state: Mutex<LogState>,
    /// Exclusive lock held until the store is dropped
    _lock: File,
}

impl DiskStore {
    // == Constructor ==
    /// Opens (or creates) the store `name` inside `dir` with default options.
    pub fn open(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        Self::open_with_options(dir, name, DiskOptions::default())
    }

    /// Opens (or creates) the store `name` inside `dir`.
    ///
    /// Fails with [`CacheError::Locked`] when another instance has it open.
    pub fn open_with_options(
        dir: impl AsRef<Path>,
        name: &str,
        options: DiskOptions,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let lock_path = dir.join(format!("{}.lock", name));
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        if let Err(e) = lock.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(CacheError::Locked(lock_path));
            }
            return Err(e.into());
        }
        debug!("Acquired lock {}", lock_path.display());

        let log_path = dir.join(format!("{}.log", name));
        let mut state = LogState::new(open_log(&log_path)?);
        let records = state.replay(&log_path)?;

        info!(
            "Disk store '{}' opened: {} live entries from {} records ({} bytes)",
            name,
            state.index.len(),
            records,
            state.end
        );

        Ok(DiskStore {
            name: name.to_string(),
            log_path,
            options,
            state: Mutex::new(state),
            _lock: lock,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the data log.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Current length of the data log in bytes.
    pub fn log_len(&self) -> u64 {
        self.state.lock().end
    }

    // == Compact ==
    /// Rewrites the log without stale records.
    pub fn compact(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.compact(&self.log_path)
    }

    /// Compacts once stale bytes pass the configured floor and outweigh live ones.
    ///
    /// Runs after a mutation has already been committed, so a failure is
    /// logged and left for the next attempt rather than returned.
    fn maybe_compact(&self, state: &mut LogState) {
        let stale = state.stale_bytes();
        if stale > self.options.compaction_min_bytes && stale > state.live_bytes {
            debug!(
                "Compacting '{}': {} stale bytes vs {} live",
                self.name, stale, state.live_bytes
            );
            if let Err(e) = state.compact(&self.log_path) {
                warn!("Automatic compaction of '{}' failed: {}", self.name, e);
            }
        }
    }

    fn sync(&self) -> SyncPolicy {
        self.options.sync_policy
    }
}

impl Backend for DiskStore {
    fn write(&self, id: &StorageIdentifier, value: Value, ttl: Option<Duration>) -> Result<()> {
        let expires_at = expiry_from_ttl(current_timestamp_ms(), ttl);
        let mut state = self.state.lock();
        state.put(id, &value, expires_at, self.sync())?;
        self.maybe_compact(&mut state);
        Ok(())
    }

    fn write_if_absent(
        &self,
        id: &StorageIdentifier,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        if state.live_slot(id).is_some() {
            return Ok(false);
        }
        let expires_at = expiry_from_ttl(current_timestamp_ms(), ttl);
        state.put(id, &value, expires_at, self.sync())?;
        self.maybe_compact(&mut state);
        Ok(true)
    }

    fn read(&self, id: &StorageIdentifier) -> Result<Option<Value>> {
        let mut state = self.state.lock();
        match state.live_slot(id) {
            Some(slot) => Ok(Some(state.read_value(slot)?)),
            None => Ok(None),
        }
    }

    fn take(&self, id: &StorageIdentifier) -> Result<Option<Value>> {
        let mut state = self.state.lock();
        let Some(slot) = state.live_slot(id) else {
            return Ok(None);
        };
        let value = state.read_value(slot)?;
        state.delete(id, self.sync())?;
        self.maybe_compact(&mut state);
        Ok(Some(value))
    }

    fn remove(&self, id: &StorageIdentifier) -> Result<bool> {
        let mut state = self.state.lock();
        let removed = state.delete(id, self.sync())?;
        self.maybe_compact(&mut state);
        Ok(removed)
    }

    fn contains(&self, id: &StorageIdentifier) -> Result<bool> {
        Ok(self.state.lock().live_slot(id).is_some())
    }

    fn increment(&self, id: &StorageIdentifier, delta: Number) -> Result<Number> {
        let mut state = self.state.lock();
        let slot = state
            .live_slot(id)
            .ok_or_else(|| CacheError::KeyNotFound(id.to_string()))?;

        let current = state.read_value(slot)?;
        let updated = apply_delta(&current, delta, id.as_str())?;
        state.put(id, &Value::from(updated), slot.expires_at, self.sync())?;
        self.maybe_compact(&mut state);
        Ok(updated)
    }

    fn touch(&self, id: &StorageIdentifier, ttl: Option<Duration>) -> Result<bool> {
        let mut state = self.state.lock();
        let Some(slot) = state.live_slot(id) else {
            return Ok(false);
        };
        let payload = state.read_payload(slot)?;
        let expires_at = expiry_from_ttl(current_timestamp_ms(), ttl);
        state.put_payload(id, payload, expires_at, self.sync())?;
        self.maybe_compact(&mut state);
        Ok(true)
    }

    fn ttl(&self, id: &StorageIdentifier) -> Result<Option<Ttl>> {
        let mut state = self.state.lock();
        Ok(state
            .live_slot(id)
            .map(|slot| Ttl::from_expires_at(slot.expires_at)))
    }

    fn clear(&self) -> Result<()> {
        self.state.lock().clear()
    }

    fn count(&self) -> Result<usize> {
        let now = current_timestamp_ms();
        let state = self.state.lock();
        Ok(state.index.values().filter(|slot| !slot.is_expired(now)).count())
    }

    fn purge_expired(&self) -> Result<usize> {
        let now = current_timestamp_ms();
        let mut state = self.state.lock();

        let expired: Vec<StorageIdentifier> = state
            .index
            .iter()
            .filter(|(_, slot)| slot.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            state.drop_slot(id);
        }

        self.maybe_compact(&mut state);
        Ok(expired.len())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{encode, Key};
    use std::thread::sleep;
    use tempfile::TempDir;

    fn id(key: &str) -> StorageIdentifier {
        encode(&Key::from(key), None)
    }

    fn no_auto_compaction() -> DiskOptions {
        DiskOptions {
            compaction_min_bytes: u64::MAX,
            ..DiskOptions::default()
        }
    }

    #[test]
    fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open(dir.path(), "cache").unwrap();

        store.write(&id("key1"), Value::from("value1"), None).unwrap();

        assert_eq!(store.read(&id("key1")).unwrap(), Some(Value::from("value1")));
        assert_eq!(store.read(&id("missing")).unwrap(), None);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = DiskStore::open(dir.path(), "cache").unwrap();
            store.write(&id("kept"), Value::from(vec![1u8, 2, 3]), None).unwrap();
            store.write(&id("gone"), Value::from("x"), None).unwrap();
            store.remove(&id("gone")).unwrap();
            store.write(&id("n"), Value::from(1i64), None).unwrap();
            store.increment(&id("n"), Number::Int(41)).unwrap();
        }

        let store = DiskStore::open(dir.path(), "cache").unwrap();
        assert_eq!(store.read(&id("kept")).unwrap(), Some(Value::from(vec![1u8, 2, 3])));
        assert_eq!(store.read(&id("gone")).unwrap(), None);
        assert_eq!(store.read(&id("n")).unwrap(), Some(Value::from(42i64)));
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_expiration_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = DiskStore::open(dir.path(), "cache").unwrap();
            store
                .write(&id("short"), Value::from("v"), Some(Duration::from_millis(50)))
                .unwrap();
            store
                .write(&id("long"), Value::from("v"), Some(Duration::from_secs(60)))
                .unwrap();
        }

        sleep(Duration::from_millis(80));

        let store = DiskStore::open(dir.path(), "cache").unwrap();
        assert!(!store.contains(&id("short")).unwrap());
        assert!(store.contains(&id("long")).unwrap());
        assert!(matches!(store.ttl(&id("long")).unwrap(), Some(Ttl::Remaining(_))));
    }

    #[test]
    fn test_second_open_is_locked() {
        let dir = TempDir::new().unwrap();
        let _store = DiskStore::open(dir.path(), "cache").unwrap();

        let result = DiskStore::open(dir.path(), "cache");
        assert!(matches!(result, Err(CacheError::Locked(_))));

        // A different name in the same directory is a separate store
        assert!(DiskStore::open(dir.path(), "other").is_ok());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        drop(DiskStore::open(dir.path(), "cache").unwrap());
        assert!(DiskStore::open(dir.path(), "cache").is_ok());
    }

    #[test]
    fn test_torn_tail_is_truncated() {
        let dir = TempDir::new().unwrap();
        let (log_path, good_len) = {
            let store = DiskStore::open(dir.path(), "cache").unwrap();
            store.write(&id("a"), Value::from(1i64), None).unwrap();
            store.write(&id("b"), Value::from(2i64), None).unwrap();
            (store.log_path().to_path_buf(), store.log_len())
        };

        // Simulate a crash halfway through a record
        let partial = LogRecord::put(id("c"), vec![0; 16], None).to_bytes().unwrap();
        let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
        file.write_all(&partial[..partial.len() / 2]).unwrap();
        drop(file);

        let store = DiskStore::open(dir.path(), "cache").unwrap();
        assert_eq!(store.log_len(), good_len);
        assert_eq!(fs::metadata(&log_path).unwrap().len(), good_len);
        assert_eq!(store.read(&id("b")).unwrap(), Some(Value::from(2i64)));
        assert_eq!(store.read(&id("c")).unwrap(), None);

        // Appends continue cleanly after the cut
        store.write(&id("c"), Value::from(3i64), None).unwrap();
        drop(store);
        let store = DiskStore::open(dir.path(), "cache").unwrap();
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_write_if_absent() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open(dir.path(), "cache").unwrap();

        assert!(store.write_if_absent(&id("k"), Value::from(1i64), None).unwrap());
        assert!(!store.write_if_absent(&id("k"), Value::from(2i64), None).unwrap());
        assert_eq!(store.read(&id("k")).unwrap(), Some(Value::from(1i64)));
    }

    #[test]
    fn test_increment_errors() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open(dir.path(), "cache").unwrap();

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
    fn test_touch_rewrites_expiration() {
        let dir = TempDir::new().unwrap();
        {
            let store = DiskStore::open(dir.path(), "cache").unwrap();
            store
                .write(&id("k"), Value::from("v"), Some(Duration::from_millis(50)))
                .unwrap();
            assert!(store.touch(&id("k"), None).unwrap());
            assert!(!store.touch(&id("missing"), None).unwrap());
        }

        sleep(Duration::from_millis(80));

        let store = DiskStore::open(dir.path(), "cache").unwrap();
        assert_eq!(store.ttl(&id("k")).unwrap(), Some(Ttl::Never));
        assert_eq!(store.read(&id("k")).unwrap(), Some(Value::from("v")));
    }

    #[test]
    fn test_clear_truncates_log() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open(dir.path(), "cache").unwrap();

        store.write(&id("k"), Value::from("v"), None).unwrap();
        store.clear().unwrap();

        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.log_len(), 0);
        assert_eq!(fs::metadata(store.log_path()).unwrap().len(), 0);
    }

    #[test]
    fn test_compact_keeps_live_entries() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open_with_options(dir.path(), "cache", no_auto_compaction()).unwrap();

        for n in 0..20i64 {
            store.write(&id("hot"), Value::from(n), None).unwrap();
        }
        store.write(&id("cold"), Value::from("c"), None).unwrap();
        store.write(&id("dead"), Value::from("d"), None).unwrap();
        store.remove(&id("dead")).unwrap();
        let before = store.log_len();

        store.compact().unwrap();

        assert!(store.log_len() < before);
        assert_eq!(store.read(&id("hot")).unwrap(), Some(Value::from(19i64)));
        assert_eq!(store.read(&id("cold")).unwrap(), Some(Value::from("c")));
        assert_eq!(store.read(&id("dead")).unwrap(), None);

        let compacted_len = store.log_len();
        drop(store);
        let store = DiskStore::open(dir.path(), "cache").unwrap();
        assert_eq!(store.log_len(), compacted_len);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_automatic_compaction_bounds_log() {
        let dir = TempDir::new().unwrap();
        let options = DiskOptions {
            compaction_min_bytes: 64,
            ..DiskOptions::default()
        };
        let store = DiskStore::open_with_options(dir.path(), "cache", options).unwrap();

        for n in 0..200i64 {
            store.write(&id("counter"), Value::from(n), None).unwrap();
        }

        assert!(store.log_len() < 400, "log grew to {}", store.log_len());
        assert_eq!(store.read(&id("counter")).unwrap(), Some(Value::from(199i64)));
    }

    #[test]
    fn test_remove_expired_appends_nothing() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open(dir.path(), "cache").unwrap();

        store
            .write(&id("k"), Value::from(1i64), Some(Duration::from_millis(20)))
            .unwrap();
        let len = store.log_len();
        sleep(Duration::from_millis(50));

        assert!(!store.remove(&id("k")).unwrap());
        assert_eq!(store.log_len(), len);
    }

    /// Blocks compaction by occupying its scratch path with a directory.
    fn blocked_compaction(dir: &TempDir) -> DiskStore {
        fs::create_dir(dir.path().join("cache.log.compact")).unwrap();
        let options = DiskOptions {
            compaction_min_bytes: 64,
            ..DiskOptions::default()
        };
        DiskStore::open_with_options(dir.path(), "cache", options).unwrap()
    }

    #[test]
    fn test_failed_auto_compaction_keeps_writes() {
        let dir = TempDir::new().unwrap();
        let store = blocked_compaction(&dir);

        for n in 0..50i64 {
            store.write(&id("k"), Value::from(n), None).unwrap();
        }
        assert_eq!(store.read(&id("k")).unwrap(), Some(Value::from(49i64)));

        assert_eq!(store.take(&id("k")).unwrap(), Some(Value::from(49i64)));
        assert_eq!(store.read(&id("k")).unwrap(), None);

        store.write(&id("after"), Value::from("v"), None).unwrap();
        drop(store);

        let store = DiskStore::open(dir.path(), "cache").unwrap();
        assert_eq!(store.read(&id("k")).unwrap(), None);
        assert_eq!(store.read(&id("after")).unwrap(), Some(Value::from("v")));
    }

    #[test]
    fn test_failed_compaction_leaves_log_usable() {
        let dir = TempDir::new().unwrap();
        let store = blocked_compaction(&dir);
        store.write(&id("a"), Value::from(1i64), None).unwrap();

        assert!(matches!(store.compact(), Err(CacheError::Io(_))));
        assert!(dir.path().join("cache.log.compact").is_dir());

        store.write(&id("b"), Value::from(2i64), None).unwrap();
        drop(store);

        fs::remove_dir(dir.path().join("cache.log.compact")).unwrap();
        let store = DiskStore::open(dir.path(), "cache").unwrap();
        store.compact().unwrap();
        assert_eq!(store.read(&id("a")).unwrap(), Some(Value::from(1i64)));
        assert_eq!(store.read(&id("b")).unwrap(), Some(Value::from(2i64)));

        // Writes after a compaction land in the renamed file
        store.write(&id("c"), Value::from(3i64), None).unwrap();
        drop(store);
        let store = DiskStore::open(dir.path(), "cache").unwrap();
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_purge_expired() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open(dir.path(), "cache").unwrap();

        store
            .write(&id("a"), Value::from(1i64), Some(Duration::from_millis(30)))
            .unwrap();
        store.write(&id("b"), Value::from(2i64), None).unwrap();

        sleep(Duration::from_millis(50));

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.count().unwrap(), 1);
    }
}
