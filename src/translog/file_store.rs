//! Generation File Storage
//!
//! Trait-based storage for translog generation files and their checkpoints.
//!
//! ## Implementations
//!
//! - `InMemoryGenerationStore`: unit tests and DST; tracks the synced prefix of
//!   every file so a crash can drop unsynced bytes
//! - `LocalGenerationStore`: production (std::fs::File + sync_all)
//! - `SimulatedGenerationStore`: DST with buggify fault injection

use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{Error as IoError, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Error type for generation store operations
#[derive(Debug)]
pub enum StoreError {
    /// I/O error
    Io(IoError),
    /// Corruption detected
    Corruption(String),
    /// File not found
    NotFound(String),
    /// Disk full
    DiskFull,
    /// Fsync failed
    FsyncFailed(String),
    /// Partial write detected
    PartialWrite { expected: usize, actual: usize },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "store I/O error: {}", e),
            StoreError::Corruption(msg) => write!(f, "store corruption: {}", msg),
            StoreError::NotFound(name) => write!(f, "file not found: {}", name),
            StoreError::DiskFull => write!(f, "disk full"),
            StoreError::FsyncFailed(msg) => write!(f, "fsync failed: {}", msg),
            StoreError::PartialWrite { expected, actual } => {
                write!(
                    f,
                    "partial write: expected {} bytes, wrote {}",
                    expected, actual
                )
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<IoError> for StoreError {
    fn from(e: IoError) -> Self {
        match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(e.to_string()),
            _ if e.to_string().contains("No space left") => StoreError::DiskFull,
            _ => StoreError::Io(e),
        }
    }
}

/// Append handle for the current generation's data file
pub trait GenerationWriter: Send {
    /// Append data. Returns the file size after the write.
    fn append(&mut self, data: &[u8]) -> Result<u64, StoreError>;
    /// Fsync to durable storage
    fn sync(&mut self) -> Result<(), StoreError>;
    /// Current size in bytes
    fn size(&self) -> u64;
}

/// Storage backend for generation files
pub trait GenerationStore: Send + Sync + 'static {
    type Writer: GenerationWriter;

    /// Create (or truncate) a file for appending
    fn create(&self, name: &str) -> Result<Self::Writer, StoreError>;
    /// Read a whole file
    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError>;
    /// Replace a file's contents durably (write, fsync, rename)
    fn write_atomic(&self, name: &str, data: &[u8]) -> Result<(), StoreError>;
    /// List all file names, sorted
    fn list(&self) -> Result<Vec<String>, StoreError>;
    /// Delete a file; deleting a missing file is not an error
    fn delete(&self, name: &str) -> Result<(), StoreError>;
    fn exists(&self, name: &str) -> Result<bool, StoreError>;
}

// ============================================================================
// InMemoryGenerationStore - For unit tests and DST
// ============================================================================

#[derive(Debug, Clone, Default)]
struct InMemoryFile {
    data: Vec<u8>,
    /// Position up to which data is durable
    synced_pos: usize,
}

type SharedFiles = Arc<Mutex<HashMap<String, InMemoryFile>>>;

/// In-memory generation store. Clones share the same files.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGenerationStore {
    files: SharedFiles,
}

impl InMemoryGenerationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes of a file
    pub fn get_file_data(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().get(name).map(|f| f.data.clone())
    }

    /// Overwrite a file's bytes (treated as durable)
    pub fn set_file_data(&self, name: &str, data: Vec<u8>) {
        let mut files = self.files.lock();
        if let Some(file) = files.get_mut(name) {
            file.synced_pos = data.len();
            file.data = data;
        }
    }

    /// Flip one byte of a file
    pub fn corrupt_byte(&self, name: &str, offset: usize) {
        let mut files = self.files.lock();
        if let Some(file) = files.get_mut(name) {
            if let Some(byte) = file.data.get_mut(offset) {
                *byte ^= 0xFF;
            }
        }
    }

    pub fn truncate_file(&self, name: &str, len: usize) {
        let mut files = self.files.lock();
        if let Some(file) = files.get_mut(name) {
            file.data.truncate(len);
            if file.synced_pos > len {
                file.synced_pos = len;
            }
        }
    }

    /// Simulate a crash: every file loses its unsynced tail
    pub fn simulate_crash(&self) {
        let mut files = self.files.lock();
        for file in files.values_mut() {
            file.data.truncate(file.synced_pos);
        }
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }
}

pub struct InMemoryGenerationWriter {
    name: String,
    files: SharedFiles,
    current_size: u64,
}

impl GenerationWriter for InMemoryGenerationWriter {
    fn append(&mut self, data: &[u8]) -> Result<u64, StoreError> {
        debug_assert!(!data.is_empty(), "Precondition: data must not be empty");

        let mut files = self.files.lock();
        let file = files
            .get_mut(&self.name)
            .ok_or_else(|| StoreError::NotFound(self.name.clone()))?;
        file.data.extend_from_slice(data);
        self.current_size = file.data.len() as u64;

        Ok(self.current_size)
    }

    fn sync(&mut self) -> Result<(), StoreError> {
        let mut files = self.files.lock();
        if let Some(file) = files.get_mut(&self.name) {
            file.synced_pos = file.data.len();
        }
        Ok(())
    }

    fn size(&self) -> u64 {
        self.current_size
    }
}

impl GenerationStore for InMemoryGenerationStore {
    type Writer = InMemoryGenerationWriter;

    fn create(&self, name: &str) -> Result<Self::Writer, StoreError> {
        debug_assert!(!name.is_empty(), "Precondition: name must not be empty");

        self.files
            .lock()
            .insert(name.to_string(), InMemoryFile::default());
        Ok(InMemoryGenerationWriter {
            name: name.to_string(),
            files: Arc::clone(&self.files),
            current_size: 0,
        })
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.files
            .lock()
            .get(name)
            .map(|f| f.data.clone())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn write_atomic(&self, name: &str, data: &[u8]) -> Result<(), StoreError> {
        self.files.lock().insert(
            name.to_string(),
            InMemoryFile {
                data: data.to_vec(),
                synced_pos: data.len(),
            },
        );
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.files.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.files.lock().remove(name);
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.files.lock().contains_key(name))
    }
}

// ============================================================================
// LocalGenerationStore - For production
// ============================================================================

/// Local filesystem store using std::fs::File + sync_all()
#[derive(Debug, Clone)]
pub struct LocalGenerationStore {
    dir: PathBuf,
}

impl LocalGenerationStore {
    /// Creates the directory if it doesn't exist
    pub fn new(dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&dir)?;
        Ok(LocalGenerationStore { dir })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

pub struct LocalGenerationWriter {
    file: std::fs::File,
    current_size: u64,
}

impl GenerationWriter for LocalGenerationWriter {
    fn append(&mut self, data: &[u8]) -> Result<u64, StoreError> {
        debug_assert!(!data.is_empty(), "Precondition: data must not be empty");

        let written = self.file.write(data).map_err(StoreError::Io)?;
        if written != data.len() {
            return Err(StoreError::PartialWrite {
                expected: data.len(),
                actual: written,
            });
        }
        self.current_size = self
            .current_size
            .checked_add(written as u64)
            .expect("file size overflow is unreachable for files < u64::MAX");

        Ok(self.current_size)
    }

    fn sync(&mut self) -> Result<(), StoreError> {
        self.file
            .sync_all()
            .map_err(|e| StoreError::FsyncFailed(e.to_string()))
    }

    fn size(&self) -> u64 {
        self.current_size
    }
}

impl GenerationStore for LocalGenerationStore {
    type Writer = LocalGenerationWriter;

    fn create(&self, name: &str) -> Result<Self::Writer, StoreError> {
        debug_assert!(!name.is_empty(), "Precondition: name must not be empty");

        let file = std::fs::File::create(self.file_path(name)).map_err(StoreError::Io)?;
        Ok(LocalGenerationWriter {
            file,
            current_size: 0,
        })
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.file_path(name);
        if !path.exists() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        std::fs::read(&path).map_err(StoreError::Io)
    }

    fn write_atomic(&self, name: &str, data: &[u8]) -> Result<(), StoreError> {
        let tmp_path = self.file_path(&format!("{}.tmp", name));
        {
            let mut file = std::fs::File::create(&tmp_path).map_err(StoreError::Io)?;
            file.write_all(data).map_err(StoreError::from)?;
            file.sync_all()
                .map_err(|e| StoreError::FsyncFailed(e.to_string()))?;
        }
        std::fs::rename(&tmp_path, self.file_path(name)).map_err(StoreError::Io)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(StoreError::Io)? {
            let entry = entry.map_err(StoreError::Io)?;
            if entry.path().is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    if !name.ends_with(".tmp") {
                        names.push(name.to_string());
                    }
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.file_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.file_path(name).exists())
    }
}

// ============================================================================
// SimulatedGenerationStore - For DST with buggify fault injection
// ============================================================================

use crate::buggify::faults::disk as disk_faults;
use crate::io::Rng;

/// Fault probabilities for the simulated store
#[derive(Debug, Clone)]
pub struct SimulatedStoreConfig {
    pub write_fail_prob: f64,
    pub partial_write_prob: f64,
    pub fsync_fail_prob: f64,
    /// Probability that a read returns one flipped byte
    pub corruption_prob: f64,
    pub disk_full_prob: f64,
}

impl Default for SimulatedStoreConfig {
    fn default() -> Self {
        SimulatedStoreConfig {
            write_fail_prob: 0.01,
            partial_write_prob: 0.005,
            fsync_fail_prob: 0.005,
            corruption_prob: 0.001,
            disk_full_prob: 0.001,
        }
    }
}

impl SimulatedStoreConfig {
    pub fn no_faults() -> Self {
        SimulatedStoreConfig {
            write_fail_prob: 0.0,
            partial_write_prob: 0.0,
            fsync_fail_prob: 0.0,
            corruption_prob: 0.0,
            disk_full_prob: 0.0,
        }
    }

    pub fn high_chaos() -> Self {
        SimulatedStoreConfig {
            write_fail_prob: 0.05,
            partial_write_prob: 0.02,
            fsync_fail_prob: 0.02,
            corruption_prob: 0.01,
            disk_full_prob: 0.005,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedStoreStats {
    pub write_attempts: u64,
    pub write_failures: u64,
    pub partial_writes: u64,
    pub sync_attempts: u64,
    pub sync_failures: u64,
    pub read_attempts: u64,
    pub read_corruptions: u64,
    pub disk_full_errors: u64,
}

struct SimulatedInner<R: Rng> {
    rng: R,
    config: SimulatedStoreConfig,
    stats: SimulatedStoreStats,
}

/// In-memory store with injected faults. Clones share files, RNG, fault
/// profile and stats.
pub struct SimulatedGenerationStore<R: Rng> {
    inner: InMemoryGenerationStore,
    state: Arc<Mutex<SimulatedInner<R>>>,
}

impl<R: Rng> SimulatedGenerationStore<R> {
    pub fn new(rng: R, config: SimulatedStoreConfig) -> Self {
        Self::with_files(InMemoryGenerationStore::new(), rng, config)
    }

    /// Wrap existing files, e.g. to reopen after a simulated crash with a
    /// different fault profile
    pub fn with_files(
        inner: InMemoryGenerationStore,
        rng: R,
        config: SimulatedStoreConfig,
    ) -> Self {
        SimulatedGenerationStore {
            inner,
            state: Arc::new(Mutex::new(SimulatedInner {
                rng,
                config,
                stats: SimulatedStoreStats::default(),
            })),
        }
    }

    pub fn stats(&self) -> SimulatedStoreStats {
        self.state.lock().stats.clone()
    }

    /// Swap the fault profile, e.g. to start failing fsyncs mid-run
    pub fn set_config(&self, config: SimulatedStoreConfig) {
        self.state.lock().config = config;
    }

    /// Underlying files, for crash simulation
    pub fn inner_store(&self) -> &InMemoryGenerationStore {
        &self.inner
    }

    /// Fail writes and checkpoint replacements the way the writer does
    fn inject_write_fault(&self) -> Result<(), StoreError> {
        let mut guard = self.state.lock();
        let s = &mut *guard;
        s.stats.write_attempts = s.stats.write_attempts.saturating_add(1);

        if crate::buggify!(&mut s.rng, disk_faults::DISK_FULL, s.config.disk_full_prob) {
            s.stats.disk_full_errors = s.stats.disk_full_errors.saturating_add(1);
            return Err(StoreError::DiskFull);
        }
        if crate::buggify!(&mut s.rng, disk_faults::WRITE_FAIL, s.config.write_fail_prob) {
            s.stats.write_failures = s.stats.write_failures.saturating_add(1);
            return Err(StoreError::Io(IoError::new(
                ErrorKind::Other,
                "simulated write failure",
            )));
        }
        Ok(())
    }
}

impl<R: Rng> Clone for SimulatedGenerationStore<R> {
    fn clone(&self) -> Self {
        SimulatedGenerationStore {
            inner: self.inner.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

pub struct SimulatedGenerationWriter<R: Rng> {
    inner: InMemoryGenerationWriter,
    store: SimulatedGenerationStore<R>,
}

impl<R: Rng> GenerationWriter for SimulatedGenerationWriter<R> {
    fn append(&mut self, data: &[u8]) -> Result<u64, StoreError> {
        self.store.inject_write_fault()?;

        {
            let mut guard = self.store.state.lock();
            let s = &mut *guard;
            // Partial write: some bytes land, the caller must not ack
            if data.len() > 1
                && crate::buggify!(
                    &mut s.rng,
                    disk_faults::PARTIAL_WRITE,
                    s.config.partial_write_prob
                )
            {
                s.stats.partial_writes = s.stats.partial_writes.saturating_add(1);
                let partial_len = s.rng.gen_range(1, data.len() as u64) as usize;
                drop(guard);
                let _ = self.inner.append(&data[..partial_len]);
                return Err(StoreError::PartialWrite {
                    expected: data.len(),
                    actual: partial_len,
                });
            }
        }

        self.inner.append(data)
    }

    fn sync(&mut self) -> Result<(), StoreError> {
        let mut guard = self.store.state.lock();
        let s = &mut *guard;
        s.stats.sync_attempts = s.stats.sync_attempts.saturating_add(1);

        if crate::buggify!(&mut s.rng, disk_faults::FSYNC_FAIL, s.config.fsync_fail_prob) {
            s.stats.sync_failures = s.stats.sync_failures.saturating_add(1);
            return Err(StoreError::FsyncFailed("simulated fsync failure".to_string()));
        }

        drop(guard);
        self.inner.sync()
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }
}

impl<R: Rng + 'static> GenerationStore for SimulatedGenerationStore<R> {
    type Writer = SimulatedGenerationWriter<R>;

    fn create(&self, name: &str) -> Result<Self::Writer, StoreError> {
        let inner = self.inner.create(name)?;
        Ok(SimulatedGenerationWriter {
            inner,
            store: self.clone(),
        })
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let mut data = self.inner.read(name)?;

        let mut guard = self.state.lock();
        let s = &mut *guard;
        s.stats.read_attempts = s.stats.read_attempts.saturating_add(1);
        if !data.is_empty()
            && crate::buggify!(&mut s.rng, disk_faults::CORRUPTION, s.config.corruption_prob)
        {
            s.stats.read_corruptions = s.stats.read_corruptions.saturating_add(1);
            let idx = s.rng.gen_range(0, data.len() as u64) as usize;
            data[idx] ^= 0xFF;
        }
        Ok(data)
    }

    fn write_atomic(&self, name: &str, data: &[u8]) -> Result<(), StoreError> {
        self.inject_write_fault()?;
        self.inner.write_atomic(name, data)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list()
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.inner.delete(name)
    }

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        self.inner.exists(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SimulatedRng;

    #[test]
    fn test_inmemory_create_write_read() {
        let store = InMemoryGenerationStore::new();

        let mut writer = store.create("translog-1.tlog").unwrap();
        writer.append(b"hello").unwrap();
        writer.append(b" world").unwrap();
        assert_eq!(writer.size(), 11);

        assert_eq!(store.read("translog-1.tlog").unwrap(), b"hello world");
        assert!(matches!(
            store.read("missing.tlog"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_inmemory_crash_drops_unsynced_tail() {
        let store = InMemoryGenerationStore::new();
        let mut writer = store.create("translog-1.tlog").unwrap();
        writer.append(b"durable").unwrap();
        writer.sync().unwrap();
        writer.append(b"-lost").unwrap();
        store.write_atomic("translog-1.ckp", b"{}").unwrap();

        store.simulate_crash();

        assert_eq!(store.read("translog-1.tlog").unwrap(), b"durable");
        assert_eq!(store.read("translog-1.ckp").unwrap(), b"{}");
    }

    #[test]
    fn test_inmemory_list_and_delete() {
        let store = InMemoryGenerationStore::new();
        store.create("translog-2.tlog").unwrap();
        store.create("translog-1.tlog").unwrap();
        assert_eq!(
            store.list().unwrap(),
            vec!["translog-1.tlog", "translog-2.tlog"]
        );

        store.delete("translog-1.tlog").unwrap();
        store.delete("translog-1.tlog").unwrap();
        assert!(!store.exists("translog-1.tlog").unwrap());
        assert_eq!(store.file_count(), 1);
    }

    #[test]
    fn test_local_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalGenerationStore::new(dir.path().join("tlog")).unwrap();

        let mut writer = store.create("translog-1.tlog").unwrap();
        writer.append(b"hello").unwrap();
        writer.sync().unwrap();
        assert_eq!(writer.size(), 5);

        store.write_atomic("translog-1.ckp", b"v1").unwrap();
        store.write_atomic("translog-1.ckp", b"v2").unwrap();

        assert_eq!(store.read("translog-1.tlog").unwrap(), b"hello");
        assert_eq!(store.read("translog-1.ckp").unwrap(), b"v2");
        assert_eq!(store.list().unwrap().len(), 2);

        store.delete("translog-1.tlog").unwrap();
        assert!(!store.exists("translog-1.tlog").unwrap());
    }

    #[test]
    fn test_simulated_store_no_faults() {
        let store =
            SimulatedGenerationStore::new(SimulatedRng::new(42), SimulatedStoreConfig::no_faults());

        let mut writer = store.create("translog-1.tlog").unwrap();
        writer.append(b"hello").unwrap();
        writer.sync().unwrap();
        assert_eq!(store.read("translog-1.tlog").unwrap(), b"hello");

        let stats = store.stats();
        assert_eq!(stats.write_attempts, 1);
        assert_eq!(stats.sync_attempts, 1);
        assert_eq!(stats.sync_failures, 0);
    }

    #[test]
    fn test_simulated_store_fsync_failure() {
        let store = SimulatedGenerationStore::new(
            SimulatedRng::new(42),
            SimulatedStoreConfig {
                fsync_fail_prob: 1.0,
                ..SimulatedStoreConfig::no_faults()
            },
        );

        let mut writer = store.create("translog-1.tlog").unwrap();
        writer.append(b"data").unwrap();
        assert!(matches!(writer.sync(), Err(StoreError::FsyncFailed(_))));
        assert_eq!(store.stats().sync_failures, 1);
    }

    #[test]
    fn test_simulated_store_deterministic() {
        let config = SimulatedStoreConfig {
            write_fail_prob: 0.3,
            fsync_fail_prob: 0.2,
            ..SimulatedStoreConfig::no_faults()
        };

        let run = |seed: u64| {
            let store = SimulatedGenerationStore::new(SimulatedRng::new(seed), config.clone());
            let mut writer = store.create("translog-1.tlog").unwrap();
            (0..20)
                .map(|_| writer.append(b"data").is_ok())
                .collect::<Vec<_>>()
        };

        assert_eq!(run(12345), run(12345));
    }
}
