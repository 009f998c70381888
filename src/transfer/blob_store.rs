//! Blob Store Abstraction
//!
//! Remote storage for uploaded translog files, as an object-safe trait with
//! boxed futures so services can hold `Arc<dyn BlobStore>`.
//!
//! Implementations:
//! - `InMemoryBlobStore`: unit tests and DST
//! - `LocalFsBlobStore`: development and local testing
//! - `SimulatedBlobStore`: DST with buggify fault injection
//! - `S3BlobStore`: production (feature `s3`)

use crate::buggify::faults::blob_store as faults;
use crate::io::Rng;
use crate::transfer::config::{BlobStoreType, TransferConfig};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::future::Future;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by every `BlobStore` method
pub type BlobFuture<'a, T> = Pin<Box<dyn Future<Output = IoResult<T>> + Send + 'a>>;

/// Metadata for a stored blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMeta {
    /// Full key, e.g. `indices/idx/0/translog/translog-3.tlog`
    pub key: String,
    pub size_bytes: u64,
}

pub trait BlobStore: Send + Sync + 'static {
    /// Create or overwrite
    fn put<'a>(&'a self, key: &'a str, data: Bytes) -> BlobFuture<'a, ()>;

    fn get<'a>(&'a self, key: &'a str) -> BlobFuture<'a, Bytes>;

    fn exists<'a>(&'a self, key: &'a str) -> BlobFuture<'a, bool>;

    /// Deleting a missing blob is not an error
    fn delete<'a>(&'a self, key: &'a str) -> BlobFuture<'a, ()>;

    /// Blobs whose key starts with `prefix`, sorted by key
    fn list<'a>(&'a self, prefix: &'a str) -> BlobFuture<'a, Vec<BlobMeta>>;
}

impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    fn put<'a>(&'a self, key: &'a str, data: Bytes) -> BlobFuture<'a, ()> {
        (**self).put(key, data)
    }

    fn get<'a>(&'a self, key: &'a str) -> BlobFuture<'a, Bytes> {
        (**self).get(key)
    }

    fn exists<'a>(&'a self, key: &'a str) -> BlobFuture<'a, bool> {
        (**self).exists(key)
    }

    fn delete<'a>(&'a self, key: &'a str) -> BlobFuture<'a, ()> {
        (**self).delete(key)
    }

    fn list<'a>(&'a self, prefix: &'a str) -> BlobFuture<'a, Vec<BlobMeta>> {
        (**self).list(prefix)
    }
}

fn not_found(key: &str) -> IoError {
    IoError::new(ErrorKind::NotFound, format!("blob not found: {}", key))
}

// ============================================================================
// InMemoryBlobStore - For tests and DST
// ============================================================================

/// In-memory blob store. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<RwLock<BTreeMap<String, Bytes>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// All keys, sorted (for testing)
    pub fn keys(&self) -> Vec<String> {
        self.blobs.read().keys().cloned().collect()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put<'a>(&'a self, key: &'a str, data: Bytes) -> BlobFuture<'a, ()> {
        Box::pin(async move {
            self.blobs.write().insert(key.to_string(), data);
            Ok(())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> BlobFuture<'a, Bytes> {
        Box::pin(async move {
            self.blobs
                .read()
                .get(key)
                .cloned()
                .ok_or_else(|| not_found(key))
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> BlobFuture<'a, bool> {
        Box::pin(async move { Ok(self.blobs.read().contains_key(key)) })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BlobFuture<'a, ()> {
        Box::pin(async move {
            self.blobs.write().remove(key);
            Ok(())
        })
    }

    fn list<'a>(&'a self, prefix: &'a str) -> BlobFuture<'a, Vec<BlobMeta>> {
        Box::pin(async move {
            let blobs = self.blobs.read();
            Ok(blobs
                .range(prefix.to_string()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| BlobMeta {
                    key: k.clone(),
                    size_bytes: v.len() as u64,
                })
                .collect())
        })
    }
}

// ============================================================================
// LocalFsBlobStore - For development
// ============================================================================

/// Blobs as files under `base_path`; key segments become directories
#[derive(Debug, Clone)]
pub struct LocalFsBlobStore {
    base_path: PathBuf,
}

impl LocalFsBlobStore {
    pub fn new(base_path: PathBuf) -> Self {
        LocalFsBlobStore { base_path }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }
}

impl BlobStore for LocalFsBlobStore {
    fn put<'a>(&'a self, key: &'a str, data: Bytes) -> BlobFuture<'a, ()> {
        Box::pin(async move {
            let path = self.full_path(key);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            // Write then rename so readers never see a torn blob
            let mut tmp = path.clone().into_os_string();
            tmp.push(".tmp-upload");
            let tmp = PathBuf::from(tmp);
            tokio::fs::write(&tmp, &data).await?;
            tokio::fs::rename(&tmp, &path).await
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> BlobFuture<'a, Bytes> {
        Box::pin(async move {
            match tokio::fs::read(self.full_path(key)).await {
                Ok(data) => Ok(Bytes::from(data)),
                Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found(key)),
                Err(e) => Err(e),
            }
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> BlobFuture<'a, bool> {
        Box::pin(async move { tokio::fs::try_exists(self.full_path(key)).await })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BlobFuture<'a, ()> {
        Box::pin(async move {
            match tokio::fs::remove_file(self.full_path(key)).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            }
        })
    }

    fn list<'a>(&'a self, prefix: &'a str) -> BlobFuture<'a, Vec<BlobMeta>> {
        Box::pin(async move {
            let base = self.base_path.clone();
            let prefix = prefix.to_string();
            tokio::task::spawn_blocking(move || -> IoResult<Vec<BlobMeta>> {
                let mut blobs = Vec::new();
                if base.exists() {
                    walk_dir(&base, &base, &prefix, &mut blobs)?;
                }
                blobs.sort_by(|a, b| a.key.cmp(&b.key));
                Ok(blobs)
            })
            .await
            .map_err(|e| IoError::new(ErrorKind::Other, e))?
        })
    }
}

fn walk_dir(dir: &Path, base: &Path, prefix: &str, blobs: &mut Vec<BlobMeta>) -> IoResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk_dir(&path, base, prefix, blobs)?;
            continue;
        }
        let Ok(relative) = path.strip_prefix(base) else {
            continue;
        };
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if key.ends_with(".tmp-upload") || !key.starts_with(prefix) {
            continue;
        }
        blobs.push(BlobMeta {
            key,
            size_bytes: std::fs::metadata(&path)?.len(),
        });
    }
    Ok(())
}

// ============================================================================
// SimulatedBlobStore - For DST with buggify fault injection
// ============================================================================

/// Fault probabilities for the simulated blob store
#[derive(Debug, Clone)]
pub struct SimulatedBlobStoreConfig {
    pub put_fail_prob: f64,
    pub get_fail_prob: f64,
    /// Probability that a read returns one flipped byte
    pub get_corrupt_prob: f64,
    pub timeout_prob: f64,
    pub delete_fail_prob: f64,
    /// Probability that a listing drops its last entry
    pub list_incomplete_prob: f64,
    /// Simulated latency range in microseconds (min, max)
    pub latency_range_us: (u64, u64),
}

impl Default for SimulatedBlobStoreConfig {
    fn default() -> Self {
        SimulatedBlobStoreConfig {
            put_fail_prob: 0.01,
            get_fail_prob: 0.01,
            get_corrupt_prob: 0.001,
            timeout_prob: 0.005,
            delete_fail_prob: 0.01,
            list_incomplete_prob: 0.02,
            latency_range_us: (0, 0),
        }
    }
}

impl SimulatedBlobStoreConfig {
    pub fn no_faults() -> Self {
        SimulatedBlobStoreConfig {
            put_fail_prob: 0.0,
            get_fail_prob: 0.0,
            get_corrupt_prob: 0.0,
            timeout_prob: 0.0,
            delete_fail_prob: 0.0,
            list_incomplete_prob: 0.0,
            latency_range_us: (0, 0),
        }
    }

    pub fn high_chaos() -> Self {
        SimulatedBlobStoreConfig {
            put_fail_prob: 0.1,
            get_fail_prob: 0.05,
            get_corrupt_prob: 0.01,
            timeout_prob: 0.05,
            delete_fail_prob: 0.05,
            list_incomplete_prob: 0.05,
            latency_range_us: (0, 0),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedBlobStoreStats {
    pub put_attempts: u64,
    pub put_failures: u64,
    pub get_attempts: u64,
    pub get_failures: u64,
    pub get_corruptions: u64,
    pub delete_attempts: u64,
    pub delete_failures: u64,
    pub list_attempts: u64,
    pub list_incomplete: u64,
    pub timeouts: u64,
}

struct SimulatedInner<R: Rng> {
    rng: R,
    config: SimulatedBlobStoreConfig,
    stats: SimulatedBlobStoreStats,
}

/// Wraps another blob store and injects faults. Clones share the wrapped
/// store, RNG, fault profile and stats.
pub struct SimulatedBlobStore<B: BlobStore + Clone, R: Rng> {
    inner: B,
    state: Arc<Mutex<SimulatedInner<R>>>,
}

impl<B: BlobStore + Clone, R: Rng> Clone for SimulatedBlobStore<B, R> {
    fn clone(&self) -> Self {
        SimulatedBlobStore {
            inner: self.inner.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<B: BlobStore + Clone, R: Rng> SimulatedBlobStore<B, R> {
    pub fn new(inner: B, rng: R, config: SimulatedBlobStoreConfig) -> Self {
        SimulatedBlobStore {
            inner,
            state: Arc::new(Mutex::new(SimulatedInner {
                rng,
                config,
                stats: SimulatedBlobStoreStats::default(),
            })),
        }
    }

    pub fn stats(&self) -> SimulatedBlobStoreStats {
        self.state.lock().stats.clone()
    }

    pub fn set_config(&self, config: SimulatedBlobStoreConfig) {
        self.state.lock().config = config;
    }

    /// The wrapped store, bypassing fault injection
    pub fn inner_store(&self) -> &B {
        &self.inner
    }

    /// Timeout check shared by every operation, plus the latency to apply
    fn timeout_and_latency(&self) -> (bool, u64) {
        let mut guard = self.state.lock();
        let s = &mut *guard;
        if crate::buggify!(&mut s.rng, faults::TIMEOUT, s.config.timeout_prob) {
            s.stats.timeouts = s.stats.timeouts.saturating_add(1);
            return (true, 0);
        }
        let (min, max) = s.config.latency_range_us;
        let latency = if max > min {
            s.rng.gen_range(min, max)
        } else {
            min
        };
        (false, latency)
    }

    async fn pre_op(&self) -> IoResult<()> {
        let (timed_out, latency_us) = self.timeout_and_latency();
        if timed_out {
            return Err(IoError::new(ErrorKind::TimedOut, "simulated timeout"));
        }
        if latency_us > 0 {
            tokio::time::sleep(std::time::Duration::from_micros(latency_us)).await;
        }
        Ok(())
    }
}

impl<B: BlobStore + Clone, R: Rng + 'static> BlobStore for SimulatedBlobStore<B, R> {
    fn put<'a>(&'a self, key: &'a str, data: Bytes) -> BlobFuture<'a, ()> {
        Box::pin(async move {
            {
                let mut s = self.state.lock();
                s.stats.put_attempts = s.stats.put_attempts.saturating_add(1);
            }
            self.pre_op().await?;

            let should_fail = {
                let mut guard = self.state.lock();
                let s = &mut *guard;
                let fail = crate::buggify!(&mut s.rng, faults::PUT_FAIL, s.config.put_fail_prob);
                if fail {
                    s.stats.put_failures = s.stats.put_failures.saturating_add(1);
                }
                fail
            };
            if should_fail {
                return Err(IoError::new(ErrorKind::Other, "simulated put failure"));
            }

            self.inner.put(key, data).await
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> BlobFuture<'a, Bytes> {
        Box::pin(async move {
            {
                let mut s = self.state.lock();
                s.stats.get_attempts = s.stats.get_attempts.saturating_add(1);
            }
            self.pre_op().await?;

            let should_fail = {
                let mut guard = self.state.lock();
                let s = &mut *guard;
                let fail = crate::buggify!(&mut s.rng, faults::GET_FAIL, s.config.get_fail_prob);
                if fail {
                    s.stats.get_failures = s.stats.get_failures.saturating_add(1);
                }
                fail
            };
            if should_fail {
                return Err(IoError::new(ErrorKind::Other, "simulated get failure"));
            }

            let data = self.inner.get(key).await?;

            let corrupt_at = {
                let mut guard = self.state.lock();
                let s = &mut *guard;
                if !data.is_empty()
                    && crate::buggify!(&mut s.rng, faults::GET_CORRUPT, s.config.get_corrupt_prob)
                {
                    s.stats.get_corruptions = s.stats.get_corruptions.saturating_add(1);
                    Some(s.rng.gen_range(0, data.len() as u64) as usize)
                } else {
                    None
                }
            };
            match corrupt_at {
                Some(pos) => {
                    let mut corrupted = data.to_vec();
                    corrupted[pos] ^= 0xFF;
                    Ok(Bytes::from(corrupted))
                }
                None => Ok(data),
            }
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> BlobFuture<'a, bool> {
        Box::pin(async move {
            self.pre_op().await?;
            self.inner.exists(key).await
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BlobFuture<'a, ()> {
        Box::pin(async move {
            {
                let mut s = self.state.lock();
                s.stats.delete_attempts = s.stats.delete_attempts.saturating_add(1);
            }
            self.pre_op().await?;

            let should_fail = {
                let mut guard = self.state.lock();
                let s = &mut *guard;
                let fail =
                    crate::buggify!(&mut s.rng, faults::DELETE_FAIL, s.config.delete_fail_prob);
                if fail {
                    s.stats.delete_failures = s.stats.delete_failures.saturating_add(1);
                }
                fail
            };
            if should_fail {
                return Err(IoError::new(ErrorKind::Other, "simulated delete failure"));
            }

            self.inner.delete(key).await
        })
    }

    fn list<'a>(&'a self, prefix: &'a str) -> BlobFuture<'a, Vec<BlobMeta>> {
        Box::pin(async move {
            {
                let mut s = self.state.lock();
                s.stats.list_attempts = s.stats.list_attempts.saturating_add(1);
            }
            self.pre_op().await?;

            let mut blobs = self.inner.list(prefix).await?;

            let truncate = {
                let mut guard = self.state.lock();
                let s = &mut *guard;
                let incomplete = !blobs.is_empty()
                    && crate::buggify!(
                        &mut s.rng,
                        faults::LIST_INCOMPLETE,
                        s.config.list_incomplete_prob
                    );
                if incomplete {
                    s.stats.list_incomplete = s.stats.list_incomplete.saturating_add(1);
                }
                incomplete
            };
            if truncate {
                blobs.pop();
            }
            Ok(blobs)
        })
    }
}

/// Build the blob store named by `config`
pub fn open_blob_store(config: &TransferConfig) -> IoResult<Arc<dyn BlobStore>> {
    config
        .validate()
        .map_err(|msg| IoError::new(ErrorKind::InvalidInput, msg))?;
    match config.store_type {
        BlobStoreType::InMemory => Ok(Arc::new(InMemoryBlobStore::new())),
        BlobStoreType::LocalFs => {
            let path = config.local_path.clone().ok_or_else(|| {
                IoError::new(ErrorKind::InvalidInput, "local_path is required")
            })?;
            std::fs::create_dir_all(&path)?;
            Ok(Arc::new(LocalFsBlobStore::new(path)))
        }
        #[cfg(feature = "s3")]
        BlobStoreType::S3 => {
            let s3 = config
                .s3
                .clone()
                .ok_or_else(|| IoError::new(ErrorKind::InvalidInput, "s3 settings are required"))?;
            Ok(Arc::new(crate::transfer::s3_store::S3BlobStore::new(s3)?))
        }
    }
}
