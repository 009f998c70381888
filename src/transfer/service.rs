//! Transfer Service
//!
//! The boundary between translog uploaders and remote storage. Every upload
//! attempt, sync or async, ends in exactly one `on_success` / `on_failure`
//! on the file's listener: `upload_file_async` reports by itself, callers of
//! `upload_file` report the returned outcome.

use crate::transfer::blob_store::BlobStore;
use crate::transfer::error::TransferError;
use crate::transfer::file::{FileTransferListener, TransferFileSnapshot};
use bytes::Bytes;
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Boxed future returned by `TransferService` methods
pub type TransferFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransferError>> + Send + 'a>>;

/// Remote directory as path segments, joined with `/`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RemotePath {
    segments: Vec<String>,
}

impl RemotePath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RemotePath {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// A child directory
    pub fn add(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        RemotePath { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Directory key, with trailing `/` unless the path is empty
    pub fn as_dir(&self) -> String {
        if self.segments.is_empty() {
            String::new()
        } else {
            format!("{}/", self.segments.join("/"))
        }
    }

    /// Full key of `name` inside this directory
    pub fn key(&self, name: &str) -> String {
        format!("{}{}", self.as_dir(), name)
    }
}

impl std::fmt::Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

pub trait TransferService: Send + Sync + 'static {
    /// Upload and wait. The caller reports the outcome to its listener.
    fn upload_file<'a>(
        &'a self,
        snapshot: &'a TransferFileSnapshot,
        remote_path: &'a RemotePath,
    ) -> TransferFuture<'a, ()>;

    /// Upload in the background and report to `listener` exactly once.
    ///
    /// The task's result is the upload outcome, or the listener's error if
    /// the listener rejected the report.
    fn upload_file_async(
        &self,
        snapshot: TransferFileSnapshot,
        remote_path: RemotePath,
        listener: Arc<dyn FileTransferListener>,
    ) -> JoinHandle<Result<(), TransferError>>;

    /// Names (not full keys) under `remote_path` starting with `prefix`
    fn list_files_by_prefix<'a>(
        &'a self,
        prefix: &'a str,
        remote_path: &'a RemotePath,
    ) -> TransferFuture<'a, BTreeSet<String>>;

    fn read_file<'a>(&'a self, name: &'a str, remote_path: &'a RemotePath)
        -> TransferFuture<'a, Bytes>;
}

/// `TransferService` over any `BlobStore`
#[derive(Debug, Clone)]
pub struct BlobStoreTransferService<B: BlobStore + Clone> {
    store: B,
}

impl<B: BlobStore + Clone> BlobStoreTransferService<B> {
    pub fn new(store: B) -> Self {
        BlobStoreTransferService { store }
    }

    pub fn store(&self) -> &B {
        &self.store
    }
}

async fn put_snapshot<B: BlobStore>(
    store: &B,
    snapshot: &TransferFileSnapshot,
    remote_path: &RemotePath,
) -> Result<(), TransferError> {
    let key = remote_path.key(snapshot.name());
    store
        .put(&key, snapshot.content().clone())
        .await
        .map_err(|e| TransferError::upload(snapshot.name(), e.into()))?;
    debug!("uploaded {} ({} bytes) to {}", snapshot.identity(), snapshot.len(), key);
    Ok(())
}

impl<B: BlobStore + Clone> TransferService for BlobStoreTransferService<B> {
    fn upload_file<'a>(
        &'a self,
        snapshot: &'a TransferFileSnapshot,
        remote_path: &'a RemotePath,
    ) -> TransferFuture<'a, ()> {
        Box::pin(put_snapshot(&self.store, snapshot, remote_path))
    }

    fn upload_file_async(
        &self,
        snapshot: TransferFileSnapshot,
        remote_path: RemotePath,
        listener: Arc<dyn FileTransferListener>,
    ) -> JoinHandle<Result<(), TransferError>> {
        let store = self.store.clone();
        tokio::spawn(async move {
            match put_snapshot(&store, &snapshot, &remote_path).await {
                Ok(()) => listener.on_success(snapshot.identity()),
                Err(e) => {
                    if let Err(rejected) = listener.on_failure(snapshot.identity(), &e) {
                        error!(
                            "listener rejected failure of {} ({}): {}",
                            snapshot.identity(),
                            e,
                            rejected
                        );
                        return Err(rejected);
                    }
                    Err(e)
                }
            }
        })
    }

    fn list_files_by_prefix<'a>(
        &'a self,
        prefix: &'a str,
        remote_path: &'a RemotePath,
    ) -> TransferFuture<'a, BTreeSet<String>> {
        Box::pin(async move {
            let dir = remote_path.as_dir();
            let blobs = self.store.list(&remote_path.key(prefix)).await?;
            Ok(blobs
                .into_iter()
                .filter_map(|blob| blob.key.strip_prefix(&dir).map(str::to_string))
                .filter(|name| !name.contains('/'))
                .collect())
        })
    }

    fn read_file<'a>(
        &'a self,
        name: &'a str,
        remote_path: &'a RemotePath,
    ) -> TransferFuture<'a, Bytes> {
        Box::pin(async move { Ok(self.store.get(&remote_path.key(name)).await?) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SimulatedRng;
    use crate::transfer::blob_store::{InMemoryBlobStore, SimulatedBlobStore, SimulatedBlobStoreConfig};
    use crate::transfer::file::FileIdentity;
    use crate::transfer::state::TransferState;
    use crate::transfer::tracker::FileTransferTracker;

    fn snapshot(name: &str, content: &'static [u8]) -> TransferFileSnapshot {
        TransferFileSnapshot::new(FileIdentity::new(name, 1, 1), Bytes::from_static(content))
    }

    #[test]
    fn test_remote_path_joins_segments() {
        let path = RemotePath::new(["indices", "idx"]).add("0").add("translog");
        assert_eq!(path.to_string(), "indices/idx/0/translog");
        assert_eq!(path.key("translog-1.tlog"), "indices/idx/0/translog/translog-1.tlog");
        assert_eq!(RemotePath::default().key("x"), "x");
    }

    #[tokio::test]
    async fn test_upload_list_read() {
        let service = BlobStoreTransferService::new(InMemoryBlobStore::new());
        let path = RemotePath::new(["idx", "0"]);

        service.upload_file(&snapshot("translog-1.tlog", b"ops"), &path).await.unwrap();
        service.upload_file(&snapshot("translog-1.ckp", b"ckp"), &path).await.unwrap();
        service
            .upload_file(&snapshot("translog-1.tlog", b"nested"), &path.add("sub"))
            .await
            .unwrap();
        service.upload_file(&snapshot("metadata", b"m"), &path).await.unwrap();

        let names = service.list_files_by_prefix("translog-", &path).await.unwrap();
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["translog-1.ckp", "translog-1.tlog"]
        );
        assert_eq!(
            service.read_file("translog-1.tlog", &path).await.unwrap(),
            Bytes::from_static(b"ops")
        );
        assert!(matches!(
            service.read_file("translog-9.tlog", &path).await,
            Err(TransferError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_async_upload_reports_success_once() {
        let service = BlobStoreTransferService::new(InMemoryBlobStore::new());
        let tracker = Arc::new(FileTransferTracker::new("test"));
        let file = snapshot("translog-1.tlog", b"ops");

        service
            .upload_file_async(file.clone(), RemotePath::new(["r"]), tracker.clone())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(tracker.state(file.identity()), Some(TransferState::Success));
        assert_eq!(service.store().keys(), vec!["r/translog-1.tlog"]);
    }

    #[tokio::test]
    async fn test_async_upload_failure_reports_failure() {
        let mut config = SimulatedBlobStoreConfig::no_faults();
        config.put_fail_prob = 1.0;
        let store = SimulatedBlobStore::new(InMemoryBlobStore::new(), SimulatedRng::new(5), config);
        let service = BlobStoreTransferService::new(store);
        let tracker = Arc::new(FileTransferTracker::new("test"));
        let file = snapshot("translog-1.tlog", b"ops");

        let result = service
            .upload_file_async(file.clone(), RemotePath::new(["r"]), tracker.clone())
            .await
            .unwrap();

        assert!(matches!(result, Err(TransferError::Upload { .. })));
        assert_eq!(tracker.state(file.identity()), Some(TransferState::Failed));
    }

    #[tokio::test]
    async fn test_async_upload_surfaces_rejected_report() {
        let service = BlobStoreTransferService::new(InMemoryBlobStore::new());
        let tracker = Arc::new(FileTransferTracker::new("test"));
        let file = snapshot("translog-1.tlog", b"ops");
        tracker.on_deleted(file.identity()).unwrap();

        let result = service
            .upload_file_async(file.clone(), RemotePath::new(["r"]), tracker.clone())
            .await
            .unwrap();

        assert!(result.unwrap_err().is_illegal_transition());
        assert_eq!(tracker.state(file.identity()), Some(TransferState::Deleted));
    }
}
