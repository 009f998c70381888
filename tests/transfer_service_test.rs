//! Transfer Service Integration Tests
//!
//! Uploads real translog generations through `TransferService` to the local
//! filesystem and in-memory blob stores, checking the tracker and the
//! remote bytes together.

use bytes::Bytes;
use shard_translog::transfer::{
    open_blob_store, BlobStore, BlobStoreTransferService, FileIdentity, FileTransferListener,
    FileTransferTracker, InMemoryBlobStore, RemotePath, TransferConfig, TransferError,
    TransferFileSnapshot, TransferService, TransferState, TranslogUploader,
};
use shard_translog::translog::{
    InMemoryGenerationStore, Operation, Translog, TranslogConfig, TranslogDeps,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn translog_with_generations(generations: u64) -> Translog<InMemoryGenerationStore> {
    let mut config = TranslogConfig::test();
    config.generation_threshold_size = u64::MAX;
    let translog = Translog::open(
        "[logs][0]",
        &config,
        &Translog::<InMemoryGenerationStore>::new_uuid(),
        InMemoryGenerationStore::new(),
        TranslogDeps::default(),
    )
    .unwrap();

    let mut seq_no = 0;
    for _ in 0..generations {
        for _ in 0..10 {
            translog
                .add(&Operation::new(seq_no, 1, format!("doc-{}", seq_no)))
                .unwrap();
            seq_no += 1;
        }
        translog.roll_generation().unwrap();
    }
    translog
}

fn remote_path() -> RemotePath {
    RemotePath::new(["cluster", "logs", "0", "translog"])
}

#[derive(Default)]
struct CountingListener {
    successes: AtomicUsize,
    failures: AtomicUsize,
}

impl FileTransferListener for CountingListener {
    fn on_success(&self, _file: &FileIdentity) -> Result<(), TransferError> {
        self.successes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_failure(&self, _file: &FileIdentity, _cause: &TransferError) -> Result<(), TransferError> {
        self.failures.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_local_fs_upload_matches_local_generations() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_blob_store(&TransferConfig::local(dir.path().to_path_buf())).unwrap();
    let service = Arc::new(BlobStoreTransferService::new(store));
    let tracker = Arc::new(FileTransferTracker::new("[logs][0]"));
    let uploader = TranslogUploader::new("[logs][0]", service, tracker.clone(), remote_path());

    let translog = translog_with_generations(3);
    let summary = uploader.upload_sealed_generations(&translog).await.unwrap();
    assert_eq!(summary.uploaded, 6);
    assert_eq!(summary.failed, 0);

    let sealed = translog.sealed_generations();
    let remote = uploader.remote_generations().await.unwrap();
    assert_eq!(
        remote.into_iter().collect::<Vec<_>>(),
        sealed.iter().map(|g| g.generation).collect::<Vec<_>>()
    );

    for info in &sealed {
        let local = translog.generation_files(info.generation).unwrap();
        let (data, checkpoint) = uploader.fetch_generation(info.generation).await.unwrap();
        assert_eq!(data, local.data);
        assert_eq!(checkpoint, local.checkpoint);
    }
    assert_eq!(tracker.files_in_state(TransferState::Success).len(), 6);

    // Files land under the remote path on disk
    assert!(dir
        .path()
        .join("cluster/logs/0/translog")
        .join(&translog.generation_files(sealed[0].generation).unwrap().data_file_name)
        .exists());
}

#[tokio::test]
async fn test_second_pass_uploads_only_new_generations() {
    let store = InMemoryBlobStore::new();
    let service = Arc::new(BlobStoreTransferService::new(store.clone()));
    let tracker = Arc::new(FileTransferTracker::new("[logs][0]"));
    let uploader = TranslogUploader::new("[logs][0]", service, tracker, remote_path());

    let translog = translog_with_generations(2);
    let first = uploader.upload_sealed_generations_async(&translog).await.unwrap();
    assert_eq!(first.uploaded, 4);

    translog.add(&Operation::new(1_000, 1, "late")).unwrap();
    translog.roll_generation().unwrap();

    let second = uploader.upload_sealed_generations(&translog).await.unwrap();
    assert_eq!(second.uploaded, 2);
    assert_eq!(second.skipped, 4);
    assert_eq!(store.len(), 6);
}

#[tokio::test]
async fn test_async_upload_reports_to_custom_listener() {
    let service = BlobStoreTransferService::new(InMemoryBlobStore::new());
    let listener = Arc::new(CountingListener::default());

    let handles: Vec<_> = (0..4u64)
        .map(|generation| {
            let snapshot = TransferFileSnapshot::new(
                FileIdentity::new(format!("translog-{}.tlog", generation), 1, generation),
                Bytes::from(vec![generation as u8; 32]),
            );
            service.upload_file_async(snapshot, remote_path(), listener.clone())
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(listener.successes.load(Ordering::SeqCst), 4);
    assert_eq!(listener.failures.load(Ordering::SeqCst), 0);

    let names = service.list_files_by_prefix("translog-", &remote_path()).await.unwrap();
    assert_eq!(names.len(), 4);
}

#[tokio::test]
async fn test_read_missing_file_is_not_found() {
    let service = BlobStoreTransferService::new(InMemoryBlobStore::new());
    let err = service.read_file("translog-9.tlog", &remote_path()).await.unwrap_err();
    assert!(matches!(err, TransferError::NotFound(_)));
}

#[tokio::test]
async fn test_listing_ignores_other_paths() {
    let store = InMemoryBlobStore::new();
    store
        .put("cluster/logs/1/translog/translog-1.tlog", Bytes::from_static(b"x"))
        .await
        .unwrap();
    store
        .put("cluster/logs/0/translog/nested/translog-2.tlog", Bytes::from_static(b"x"))
        .await
        .unwrap();
    store
        .put("cluster/logs/0/translog/translog-3.tlog", Bytes::from_static(b"x"))
        .await
        .unwrap();

    let service = BlobStoreTransferService::new(store);
    let names = service.list_files_by_prefix("translog-", &remote_path()).await.unwrap();
    assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["translog-3.tlog"]);
}

#[tokio::test]
async fn test_deleted_generation_is_never_reuploaded() {
    let store = InMemoryBlobStore::new();
    let service = Arc::new(BlobStoreTransferService::new(store.clone()));
    let tracker = Arc::new(FileTransferTracker::new("[logs][0]"));
    let uploader = TranslogUploader::new("[logs][0]", service, tracker.clone(), remote_path());

    let translog = translog_with_generations(1);
    uploader.upload_sealed_generations(&translog).await.unwrap();

    let files = translog
        .generation_files(translog.sealed_generations()[0].generation)
        .unwrap();
    for name in [&files.data_file_name, &files.checkpoint_file_name] {
        let identity = FileIdentity::new(name.clone(), files.info.primary_term, files.info.generation)
            .with_created_at(files.info.last_modified_ms);
        store.delete(&remote_path().key(name)).await.unwrap();
        tracker.on_deleted(&identity).unwrap();
        assert!(tracker.on_deleted(&identity).is_err());
    }

    let again = uploader.upload_sealed_generations(&translog).await.unwrap();
    assert_eq!(again.uploaded, 0);
    assert_eq!(again.skipped, 2);
    assert!(store.is_empty());
}
