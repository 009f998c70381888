//! S3 Blob Store
//!
//! Production blob store on AWS S3 or an S3-compatible service (MinIO,
//! LocalStack), through the `object_store` crate.

use crate::transfer::blob_store::{BlobFuture, BlobMeta, BlobStore};
use crate::transfer::config::S3Config;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore as ObjectStoreTrait;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::sync::Arc;

#[derive(Clone)]
pub struct S3BlobStore {
    store: Arc<dyn ObjectStoreTrait>,
    prefix: String,
}

impl S3BlobStore {
    /// Credentials come from `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`
    pub fn new(config: S3Config) -> IoResult<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_access_key_id(std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_default())
            .with_secret_access_key(std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default());

        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder.build().map_err(|e| {
            IoError::new(
                ErrorKind::InvalidInput,
                format!("failed to create S3 store: {}", e),
            )
        })?;

        Ok(S3BlobStore {
            store: Arc::new(store),
            prefix: config.prefix,
        })
    }

    /// Wrap an existing `object_store` (e.g. `object_store::memory::InMemory`)
    pub fn from_store(store: Arc<dyn ObjectStoreTrait>, prefix: String) -> Self {
        S3BlobStore { store, prefix }
    }

    fn full_path(&self, key: &str) -> ObjectPath {
        ObjectPath::from(prefixed(&self.prefix, key))
    }

    fn strip_prefix(&self, path: &ObjectPath) -> String {
        let path = path.to_string();
        if self.prefix.is_empty() {
            return path;
        }
        let with_slash = format!("{}/", self.prefix);
        path.strip_prefix(&with_slash).unwrap_or(&path).to_string()
    }

    fn map_error(err: object_store::Error) -> IoError {
        match &err {
            object_store::Error::NotFound { .. } => IoError::new(ErrorKind::NotFound, err.to_string()),
            object_store::Error::AlreadyExists { .. } => {
                IoError::new(ErrorKind::AlreadyExists, err.to_string())
            }
            object_store::Error::Precondition { .. } => {
                IoError::new(ErrorKind::InvalidInput, err.to_string())
            }
            _ => IoError::new(ErrorKind::Other, err.to_string()),
        }
    }
}

fn prefixed(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}

impl std::fmt::Debug for S3BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BlobStore")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl BlobStore for S3BlobStore {
    fn put<'a>(&'a self, key: &'a str, data: Bytes) -> BlobFuture<'a, ()> {
        Box::pin(async move {
            self.store
                .put(&self.full_path(key), data.into())
                .await
                .map_err(Self::map_error)?;
            Ok(())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> BlobFuture<'a, Bytes> {
        Box::pin(async move {
            let result = self
                .store
                .get(&self.full_path(key))
                .await
                .map_err(Self::map_error)?;
            result.bytes().await.map_err(Self::map_error)
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> BlobFuture<'a, bool> {
        Box::pin(async move {
            match self.store.head(&self.full_path(key)).await {
                Ok(_) => Ok(true),
                Err(object_store::Error::NotFound { .. }) => Ok(false),
                Err(e) => Err(Self::map_error(e)),
            }
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BlobFuture<'a, ()> {
        Box::pin(async move {
            match self.store.delete(&self.full_path(key)).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
                Err(e) => Err(Self::map_error(e)),
            }
        })
    }

    fn list<'a>(&'a self, prefix: &'a str) -> BlobFuture<'a, Vec<BlobMeta>> {
        Box::pin(async move {
            // object_store lists by path segment, so list the parent
            // directory and filter on the full key prefix.
            let full_prefix = prefixed(&self.prefix, prefix);
            let dir = full_prefix
                .rfind('/')
                .map(|pos| ObjectPath::from(&full_prefix[..pos]));

            let metas: Vec<_> = self
                .store
                .list(dir.as_ref())
                .try_collect()
                .await
                .map_err(Self::map_error)?;

            let mut blobs: Vec<BlobMeta> = metas
                .into_iter()
                .filter(|meta| meta.location.as_ref().starts_with(&full_prefix))
                .map(|meta| BlobMeta {
                    key: self.strip_prefix(&meta.location),
                    size_bytes: meta.size as u64,
                })
                .collect();
            blobs.sort_by(|a, b| a.key.cmp(&b.key));
            Ok(blobs)
        })
    }
}
