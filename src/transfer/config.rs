//! Transfer Configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which blob store backs the transfer service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlobStoreType {
    /// In-memory store (for tests)
    #[default]
    InMemory,
    /// Local filesystem
    LocalFs,
    /// Amazon S3 or compatible
    #[cfg(feature = "s3")]
    S3,
}

/// S3 configuration
#[cfg(feature = "s3")]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    /// Key prefix within the bucket
    #[serde(default)]
    pub prefix: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack)
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Where translog files are uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub store_type: BlobStoreType,
    /// Root directory for `LocalFs`
    pub local_path: Option<PathBuf>,
    /// Path segments prepended to every remote key, joined with `/`
    pub remote_base_path: Vec<String>,
    #[cfg(feature = "s3")]
    pub s3: Option<S3Config>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            store_type: BlobStoreType::InMemory,
            local_path: None,
            remote_base_path: vec!["translog".to_string()],
            #[cfg(feature = "s3")]
            s3: None,
        }
    }
}

impl TransferConfig {
    /// Local filesystem store rooted at `path`
    pub fn local(path: PathBuf) -> Self {
        TransferConfig {
            store_type: BlobStoreType::LocalFs,
            local_path: Some(path),
            ..Default::default()
        }
    }

    /// In-memory store under a `test` base path
    pub fn test() -> Self {
        TransferConfig {
            remote_base_path: vec!["test".to_string()],
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.remote_base_path.iter().any(|s| s.is_empty() || s.contains('/')) {
            return Err(format!(
                "remote_base_path segments must be non-empty and contain no '/': {:?}",
                self.remote_base_path
            ));
        }
        match self.store_type {
            BlobStoreType::LocalFs if self.local_path.is_none() => {
                Err("local_path is required for the local_fs blob store".to_string())
            }
            #[cfg(feature = "s3")]
            BlobStoreType::S3 if self.s3.is_none() => {
                Err("s3 settings are required for the s3 blob store".to_string())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_in_memory() {
        let config = TransferConfig::default();
        assert_eq!(config.store_type, BlobStoreType::InMemory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_local_requires_path() {
        let mut config = TransferConfig::local(PathBuf::from("/data/remote"));
        assert!(config.validate().is_ok());
        config.local_path = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_segments() {
        let mut config = TransferConfig::test();
        config.remote_base_path = vec!["a/b".into()];
        assert!(config.validate().is_err());
        config.remote_base_path = vec![String::new()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = TransferConfig::local(PathBuf::from("/data/remote"));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"local_fs\""));
        let parsed: TransferConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
