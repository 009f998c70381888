//! Translog Configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// When appended operations become durable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Callers sync their write locations before acknowledging
    #[default]
    Request,
    /// A background actor syncs every `sync_interval`
    Async,
}

/// Which sealed generations are kept around after they stop being needed
/// for recovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Keep sealed generations while their combined size stays under this
    pub size_bytes: Option<u64>,
    /// Keep sealed generations younger than this
    #[serde(default, with = "option_duration_millis")]
    pub age: Option<Duration>,
    /// Keep at most this many files, counting the current generation
    pub total_files: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        RetentionConfig {
            size_bytes: None,
            age: None,
            total_files: 100,
        }
    }
}

impl RetentionConfig {
    /// Retain nothing beyond what recovery needs
    pub fn none() -> Self {
        RetentionConfig {
            size_bytes: None,
            age: None,
            total_files: 0,
        }
    }
}

/// Configuration for one shard's translog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslogConfig {
    /// Directory holding `translog-{gen}.tlog` / `.ckp` files
    pub translog_dir: PathBuf,
    /// Roll the generation once it grows past this many bytes (default: 64MB)
    pub generation_threshold_size: u64,
    pub durability: Durability,
    /// Background sync period under `Durability::Async` (default: 5s)
    #[serde(with = "duration_millis")]
    pub sync_interval: Duration,
    pub retention: RetentionConfig,
}

impl Default for TranslogConfig {
    fn default() -> Self {
        TranslogConfig {
            translog_dir: PathBuf::from("/tmp/shard-translog"),
            generation_threshold_size: 64 * 1024 * 1024, // 64MB
            durability: Durability::Request,
            sync_interval: Duration::from_secs(5),
            retention: RetentionConfig::default(),
        }
    }
}

impl TranslogConfig {
    /// Configuration for tests (tiny generations, fast sync)
    pub fn test() -> Self {
        TranslogConfig {
            translog_dir: PathBuf::from("/tmp/shard-translog-test"),
            generation_threshold_size: 4 * 1024, // 4KB for fast rolls in tests
            durability: Durability::Request,
            sync_interval: Duration::from_millis(20),
            retention: RetentionConfig::none(),
        }
    }

    /// Async-durability configuration rooted at `translog_dir`
    pub fn async_durability(translog_dir: PathBuf, sync_interval: Duration) -> Self {
        TranslogConfig {
            translog_dir,
            durability: Durability::Async,
            sync_interval,
            ..Default::default()
        }
    }
}

/// Serde helper for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Serde helper for Option<Duration> as milliseconds
mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
