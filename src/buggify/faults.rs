//! Fault identifiers
//!
//! Naming: `<subsystem>.<fault>`. Probabilities live in `FaultConfig`.

/// Local generation-file faults
pub mod disk {
    pub const WRITE_FAIL: &str = "disk.write_fail";
    pub const PARTIAL_WRITE: &str = "disk.partial_write";
    pub const FSYNC_FAIL: &str = "disk.fsync_fail";
    pub const CORRUPTION: &str = "disk.corruption";
    pub const DISK_FULL: &str = "disk.disk_full";
}

/// Remote blob store faults
pub mod blob_store {
    pub const PUT_FAIL: &str = "blob_store.put_fail";
    pub const GET_FAIL: &str = "blob_store.get_fail";
    pub const GET_CORRUPT: &str = "blob_store.get_corrupt";
    pub const TIMEOUT: &str = "blob_store.timeout";
    pub const DELETE_FAIL: &str = "blob_store.delete_fail";
    pub const LIST_INCOMPLETE: &str = "blob_store.list_incomplete";
}

/// Every known fault, for configuration presets
pub const ALL_FAULTS: &[&str] = &[
    disk::WRITE_FAIL,
    disk::PARTIAL_WRITE,
    disk::FSYNC_FAIL,
    disk::CORRUPTION,
    disk::DISK_FULL,
    blob_store::PUT_FAIL,
    blob_store::GET_FAIL,
    blob_store::GET_CORRUPT,
    blob_store::TIMEOUT,
    blob_store::DELETE_FAIL,
    blob_store::LIST_INCOMPLETE,
];
