//! Fault probability configuration

use super::faults::{blob_store, disk, ALL_FAULTS};
use std::collections::HashMap;

/// Per-fault probabilities plus a global switch
#[derive(Debug, Clone)]
pub struct FaultConfig {
    /// Master switch; when false nothing triggers
    pub enabled: bool,
    /// Multiplier applied to every configured probability
    pub global_multiplier: f64,
    probabilities: HashMap<String, f64>,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultConfig {
    /// Enabled, with no per-fault probabilities (only explicit overrides fire)
    pub fn new() -> Self {
        FaultConfig {
            enabled: true,
            global_multiplier: 1.0,
            probabilities: HashMap::new(),
        }
    }

    /// Nothing ever triggers
    pub fn disabled() -> Self {
        FaultConfig {
            enabled: false,
            ..Self::new()
        }
    }

    /// Roughly 1% for every known fault
    pub fn moderate() -> Self {
        let mut config = Self::new();
        for fault in ALL_FAULTS {
            config.set(fault, 0.01);
        }
        config
    }

    /// Aggressive disk faults, moderate remote faults
    pub fn chaos() -> Self {
        let mut config = Self::moderate();
        config.set(disk::WRITE_FAIL, 0.05);
        config.set(disk::FSYNC_FAIL, 0.05);
        config.set(disk::PARTIAL_WRITE, 0.02);
        config.set(blob_store::PUT_FAIL, 0.05);
        config.set(blob_store::TIMEOUT, 0.02);
        config
    }

    /// Set a single fault probability
    pub fn set(&mut self, fault_id: &str, probability: f64) -> &mut Self {
        self.probabilities
            .insert(fault_id.to_string(), probability.clamp(0.0, 1.0));
        self
    }

    /// Effective probability for a fault (0.0 when unknown or disabled)
    pub fn get(&self, fault_id: &str) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        let base = self.probabilities.get(fault_id).copied().unwrap_or(0.0);
        (base * self.global_multiplier).clamp(0.0, 1.0)
    }
}
