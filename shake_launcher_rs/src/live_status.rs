use crate::detector::{LatchMode, Phase};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Snapshot written by the service on each heartbeat and at shutdown.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub uptime_seconds: u64,
    // Detector
    pub phase: Phase,
    pub confirmed: bool,
    pub episode: Option<u64>,
    pub latch_mode: LatchMode,
    pub samples_seen: u64,
    pub samples_rejected: u64,
    pub samples_dropped_disabled: u64,
    pub first_shakes: u64,
    pub confirmations: u64,
    pub expiries: u64,
    pub last_magnitude: f64,
    // Policy
    pub shake_threshold: f64,
    pub min_inter_shake_delay_ms: u64,
    pub max_episode_duration_ms: u64,
    pub sensitivity_level: u8,
    // Switches
    pub detection_enabled: bool,
    pub dispatch_enabled: bool,
    // Dispatch
    pub dispatches_scheduled: u64,
    pub dispatches_completed: u64,
    pub dispatches_failed: u64,
    pub dispatch_in_flight: bool,
    // Health monitoring
    pub accel_healthy: bool,
    pub accel_silence_duration_secs: f64,
}

impl LiveStatus {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = self.to_json()?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
