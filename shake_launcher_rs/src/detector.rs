//! Double-shake state machine.
//!
//! The detector is a pure function of the policy, the sample stream and its
//! own episode state. It never reads a clock: every decision is made from the
//! caller-supplied sample timestamps, which must be non-decreasing.
//! Samples that step backwards are dropped and counted.
//!
//! ```text
//!   Idle --shake--> FirstShakeSeen --shake in (min, max)--> FirstShakeSeen + confirmed
//!    ^                    |                                          |
//!    +---quiet, > max-----+------------ quiet, > max (UntilExpiry) --+
//! ```

use crate::policy::DetectionPolicy;
use crate::sensors::Sample;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Emitted once per observed sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShakeEvent {
    NoOp,
    FirstShakeRegistered,
    GestureConfirmed,
    EpisodeExpired,
}

impl ShakeEvent {
    /// Stable integer code for FFI callers.
    pub fn code(&self) -> i32 {
        match self {
            ShakeEvent::NoOp => 0,
            ShakeEvent::FirstShakeRegistered => 1,
            ShakeEvent::GestureConfirmed => 2,
            ShakeEvent::EpisodeExpired => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    FirstShakeSeen,
}

/// What happens to a confirmed episode once its window has passed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum LatchMode {
    /// Confirmation stays latched until [`ShakeDetector::reset`].
    #[default]
    UntilReset,
    /// A confirmed episode expires like any other after `max_episode_duration`.
    UntilExpiry,
}

/// Identifies one episode, for de-duplicating downstream side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeId(pub u64);

/// Detector-internal episode state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShakeEpisode {
    pub phase: Phase,
    pub first_shake_timestamp_ms: Option<u64>,
    pub confirmed: bool,
    pub id: Option<EpisodeId>,
}

impl ShakeEpisode {
    fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            first_shake_timestamp_ms: None,
            confirmed: false,
            id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorStats {
    pub samples_seen: u64,
    pub samples_rejected: u64,
    pub first_shakes: u64,
    pub confirmations: u64,
    pub expiries: u64,
}

pub struct ShakeDetector {
    episode: ShakeEpisode,
    latch: LatchMode,
    last_timestamp_ms: Option<u64>,
    next_episode: u64,
    stats: DetectorStats,
}

impl ShakeDetector {
    pub fn new(latch: LatchMode) -> Self {
        Self {
            episode: ShakeEpisode::idle(),
            latch,
            last_timestamp_ms: None,
            next_episode: 1,
            stats: DetectorStats::default(),
        }
    }

    pub fn episode(&self) -> ShakeEpisode {
        self.episode
    }

    pub fn phase(&self) -> Phase {
        self.episode.phase
    }

    pub fn is_confirmed(&self) -> bool {
        self.episode.confirmed
    }

    pub fn episode_id(&self) -> Option<EpisodeId> {
        self.episode.id
    }

    pub fn latch_mode(&self) -> LatchMode {
        self.latch
    }

    pub fn stats(&self) -> DetectorStats {
        self.stats
    }

    /// Fold one sample into the episode state.
    pub fn observe(&mut self, policy: &DetectionPolicy, sample: Sample) -> ShakeEvent {
        if let Some(last) = self.last_timestamp_ms {
            if sample.timestamp_ms < last {
                self.stats.samples_rejected += 1;
                log::debug!(
                    "[detector] dropping out-of-order sample t={} (last t={})",
                    sample.timestamp_ms,
                    last
                );
                return ShakeEvent::NoOp;
            }
        }
        self.last_timestamp_ms = Some(sample.timestamp_ms);
        self.stats.samples_seen += 1;

        // NaN magnitudes compare false and fall through as quiet samples
        if sample.magnitude > policy.shake_threshold() {
            self.on_shake(policy, sample)
        } else {
            self.on_quiet(policy, sample)
        }
    }

    /// Return to `Idle`, clearing the latch.
    pub fn reset(&mut self) {
        if self.episode.phase != Phase::Idle {
            log::info!("[detector] reset (episode {:?})", self.episode.id);
        }
        self.episode = ShakeEpisode::idle();
    }

    fn elapsed_since_first(&self, timestamp_ms: u64) -> Duration {
        let first = self.episode.first_shake_timestamp_ms.unwrap_or(timestamp_ms);
        Duration::from_millis(timestamp_ms.saturating_sub(first))
    }

    fn on_shake(&mut self, policy: &DetectionPolicy, sample: Sample) -> ShakeEvent {
        match self.episode.phase {
            Phase::Idle => {
                let id = EpisodeId(self.next_episode);
                self.next_episode += 1;
                self.episode = ShakeEpisode {
                    phase: Phase::FirstShakeSeen,
                    first_shake_timestamp_ms: Some(sample.timestamp_ms),
                    confirmed: false,
                    id: Some(id),
                };
                self.stats.first_shakes += 1;
                log::info!(
                    "[detector] first shake (episode {}, magnitude {:.2}, threshold {:.2})",
                    id.0,
                    sample.magnitude,
                    policy.shake_threshold()
                );
                ShakeEvent::FirstShakeRegistered
            }
            Phase::FirstShakeSeen if self.episode.confirmed => ShakeEvent::NoOp,
            Phase::FirstShakeSeen => {
                let elapsed = self.elapsed_since_first(sample.timestamp_ms);
                if elapsed > policy.min_inter_shake_delay()
                    && elapsed < policy.max_episode_duration()
                {
                    self.episode.confirmed = true;
                    self.stats.confirmations += 1;
                    log::info!(
                        "[detector] gesture confirmed (episode {:?}, {} ms after first shake)",
                        self.episode.id.map(|id| id.0),
                        elapsed.as_millis()
                    );
                    ShakeEvent::GestureConfirmed
                } else {
                    // Too fast (bounce) or too late: neither confirms nor re-arms
                    log::debug!(
                        "[detector] second shake outside window ({} ms)",
                        elapsed.as_millis()
                    );
                    ShakeEvent::NoOp
                }
            }
        }
    }

    fn on_quiet(&mut self, policy: &DetectionPolicy, sample: Sample) -> ShakeEvent {
        if self.episode.phase != Phase::FirstShakeSeen {
            return ShakeEvent::NoOp;
        }
        if self.episode.confirmed && self.latch == LatchMode::UntilReset {
            return ShakeEvent::NoOp;
        }
        if self.elapsed_since_first(sample.timestamp_ms) > policy.max_episode_duration() {
            log::info!(
                "[detector] episode {:?} expired (confirmed: {})",
                self.episode.id.map(|id| id.0),
                self.episode.confirmed
            );
            self.episode = ShakeEpisode::idle();
            self.stats.expiries += 1;
            return ShakeEvent::EpisodeExpired;
        }
        ShakeEvent::NoOp
    }
}

impl Default for ShakeDetector {
    fn default() -> Self {
        Self::new(LatchMode::default())
    }
}
