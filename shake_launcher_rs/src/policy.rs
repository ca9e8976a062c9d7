//! Detection thresholds shared between the detector and the settings surface.
//!
//! A [`DetectionPolicy`] is a small `Copy` value. Mutating setters keep the
//! ordering invariant `max_episode_duration >= min_inter_shake_delay` by
//! pushing the counterpart bound and report both bounds back. Sharing
//! goes through [`PolicyHandle`], which swaps the whole value at once so a
//! reader can never observe a half-applied update.

use std::time::Duration;
use tokio::sync::watch;

/// Lowest accepted shake threshold (m/s²).
pub const MIN_SHAKE_THRESHOLD: f64 = 0.1;

pub const DEFAULT_SHAKE_THRESHOLD: f64 = 15.0;
pub const DEFAULT_MIN_INTER_SHAKE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_EPISODE_DURATION: Duration = Duration::from_millis(2000);

/// Sensitivity presets: level 1 is the least sensitive.
pub const SENSITIVITY_LEVELS: u8 = 5;
const SENSITIVITY_BASE: f64 = 30.0;
const SENSITIVITY_STEP: f64 = 3.75;

/// Min-delay slider: 200 ms + step * 100 ms, steps 0..=8.
pub const MIN_DELAY_SLIDER_BASE_MS: u64 = 200;
pub const MIN_DELAY_SLIDER_STEP_MS: u64 = 100;
pub const MIN_DELAY_SLIDER_MAX_STEP: u64 = 8;

/// Max-duration slider: 500 ms + step * 500 ms, steps 0..=5.
pub const MAX_DURATION_SLIDER_BASE_MS: u64 = 500;
pub const MAX_DURATION_SLIDER_STEP_MS: u64 = 500;
pub const MAX_DURATION_SLIDER_MAX_STEP: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionPolicy {
    shake_threshold: f64,
    min_inter_shake_delay: Duration,
    max_episode_duration: Duration,
}

/// The timing pair after a mutation, for refreshing displayed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingBounds {
    pub min_inter_shake_delay: Duration,
    pub max_episode_duration: Duration,
}

impl DetectionPolicy {
    /// Build a policy, clamping inputs so the invariants hold.
    ///
    /// If `max_episode_duration` is shorter than `min_inter_shake_delay`, the
    /// maximum is raised to the minimum.
    pub fn new(
        shake_threshold: f64,
        min_inter_shake_delay: Duration,
        max_episode_duration: Duration,
    ) -> Self {
        let mut policy = Self::default();
        policy.set_threshold(shake_threshold);
        policy.min_inter_shake_delay = min_inter_shake_delay;
        policy.max_episode_duration = max_episode_duration.max(min_inter_shake_delay);
        policy
    }

    pub fn shake_threshold(&self) -> f64 {
        self.shake_threshold
    }

    pub fn min_inter_shake_delay(&self) -> Duration {
        self.min_inter_shake_delay
    }

    pub fn max_episode_duration(&self) -> Duration {
        self.max_episode_duration
    }

    pub fn timing(&self) -> TimingBounds {
        TimingBounds {
            min_inter_shake_delay: self.min_inter_shake_delay,
            max_episode_duration: self.max_episode_duration,
        }
    }

    /// Set the magnitude threshold. Non-finite input is ignored and values
    /// below [`MIN_SHAKE_THRESHOLD`] are raised to it. Returns the value in
    /// effect.
    pub fn set_threshold(&mut self, threshold: f64) -> f64 {
        if threshold.is_finite() {
            self.shake_threshold = threshold.max(MIN_SHAKE_THRESHOLD);
        }
        self.shake_threshold
    }

    /// Set the minimum delay between the two shakes. A delay longer than the
    /// current maximum pushes the maximum up.
    pub fn set_min_inter_shake_delay(&mut self, delay: Duration) -> TimingBounds {
        self.min_inter_shake_delay = delay;
        if self.max_episode_duration < delay {
            self.max_episode_duration = delay;
        }
        self.timing()
    }

    /// Set the episode length. A maximum shorter than the current minimum
    /// delay pulls the minimum down.
    pub fn set_max_episode_duration(&mut self, duration: Duration) -> TimingBounds {
        self.max_episode_duration = duration;
        if self.min_inter_shake_delay > duration {
            self.min_inter_shake_delay = duration;
        }
        self.timing()
    }

    /// Threshold for a sensitivity preset (1..=5). Out-of-range levels are
    /// clamped.
    pub fn threshold_for_sensitivity(level: u8) -> f64 {
        let level = level.clamp(1, SENSITIVITY_LEVELS);
        SENSITIVITY_BASE - f64::from(level - 1) * SENSITIVITY_STEP
    }

    pub fn set_sensitivity_level(&mut self, level: u8) -> f64 {
        self.set_threshold(Self::threshold_for_sensitivity(level))
    }

    /// Nearest sensitivity preset for the current threshold.
    pub fn sensitivity_level(&self) -> u8 {
        let raw = ((SENSITIVITY_BASE - self.shake_threshold) / SENSITIVITY_STEP).round() + 1.0;
        raw.clamp(1.0, f64::from(SENSITIVITY_LEVELS)) as u8
    }

    /// Slider position for the current minimum delay.
    pub fn min_delay_slider_step(&self) -> u64 {
        let ms = self.min_inter_shake_delay.as_millis() as u64;
        (ms.saturating_sub(MIN_DELAY_SLIDER_BASE_MS) / MIN_DELAY_SLIDER_STEP_MS)
            .min(MIN_DELAY_SLIDER_MAX_STEP)
    }

    /// Slider position for the current maximum duration.
    pub fn max_duration_slider_step(&self) -> u64 {
        let ms = self.max_episode_duration.as_millis() as u64;
        (ms.saturating_sub(MAX_DURATION_SLIDER_BASE_MS) / MAX_DURATION_SLIDER_STEP_MS)
            .min(MAX_DURATION_SLIDER_MAX_STEP)
    }

    pub fn min_delay_for_slider_step(step: u64) -> Duration {
        Duration::from_millis(
            MIN_DELAY_SLIDER_BASE_MS + step.min(MIN_DELAY_SLIDER_MAX_STEP) * MIN_DELAY_SLIDER_STEP_MS,
        )
    }

    pub fn max_duration_for_slider_step(step: u64) -> Duration {
        Duration::from_millis(
            MAX_DURATION_SLIDER_BASE_MS
                + step.min(MAX_DURATION_SLIDER_MAX_STEP) * MAX_DURATION_SLIDER_STEP_MS,
        )
    }
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            shake_threshold: DEFAULT_SHAKE_THRESHOLD,
            min_inter_shake_delay: DEFAULT_MIN_INTER_SHAKE_DELAY,
            max_episode_duration: DEFAULT_MAX_EPISODE_DURATION,
        }
    }
}

/// Writer side of the shared policy. Cheap to clone.
#[derive(Clone)]
pub struct PolicyHandle {
    tx: watch::Sender<DetectionPolicy>,
}

impl PolicyHandle {
    pub fn new(policy: DetectionPolicy) -> Self {
        let (tx, _rx) = watch::channel(policy);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<DetectionPolicy> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> DetectionPolicy {
        *self.tx.borrow()
    }

    /// Apply `f` to a copy of the current policy and publish the result as
    /// one value.
    pub fn update<R>(&self, f: impl FnOnce(&mut DetectionPolicy) -> R) -> R {
        let mut result = None;
        self.tx.send_modify(|policy| result = Some(f(policy)));
        match result {
            Some(r) => r,
            None => unreachable!("send_modify always runs the closure"),
        }
    }

    pub fn replace(&self, policy: DetectionPolicy) {
        self.tx.send_replace(policy);
    }
}
