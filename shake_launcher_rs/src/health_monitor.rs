use tokio::time::{Duration, Instant};

pub const DEFAULT_SILENCE_THRESHOLD: Duration = Duration::from_secs(5);

/// Tracks whether a sensor is still delivering samples.
#[derive(Clone, Debug)]
pub struct SensorHealth {
    pub name: String,
    started: Instant,
    last_update: Option<Instant>,
    silence_threshold: Duration,
    reported_silent: bool,
}

/// Snapshot of a sensor's health.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HealthReport {
    pub healthy: bool,
    pub silence_duration: Duration,
    pub ever_delivered: bool,
}

impl SensorHealth {
    pub fn new(name: &str, silence_threshold: Duration) -> Self {
        SensorHealth {
            name: name.to_string(),
            started: Instant::now(),
            last_update: None,
            silence_threshold,
            reported_silent: false,
        }
    }

    pub fn update(&mut self) {
        self.last_update = Some(Instant::now());
    }

    /// Time since the last sample, or since creation if none arrived yet.
    pub fn time_since_last_update(&self) -> Duration {
        self.last_update.unwrap_or(self.started).elapsed()
    }

    pub fn is_silent(&self) -> bool {
        self.time_since_last_update() > self.silence_threshold
    }

    pub fn check_health(&self) -> HealthReport {
        HealthReport {
            healthy: !self.is_silent(),
            silence_duration: self.time_since_last_update(),
            ever_delivered: self.last_update.is_some(),
        }
    }

    /// Check and log transitions between healthy and silent.
    pub fn check_and_log(&mut self) -> HealthReport {
        let report = self.check_health();
        if !report.healthy && !self.reported_silent {
            if report.ever_delivered {
                log::warn!(
                    "[health] {} SILENT for {:.1}s",
                    self.name,
                    report.silence_duration.as_secs_f64()
                );
            } else {
                log::warn!(
                    "[health] {} has not delivered any samples (unavailable or permission denied?)",
                    self.name
                );
            }
            self.reported_silent = true;
        } else if report.healthy && self.reported_silent {
            log::info!("[health] {} recovered", self.name);
            self.reported_silent = false;
        }
        report
    }

    pub fn format_status(&self) -> String {
        let report = self.check_health();
        if report.healthy {
            format!("{} ✓", self.name)
        } else {
            format!(
                "{} ⚠ (silent {:.1}s)",
                self.name,
                report.silence_duration.as_secs_f64()
            )
        }
    }
}
