//! Long-running detection service.
//!
//! Owns the detector and the dispatcher and folds three inputs into them:
//! accelerometer readings, control commands and dispatch reports. The policy
//! is read from a `watch` channel once per sample, so a concurrent update is
//! seen either entirely or not at all.

use crate::detector::{EpisodeId, LatchMode, ShakeDetector, ShakeEvent};
use crate::dispatcher::{
    DispatchConfig, DispatchDecision, DispatchReport, DispatchResult, DispatchTrigger,
    GestureDispatcher,
};
use crate::health_monitor::{SensorHealth, DEFAULT_SILENCE_THRESHOLD};
use crate::live_status::{current_timestamp, LiveStatus};
use crate::platform::Platform;
use crate::policy::DetectionPolicy;
use crate::sensors::{AccelData, SampleFilter};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub detection_enabled: bool,
    pub latch: LatchMode,
    /// Reset the detector once a gesture launch has completed.
    pub reset_after_launch: bool,
    pub heartbeat_interval: Duration,
    pub silence_threshold: Duration,
    /// Directory for `live_status.json`.
    pub status_dir: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            detection_enabled: true,
            latch: LatchMode::default(),
            reset_after_launch: false,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            silence_threshold: DEFAULT_SILENCE_THRESHOLD,
            status_dir: None,
        }
    }
}

/// Published to observers for every non-`NoOp` detector event and every
/// finished launch sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServiceEvent {
    Shake {
        event: ShakeEvent,
        episode: Option<EpisodeId>,
        timestamp_ms: u64,
        magnitude: f64,
        dispatch: Option<DispatchDecision>,
    },
    Dispatch(DispatchReport),
}

#[derive(Debug)]
pub enum ServiceCommand {
    Reset,
    LaunchNow,
    SetDetectionEnabled(bool),
    SetDispatchEnabled(bool),
    Status(oneshot::Sender<LiveStatus>),
    Shutdown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub samples_dropped_disabled: u64,
    pub dispatches_completed: u64,
    pub dispatches_failed: u64,
}

pub struct ShakeService {
    config: ServiceConfig,
    detector: ShakeDetector,
    policy: watch::Receiver<DetectionPolicy>,
    dispatcher: GestureDispatcher,
    reports: Option<mpsc::UnboundedReceiver<DispatchReport>>,
    events: broadcast::Sender<ServiceEvent>,
    health: SensorHealth,
    stats: ServiceStats,
    last_magnitude: f64,
    started: Instant,
}

impl ShakeService {
    pub fn new(
        config: ServiceConfig,
        policy: watch::Receiver<DetectionPolicy>,
        dispatch: DispatchConfig,
        platform: Platform,
        runtime: Handle,
    ) -> Self {
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let dispatcher = GestureDispatcher::new(dispatch, platform, runtime).with_reports(report_tx);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let health = SensorHealth::new("Accelerometer", config.silence_threshold);

        Self {
            detector: ShakeDetector::new(config.latch),
            config,
            policy,
            dispatcher,
            reports: Some(report_rx),
            events,
            health,
            stats: ServiceStats::default(),
            last_magnitude: 0.0,
            started: Instant::now(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.events.subscribe()
    }

    pub fn detector(&self) -> &ShakeDetector {
        &self.detector
    }

    pub fn dispatcher(&self) -> &GestureDispatcher {
        &self.dispatcher
    }

    pub fn stats(&self) -> ServiceStats {
        self.stats
    }

    pub fn policy(&self) -> DetectionPolicy {
        *self.policy.borrow()
    }

    pub fn detection_enabled(&self) -> bool {
        self.config.detection_enabled
    }

    pub fn set_detection_enabled(&mut self, enabled: bool) {
        if self.config.detection_enabled == enabled {
            return;
        }
        log::info!(
            "[service] detection {}",
            if enabled { "enabled" } else { "disabled" }
        );
        self.config.detection_enabled = enabled;
        if !enabled {
            // A half-finished episode must not confirm after re-enabling
            self.reset();
        }
    }

    pub fn set_dispatch_enabled(&mut self, enabled: bool) {
        self.dispatcher.set_enabled(enabled);
    }

    /// Filter, detect and dispatch one reading. Returns the detector event.
    pub fn handle_sample(&mut self, reading: &AccelData) -> ShakeEvent {
        self.drain_reports();
        self.health.update();

        if !self.config.detection_enabled {
            self.stats.samples_dropped_disabled += 1;
            return ShakeEvent::NoOp;
        }

        let sample = SampleFilter::apply(reading);
        self.last_magnitude = sample.magnitude;
        let policy = *self.policy.borrow();
        let event = self.detector.observe(&policy, sample);

        let dispatch = match event {
            ShakeEvent::NoOp => return event,
            ShakeEvent::FirstShakeRegistered => {
                self.dispatcher.on_episode_started();
                None
            }
            ShakeEvent::EpisodeExpired => {
                self.dispatcher.on_episode_reset();
                None
            }
            ShakeEvent::GestureConfirmed => self
                .detector
                .episode_id()
                .map(|id| self.dispatcher.on_gesture_confirmed(id)),
        };

        let episode = match event {
            ShakeEvent::EpisodeExpired => None,
            _ => self.detector.episode_id(),
        };
        self.publish(ServiceEvent::Shake {
            event,
            episode,
            timestamp_ms: sample.timestamp_ms,
            magnitude: sample.magnitude,
            dispatch,
        });
        event
    }

    /// Record a finished launch sequence and pass it on to observers.
    ///
    /// With `reset_after_launch`, the sequence of the current episode re-arms
    /// the detector whether or not the launch succeeded. Reports for older
    /// episodes and manual launches leave the detector alone.
    pub fn handle_report(&mut self, report: DispatchReport) {
        match &report.result {
            DispatchResult::Failed { reason } => {
                self.stats.dispatches_failed += 1;
                log::warn!("[service] dispatch failed: {}", reason);
            }
            result => {
                self.stats.dispatches_completed += 1;
                log::info!("[service] dispatch finished: {:?}", result);
            }
        }
        let current_episode = report.trigger == DispatchTrigger::Gesture
            && report.episode.is_some()
            && report.episode == self.detector.episode_id();
        if self.config.reset_after_launch && current_episode {
            self.reset();
        }
        self.publish(ServiceEvent::Dispatch(report));
    }

    /// Apply one command. Returns false when the service should stop.
    pub fn handle_command(&mut self, command: ServiceCommand) -> bool {
        match command {
            ServiceCommand::Reset => self.reset(),
            ServiceCommand::LaunchNow => {
                let decision = self.launch_now();
                log::info!("[service] manual launch: {:?}", decision);
            }
            ServiceCommand::SetDetectionEnabled(enabled) => self.set_detection_enabled(enabled),
            ServiceCommand::SetDispatchEnabled(enabled) => self.set_dispatch_enabled(enabled),
            ServiceCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
            ServiceCommand::Shutdown => return false,
        }
        true
    }

    /// Return the detector to `Idle` and re-arm dispatch.
    pub fn reset(&mut self) {
        self.detector.reset();
        self.dispatcher.on_episode_reset();
    }

    pub fn launch_now(&mut self) -> DispatchDecision {
        self.dispatcher.launch_now()
    }

    pub fn status(&mut self) -> LiveStatus {
        self.drain_reports();
        let policy = *self.policy.borrow();
        let detector = self.detector.stats();
        let episode = self.detector.episode();
        let dispatch = self.dispatcher.stats();
        let health = self.health.check_health();

        LiveStatus {
            timestamp: current_timestamp(),
            uptime_seconds: self.started.elapsed().as_secs(),
            phase: episode.phase,
            confirmed: episode.confirmed,
            episode: episode.id.map(|id| id.0),
            latch_mode: self.detector.latch_mode(),
            samples_seen: detector.samples_seen,
            samples_rejected: detector.samples_rejected,
            samples_dropped_disabled: self.stats.samples_dropped_disabled,
            first_shakes: detector.first_shakes,
            confirmations: detector.confirmations,
            expiries: detector.expiries,
            last_magnitude: self.last_magnitude,
            shake_threshold: policy.shake_threshold(),
            min_inter_shake_delay_ms: policy.min_inter_shake_delay().as_millis() as u64,
            max_episode_duration_ms: policy.max_episode_duration().as_millis() as u64,
            sensitivity_level: policy.sensitivity_level(),
            detection_enabled: self.config.detection_enabled,
            dispatch_enabled: self.dispatcher.is_enabled(),
            dispatches_scheduled: dispatch.scheduled,
            dispatches_completed: self.stats.dispatches_completed,
            dispatches_failed: self.stats.dispatches_failed,
            dispatch_in_flight: self.dispatcher.is_in_flight(),
            accel_healthy: health.healthy,
            accel_silence_duration_secs: health.silence_duration.as_secs_f64(),
        }
    }

    /// Periodic state log plus the sensor watchdog and status file.
    pub fn heartbeat(&mut self) {
        self.health.check_and_log();
        let stats = self.detector.stats();
        log::info!(
            "[service] heartbeat: detection {}, phase {:?}, samples {} ({} rejected), confirmations {}, {}",
            if self.config.detection_enabled { "on" } else { "off" },
            self.detector.phase(),
            stats.samples_seen,
            stats.samples_rejected,
            stats.confirmations,
            self.health.format_status()
        );
        self.write_status();
    }

    /// Consume the service, running until the sample stream ends or a
    /// `Shutdown` command arrives. Returns the final status.
    pub async fn run(
        mut self,
        mut samples: mpsc::Receiver<AccelData>,
        mut commands: mpsc::Receiver<ServiceCommand>,
    ) -> LiveStatus {
        let mut reports = self.reports.take();
        let mut heartbeat = interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        heartbeat.tick().await;

        log::info!("[service] started");
        loop {
            tokio::select! {
                reading = samples.recv() => match reading {
                    Some(reading) => {
                        self.handle_sample(&reading);
                    }
                    None => {
                        log::info!("[service] sample stream closed");
                        break;
                    }
                },
                Some(command) = commands.recv() => {
                    if !self.handle_command(command) {
                        log::info!("[service] shutdown requested");
                        break;
                    }
                }
                Some(report) = next_report(&mut reports) => self.handle_report(report),
                _ = heartbeat.tick() => self.heartbeat(),
            }
        }

        self.reports = reports;
        self.shutdown()
    }

    /// Cancel any pending launch and write the final status.
    pub fn shutdown(&mut self) -> LiveStatus {
        if self.dispatcher.cancel() {
            log::info!("[service] pending launch cancelled at shutdown");
        }
        let status = self.status();
        self.write_status_snapshot(&status);
        log::info!(
            "[service] stopped after {} samples, {} confirmations",
            status.samples_seen,
            status.confirmations
        );
        status
    }

    fn drain_reports(&mut self) {
        let mut drained = Vec::new();
        if let Some(rx) = self.reports.as_mut() {
            while let Ok(report) = rx.try_recv() {
                drained.push(report);
            }
        }
        for report in drained {
            self.handle_report(report);
        }
    }

    fn publish(&self, event: ServiceEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn write_status(&mut self) {
        if self.config.status_dir.is_none() {
            return;
        }
        let status = self.status();
        self.write_status_snapshot(&status);
    }

    fn write_status_snapshot(&self, status: &LiveStatus) {
        let Some(dir) = &self.config.status_dir else {
            return;
        };
        if let Err(e) = std::fs::create_dir_all(dir) {
            log::warn!("[service] cannot create {}: {}", dir.display(), e);
            return;
        }
        let path = dir.join("live_status.json");
        if let Err(e) = status.save(&path) {
            log::warn!("[service] failed to write {}: {}", path.display(), e);
        }
    }
}

async fn next_report(
    reports: &mut Option<mpsc::UnboundedReceiver<DispatchReport>>,
) -> Option<DispatchReport> {
    match reports {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
