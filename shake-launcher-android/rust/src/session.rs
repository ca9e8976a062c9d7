use crate::error::{JResult, JniBridgeError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shake_launcher_rs::dispatcher::DispatchConfig;
use shake_launcher_rs::live_status::LiveStatus;
use shake_launcher_rs::service::{ServiceConfig, ShakeService};
use shake_launcher_rs::{
    AccelData, DispatchDecision, LauncherSettings, Platform, PolicyHandle, ShakeEvent,
    TimingBounds,
};
use std::time::Duration;
use tokio::runtime::Runtime;

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Settings loaded, no detection
    Idle,
    /// Samples are being fed to the detector
    Running,
}

/// Snapshot returned by `getStatusJson`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub started_at: Option<String>,
    pub settings: LauncherSettings,
    pub sensitivity_level: u8,
    pub min_delay_slider_step: u64,
    pub max_duration_slider_step: u64,
    pub live: Option<LiveStatus>,
}

struct Running {
    runtime: Runtime,
    service: ShakeService,
    started_at: String,
}

/// Detection session behind the JNI surface.
pub struct LauncherSession {
    settings: LauncherSettings,
    policy: PolicyHandle,
    running: Option<Running>,
}

impl LauncherSession {
    pub fn new() -> Self {
        Self::with_settings(LauncherSettings::default())
    }

    pub fn with_settings(settings: LauncherSettings) -> Self {
        let settings = settings.normalized();
        Self {
            policy: PolicyHandle::new(settings.policy()),
            settings,
            running: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.running.is_some() {
            SessionState::Running
        } else {
            SessionState::Idle
        }
    }

    /// Idle → Running
    pub fn start(&mut self, platform: Platform) -> JResult<()> {
        if self.running.is_some() {
            return Err(JniBridgeError::AlreadyRunning);
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("shake-dispatch")
            .enable_time()
            .build()
            .map_err(|e| JniBridgeError::Internal(format!("runtime: {}", e)))?;

        let config = ServiceConfig {
            detection_enabled: self.settings.detection_enabled,
            reset_after_launch: true,
            ..ServiceConfig::default()
        };
        let dispatch = DispatchConfig {
            enabled: self.settings.shake_to_launch_enabled,
            ..DispatchConfig::default()
        };
        let service = ShakeService::new(
            config,
            self.policy.subscribe(),
            dispatch,
            platform,
            runtime.handle().clone(),
        );

        self.running = Some(Running {
            runtime,
            service,
            started_at: Utc::now().to_rfc3339(),
        });
        log::info!("[session] detection started");
        Ok(())
    }

    /// Running → Idle. Cancels any pending launch.
    pub fn stop(&mut self) -> JResult<()> {
        let Some(mut running) = self.running.take() else {
            return Err(JniBridgeError::NotRunning);
        };
        running.service.shutdown();
        drop(running.service);
        running.runtime.shutdown_background();
        log::info!("[session] detection stopped");
        Ok(())
    }

    /// Feed one reading. Samples arriving while idle are ignored.
    pub fn push_sample(&mut self, reading: AccelData) -> ShakeEvent {
        match self.running.as_mut() {
            Some(running) => running.service.handle_sample(&reading),
            None => ShakeEvent::NoOp,
        }
    }

    pub fn reset(&mut self) -> JResult<()> {
        let running = self.running.as_mut().ok_or(JniBridgeError::NotRunning)?;
        running.service.reset();
        Ok(())
    }

    pub fn launch_now(&mut self) -> JResult<DispatchDecision> {
        let running = self.running.as_mut().ok_or(JniBridgeError::NotRunning)?;
        Ok(running.service.launch_now())
    }

    pub fn set_threshold(&mut self, threshold: f64) -> f64 {
        let applied = self.policy.update(|p| p.set_threshold(threshold));
        self.sync_policy();
        applied
    }

    pub fn set_sensitivity_level(&mut self, level: i32) -> f64 {
        let level = level.clamp(1, i32::from(u8::MAX)) as u8;
        let applied = self.policy.update(|p| p.set_sensitivity_level(level));
        self.sync_policy();
        applied
    }

    pub fn set_min_inter_shake_delay(&mut self, delay_ms: i64) -> TimingBounds {
        let delay = Duration::from_millis(delay_ms.max(0) as u64);
        let bounds = self.policy.update(|p| p.set_min_inter_shake_delay(delay));
        self.sync_policy();
        bounds
    }

    pub fn set_max_episode_duration(&mut self, duration_ms: i64) -> TimingBounds {
        let duration = Duration::from_millis(duration_ms.max(0) as u64);
        let bounds = self.policy.update(|p| p.set_max_episode_duration(duration));
        self.sync_policy();
        bounds
    }

    pub fn set_dispatch_enabled(&mut self, enabled: bool) {
        self.settings.shake_to_launch_enabled = enabled;
        if let Some(running) = self.running.as_mut() {
            running.service.set_dispatch_enabled(enabled);
        }
    }

    pub fn set_detection_enabled(&mut self, enabled: bool) {
        self.settings.detection_enabled = enabled;
        if let Some(running) = self.running.as_mut() {
            running.service.set_detection_enabled(enabled);
        }
    }

    pub fn settings(&self) -> &LauncherSettings {
        &self.settings
    }

    pub fn settings_json(&self) -> JResult<String> {
        Ok(self.settings.to_json()?)
    }

    /// Replace all settings from a persisted document.
    pub fn apply_settings_json(&mut self, json: &str) -> JResult<()> {
        let settings = LauncherSettings::from_json(json)?;
        self.policy.replace(settings.policy());
        self.set_detection_enabled(settings.detection_enabled);
        self.set_dispatch_enabled(settings.shake_to_launch_enabled);
        self.settings = settings;
        Ok(())
    }

    pub fn status(&mut self) -> SessionStatus {
        let policy = self.policy.current();
        let (started_at, live) = match self.running.as_mut() {
            Some(running) => (
                Some(running.started_at.clone()),
                Some(running.service.status()),
            ),
            None => (None, None),
        };
        SessionStatus {
            state: self.state(),
            started_at,
            settings: self.settings.clone(),
            sensitivity_level: policy.sensitivity_level(),
            min_delay_slider_step: policy.min_delay_slider_step(),
            max_duration_slider_step: policy.max_duration_slider_step(),
            live,
        }
    }

    pub fn status_json(&mut self) -> JResult<String> {
        serde_json::to_string(&self.status())
            .map_err(|e| JniBridgeError::Internal(format!("status encode: {}", e)))
    }

    fn sync_policy(&mut self) {
        self.settings.set_policy(&self.policy.current());
    }
}

impl Default for LauncherSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LauncherSession {
    fn drop(&mut self) {
        if self.running.is_some() {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shake_launcher_rs::platform::LoggingPlatform;
    use std::sync::Arc;

    fn platform() -> Platform {
        Platform::from_shared(Arc::new(LoggingPlatform))
    }

    fn shake(t: u64) -> AccelData {
        AccelData::new(20.0, 0.0, 9.81, t)
    }

    #[test]
    fn test_session_state_transitions() {
        let mut session = LauncherSession::new();
        assert_eq!(session.state(), SessionState::Idle);

        session.start(platform()).unwrap();
        assert_eq!(session.state(), SessionState::Running);
        assert!(matches!(
            session.start(platform()),
            Err(JniBridgeError::AlreadyRunning)
        ));

        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(matches!(session.stop(), Err(JniBridgeError::NotRunning)));
    }

    #[test]
    fn test_samples_ignored_while_idle() {
        let mut session = LauncherSession::new();
        assert_eq!(session.push_sample(shake(0)), ShakeEvent::NoOp);
        assert!(matches!(session.reset(), Err(JniBridgeError::NotRunning)));
        assert!(session.status().live.is_none());
    }

    #[test]
    fn test_double_shake_through_session() {
        let mut session = LauncherSession::new();
        session.start(platform()).unwrap();

        assert_eq!(
            session.push_sample(shake(0)),
            ShakeEvent::FirstShakeRegistered
        );
        assert_eq!(
            session.push_sample(AccelData::new(0.0, 0.0, 9.81, 300)),
            ShakeEvent::NoOp
        );
        assert_eq!(session.push_sample(shake(800)), ShakeEvent::GestureConfirmed);

        let status = session.status();
        let live = status.live.unwrap();
        assert_eq!(live.confirmations, 1);
        assert_eq!(live.dispatches_scheduled, 1);
        session.stop().unwrap();
    }

    #[test]
    fn test_policy_setters_keep_settings_in_sync() {
        let mut session = LauncherSession::new();

        let bounds = session.set_min_inter_shake_delay(2500);
        assert_eq!(bounds.max_episode_duration, Duration::from_millis(2500));
        assert_eq!(session.settings().shake_time_max, 2500);

        let bounds = session.set_max_episode_duration(300);
        assert_eq!(bounds.min_inter_shake_delay, Duration::from_millis(300));
        assert_eq!(session.settings().shake_time_window, 300);

        assert_eq!(session.set_sensitivity_level(1), 30.0);
        assert_eq!(session.settings().shake_threshold, 30.0);
        assert!(session.set_threshold(-4.0) > 0.0);
    }

    #[test]
    fn test_apply_settings_json() {
        let mut session = LauncherSession::new();
        session
            .apply_settings_json(r#"{"shakeThreshold": 22.5, "detectionEnabled": false}"#)
            .unwrap();
        assert_eq!(session.settings().shake_threshold, 22.5);
        assert!(!session.settings().detection_enabled);

        session.start(platform()).unwrap();
        assert_eq!(session.push_sample(shake(0)), ShakeEvent::NoOp);

        assert!(matches!(
            session.apply_settings_json("{oops"),
            Err(JniBridgeError::Launcher(_))
        ));
    }

    #[test]
    fn test_status_json_shape() {
        let mut session = LauncherSession::new();
        let json = session.status_json().unwrap();
        assert!(json.contains("\"state\":\"idle\""));
        assert!(json.contains("\"shakeThreshold\""));
    }
}
