//! Turns a confirmed gesture into exactly one wake → foreground → launch
//! sequence.
//!
//! The whole sequence runs as a task on the tokio runtime, so confirming a
//! gesture returns immediately. Platform calls may block (shell tools, JNI
//! upcalls) and go through `spawn_blocking`. The launch step waits
//! `launch_delay` to let the display settle, and launch steps never overlap:
//! a gesture confirmed during a manual launch runs its own launch step once
//! the manual one ends. Gesture and manual launches are tracked separately;
//! a new episode only cancels the gesture launch. Every platform failure is
//! logged and, when the user should know, surfaced as a notice. Nothing
//! propagates back into the detection loop.

use crate::detector::EpisodeId;
use crate::error::{LauncherError, LauncherResult};
use crate::platform::{LaunchOutcome, Platform};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub const DEFAULT_TARGET_PACKAGE: &str = "org.xcontest.XCTrack";
pub const DEFAULT_INSTALL_URL: &str = "market://details?id=org.xcontest.XCTrack";
pub const DEFAULT_WAKE_HOLD: Duration = Duration::from_secs(5);
pub const DEFAULT_LAUNCH_DELAY: Duration = Duration::from_millis(1000);

/// Exponential backoff for the launch step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub factor: f64,
}

impl RetryPolicy {
    /// Wait before the next attempt, after `failed_attempts` failures.
    pub fn backoff_for(&self, failed_attempts: u32) -> Duration {
        let exp = failed_attempts.saturating_sub(1) as i32;
        let secs = self.base_backoff.as_secs_f64() * self.factor.powi(exp);
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(2),
            factor: 1.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// When false, confirmations produce no external effect.
    pub enabled: bool,
    pub target_package: String,
    pub install_url: String,
    pub wake_hold: Duration,
    pub launch_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_package: DEFAULT_TARGET_PACKAGE.to_string(),
            install_url: DEFAULT_INSTALL_URL.to_string(),
            wake_hold: DEFAULT_WAKE_HOLD,
            launch_delay: DEFAULT_LAUNCH_DELAY,
            retry: RetryPolicy::default(),
        }
    }
}

/// Immediate answer to a dispatch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchDecision {
    Scheduled,
    Disabled,
    Duplicate,
    /// Manual launch refused: a launch is already running.
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchTrigger {
    Gesture,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchResult {
    Launched,
    BroughtToFront,
    InstallSourceOpened,
    Failed { reason: String },
}

/// Final outcome of one launch sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub episode: Option<EpisodeId>,
    pub trigger: DispatchTrigger,
    pub result: DispatchResult,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    pub scheduled: u64,
    pub duplicates: u64,
    pub disabled: u64,
    pub cancelled: u64,
}

/// Everything a launch task needs, detached from the dispatcher.
struct LaunchJob {
    platform: Platform,
    package: String,
    install_url: String,
    retry: RetryPolicy,
    reports: Option<UnboundedSender<DispatchReport>>,
    launch_lock: Arc<Mutex<()>>,
}

pub struct GestureDispatcher {
    config: DispatchConfig,
    platform: Platform,
    runtime: Handle,
    reports: Option<UnboundedSender<DispatchReport>>,
    dispatched: Option<EpisodeId>,
    launch_lock: Arc<Mutex<()>>,
    gesture: Option<JoinHandle<()>>,
    manual: Option<JoinHandle<()>>,
    stats: DispatchStats,
}

impl GestureDispatcher {
    pub fn new(config: DispatchConfig, platform: Platform, runtime: Handle) -> Self {
        Self {
            config,
            platform,
            runtime,
            reports: None,
            dispatched: None,
            launch_lock: Arc::new(Mutex::new(())),
            gesture: None,
            manual: None,
            stats: DispatchStats::default(),
        }
    }

    /// Deliver a [`DispatchReport`] on `tx` when each launch sequence ends.
    pub fn with_reports(mut self, tx: UnboundedSender<DispatchReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.config.enabled != enabled {
            log::info!("[dispatch] dispatch {}", if enabled { "enabled" } else { "disabled" });
        }
        self.config.enabled = enabled;
    }

    pub fn is_in_flight(&self) -> bool {
        running(&self.gesture) || running(&self.manual)
    }

    /// Run the action sequence for `episode`, at most once per episode.
    ///
    /// A launch still pending for an older episode is stale and replaced.
    pub fn on_gesture_confirmed(&mut self, episode: EpisodeId) -> DispatchDecision {
        if !self.config.enabled {
            self.stats.disabled += 1;
            log::info!("[dispatch] episode {} confirmed, dispatch disabled", episode.0);
            return DispatchDecision::Disabled;
        }
        if self.dispatched == Some(episode) {
            self.stats.duplicates += 1;
            log::debug!("[dispatch] episode {} already dispatched", episode.0);
            return DispatchDecision::Duplicate;
        }
        if self.cancel_gesture() {
            log::info!("[dispatch] stale launch replaced by episode {}", episode.0);
        }
        if running(&self.manual) {
            log::info!("[dispatch] episode {} will launch after the manual launch", episode.0);
        }
        self.dispatched = Some(episode);
        self.stats.scheduled += 1;

        let job = self.job();
        let wake_hold = self.config.wake_hold;
        let delay = self.config.launch_delay;
        self.gesture = Some(self.runtime.spawn(async move {
            // Steps 1 and 2 are independent of each other and of step 3
            if let Err(e) = blocking(&job.platform, move |p| p.display.wake(wake_hold)).await {
                log::warn!("[dispatch] wake failed: {}", e);
            }
            if let Err(e) = blocking(&job.platform, |p| p.foreground.bring_to_front()).await {
                log::warn!("[dispatch] bring to front failed: {}", e);
            }
            tokio::time::sleep(delay).await;
            job.run(Some(episode), DispatchTrigger::Gesture).await;
        }));
        DispatchDecision::Scheduled
    }

    /// Launch the target now, without a gesture. Refused while any launch
    /// is running.
    pub fn launch_now(&mut self) -> DispatchDecision {
        if self.is_in_flight() {
            return DispatchDecision::InFlight;
        }
        log::info!("[dispatch] manual launch of {}", self.config.target_package);
        self.stats.scheduled += 1;

        let job = self.job();
        self.manual = Some(
            self.runtime
                .spawn(async move { job.run(None, DispatchTrigger::Manual).await }),
        );
        DispatchDecision::Scheduled
    }

    /// A new episode has begun; a gesture launch still waiting for the
    /// previous one is stale. Manual launches are left alone.
    pub fn on_episode_started(&mut self) {
        if self.cancel_gesture() {
            log::info!("[dispatch] pending launch cancelled by new episode");
        }
    }

    /// The detector left the episode (reset or expiry); allow the next
    /// confirmation to dispatch again.
    pub fn on_episode_reset(&mut self) {
        self.dispatched = None;
    }

    /// Abort every pending launch. Returns true if one was actually stopped.
    pub fn cancel(&mut self) -> bool {
        let gesture = self.cancel_gesture();
        let manual = abort(&mut self.manual);
        if manual {
            self.stats.cancelled += 1;
        }
        gesture || manual
    }

    fn cancel_gesture(&mut self) -> bool {
        let stopped = abort(&mut self.gesture);
        if stopped {
            self.stats.cancelled += 1;
        }
        stopped
    }

    fn job(&self) -> LaunchJob {
        LaunchJob {
            platform: self.platform.clone(),
            package: self.config.target_package.clone(),
            install_url: self.config.install_url.clone(),
            retry: self.config.retry,
            reports: self.reports.clone(),
            launch_lock: self.launch_lock.clone(),
        }
    }
}

impl Drop for GestureDispatcher {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn running(handle: &Option<JoinHandle<()>>) -> bool {
    handle.as_ref().is_some_and(|h| !h.is_finished())
}

fn abort(slot: &mut Option<JoinHandle<()>>) -> bool {
    let Some(handle) = slot.take() else {
        return false;
    };
    if handle.is_finished() {
        return false;
    }
    handle.abort();
    true
}

/// Run a platform call on the blocking pool.
async fn blocking<T, F>(platform: &Platform, f: F) -> LauncherResult<T>
where
    F: FnOnce(&Platform) -> LauncherResult<T> + Send + 'static,
    T: Send + 'static,
{
    let platform = platform.clone();
    tokio::task::spawn_blocking(move || f(&platform))
        .await
        .map_err(|e| LauncherError::Platform(format!("platform call join failure: {}", e)))?
}

impl LaunchJob {
    /// Launch step plus report. Holds the launch lock for the whole step.
    async fn run(self, episode: Option<EpisodeId>, trigger: DispatchTrigger) {
        let _guard = self.launch_lock.clone().lock_owned().await;
        let (result, attempts) = self.launch_with_retry().await;

        let report = DispatchReport {
            episode,
            trigger,
            result,
            attempts,
        };
        if let Some(tx) = &self.reports {
            let _ = tx.send(report);
        }
    }

    async fn notify(&self, message: String) {
        let _ = blocking(&self.platform, move |p| {
            p.notices.notify(&message);
            Ok(())
        })
        .await;
    }

    async fn launch_with_retry(&self) -> (DispatchResult, u32) {
        let package = self.package.as_str();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let target = self.package.clone();
            match blocking(&self.platform, move |p| p.launcher.launch(&target)).await {
                Ok(LaunchOutcome::Launched) => {
                    log::info!("[dispatch] launched {}", package);
                    return (DispatchResult::Launched, attempt);
                }
                Ok(LaunchOutcome::BroughtToFront) => {
                    log::info!("[dispatch] brought {} to front", package);
                    return (DispatchResult::BroughtToFront, attempt);
                }
                Ok(LaunchOutcome::NotInstalled) => {
                    log::warn!("[dispatch] {} not installed, opening {}", package, self.install_url);
                    let url = self.install_url.clone();
                    return match blocking(&self.platform, move |p| {
                        p.launcher.open_install_source(&url)
                    })
                    .await
                    {
                        Ok(()) => (DispatchResult::InstallSourceOpened, attempt),
                        Err(e) => {
                            log::error!("[dispatch] could not open install source: {}", e);
                            self.notify(format!("{} is not installed", package)).await;
                            (
                                DispatchResult::Failed {
                                    reason: e.to_string(),
                                },
                                attempt,
                            )
                        }
                    };
                }
                Err(e) => {
                    if attempt >= self.retry.max_attempts.max(1) {
                        log::error!(
                            "[dispatch] launch of {} failed after {} attempt(s): {}",
                            package,
                            attempt,
                            e
                        );
                        self.notify(format!("Failed to launch {}", package)).await;
                        return (
                            DispatchResult::Failed {
                                reason: e.to_string(),
                            },
                            attempt,
                        );
                    }
                    let backoff = self.retry.backoff_for(attempt);
                    log::warn!(
                        "[dispatch] launch attempt {} failed ({}), retrying in {:.2}s",
                        attempt,
                        e,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LauncherError;
    use crate::testing::{Call, RecordingPlatform};
    use tokio::sync::mpsc;
    use tokio::time::sleep;

    fn dispatcher(
        recorder: &Arc<RecordingPlatform>,
    ) -> (GestureDispatcher, mpsc::UnboundedReceiver<DispatchReport>) {
        dispatcher_with(recorder, DispatchConfig::default())
    }

    fn dispatcher_with(
        recorder: &Arc<RecordingPlatform>,
        config: DispatchConfig,
    ) -> (GestureDispatcher, mpsc::UnboundedReceiver<DispatchReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = GestureDispatcher::new(config, recorder.platform(), Handle::current())
            .with_reports(tx);
        (dispatcher, rx)
    }

    fn platform_error() -> LauncherError {
        LauncherError::Platform("ActivityNotFoundException".to_string())
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.backoff_for(1), Duration::from_millis(250));
        assert_eq!(retry.backoff_for(2), Duration::from_millis(375));
        assert!(retry.backoff_for(3) > retry.backoff_for(2));
        assert_eq!(retry.backoff_for(20), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_order_and_delay() {
        let recorder = RecordingPlatform::new();
        let (mut dispatcher, mut reports) = dispatcher(&recorder);

        assert_eq!(
            dispatcher.on_gesture_confirmed(EpisodeId(1)),
            DispatchDecision::Scheduled
        );
        assert!(dispatcher.is_in_flight());

        sleep(Duration::from_millis(900)).await;
        assert_eq!(
            recorder.calls(),
            vec![Call::Wake(DEFAULT_WAKE_HOLD), Call::BringToFront]
        );

        let report = reports.recv().await.unwrap();
        assert_eq!(report.result, DispatchResult::Launched);
        assert_eq!(report.episode, Some(EpisodeId(1)));
        assert_eq!(report.attempts, 1);
        assert_eq!(
            recorder.calls().last(),
            Some(&Call::Launch(DEFAULT_TARGET_PACKAGE.to_string()))
        );
        assert!(!dispatcher.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_episode_dispatches_once() {
        let recorder = RecordingPlatform::new();
        let (mut dispatcher, mut reports) = dispatcher(&recorder);

        assert_eq!(
            dispatcher.on_gesture_confirmed(EpisodeId(7)),
            DispatchDecision::Scheduled
        );
        assert_eq!(
            dispatcher.on_gesture_confirmed(EpisodeId(7)),
            DispatchDecision::Duplicate
        );
        reports.recv().await.unwrap();
        assert_eq!(
            dispatcher.on_gesture_confirmed(EpisodeId(7)),
            DispatchDecision::Duplicate
        );

        sleep(Duration::from_secs(5)).await;
        assert_eq!(recorder.launch_count(), 1);
        assert_eq!(dispatcher.stats().duplicates, 2);

        // after the episode boundary a new confirmation dispatches again
        dispatcher.on_episode_reset();
        assert_eq!(
            dispatcher.on_gesture_confirmed(EpisodeId(8)),
            DispatchDecision::Scheduled
        );
        reports.recv().await.unwrap();
        assert_eq!(recorder.launch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_confirmation_replaces_stale_launch() {
        let recorder = RecordingPlatform::new();
        let (mut dispatcher, mut reports) = dispatcher(&recorder);
        dispatcher.on_gesture_confirmed(EpisodeId(1));
        dispatcher.on_episode_reset();
        assert_eq!(
            dispatcher.on_gesture_confirmed(EpisodeId(2)),
            DispatchDecision::Scheduled
        );

        let report = reports.recv().await.unwrap();
        assert_eq!(report.episode, Some(EpisodeId(2)));
        sleep(Duration::from_secs(3)).await;
        assert_eq!(recorder.launch_count(), 1);
        assert!(reports.try_recv().is_err());
        assert_eq!(dispatcher.stats().cancelled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_has_no_effect() {
        let recorder = RecordingPlatform::new();
        let (mut dispatcher, _reports) = dispatcher(&recorder);
        dispatcher.set_enabled(false);

        assert_eq!(
            dispatcher.on_gesture_confirmed(EpisodeId(1)),
            DispatchDecision::Disabled
        );
        sleep(Duration::from_secs(3)).await;
        assert!(recorder.calls().is_empty());
        assert_eq!(dispatcher.stats().disabled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wake_failure_does_not_block_launch() {
        let recorder = Arc::new(RecordingPlatform {
            fail_wake: true,
            fail_foreground: true,
            ..RecordingPlatform::default()
        });
        let (mut dispatcher, mut reports) = dispatcher(&recorder);

        dispatcher.on_gesture_confirmed(EpisodeId(1));
        let report = reports.recv().await.unwrap();
        assert_eq!(report.result, DispatchResult::Launched);
        assert_eq!(recorder.launch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_installed_opens_install_source() {
        let recorder = RecordingPlatform::with_launch_script(vec![Ok(LaunchOutcome::NotInstalled)]);
        let (mut dispatcher, mut reports) = dispatcher(&recorder);

        dispatcher.on_gesture_confirmed(EpisodeId(1));
        let report = reports.recv().await.unwrap();
        assert_eq!(report.result, DispatchResult::InstallSourceOpened);
        assert_eq!(report.attempts, 1);
        assert_eq!(
            recorder.calls().last(),
            Some(&Call::InstallSource(DEFAULT_INSTALL_URL.to_string()))
        );
        assert!(recorder.notices().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_running_is_brought_to_front() {
        let recorder =
            RecordingPlatform::with_launch_script(vec![Ok(LaunchOutcome::BroughtToFront)]);
        let (mut dispatcher, mut reports) = dispatcher(&recorder);
        dispatcher.on_gesture_confirmed(EpisodeId(1));
        assert_eq!(
            reports.recv().await.unwrap().result,
            DispatchResult::BroughtToFront
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_failure_retries_then_succeeds() {
        let recorder = RecordingPlatform::with_launch_script(vec![
            Err(platform_error()),
            Err(platform_error()),
            Ok(LaunchOutcome::Launched),
        ]);
        let (mut dispatcher, mut reports) = dispatcher(&recorder);

        dispatcher.on_gesture_confirmed(EpisodeId(1));
        let report = reports.recv().await.unwrap();
        assert_eq!(report.result, DispatchResult::Launched);
        assert_eq!(report.attempts, 3);
        assert_eq!(recorder.launch_count(), 3);
        assert!(recorder.notices().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_notify_once() {
        let recorder = RecordingPlatform::with_launch_script(vec![
            Err(platform_error()),
            Err(platform_error()),
            Err(platform_error()),
            Err(platform_error()),
        ]);
        let (mut dispatcher, mut reports) = dispatcher(&recorder);

        dispatcher.on_gesture_confirmed(EpisodeId(1));
        let report = reports.recv().await.unwrap();
        assert!(matches!(report.result, DispatchResult::Failed { .. }));
        assert_eq!(report.attempts, 3);
        assert_eq!(recorder.launch_count(), 3);
        assert_eq!(
            recorder.notices(),
            vec![format!("Failed to launch {}", DEFAULT_TARGET_PACKAGE)]
        );
        assert!(!dispatcher.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_delay_elapses() {
        let recorder = RecordingPlatform::new();
        let (mut dispatcher, mut reports) = dispatcher(&recorder);

        dispatcher.on_gesture_confirmed(EpisodeId(1));
        sleep(Duration::from_millis(200)).await;
        assert!(dispatcher.cancel());
        assert!(!dispatcher.is_in_flight());

        sleep(Duration::from_secs(3)).await;
        assert_eq!(recorder.launch_count(), 0);
        assert!(reports.try_recv().is_err());
        assert_eq!(dispatcher.stats().cancelled, 1);
        assert!(!dispatcher.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_episode_cancels_stale_launch() {
        let recorder = RecordingPlatform::new();
        let (mut dispatcher, _reports) = dispatcher(&recorder);

        dispatcher.on_gesture_confirmed(EpisodeId(1));
        dispatcher.on_episode_started();
        sleep(Duration::from_secs(3)).await;
        assert_eq!(recorder.launch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_launch() {
        let recorder = RecordingPlatform::new();
        {
            let (mut dispatcher, _reports) = dispatcher(&recorder);
            dispatcher.on_gesture_confirmed(EpisodeId(1));
        }
        sleep(Duration::from_secs(3)).await;
        assert_eq!(recorder.launch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_launch_is_immediate() {
        let recorder = RecordingPlatform::new();
        let (mut dispatcher, mut reports) = dispatcher(&recorder);

        assert_eq!(dispatcher.launch_now(), DispatchDecision::Scheduled);
        assert_eq!(dispatcher.launch_now(), DispatchDecision::InFlight);
        let report = reports.recv().await.unwrap();
        assert_eq!(report.trigger, DispatchTrigger::Manual);
        assert_eq!(report.episode, None);
        assert_eq!(
            recorder.calls(),
            vec![Call::Launch(DEFAULT_TARGET_PACKAGE.to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_launch_survives_new_episode() {
        let recorder = RecordingPlatform::with_launch_script(vec![
            Err(platform_error()),
            Ok(LaunchOutcome::Launched),
        ]);
        let (mut dispatcher, mut reports) = dispatcher(&recorder);

        dispatcher.launch_now();
        sleep(Duration::from_millis(10)).await;
        dispatcher.on_episode_started();

        let report = reports.recv().await.unwrap();
        assert_eq!(report.trigger, DispatchTrigger::Manual);
        assert_eq!(report.result, DispatchResult::Launched);
        assert_eq!(report.attempts, 2);
        assert_eq!(dispatcher.stats().cancelled, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gesture_during_manual_launch_runs_after_it() {
        let recorder = RecordingPlatform::with_launch_script(vec![
            Err(platform_error()),
            Ok(LaunchOutcome::Launched),
        ]);
        let config = DispatchConfig {
            launch_delay: Duration::ZERO,
            ..DispatchConfig::default()
        };
        let (mut dispatcher, mut reports) = dispatcher_with(&recorder, config);

        assert_eq!(dispatcher.launch_now(), DispatchDecision::Scheduled);
        sleep(Duration::from_millis(10)).await;
        assert_eq!(
            dispatcher.on_gesture_confirmed(EpisodeId(1)),
            DispatchDecision::Scheduled
        );
        assert_eq!(dispatcher.launch_now(), DispatchDecision::InFlight);

        let first = reports.recv().await.unwrap();
        assert_eq!(first.trigger, DispatchTrigger::Manual);
        assert_eq!(first.attempts, 2);
        let second = reports.recv().await.unwrap();
        assert_eq!(second.trigger, DispatchTrigger::Gesture);
        assert_eq!(second.episode, Some(EpisodeId(1)));
        assert_eq!(second.result, DispatchResult::Launched);
        assert_eq!(recorder.launch_count(), 3);
        assert!(!dispatcher.is_in_flight());
    }
}
