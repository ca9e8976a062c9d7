//! Recording collaborators for unit tests.

use crate::error::{LauncherError, LauncherResult};
use crate::platform::{
    AppLauncher, DisplayControl, ForegroundControl, LaunchOutcome, NoticeSink, Platform,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Wake(Duration),
    BringToFront,
    Launch(String),
    InstallSource(String),
}

/// Scripted platform: records every call and replays queued launch results
/// (defaulting to `Launched` once the script runs out).
#[derive(Default)]
pub struct RecordingPlatform {
    pub calls: Mutex<Vec<Call>>,
    pub notices: Mutex<Vec<String>>,
    pub launch_script: Mutex<VecDeque<LauncherResult<LaunchOutcome>>>,
    pub fail_wake: bool,
    pub fail_foreground: bool,
    pub fail_install_source: bool,
    /// Real time each wake, foreground and launch call blocks for.
    pub call_delay: Duration,
}

impl RecordingPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_launch_script(script: Vec<LauncherResult<LaunchOutcome>>) -> Arc<Self> {
        Arc::new(Self {
            launch_script: Mutex::new(script.into()),
            ..Self::default()
        })
    }

    pub fn platform(self: &Arc<Self>) -> Platform {
        Platform::from_shared(self.clone())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Launch(_)))
            .count()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        if !self.call_delay.is_zero() {
            std::thread::sleep(self.call_delay);
        }
        self.calls.lock().unwrap().push(call);
    }
}

impl DisplayControl for RecordingPlatform {
    fn wake(&self, hold: Duration) -> LauncherResult<()> {
        self.record(Call::Wake(hold));
        if self.fail_wake {
            return Err(LauncherError::Platform("wake lock denied".to_string()));
        }
        Ok(())
    }
}

impl ForegroundControl for RecordingPlatform {
    fn bring_to_front(&self) -> LauncherResult<()> {
        self.record(Call::BringToFront);
        if self.fail_foreground {
            return Err(LauncherError::Platform("no task".to_string()));
        }
        Ok(())
    }
}

impl AppLauncher for RecordingPlatform {
    fn launch(&self, package: &str) -> LauncherResult<LaunchOutcome> {
        self.record(Call::Launch(package.to_string()));
        self.launch_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(LaunchOutcome::Launched))
    }

    fn open_install_source(&self, url: &str) -> LauncherResult<()> {
        self.record(Call::InstallSource(url.to_string()));
        if self.fail_install_source {
            return Err(LauncherError::Platform("no store".to_string()));
        }
        Ok(())
    }
}

impl NoticeSink for RecordingPlatform {
    fn notify(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}
