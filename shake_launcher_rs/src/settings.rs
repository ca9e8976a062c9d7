use crate::error::{LauncherError, LauncherResult};
use crate::policy::{
    DetectionPolicy, DEFAULT_MAX_EPISODE_DURATION, DEFAULT_MIN_INTER_SHAKE_DELAY,
    DEFAULT_SHAKE_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Persisted user settings, one flat key/value document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LauncherSettings {
    pub shake_threshold: f64,
    /// Minimum delay between the two shakes (ms).
    pub shake_time_window: u64,
    /// Maximum episode duration (ms).
    pub shake_time_max: u64,
    pub shake_to_launch_enabled: bool,
    pub detection_enabled: bool,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            shake_threshold: DEFAULT_SHAKE_THRESHOLD,
            shake_time_window: DEFAULT_MIN_INTER_SHAKE_DELAY.as_millis() as u64,
            shake_time_max: DEFAULT_MAX_EPISODE_DURATION.as_millis() as u64,
            shake_to_launch_enabled: true,
            detection_enabled: true,
        }
    }
}

impl LauncherSettings {
    /// Policy view of the stored values, with the usual clamps applied.
    pub fn policy(&self) -> DetectionPolicy {
        DetectionPolicy::new(
            self.shake_threshold,
            Duration::from_millis(self.shake_time_window),
            Duration::from_millis(self.shake_time_max),
        )
    }

    pub fn set_policy(&mut self, policy: &DetectionPolicy) {
        self.shake_threshold = policy.shake_threshold();
        self.shake_time_window = policy.min_inter_shake_delay().as_millis() as u64;
        self.shake_time_max = policy.max_episode_duration().as_millis() as u64;
    }

    /// Re-derive the stored values through the policy clamps.
    pub fn normalized(mut self) -> Self {
        let policy = self.policy();
        self.set_policy(&policy);
        self
    }

    pub fn to_json(&self) -> LauncherResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> LauncherResult<Self> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.normalized())
    }
}

pub trait SettingsStore: Send + Sync {
    fn load(&self) -> LauncherResult<LauncherSettings>;
    fn save(&self, settings: &LauncherSettings) -> LauncherResult<()>;
}

/// Settings kept in a JSON file. A missing file loads as defaults.
pub struct JsonFileSettingsStore {
    path: PathBuf,
}

impl JsonFileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileSettingsStore {
    fn load(&self) -> LauncherResult<LauncherSettings> {
        match fs::read_to_string(&self.path) {
            Ok(json) => LauncherSettings::from_json(&json).map_err(|e| {
                LauncherError::Settings(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "[settings] {} not found, using defaults",
                    self.path.display()
                );
                Ok(LauncherSettings::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, settings: &LauncherSettings) -> LauncherResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, settings.to_json()?)?;
        log::debug!("[settings] saved to {}", self.path.display());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Option<LauncherSettings>>,
}

impl MemorySettingsStore {
    pub fn new(settings: LauncherSettings) -> Self {
        Self {
            settings: Mutex::new(Some(settings)),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> LauncherResult<LauncherSettings> {
        let guard = self
            .settings
            .lock()
            .map_err(|_| LauncherError::Settings("settings lock poisoned".to_string()))?;
        Ok(guard.clone().unwrap_or_default())
    }

    fn save(&self, settings: &LauncherSettings) -> LauncherResult<()> {
        let mut guard = self
            .settings
            .lock()
            .map_err(|_| LauncherError::Settings("settings lock poisoned".to_string()))?;
        *guard = Some(settings.clone());
        Ok(())
    }
}
