use crate::error::{LauncherError, LauncherResult};
use serde::{Deserialize, Serialize};
use std::process::{Command, Output};
use std::sync::Arc;
use std::time::Duration;

/// Result of asking the platform to open the target app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchOutcome {
    /// Target was not running and has been started.
    Launched,
    /// Target was already running and has been brought to the front.
    BroughtToFront,
    /// Target is not installed on this device.
    NotInstalled,
}

/// Turns the display on. Best effort; may no-op if already on.
pub trait DisplayControl: Send + Sync {
    fn wake(&self, hold: Duration) -> LauncherResult<()>;
}

/// Brings the hosting application to the foreground.
pub trait ForegroundControl: Send + Sync {
    fn bring_to_front(&self) -> LauncherResult<()>;
}

pub trait AppLauncher: Send + Sync {
    fn launch(&self, package: &str) -> LauncherResult<LaunchOutcome>;

    /// Send the user to where `package` can be installed.
    fn open_install_source(&self, url: &str) -> LauncherResult<()>;
}

/// User-visible, non-blocking notice (toast-style).
pub trait NoticeSink: Send + Sync {
    fn notify(&self, message: &str);
}

/// The external collaborators the dispatcher drives.
#[derive(Clone)]
pub struct Platform {
    pub display: Arc<dyn DisplayControl>,
    pub foreground: Arc<dyn ForegroundControl>,
    pub launcher: Arc<dyn AppLauncher>,
    pub notices: Arc<dyn NoticeSink>,
}

impl Platform {
    /// Use one object for every collaborator role.
    pub fn from_shared<P>(platform: Arc<P>) -> Self
    where
        P: DisplayControl + ForegroundControl + AppLauncher + NoticeSink + 'static,
    {
        Self {
            display: platform.clone(),
            foreground: platform.clone(),
            launcher: platform.clone(),
            notices: platform,
        }
    }
}

/// Collaborators backed by Android shell tools (`am`, `pm`, `input`,
/// `termux-toast`), for running under Termux or adb.
pub struct ShellPlatform {
    host_package: Option<String>,
}

impl ShellPlatform {
    pub fn new(host_package: Option<String>) -> Self {
        Self { host_package }
    }

    fn run(program: &str, args: &[&str]) -> LauncherResult<Output> {
        let output = Command::new(program).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LauncherError::PlatformUnavailable(format!("{} not found", program))
            } else {
                LauncherError::Platform(format!("failed to run {}: {}", program, e))
            }
        })?;
        Ok(output)
    }

    fn run_checked(program: &str, args: &[&str]) -> LauncherResult<Output> {
        let output = Self::run(program, args)?;
        if !output.status.success() {
            return Err(LauncherError::Platform(format!(
                "{} {} exited with {}: {}",
                program,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output)
    }

    fn is_installed(package: &str) -> LauncherResult<bool> {
        let output = Self::run("pm", &["path", package])?;
        Ok(output.status.success() && String::from_utf8_lossy(&output.stdout).contains("package:"))
    }

    fn is_running(package: &str) -> bool {
        Self::run("pidof", &[package])
            .map(|o| o.status.success() && !o.stdout.is_empty())
            .unwrap_or(false)
    }

    fn start_package(package: &str) -> LauncherResult<()> {
        Self::run_checked(
            "monkey",
            &["-p", package, "-c", "android.intent.category.LAUNCHER", "1"],
        )?;
        Ok(())
    }
}

impl DisplayControl for ShellPlatform {
    fn wake(&self, hold: Duration) -> LauncherResult<()> {
        log::debug!("[platform] wake display (hold {} ms)", hold.as_millis());
        Self::run_checked("input", &["keyevent", "KEYCODE_WAKEUP"])?;
        Ok(())
    }
}

impl ForegroundControl for ShellPlatform {
    fn bring_to_front(&self) -> LauncherResult<()> {
        match &self.host_package {
            Some(package) => Self::start_package(package),
            None => Ok(()),
        }
    }
}

impl AppLauncher for ShellPlatform {
    fn launch(&self, package: &str) -> LauncherResult<LaunchOutcome> {
        if !Self::is_installed(package)? {
            return Ok(LaunchOutcome::NotInstalled);
        }
        let running = Self::is_running(package);
        Self::start_package(package).map_err(|e| LauncherError::LaunchFailed {
            package: package.to_string(),
            reason: e.to_string(),
        })?;
        Ok(if running {
            LaunchOutcome::BroughtToFront
        } else {
            LaunchOutcome::Launched
        })
    }

    fn open_install_source(&self, url: &str) -> LauncherResult<()> {
        Self::run_checked(
            "am",
            &["start", "-a", "android.intent.action.VIEW", "-d", url],
        )?;
        Ok(())
    }
}

impl NoticeSink for ShellPlatform {
    fn notify(&self, message: &str) {
        if Self::run_checked("termux-toast", &[message]).is_err() {
            log::warn!("[notice] {}", message);
        }
    }
}

/// Collaborators that only log what they would do.
pub struct LoggingPlatform;

impl DisplayControl for LoggingPlatform {
    fn wake(&self, hold: Duration) -> LauncherResult<()> {
        log::info!("[platform] wake display (hold {} ms)", hold.as_millis());
        Ok(())
    }
}

impl ForegroundControl for LoggingPlatform {
    fn bring_to_front(&self) -> LauncherResult<()> {
        log::info!("[platform] bring host to front");
        Ok(())
    }
}

impl AppLauncher for LoggingPlatform {
    fn launch(&self, package: &str) -> LauncherResult<LaunchOutcome> {
        log::info!("[platform] launch {}", package);
        Ok(LaunchOutcome::Launched)
    }

    fn open_install_source(&self, url: &str) -> LauncherResult<()> {
        log::info!("[platform] open install source {}", url);
        Ok(())
    }
}

impl NoticeSink for LoggingPlatform {
    fn notify(&self, message: &str) {
        log::warn!("[notice] {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_platform_always_launches() {
        let platform = Platform::from_shared(Arc::new(LoggingPlatform));
        assert!(platform.display.wake(Duration::from_secs(5)).is_ok());
        assert!(platform.foreground.bring_to_front().is_ok());
        assert_eq!(
            platform.launcher.launch("org.xcontest.XCTrack").unwrap(),
            LaunchOutcome::Launched
        );
    }

    #[test]
    fn test_shell_platform_without_host_skips_foreground() {
        let platform = ShellPlatform::new(None);
        assert!(platform.bring_to_front().is_ok());
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let err = ShellPlatform::run("definitely-not-a-real-binary-xyz", &[]).unwrap_err();
        assert!(matches!(err, LauncherError::PlatformUnavailable(_)));
    }
}
