// Shake Launcher Android JNI Library
// Exposes the Rust shake detector to Kotlin via JNI

pub mod android_jni;
pub mod bridge;
pub mod error;
pub mod session;

pub use bridge::JniPlatform;
pub use error::{JResult, JniBridgeError};
pub use session::{LauncherSession, SessionState, SessionStatus};

static LOGGER: std::sync::Once = std::sync::Once::new();

/// Route `log` output to logcat on Android, stderr elsewhere.
pub fn init_logging() {
    LOGGER.call_once(|| {
        #[cfg(target_os = "android")]
        {
            let _ = android_log::init("ShakeLauncher");
        }
        #[cfg(not(target_os = "android"))]
        {
            let _ = env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or("info"),
            )
            .try_init();
        }
    });
}
