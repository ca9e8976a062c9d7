use thiserror::Error;

/// Shake launcher error types
#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("Platform unavailable: {0}")]
    PlatformUnavailable(String),

    #[error("Platform call failed: {0}")]
    Platform(String),

    #[error("Failed to launch {package}: {reason}")]
    LaunchFailed { package: String, reason: String },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Result type for launcher operations
pub type LauncherResult<T> = Result<T, LauncherError>;
