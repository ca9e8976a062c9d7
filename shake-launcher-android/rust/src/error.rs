use jni::JNIEnv;
use shake_launcher_rs::LauncherError;
use thiserror::Error;

/// Errors crossing the JNI boundary
#[derive(Error, Debug)]
pub enum JniBridgeError {
    #[error("Detection already running")]
    AlreadyRunning,

    #[error("Detection not running")]
    NotRunning,

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("JNI error: {0}")]
    JniError(String),

    #[error(transparent)]
    Launcher(#[from] LauncherError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<jni::errors::Error> for JniBridgeError {
    fn from(e: jni::errors::Error) -> Self {
        JniBridgeError::JniError(e.to_string())
    }
}

/// Result type for JNI operations
pub type JResult<T> = Result<T, JniBridgeError>;

fn exception_class(error: &JniBridgeError) -> &'static str {
    match error {
        JniBridgeError::AlreadyRunning | JniBridgeError::NotRunning => {
            "java/lang/IllegalStateException"
        }
        JniBridgeError::InvalidParameters(_)
        | JniBridgeError::Launcher(LauncherError::InvalidParameters(_))
        | JniBridgeError::Launcher(LauncherError::Settings(_))
        | JniBridgeError::Launcher(LauncherError::Serialization(_)) => {
            "java/lang/IllegalArgumentException"
        }
        JniBridgeError::Launcher(LauncherError::Io(_)) => "java/io/IOException",
        JniBridgeError::JniError(_) | JniBridgeError::Launcher(_) | JniBridgeError::Internal(_) => {
            "java/lang/RuntimeException"
        }
    }
}

/// Throw Java exception from Rust error
pub fn throw_java_exception(env: &mut JNIEnv, error: &JniBridgeError) -> JResult<()> {
    // A pending exception (e.g. from a failed JNI call) takes precedence
    if env.exception_check().unwrap_or(false) {
        return Ok(());
    }
    env.throw_new(exception_class(error), error.to_string())
        .map_err(|_| JniBridgeError::JniError("Failed to throw exception".to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_class_mapping() {
        assert_eq!(
            exception_class(&JniBridgeError::NotRunning),
            "java/lang/IllegalStateException"
        );
        assert_eq!(
            exception_class(&LauncherError::Settings("bad".into()).into()),
            "java/lang/IllegalArgumentException"
        );
        assert_eq!(
            exception_class(&LauncherError::Io(std::io::Error::other("disk")).into()),
            "java/io/IOException"
        );
        assert_eq!(
            exception_class(&LauncherError::Platform("no activity".into()).into()),
            "java/lang/RuntimeException"
        );
    }
}
