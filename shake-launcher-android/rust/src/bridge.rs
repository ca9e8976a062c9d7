//! Platform collaborators implemented as static calls on the Kotlin bridge
//! class handed to `startDetection`.
//!
//! The class reference is captured as a `GlobalRef` on the calling Java
//! thread; class lookup by name would fail on threads attached from native
//! code. Each call attaches the current thread to the VM for its duration.

use crate::error::JResult;
use jni::objects::{GlobalRef, JClass, JValue};
use jni::{JNIEnv, JavaVM};
use shake_launcher_rs::platform::{
    AppLauncher, DisplayControl, ForegroundControl, LaunchOutcome, NoticeSink,
};
use shake_launcher_rs::{LauncherError, LauncherResult};
use std::time::Duration;

const LAUNCHED_FRESH: i32 = 0;
const BROUGHT_TO_FRONT: i32 = 1;
const NOT_INSTALLED: i32 = 2;

pub struct JniPlatform {
    vm: JavaVM,
    bridge: GlobalRef,
}

impl JniPlatform {
    pub fn new(env: &mut JNIEnv, bridge_class: &JClass) -> JResult<Self> {
        Ok(Self {
            vm: env.get_java_vm()?,
            bridge: env.new_global_ref(bridge_class)?,
        })
    }

    fn call<T>(
        &self,
        what: &str,
        f: impl FnOnce(&mut JNIEnv, &JClass) -> jni::errors::Result<T>,
    ) -> LauncherResult<T> {
        let mut guard = self
            .vm
            .attach_current_thread()
            .map_err(|e| LauncherError::Platform(format!("{}: attach failed: {}", what, e)))?;
        let env: &mut JNIEnv = &mut guard;
        let class: &JClass = self.bridge.as_obj().into();

        match f(env, class) {
            Ok(value) => Ok(value),
            Err(e) => {
                // Bridge exceptions must not stay pending on this thread
                if env.exception_check().unwrap_or(false) {
                    let _ = env.exception_describe();
                    let _ = env.exception_clear();
                }
                Err(LauncherError::Platform(format!("{}: {}", what, e)))
            }
        }
    }

    fn call_with_string(&self, method: &str, sig: &str, arg: &str) -> LauncherResult<()> {
        self.call(method, |env, class| {
            let jarg = env.new_string(arg)?;
            env.call_static_method(class, method, sig, &[JValue::Object(&jarg)])?
                .v()
        })
    }
}

impl DisplayControl for JniPlatform {
    fn wake(&self, hold: Duration) -> LauncherResult<()> {
        let hold_ms = i64::try_from(hold.as_millis()).unwrap_or(i64::MAX);
        self.call("wakeScreen", |env, class| {
            env.call_static_method(class, "wakeScreen", "(J)V", &[JValue::Long(hold_ms)])?
                .v()
        })
    }
}

impl ForegroundControl for JniPlatform {
    fn bring_to_front(&self) -> LauncherResult<()> {
        self.call("bringToFront", |env, class| {
            env.call_static_method(class, "bringToFront", "()V", &[])?.v()
        })
    }
}

impl AppLauncher for JniPlatform {
    fn launch(&self, package: &str) -> LauncherResult<LaunchOutcome> {
        let code = self.call("launchApp", |env, class| {
            let jpackage = env.new_string(package)?;
            env.call_static_method(
                class,
                "launchApp",
                "(Ljava/lang/String;)I",
                &[JValue::Object(&jpackage)],
            )?
            .i()
        })?;
        launch_outcome_from_code(code)
    }

    fn open_install_source(&self, url: &str) -> LauncherResult<()> {
        self.call_with_string("openInstallSource", "(Ljava/lang/String;)V", url)
    }
}

impl NoticeSink for JniPlatform {
    fn notify(&self, message: &str) {
        if let Err(e) = self.call_with_string("showNotice", "(Ljava/lang/String;)V", message) {
            log::warn!("[notice] {} ({})", message, e);
        }
    }
}

fn launch_outcome_from_code(code: i32) -> LauncherResult<LaunchOutcome> {
    match code {
        LAUNCHED_FRESH => Ok(LaunchOutcome::Launched),
        BROUGHT_TO_FRONT => Ok(LaunchOutcome::BroughtToFront),
        NOT_INSTALLED => Ok(LaunchOutcome::NotInstalled),
        other => Err(LauncherError::Platform(format!(
            "launchApp returned unknown code {}",
            other
        ))),
    }
}
