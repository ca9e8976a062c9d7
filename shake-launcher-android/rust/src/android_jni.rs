use crate::bridge::JniPlatform;
use crate::error::{throw_java_exception, JResult, JniBridgeError};
use crate::session::LauncherSession;
use jni::objects::{JClass, JString};
use jni::sys::{jboolean, jdouble, jfloat, jint, jlong, jlongArray, jstring, JNI_FALSE};
use jni::JNIEnv;
use shake_launcher_rs::{AccelData, Platform, ShakeEvent, TimingBounds};
use std::sync::{Arc, Mutex, MutexGuard};

// Global session state - stored as static to persist across JNI calls
lazy_static::lazy_static! {
    static ref GLOBAL_SESSION: Mutex<LauncherSession> = Mutex::new(LauncherSession::new());
}

fn session() -> JResult<MutexGuard<'static, LauncherSession>> {
    GLOBAL_SESSION.lock().map_err(|_| {
        JniBridgeError::Internal("Failed to acquire global session lock".to_string())
    })
}

fn fail<T>(env: &mut JNIEnv, error: JniBridgeError, fallback: T) -> T {
    log::error!("[jni] {}", error);
    let _ = throw_java_exception(env, &error);
    fallback
}

fn new_jstring(env: &mut JNIEnv, value: JResult<String>) -> jstring {
    match value.and_then(|s| Ok(env.new_string(s)?)) {
        Ok(jstr) => jstr.into_raw(),
        Err(e) => fail(env, e, std::ptr::null_mut()),
    }
}

fn new_bounds_array(env: &mut JNIEnv, bounds: TimingBounds) -> jlongArray {
    let values = [
        bounds.min_inter_shake_delay.as_millis() as i64,
        bounds.max_episode_duration.as_millis() as i64,
    ];
    let result = env.new_long_array(2).and_then(|arr| {
        env.set_long_array_region(&arr, 0, &values)?;
        Ok(arr)
    });
    match result {
        Ok(arr) => arr.into_raw(),
        Err(e) => fail(env, e.into(), std::ptr::null_mut()),
    }
}

/// JNI: Start detection. `bridge_class` receives the platform callbacks.
/// Returns: 0 on success, -1 on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_example_shaketoopen_NativeBridge_startDetection(
    mut env: JNIEnv,
    _class: JClass,
    bridge_class: JClass,
) -> jint {
    crate::init_logging();
    match start_detection_impl(&mut env, &bridge_class) {
        Ok(_) => 0,
        Err(e) => fail(&mut env, e, -1),
    }
}

fn start_detection_impl(env: &mut JNIEnv, bridge_class: &JClass) -> JResult<()> {
    let platform = JniPlatform::new(env, bridge_class)?;
    session()?.start(Platform::from_shared(Arc::new(platform)))
}

/// JNI: Stop detection and cancel any pending launch
/// Returns: 0 on success, -1 on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_example_shaketoopen_NativeBridge_stopDetection(
    mut env: JNIEnv,
    _class: JClass,
) -> jint {
    match session().and_then(|mut s| s.stop()) {
        Ok(_) => 0,
        Err(e) => fail(&mut env, e, -1),
    }
}

/// JNI: Push accelerometer sample
/// Parameters: x, y, z (m/s²), timestamp (ms, monotonic)
/// Returns: event code (0 no-op, 1 first shake, 2 confirmed, 3 expired)
#[no_mangle]
pub extern "C" fn Java_com_example_shaketoopen_NativeBridge_pushAccelSample(
    mut env: JNIEnv,
    _class: JClass,
    x: jfloat,
    y: jfloat,
    z: jfloat,
    timestamp_ms: jlong,
) -> jint {
    match push_accel_sample_impl(x, y, z, timestamp_ms) {
        Ok(event) => event.code(),
        Err(e) => fail(&mut env, e, ShakeEvent::NoOp.code()),
    }
}

fn push_accel_sample_impl(x: f32, y: f32, z: f32, timestamp_ms: i64) -> JResult<ShakeEvent> {
    if timestamp_ms < 0 {
        return Err(JniBridgeError::InvalidParameters(format!(
            "negative timestamp {}",
            timestamp_ms
        )));
    }
    let reading = AccelData::new(x, y, z, timestamp_ms as u64);
    Ok(session()?.push_sample(reading))
}

/// JNI: Return the detector to idle
#[no_mangle]
pub extern "C" fn Java_com_example_shaketoopen_NativeBridge_resetDetection(
    mut env: JNIEnv,
    _class: JClass,
) {
    if let Err(e) = session().and_then(|mut s| s.reset()) {
        fail(&mut env, e, ());
    }
}

/// JNI: Launch the target app now, without a gesture
/// Returns: 1 if a launch was scheduled, 0 if one is already in flight
#[no_mangle]
pub extern "C" fn Java_com_example_shaketoopen_NativeBridge_launchNow(
    mut env: JNIEnv,
    _class: JClass,
) -> jint {
    match session().and_then(|mut s| s.launch_now()) {
        Ok(decision) => {
            log::info!("[jni] launchNow: {:?}", decision);
            i32::from(decision == shake_launcher_rs::DispatchDecision::Scheduled)
        }
        Err(e) => fail(&mut env, e, -1),
    }
}

/// JNI: Set the shake threshold (m/s²)
/// Returns: the threshold actually applied
#[no_mangle]
pub extern "C" fn Java_com_example_shaketoopen_NativeBridge_setThreshold(
    mut env: JNIEnv,
    _class: JClass,
    threshold: jdouble,
) -> jdouble {
    match session() {
        Ok(mut s) => s.set_threshold(threshold),
        Err(e) => fail(&mut env, e, 0.0),
    }
}

/// JNI: Set a sensitivity preset (1..=5)
/// Returns: the resulting threshold
#[no_mangle]
pub extern "C" fn Java_com_example_shaketoopen_NativeBridge_setSensitivityLevel(
    mut env: JNIEnv,
    _class: JClass,
    level: jint,
) -> jdouble {
    match session() {
        Ok(mut s) => s.set_sensitivity_level(level),
        Err(e) => fail(&mut env, e, 0.0),
    }
}

/// JNI: Set the minimum inter-shake delay (ms)
/// Returns: [minInterShakeDelayMs, maxEpisodeDurationMs] after clamping
#[no_mangle]
pub extern "C" fn Java_com_example_shaketoopen_NativeBridge_setMinInterShakeDelay(
    mut env: JNIEnv,
    _class: JClass,
    delay_ms: jlong,
) -> jlongArray {
    match session() {
        Ok(mut s) => {
            let bounds = s.set_min_inter_shake_delay(delay_ms);
            drop(s);
            new_bounds_array(&mut env, bounds)
        }
        Err(e) => fail(&mut env, e, std::ptr::null_mut()),
    }
}

/// JNI: Set the maximum episode duration (ms)
/// Returns: [minInterShakeDelayMs, maxEpisodeDurationMs] after clamping
#[no_mangle]
pub extern "C" fn Java_com_example_shaketoopen_NativeBridge_setMaxEpisodeDuration(
    mut env: JNIEnv,
    _class: JClass,
    duration_ms: jlong,
) -> jlongArray {
    match session() {
        Ok(mut s) => {
            let bounds = s.set_max_episode_duration(duration_ms);
            drop(s);
            new_bounds_array(&mut env, bounds)
        }
        Err(e) => fail(&mut env, e, std::ptr::null_mut()),
    }
}

#[no_mangle]
pub extern "C" fn Java_com_example_shaketoopen_NativeBridge_setDispatchEnabled(
    mut env: JNIEnv,
    _class: JClass,
    enabled: jboolean,
) {
    match session() {
        Ok(mut s) => s.set_dispatch_enabled(enabled != JNI_FALSE),
        Err(e) => fail(&mut env, e, ()),
    }
}

#[no_mangle]
pub extern "C" fn Java_com_example_shaketoopen_NativeBridge_setDetectionEnabled(
    mut env: JNIEnv,
    _class: JClass,
    enabled: jboolean,
) {
    match session() {
        Ok(mut s) => s.set_detection_enabled(enabled != JNI_FALSE),
        Err(e) => fail(&mut env, e, ()),
    }
}

/// JNI: Session, settings and detector status as JSON
#[no_mangle]
pub extern "C" fn Java_com_example_shaketoopen_NativeBridge_getStatusJson(
    mut env: JNIEnv,
    _class: JClass,
) -> jstring {
    let status = session().and_then(|mut s| s.status_json());
    new_jstring(&mut env, status)
}

/// JNI: Current settings document, for the host to persist
#[no_mangle]
pub extern "C" fn Java_com_example_shaketoopen_NativeBridge_getSettingsJson(
    mut env: JNIEnv,
    _class: JClass,
) -> jstring {
    let settings = session().and_then(|s| s.settings_json());
    new_jstring(&mut env, settings)
}

/// JNI: Restore a persisted settings document
/// Returns: 0 on success, -1 on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_example_shaketoopen_NativeBridge_applySettingsJson(
    mut env: JNIEnv,
    _class: JClass,
    json: JString,
) -> jint {
    match apply_settings_json_impl(&mut env, &json) {
        Ok(_) => 0,
        Err(e) => fail(&mut env, e, -1),
    }
}

fn apply_settings_json_impl(env: &mut JNIEnv, json: &JString) -> JResult<()> {
    let json: String = env.get_string(json)?.into();
    session()?.apply_settings_json(&json)
}
