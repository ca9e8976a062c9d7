use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::process::Command;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tokio::time::{interval, Duration, Instant};

/// Raw accelerometer reading as delivered by the platform (m/s²).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccelData {
    pub timestamp_ms: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl AccelData {
    pub fn new(x: f32, y: f32, z: f32, timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            x,
            y,
            z,
        }
    }
}

/// Scalar sample consumed by the detector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub magnitude: f64,
    pub timestamp_ms: u64,
}

impl Sample {
    pub fn new(magnitude: f64, timestamp_ms: u64) -> Self {
        Self {
            magnitude,
            timestamp_ms,
        }
    }
}

/// Stateless conversion from a 3-axis reading to a detector sample.
pub struct SampleFilter;

impl SampleFilter {
    /// Euclidean norm of the acceleration vector.
    pub fn magnitude(x: f32, y: f32, z: f32) -> f64 {
        Vector3::new(x as f64, y as f64, z as f64).norm()
    }

    pub fn apply(reading: &AccelData) -> Sample {
        Sample::new(
            Self::magnitude(reading.x, reading.y, reading.z),
            reading.timestamp_ms,
        )
    }
}

/// Millisecond clock anchored at service start. Never goes backwards.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Where accelerometer samples come from.
#[derive(Clone, Debug)]
pub enum SensorSource {
    /// Poll `termux-sensor` (Termux:API on Android).
    Termux,
    /// Resting gravity plus a scripted double-shake every cycle.
    Mock(MockShaker),
}

/// Synthetic accelerometer producing a double-shake every `cycle_ms`.
#[derive(Clone, Debug)]
pub struct MockShaker {
    pub cycle_ms: u64,
    pub first_shake_ms: u64,
    pub second_shake_ms: u64,
    pub shake_len_ms: u64,
    pub shake_magnitude: f32,
}

impl Default for MockShaker {
    fn default() -> Self {
        Self {
            cycle_ms: 6000,
            first_shake_ms: 1000,
            second_shake_ms: 1800,
            shake_len_ms: 60,
            shake_magnitude: 24.0,
        }
    }
}

impl MockShaker {
    pub fn reading_at(&self, timestamp_ms: u64) -> AccelData {
        let phase = timestamp_ms % self.cycle_ms.max(1);
        let in_shake = |start: u64| phase >= start && phase < start + self.shake_len_ms;

        if in_shake(self.first_shake_ms) || in_shake(self.second_shake_ms) {
            // Mostly lateral, gravity still on z
            let lateral = (self.shake_magnitude.powi(2) - 9.81f32.powi(2)).max(0.0).sqrt();
            return AccelData::new(lateral, 0.0, 9.81, timestamp_ms);
        }

        let t = timestamp_ms as f32 / 1000.0;
        AccelData::new(
            (t * 2.0 * std::f32::consts::PI).sin() * 0.2,
            (t * 2.0 * std::f32::consts::PI).cos() * 0.1,
            9.81,
            timestamp_ms,
        )
    }
}

pub async fn accel_loop(
    tx: Sender<AccelData>,
    source: SensorSource,
    sample_interval: Duration,
    clock: MonotonicClock,
) {
    let mut ticker = interval(sample_interval);
    let mut sample_count = 0u64;
    let mut warned_unavailable = false;

    loop {
        ticker.tick().await;

        let now = clock.now_ms();
        let accel = match &source {
            SensorSource::Termux => match read_accelerometer(now) {
                Some(data) => data,
                None => {
                    // No fake data here: silence is reported by the health watchdog
                    if !warned_unavailable {
                        log::warn!("[sensor] termux-sensor unavailable, no samples will be delivered");
                        warned_unavailable = true;
                    }
                    continue;
                }
            },
            SensorSource::Mock(shaker) => shaker.reading_at(now),
        };

        match tx.try_send(accel) {
            Ok(_) => {
                sample_count += 1;
                if sample_count % 500 == 0 {
                    log::debug!("[sensor] {} samples", sample_count);
                }
            }
            Err(TrySendError::Closed(_)) => {
                log::info!("[sensor] Channel closed after {} samples", sample_count);
                break;
            }
            Err(TrySendError::Full(_)) => {
                // Channel full, drop this sample
            }
        }
    }
}

fn read_accelerometer(timestamp_ms: u64) -> Option<AccelData> {
    let output = Command::new("termux-sensor")
        .arg("-n")
        .arg("1")
        .arg("-s")
        .arg("accelerometer")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    parse_accel_output(&text, timestamp_ms)
}

/// Parse one `termux-sensor` reading.
///
/// Accepts the JSON form (`{"<sensor name>": {"values": [x, y, z]}}`) and the
/// legacy `x=.., y=.., z=..` text form.
pub fn parse_accel_output(output: &str, timestamp_ms: u64) -> Option<AccelData> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(output) {
        let values = value
            .as_object()?
            .values()
            .find_map(|sensor| sensor.get("values"))?
            .as_array()?;
        if values.len() < 3 {
            return None;
        }
        let axis = |i: usize| values[i].as_f64().map(|v| v as f32);
        return Some(AccelData::new(axis(0)?, axis(1)?, axis(2)?, timestamp_ms));
    }

    let mut x = None;
    let mut y = None;
    let mut z = None;
    for part in output.split(',') {
        let part = part.trim();
        let part = part.rsplit(' ').next().unwrap_or(part);
        if let Some(val_str) = part.strip_prefix("x=") {
            x = val_str.trim().parse().ok();
        } else if let Some(val_str) = part.strip_prefix("y=") {
            y = val_str.trim().parse().ok();
        } else if let Some(val_str) = part.strip_prefix("z=") {
            z = val_str.trim().parse().ok();
        }
    }

    Some(AccelData::new(x?, y?, z?, timestamp_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_magnitude_is_euclidean_norm() {
        assert_relative_eq!(SampleFilter::magnitude(3.0, 4.0, 0.0), 5.0);
        assert_relative_eq!(SampleFilter::magnitude(0.0, 0.0, 0.0), 0.0);
        assert_relative_eq!(
            SampleFilter::magnitude(-1.0, -2.0, 2.0),
            3.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_apply_keeps_timestamp() {
        let sample = SampleFilter::apply(&AccelData::new(0.0, 0.0, 9.81, 1234));
        assert_eq!(sample.timestamp_ms, 1234);
        assert_relative_eq!(sample.magnitude, 9.81, epsilon = 1e-5);
    }

    #[test]
    fn test_parse_termux_json() {
        let json = r#"{"BMI160 Accelerometer": {"values": [0.5, -0.25, 9.75]}}"#;
        let accel = parse_accel_output(json, 42).unwrap();
        assert_eq!(accel.timestamp_ms, 42);
        assert_relative_eq!(accel.x, 0.5);
        assert_relative_eq!(accel.y, -0.25);
        assert_relative_eq!(accel.z, 9.75);
    }

    #[test]
    fn test_parse_legacy_text() {
        let text = "Accelerometer event: x=0.5, y=0.3, z=9.8, accuracy=0, timestamp=1";
        let accel = parse_accel_output(text, 7).unwrap();
        assert_relative_eq!(accel.x, 0.5);
        assert_relative_eq!(accel.y, 0.3);
        assert_relative_eq!(accel.z, 9.8);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_accel_output("", 0).is_none());
        assert!(parse_accel_output("{}", 0).is_none());
        assert!(parse_accel_output(r#"{"a": {"values": [1.0]}}"#, 0).is_none());
    }

    #[test]
    fn test_mock_shaker_emits_double_shake() {
        let shaker = MockShaker::default();
        let rest = SampleFilter::apply(&shaker.reading_at(0));
        let first = SampleFilter::apply(&shaker.reading_at(1010));
        let second = SampleFilter::apply(&shaker.reading_at(1810));
        assert!(rest.magnitude < 11.0);
        assert!(first.magnitude > 20.0);
        assert!(second.magnitude > 20.0);
        // next cycle repeats
        let again = SampleFilter::apply(&shaker.reading_at(6000 + 1010));
        assert_relative_eq!(again.magnitude, first.magnitude, epsilon = 1e-4);
    }
}
