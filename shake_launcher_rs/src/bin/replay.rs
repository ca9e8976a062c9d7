use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use flate2::read::GzDecoder;
use serde::Serialize;
use serde_json::json;
use shake_launcher_rs::settings::{JsonFileSettingsStore, SettingsStore};
use shake_launcher_rs::{
    AccelData, DetectionPolicy, LatchMode, SampleFilter, ShakeDetector, ShakeEvent,
};

#[derive(Parser, Debug)]
#[command(about = "Replay a recorded accelerometer trace through the shake detector")]
struct Args {
    /// Trace file: JSON array or JSON lines of {timestamp_ms, x, y, z} (.gz ok)
    #[arg(long)]
    trace: PathBuf,

    /// Take the policy from a settings file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Shake threshold (m/s²)
    #[arg(long)]
    threshold: Option<f64>,

    /// Minimum inter-shake delay
    #[arg(long)]
    min_delay_ms: Option<u64>,

    /// Maximum episode duration
    #[arg(long)]
    max_duration_ms: Option<u64>,

    #[arg(long, value_enum, default_value = "until-reset")]
    latch: LatchMode,

    /// Reset the detector after each confirmation, as a service that
    /// re-arms after launching would
    #[arg(long, default_value_t = false)]
    reset_after_confirm: bool,
}

#[derive(Serialize)]
struct EmittedEvent {
    timestamp_ms: u64,
    magnitude: f64,
    event: ShakeEvent,
    episode: Option<u64>,
}

fn load_trace(path: &Path) -> anyhow::Result<Vec<AccelData>> {
    let file = File::open(path)?;
    let mut text = String::new();
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        BufReader::new(GzDecoder::new(file)).read_to_string(&mut text)?;
    } else {
        BufReader::new(file).read_to_string(&mut text)?;
    }
    parse_trace(&text)
}

fn parse_trace(text: &str) -> anyhow::Result<Vec<AccelData>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    let mut samples = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let sample: AccelData = serde_json::from_str(line)
            .map_err(|e| anyhow::anyhow!("line {}: {}", lineno + 1, e))?;
        samples.push(sample);
    }
    Ok(samples)
}

fn build_policy(args: &Args) -> anyhow::Result<DetectionPolicy> {
    let mut policy = match args.settings.as_ref() {
        Some(path) => JsonFileSettingsStore::new(path).load()?.policy(),
        None => DetectionPolicy::default(),
    };
    if let Some(threshold) = args.threshold {
        policy.set_threshold(threshold);
    }
    if let Some(ms) = args.min_delay_ms {
        policy.set_min_inter_shake_delay(Duration::from_millis(ms));
    }
    if let Some(ms) = args.max_duration_ms {
        policy.set_max_episode_duration(Duration::from_millis(ms));
    }
    Ok(policy)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let policy = build_policy(&args)?;
    let samples = load_trace(&args.trace)?;
    let mut detector = ShakeDetector::new(args.latch);
    let mut peak_magnitude = 0.0f64;
    for reading in &samples {
        let sample = SampleFilter::apply(reading);
        if sample.magnitude > peak_magnitude {
            peak_magnitude = sample.magnitude;
        }
        let event = detector.observe(&policy, sample);
        if event == ShakeEvent::NoOp {
            continue;
        }
        let emitted = EmittedEvent {
            timestamp_ms: sample.timestamp_ms,
            magnitude: sample.magnitude,
            event,
            episode: match event {
                ShakeEvent::EpisodeExpired => None,
                _ => detector.episode_id().map(|id| id.0),
            },
        };
        println!("{}", serde_json::to_string(&emitted)?);

        if event == ShakeEvent::GestureConfirmed && args.reset_after_confirm {
            detector.reset();
        }
    }

    let stats = detector.stats();
    let span_ms = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => last.timestamp_ms.saturating_sub(first.timestamp_ms),
        _ => 0,
    };
    let summary = json!({
        "trace": args.trace.display().to_string(),
        "samples": samples.len(),
        "span_ms": span_ms,
        "peak_magnitude": peak_magnitude,
        "policy": {
            "shake_threshold": policy.shake_threshold(),
            "min_inter_shake_delay_ms": policy.min_inter_shake_delay().as_millis() as u64,
            "max_episode_duration_ms": policy.max_episode_duration().as_millis() as u64,
        },
        "stats": stats,
        "final_phase": detector.phase(),
        "confirmed": detector.is_confirmed(),
    });
    eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_array_and_lines() {
        let array = r#"[{"timestamp_ms": 0, "x": 20.0, "y": 0.0, "z": 9.81},
                        {"timestamp_ms": 20, "x": 0.0, "y": 0.0, "z": 9.81}]"#;
        assert_eq!(parse_trace(array).unwrap().len(), 2);

        let lines = "{\"timestamp_ms\": 0, \"x\": 1.0, \"y\": 2.0, \"z\": 3.0}\n\n\
                     {\"timestamp_ms\": 5, \"x\": 1.0, \"y\": 2.0, \"z\": 3.0}\n";
        let parsed = parse_trace(lines).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].timestamp_ms, 5);
    }

    #[test]
    fn test_bad_line_reports_position() {
        let err = parse_trace("{\"timestamp_ms\": 0, \"x\": 1, \"y\": 2, \"z\": 3}\nnope\n")
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
