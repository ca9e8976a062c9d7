use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use shake_launcher_rs::control::{self, ControlCommand};
use shake_launcher_rs::dispatcher::{
    DispatchConfig, DEFAULT_INSTALL_URL, DEFAULT_TARGET_PACKAGE,
};
use shake_launcher_rs::live_status::LiveStatus;
use shake_launcher_rs::platform::{LoggingPlatform, Platform, ShellPlatform};
use shake_launcher_rs::policy::PolicyHandle;
use shake_launcher_rs::sensors::{self, AccelData, MockShaker, MonotonicClock, SensorSource};
use shake_launcher_rs::service::{ServiceCommand, ServiceConfig, ServiceEvent, ShakeService};
use shake_launcher_rs::settings::{JsonFileSettingsStore, SettingsStore};
use shake_launcher_rs::LatchMode;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep, Duration};

#[derive(Parser, Debug)]
#[command(name = "shake_launcher")]
#[command(about = "Double-shake gesture launcher daemon", long_about = None)]
struct Args {
    /// Duration in seconds (0 = until `quit` or ctrl-c)
    #[arg(long, value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// Settings file (created on exit)
    #[arg(long, default_value = "shake_launcher_settings.json")]
    settings: PathBuf,

    /// Write live_status.json into this directory
    #[arg(long)]
    status_dir: Option<PathBuf>,

    /// Use the synthetic double-shake sensor instead of termux-sensor
    #[arg(long)]
    mock: bool,

    /// Log platform actions instead of performing them
    #[arg(long)]
    dry_run: bool,

    /// Accelerometer polling interval
    #[arg(long, default_value = "20")]
    sample_interval_ms: u64,

    /// Package to launch on a confirmed gesture
    #[arg(long, default_value = DEFAULT_TARGET_PACKAGE)]
    package: String,

    /// Where to send the user when the package is missing
    #[arg(long, default_value = DEFAULT_INSTALL_URL)]
    install_url: String,

    /// Package of the hosting app to bring to the front
    #[arg(long)]
    host_package: Option<String>,

    /// Delay between waking the display and launching
    #[arg(long, default_value = "1000")]
    launch_delay_ms: u64,

    /// How long the display is held on after a wake
    #[arg(long, default_value = "5000")]
    wake_hold_ms: u64,

    /// What ends a confirmed episode
    #[arg(long, value_enum, default_value = "until-reset")]
    latch: LatchMode,

    /// Re-arm detection once a gesture launch finished
    #[arg(long)]
    reset_after_launch: bool,

    #[arg(long, default_value = "10")]
    heartbeat_secs: u64,

    /// Shake threshold override (m/s², persisted on exit)
    #[arg(long)]
    threshold: Option<f64>,

    /// Minimum inter-shake delay override (persisted on exit)
    #[arg(long)]
    min_delay_ms: Option<u64>,

    /// Maximum episode duration override (persisted on exit)
    #[arg(long)]
    max_duration_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let store = JsonFileSettingsStore::new(&args.settings);
    let mut settings = store
        .load()
        .with_context(|| format!("loading {}", store.path().display()))?;

    let mut initial_policy = settings.policy();
    if let Some(threshold) = args.threshold {
        initial_policy.set_threshold(threshold);
    }
    if let Some(ms) = args.min_delay_ms {
        initial_policy.set_min_inter_shake_delay(Duration::from_millis(ms));
    }
    if let Some(ms) = args.max_duration_ms {
        initial_policy.set_max_episode_duration(Duration::from_millis(ms));
    }
    let policy = PolicyHandle::new(initial_policy);

    log::info!("[{}] Shake Launcher starting", ts_now());
    log::info!(
        "  Threshold: {:.2} m/s² (sensitivity {})",
        initial_policy.shake_threshold(),
        initial_policy.sensitivity_level()
    );
    log::info!(
        "  Window: {} ms < gap < {} ms",
        initial_policy.min_inter_shake_delay().as_millis(),
        initial_policy.max_episode_duration().as_millis()
    );
    log::info!("  Target: {}", args.package);
    log::info!("  Sensor: {}", if args.mock { "mock" } else { "termux-sensor" });
    log::info!("  Duration: {} seconds (0=continuous)", args.duration);

    let platform = if args.dry_run {
        Platform::from_shared(Arc::new(LoggingPlatform))
    } else {
        Platform::from_shared(Arc::new(ShellPlatform::new(args.host_package.clone())))
    };

    let dispatch = DispatchConfig {
        enabled: settings.shake_to_launch_enabled,
        target_package: args.package.clone(),
        install_url: args.install_url.clone(),
        wake_hold: Duration::from_millis(args.wake_hold_ms),
        launch_delay: Duration::from_millis(args.launch_delay_ms),
        ..DispatchConfig::default()
    };
    let config = ServiceConfig {
        detection_enabled: settings.detection_enabled,
        latch: args.latch,
        reset_after_launch: args.reset_after_launch,
        heartbeat_interval: Duration::from_secs(args.heartbeat_secs.max(1)),
        status_dir: args.status_dir.clone(),
        ..ServiceConfig::default()
    };
    let service = ShakeService::new(
        config,
        policy.subscribe(),
        dispatch,
        platform,
        Handle::current(),
    );

    // Event output
    let _printer = tokio::spawn(print_events(service.subscribe()));

    // Sensor
    let (sample_tx, sample_rx) = mpsc::channel::<AccelData>(100);
    let source = if args.mock {
        SensorSource::Mock(MockShaker::default())
    } else {
        SensorSource::Termux
    };
    let _accel_handle = tokio::spawn(sensors::accel_loop(
        sample_tx,
        source,
        Duration::from_millis(args.sample_interval_ms.max(1)),
        MonotonicClock::new(),
    ));

    // Control
    let (cmd_tx, cmd_rx) = mpsc::channel::<ServiceCommand>(16);
    let _control_handle = tokio::spawn(control_loop(spawn_stdin_reader(), cmd_tx.clone(), policy.clone()));

    let shutdown_tx = cmd_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("[{}] Interrupted, stopping...", ts_now());
            let _ = shutdown_tx.send(ServiceCommand::Shutdown).await;
        }
    });
    if args.duration > 0 {
        let duration_tx = cmd_tx.clone();
        let duration = Duration::from_secs(args.duration);
        tokio::spawn(async move {
            sleep(duration).await;
            log::info!("[{}] Duration reached, stopping...", ts_now());
            let _ = duration_tx.send(ServiceCommand::Shutdown).await;
        });
    }
    drop(cmd_tx);

    let final_status = service.run(sample_rx, cmd_rx).await;

    settings.set_policy(&policy.current());
    settings.detection_enabled = final_status.detection_enabled;
    settings.shake_to_launch_enabled = final_status.dispatch_enabled;
    store
        .save(&settings)
        .with_context(|| format!("saving {}", store.path().display()))?;

    print_final_stats(&final_status);
    Ok(())
}

/// Read stdin on a plain thread so a pending read never holds up exit.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn control_loop(
    mut lines: mpsc::Receiver<String>,
    commands: mpsc::Sender<ServiceCommand>,
    policy: PolicyHandle,
) {
    while let Some(line) = lines.recv().await {
        let command = match control::parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                log::warn!("[control] {}", e);
                log::info!("[control] {}", control::HELP);
                continue;
            }
        };

        if let Some(message) = command.apply_to_policy(&policy) {
            log::info!("[control] {}", message);
            continue;
        }

        if command == ControlCommand::Status {
            let (reply_tx, reply_rx) = oneshot::channel();
            if commands.send(ServiceCommand::Status(reply_tx)).await.is_err() {
                break;
            }
            if let Ok(status) = reply_rx.await {
                match serde_json::to_string(&status) {
                    Ok(json) => println!("{{\"kind\":\"status\",\"status\":{}}}", json),
                    Err(e) => log::warn!("[control] status encode failed: {}", e),
                }
            }
            continue;
        }

        if let Some(service_command) = command.service_command() {
            if commands.send(service_command).await.is_err() {
                break;
            }
        }
    }
}

async fn print_events(mut events: broadcast::Receiver<ServiceEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => println!("{}", json),
                Err(e) => log::warn!("[service] event encode failed: {}", e),
            },
            Err(broadcast::error::RecvError::Lagged(n)) => {
                log::warn!("[service] event printer lagged, {} events skipped", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_final_stats(status: &LiveStatus) {
    eprintln!("\n=== Final Stats ===");
    eprintln!("Uptime: {} s", status.uptime_seconds);
    eprintln!(
        "Samples: {} ({} rejected, {} dropped while disabled)",
        status.samples_seen, status.samples_rejected, status.samples_dropped_disabled
    );
    eprintln!(
        "Episodes: {} first shakes, {} confirmed, {} expired",
        status.first_shakes, status.confirmations, status.expiries
    );
    eprintln!(
        "Dispatch: {} scheduled, {} completed, {} failed",
        status.dispatches_scheduled, status.dispatches_completed, status.dispatches_failed
    );
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
