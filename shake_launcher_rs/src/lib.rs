//! Double-shake gesture detection and app launching.
//!
//! Accelerometer readings are reduced to magnitudes ([`sensors::SampleFilter`]),
//! folded into a two-shake state machine ([`detector::ShakeDetector`]) under a
//! shared [`policy::DetectionPolicy`], and a confirmed gesture is turned into a
//! wake → foreground → launch sequence by [`dispatcher::GestureDispatcher`].
//! [`service::ShakeService`] wires these together for the daemon and the JNI
//! bridge.

pub mod control;
pub mod detector;
pub mod dispatcher;
pub mod error;
pub mod health_monitor;
pub mod live_status;
pub mod platform;
pub mod policy;
pub mod sensors;
pub mod service;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use detector::{EpisodeId, LatchMode, Phase, ShakeDetector, ShakeEvent};
pub use dispatcher::{DispatchConfig, DispatchDecision, DispatchReport, GestureDispatcher};
pub use error::{LauncherError, LauncherResult};
pub use platform::{LaunchOutcome, Platform};
pub use policy::{DetectionPolicy, PolicyHandle, TimingBounds};
pub use sensors::{AccelData, Sample, SampleFilter};
pub use service::{ServiceCommand, ServiceConfig, ServiceEvent, ShakeService};
pub use settings::{LauncherSettings, SettingsStore};
