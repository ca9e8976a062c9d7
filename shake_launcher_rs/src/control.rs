//! Line-oriented control commands for the daemon.

use crate::error::{LauncherError, LauncherResult};
use crate::policy::{PolicyHandle, SENSITIVITY_LEVELS};
use crate::service::ServiceCommand;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    Reset,
    Launch,
    Threshold(f64),
    Sensitivity(u8),
    MinDelay(Duration),
    MaxDuration(Duration),
    Detection(bool),
    Dispatch(bool),
    Status,
    Quit,
}

pub const HELP: &str = "commands: reset | launch | threshold <f64> | sensitivity <1-5> | \
min-delay <ms> | max-duration <ms> | detection on|off | dispatch on|off | status | quit";

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> LauncherResult<Option<ControlCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    if let Some(extra) = words.next() {
        return Err(invalid(format!("unexpected argument '{}'", extra)));
    }

    let command = match (verb.to_ascii_lowercase().as_str(), arg) {
        ("reset", None) => ControlCommand::Reset,
        ("launch", None) => ControlCommand::Launch,
        ("status", None) => ControlCommand::Status,
        ("quit" | "exit", None) => ControlCommand::Quit,
        ("threshold", Some(v)) => {
            let value: f64 = v
                .parse()
                .map_err(|_| invalid(format!("threshold '{}' is not a number", v)))?;
            if !value.is_finite() {
                return Err(invalid(format!("threshold '{}' is not finite", v)));
            }
            ControlCommand::Threshold(value)
        }
        ("sensitivity", Some(v)) => match v.parse::<u8>() {
            Ok(level) if (1..=SENSITIVITY_LEVELS).contains(&level) => {
                ControlCommand::Sensitivity(level)
            }
            _ => {
                return Err(invalid(format!(
                    "sensitivity must be 1-{}, got '{}'",
                    SENSITIVITY_LEVELS, v
                )))
            }
        },
        ("min-delay", Some(v)) => ControlCommand::MinDelay(parse_millis(v)?),
        ("max-duration", Some(v)) => ControlCommand::MaxDuration(parse_millis(v)?),
        ("detection", Some(v)) => ControlCommand::Detection(parse_switch(v)?),
        ("dispatch", Some(v)) => ControlCommand::Dispatch(parse_switch(v)?),
        (verb, _) => return Err(invalid(format!("unknown or malformed command '{}'", verb))),
    };
    Ok(Some(command))
}

impl ControlCommand {
    /// Apply a policy command and describe the result. Other commands are
    /// left alone and yield `None`.
    pub fn apply_to_policy(&self, policy: &PolicyHandle) -> Option<String> {
        match *self {
            ControlCommand::Threshold(value) => {
                let applied = policy.update(|p| p.set_threshold(value));
                Some(format!("threshold = {:.2}", applied))
            }
            ControlCommand::Sensitivity(level) => {
                let applied = policy.update(|p| p.set_sensitivity_level(level));
                Some(format!("sensitivity {} -> threshold = {:.2}", level, applied))
            }
            ControlCommand::MinDelay(delay) => {
                let bounds = policy.update(|p| p.set_min_inter_shake_delay(delay));
                Some(format!(
                    "min delay = {} ms, max duration = {} ms",
                    bounds.min_inter_shake_delay.as_millis(),
                    bounds.max_episode_duration.as_millis()
                ))
            }
            ControlCommand::MaxDuration(duration) => {
                let bounds = policy.update(|p| p.set_max_episode_duration(duration));
                Some(format!(
                    "min delay = {} ms, max duration = {} ms",
                    bounds.min_inter_shake_delay.as_millis(),
                    bounds.max_episode_duration.as_millis()
                ))
            }
            _ => None,
        }
    }

    /// The service command this maps to, if any. `Status` needs a reply
    /// channel and is built by the caller.
    pub fn service_command(&self) -> Option<ServiceCommand> {
        match *self {
            ControlCommand::Reset => Some(ServiceCommand::Reset),
            ControlCommand::Launch => Some(ServiceCommand::LaunchNow),
            ControlCommand::Detection(on) => Some(ServiceCommand::SetDetectionEnabled(on)),
            ControlCommand::Dispatch(on) => Some(ServiceCommand::SetDispatchEnabled(on)),
            ControlCommand::Quit => Some(ServiceCommand::Shutdown),
            _ => None,
        }
    }
}

fn parse_millis(v: &str) -> LauncherResult<Duration> {
    v.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| invalid(format!("'{}' is not a duration in ms", v)))
}

fn parse_switch(v: &str) -> LauncherResult<bool> {
    match v.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(invalid(format!("expected on|off, got '{}'", v))),
    }
}

fn invalid(msg: String) -> LauncherError {
    LauncherError::InvalidParameters(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::DetectionPolicy;
    use approx::assert_relative_eq;

    fn parse(line: &str) -> ControlCommand {
        parse_command(line).unwrap().unwrap()
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse("reset"), ControlCommand::Reset);
        assert_eq!(parse("  LAUNCH "), ControlCommand::Launch);
        assert_eq!(parse("status"), ControlCommand::Status);
        assert_eq!(parse("quit"), ControlCommand::Quit);
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse("threshold 18.5"), ControlCommand::Threshold(18.5));
        assert_eq!(parse("sensitivity 3"), ControlCommand::Sensitivity(3));
        assert_eq!(
            parse("min-delay 700"),
            ControlCommand::MinDelay(Duration::from_millis(700))
        );
        assert_eq!(
            parse("max-duration 1500"),
            ControlCommand::MaxDuration(Duration::from_millis(1500))
        );
        assert_eq!(parse("detection off"), ControlCommand::Detection(false));
        assert_eq!(parse("dispatch on"), ControlCommand::Dispatch(true));
    }

    #[test]
    fn test_reject_bad_input() {
        for line in [
            "jump",
            "threshold",
            "threshold abc",
            "threshold NaN",
            "sensitivity 9",
            "min-delay -5",
            "detection maybe",
            "reset now",
            "threshold 1 2",
        ] {
            assert!(
                matches!(parse_command(line), Err(LauncherError::InvalidParameters(_))),
                "accepted '{}'",
                line
            );
        }
    }

    #[test]
    fn test_policy_commands_update_handle() {
        let policy = PolicyHandle::new(DetectionPolicy::default());

        let msg = parse("sensitivity 1").apply_to_policy(&policy).unwrap();
        assert!(msg.contains("30.00"));
        assert_relative_eq!(policy.current().shake_threshold(), 30.0);

        parse("min-delay 2500").apply_to_policy(&policy);
        assert_eq!(
            policy.current().max_episode_duration(),
            Duration::from_millis(2500)
        );

        assert!(parse("reset").apply_to_policy(&policy).is_none());
    }

    #[test]
    fn test_service_command_mapping() {
        assert!(matches!(
            parse("dispatch off").service_command(),
            Some(ServiceCommand::SetDispatchEnabled(false))
        ));
        assert!(matches!(
            parse("quit").service_command(),
            Some(ServiceCommand::Shutdown)
        ));
        assert!(parse("status").service_command().is_none());
        assert!(parse("threshold 20").service_command().is_none());
    }
}
