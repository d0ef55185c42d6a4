//! Human-readable error descriptions and structured JSON error formatting.

use crate::cli::LAST_BUDGET_MS;
use crate::run::RunAbort;
use rig_core::{BuildError, CommandError, RejectReason, RigError};

fn explain(what: &str, causes: &str, fix: &str) -> String {
    format!("What happened: {what}\nLikely causes: {causes}\nHow to fix: {fix}")
}

fn humanize_rig_error(e: &RigError) -> String {
    match e {
        RigError::Timeout => explain(
            "The device controller did not answer in time.",
            "Serial link stalled, controller busy, or timeouts configured too low.",
            "Check the controller, then consider raising timeouts.command_ms / timeouts.read_ms.",
        ),
        RigError::Connectivity(msg) => explain(
            &format!("The device link is down ({msg})."),
            "Cable unplugged, controller powered off, or port in use.",
            "Reconnect the controller and retry; telemetry is simulated while it is away.",
        ),
        RigError::Protocol(msg) => explain(
            &format!("The device sent a malformed reply ({msg})."),
            "Firmware mismatch or line noise.",
            "Verify the controller firmware version and cabling.",
        ),
        RigError::DeviceFault(msg) => explain(
            &format!("The device refused a command ({msg})."),
            "Controller fault or an interlock on the controller side.",
            "Inspect the controller's fault display, then reset the rig.",
        ),
        other => format!(
            "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        ),
    }
}

fn humanize_reject(r: &RejectReason) -> String {
    match r {
        RejectReason::HeatingRequired => explain(
            "Start was declined: heating required.",
            "The bath is below the session's target temperature.",
            "Turn the heater on and wait, or pass --auto-heat.",
        ),
        RejectReason::NoSessionBound => explain(
            "No configuration bound.",
            "A command arrived before a session was loaded.",
            "Pass a valid --session file.",
        ),
        RejectReason::DeviceDisconnected => explain(
            "Command declined: device disconnected.",
            "The controller stopped answering before the command was sent.",
            "Reconnect the controller and retry.",
        ),
        other => explain(
            &format!("Command declined: {other}."),
            "The rig was not in a state that accepts this command.",
            "Check the current phase with --log-level=debug and retry.",
        ),
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(abort) = err.downcast_ref::<RunAbort>() {
        return match abort {
            RunAbort::Interrupted => explain(
                "The run was interrupted (Ctrl-C).",
                "Operator stop.",
                "The actuator and heater were disabled; start a new run when ready.",
            ),
            RunAbort::MaxRuntime(ms) => explain(
                &format!("max run time was exceeded ({ms} ms)."),
                "Slow bath heating, a stalled actuator, or a budget that is too tight.",
                "Raise --max-run-ms or check the rig mechanics.",
            ),
            RunAbort::HeatingRequired {
                current_c,
                target_c,
            } => {
                let now = current_c.map_or_else(|| "unknown".to_string(), |t| format!("{t:.1} °C"));
                explain(
                    &format!("Heating required: bath is at {now}, target is {target_c:.1} °C."),
                    "The heater is off or the bath has not warmed up yet.",
                    "Re-run with --auto-heat, or heat the bath before starting.",
                )
            }
            RunAbort::ControllerGone => explain(
                "The controller thread stopped unexpectedly.",
                "A panic inside the controller; see the log output.",
                "Re-run with --log-level=debug and report the log.",
            ),
        };
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingLink => explain(
                "No device link was provided to the rig.",
                "The device controller failed to initialize or was not wired into the builder.",
                "Ensure the link is created successfully and passed via with_link(...).",
            ),
            BuildError::InvalidConfig(msg) => explain(
                &format!("Invalid configuration ({msg})."),
                "Missing or out-of-range values in the TOML.",
                "Edit the config file, then rerun.",
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CommandError>() {
        return match ce {
            CommandError::Rejected(reason) => humanize_reject(reason),
            CommandError::Device(e) => humanize_rig_error(e),
            CommandError::Stopped => explain(
                "The controller is not running.",
                "It shut down before the command was delivered.",
                "Start a new run.",
            ),
        };
    }

    if let Some(re) = err.downcast_ref::<RigError>() {
        return humanize_rig_error(re);
    }

    // String-based heuristics for errors coming from config or session loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.starts_with("read config") || lower.starts_with("read session") {
        return explain(
            &format!("A file could not be read ({msg})."),
            "Wrong path or missing permissions.",
            "Check the --config / --session path.",
        );
    }

    if lower.starts_with("session.") || lower.starts_with("parse session") {
        return explain(
            &format!("Session file is invalid ({msg})."),
            "Missing fields, duplicated curve labels, or non-positive targets.",
            "Edit the session TOML and run `trackrig validate --session FILE`.",
        );
    }

    if lower.starts_with("parse config") || lower.contains(" must ") {
        return explain(
            &format!("Configuration is invalid ({msg})."),
            "Out-of-range values or a typo in the TOML.",
            "Edit the config file and try again.",
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes. Anything not listed returns 1; clap usage errors use 2.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(abort) = err.downcast_ref::<RunAbort>() {
        return match abort {
            RunAbort::Interrupted => 130,
            RunAbort::HeatingRequired { .. } => 3,
            RunAbort::MaxRuntime(_) => 4,
            RunAbort::ControllerGone => 5,
        };
    }
    match err.downcast_ref::<CommandError>() {
        Some(CommandError::Rejected(_)) => 6,
        Some(CommandError::Device(_) | CommandError::Stopped) => 5,
        None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let msg = humanize(err);
    if let Some(abort) = err.downcast_ref::<RunAbort>() {
        let details = match abort {
            RunAbort::MaxRuntime(ms) => Some(json!({ "max_run_ms": LAST_BUDGET_MS.get().copied().unwrap_or(*ms) })),
            RunAbort::HeatingRequired {
                current_c,
                target_c,
            } => Some(json!({ "current_c": current_c, "target_c": target_c })),
            RunAbort::Interrupted | RunAbort::ControllerGone => None,
        };
        let obj = match details {
            Some(d) => json!({ "reason": abort.name(), "details": d, "message": msg }),
            None => json!({ "reason": abort.name(), "message": msg }),
        };
        return obj.to_string();
    }
    if let Some(CommandError::Rejected(reason)) = err.downcast_ref::<CommandError>() {
        return json!({ "reason": "Rejected", "code": reason.code(), "message": msg }).to_string();
    }

    // Generic error JSON
    json!({ "reason": "Error", "message": msg }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RunAbort::Interrupted, 130)]
    #[case(RunAbort::HeatingRequired { current_c: Some(30.0), target_c: 37.0 }, 3)]
    #[case(RunAbort::MaxRuntime(5), 4)]
    #[case(RunAbort::ControllerGone, 5)]
    fn run_aborts_have_stable_exit_codes(#[case] abort: RunAbort, #[case] code: i32) {
        assert_eq!(exit_code_for_error(&eyre::Report::new(abort)), code);
    }

    #[test]
    fn rejected_command_maps_to_code_and_json() {
        let err = eyre::Report::new(CommandError::Rejected(RejectReason::RetractNotEnabled));
        assert_eq!(exit_code_for_error(&err), 6);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["code"], "retract_not_enabled");
        assert!(v["message"].as_str().unwrap().contains("retraction not enabled"));
    }

    #[test]
    fn device_timeout_is_explained() {
        let err = eyre::Report::new(CommandError::Device(RigError::Timeout));
        assert!(humanize(&err).starts_with("What happened: The device controller did not answer"));
    }

    #[test]
    fn session_validation_messages_are_recognised() {
        let err = eyre::eyre!("session.curves[1].label \"arch\" is duplicated");
        let text = humanize(&err);
        assert!(text.contains("Session file is invalid"));
        assert_eq!(exit_code_for_error(&err), 1);
    }

    #[test]
    fn heating_abort_json_carries_temperatures() {
        let err = eyre::Report::new(RunAbort::HeatingRequired {
            current_c: None,
            target_c: 37.0,
        });
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "HeatingRequired");
        assert_eq!(v["details"]["target_c"], 37.0);
        assert!(v["details"]["current_c"].is_null());
    }
}
