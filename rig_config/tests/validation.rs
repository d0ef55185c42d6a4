use rig_config::{MAX_CURVES, load_session_file, load_session_toml, load_toml};
use rstest::rstest;
use std::fs;
use tempfile::tempdir;

#[test]
fn rejects_zero_process_interval() {
    let toml = r#"
[poll]
process_interval_ms = 0
manual_interval_ms = 500
"#;

    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject process_interval_ms=0");
    assert!(
        format!("{err}")
            .to_lowercase()
            .contains("poll.process_interval_ms must be >= 1")
    );
}

#[test]
fn rejects_read_timeout_longer_than_poll_interval() {
    let toml = r#"
[poll]
process_interval_ms = 1500

[timeouts]
read_ms = 2000
command_ms = 500
"#;

    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("read timeout must fit in one tick");
    assert!(format!("{err}").contains("timeouts.read_ms"));
}

#[test]
fn accepts_sensor_ms_alias() {
    let toml = r#"
[timeouts]
sensor_ms = 250
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    assert_eq!(cfg.timeouts.read_ms, 250);
    assert_eq!(cfg.timeouts.command_ms, 1000);
    cfg.validate().expect("valid config should pass");
}

#[test]
fn rejects_unknown_rounding_mode() {
    assert!(load_toml("[tolerance]\nrounding = \"ceil\"\n").is_err());
    let cfg = load_toml("[tolerance]\nrounding = \"nearest\"\n").expect("parse TOML");
    assert_eq!(cfg.tolerance.rounding, rig_config::DistanceRounding::Nearest);
}

#[rstest]
#[case("[tolerance]\ndistance_mm = 11", "tolerance.distance_mm")]
#[case("[interlock]\ndrop_hysteresis_c = -0.5", "interlock.drop_hysteresis_c")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation")]
#[case("[simulator]\nstep_mm = 0.0", "simulator.step_mm")]
#[case("[recorder]\ndir = \"  \"", "recorder.dir")]
fn rejects_invalid_sections(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "expected {needle:?} in {err}"
    );
}

fn session_with_curves(n: usize) -> String {
    let mut s = String::from(
        r#"
name = "sweep"
target_distance_mm = 500.0
force_threshold_mn = 2000.0
target_temperature_c = 37.0
"#,
    );
    for i in 0..n {
        s.push_str(&format!(
            "\n[[curves]]\nlabel = \"c{i}\"\ndistance_mm = {}.0\n",
            (i + 1) * 10
        ));
    }
    s
}

#[test]
fn accepts_max_curves() {
    let session = load_session_toml(&session_with_curves(MAX_CURVES)).expect("parse");
    session.validate().expect("20 curves are allowed");
    assert_eq!(session.curves.len(), MAX_CURVES);
    assert!(session.retraction_stroke_mm.is_none());
}

#[test]
fn rejects_too_many_curves() {
    let session = load_session_toml(&session_with_curves(MAX_CURVES + 1)).expect("parse");
    let err = session.validate().expect_err("21 curves must be rejected");
    assert!(format!("{err}").contains("at most 20"));
}

#[test]
fn rejects_duplicate_curve_labels() {
    let toml = r#"
name = "dup"
target_distance_mm = 500.0
force_threshold_mn = 2000.0
target_temperature_c = 37.0

[[curves]]
label = "A"
distance_mm = 100.0

[[curves]]
label = "A"
distance_mm = 200.0
"#;
    let session = load_session_toml(toml).expect("parse");
    let err = session.validate().expect_err("duplicate labels");
    assert!(format!("{err}").contains("duplicated"));
}

#[rstest]
#[case("name = \"\"\ntarget_distance_mm = 1.0\nforce_threshold_mn = 1.0\ntarget_temperature_c = 37.0", "session.name")]
#[case("name = \"x\"\ntarget_distance_mm = 0.0\nforce_threshold_mn = 1.0\ntarget_temperature_c = 37.0", "session.target_distance_mm")]
#[case("name = \"x\"\ntarget_distance_mm = 1.0\nforce_threshold_mn = -1.0\ntarget_temperature_c = 37.0", "session.force_threshold_mn")]
#[case("name = \"x\"\ntarget_distance_mm = 1.0\nforce_threshold_mn = 1.0\ntarget_temperature_c = 37.0\nretraction_stroke_mm = 0.0", "session.retraction_stroke_mm")]
fn rejects_invalid_sessions(#[case] toml: &str, #[case] needle: &str) {
    let session = load_session_toml(toml).expect("parse");
    let err = session.validate().expect_err("should be rejected");
    assert!(format!("{err}").contains(needle), "expected {needle:?} in {err}");
}

#[test]
fn session_file_loader_reports_path_on_parse_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "name = ").unwrap();
    let err = load_session_file(&path).expect_err("broken TOML");
    assert!(format!("{err}").contains("broken.toml"));
}

#[test]
fn session_file_loader_validates() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ok.toml");
    fs::write(&path, session_with_curves(2)).unwrap();
    let session = load_session_file(&path).expect("valid session");
    assert_eq!(session.name, "sweep");
    assert_eq!(session.curves[1].label, "c1");
}
