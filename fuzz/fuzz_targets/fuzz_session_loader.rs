#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let Ok(session) = rig_config::load_session_toml(data) else {
        return;
    };
    if session.validate().is_ok() {
        // Curve labels are unique and bounded once validation passes.
        assert!(session.curves.len() <= rig_config::MAX_CURVES);
        let unreachable = session.unreachable_curves();
        assert!(unreachable.len() <= session.curves.len());
    }
});
