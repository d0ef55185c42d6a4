#![allow(dead_code)]

use rig_core::mocks::{ScriptedLink, SpyRecorder, measurement};
use rig_core::{ControllerCfg, ProcessController, SensorReading, SessionConfig};
use rig_traits::{Clock, ManualClock};
use std::sync::Arc;

pub type TestController = ProcessController<ScriptedLink, SpyRecorder>;

pub struct Bench {
    pub ctl: TestController,
    pub link: ScriptedLink,
    pub spy: SpyRecorder,
    pub clock: ManualClock,
}

pub fn session() -> SessionConfig {
    SessionConfig::new("trial", 500.0, 2000.0, 37.0)
        .with_curve("arch", 120.0)
        .with_curve("iliac", 300.0)
}

pub fn bench_with(cfg: ControllerCfg) -> Bench {
    let link = ScriptedLink::new();
    let spy = SpyRecorder::new();
    let clock = ManualClock::new();
    let epoch = clock.now();
    let ctl = ProcessController::with_clock(
        link.clone(),
        spy.clone(),
        cfg,
        Arc::new(clock.clone()),
        epoch,
    );
    Bench {
        ctl,
        link,
        spy,
        clock,
    }
}

pub fn bench() -> Bench {
    bench_with(ControllerCfg::default())
}

/// Bench with a bound session and one warm, real reading at zero.
pub fn ready_bench() -> Bench {
    let mut b = bench();
    b.ctl.bind_session(session()).unwrap();
    feed(&mut b.ctl, 0, 0.0, 37.5);
    b
}

pub fn real(ts: u64, distance_mm: f64, temperature_c: f64) -> SensorReading {
    SensorReading::real(ts, &measurement(distance_mm, distance_mm * 4.0, temperature_c))
}

pub fn simulated(ts: u64, distance_mm: f64, temperature_c: f64) -> SensorReading {
    SensorReading::simulated(ts, &measurement(distance_mm, distance_mm * 4.0, temperature_c))
}

pub fn feed(ctl: &mut TestController, ts: u64, distance_mm: f64, temperature_c: f64) {
    ctl.on_reading(&real(ts, distance_mm, temperature_c), true);
}
