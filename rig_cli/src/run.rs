//! One full test cycle on the simulated rig: heat, insert, retract, acknowledge.

use crate::cli::LAST_BUDGET_MS;
use eyre::Result;
use rig_core::{
    CommandError, ControllerCfg, CsvRunRecorder, InterlockState, Notice, Phase, PollCfg,
    ProcessSnapshot, RecordedSample, RecorderCfg, RejectReason, Rig, RigError, RunHandle,
    RunRecorder, SessionConfig,
};
use rig_hardware::{SimCfg, SimulatedRig};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How often the driver wakes up to check the shutdown flag and the deadline.
const TICK: Duration = Duration::from_millis(20);

/// Reasons the CLI gives up on a run on its own.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RunAbort {
    #[error("run interrupted by operator")]
    Interrupted,
    #[error("max run time of {0} ms was exceeded")]
    MaxRuntime(u64),
    #[error("heating required: bath must reach {target_c:.1} °C before the run can start")]
    HeatingRequired {
        current_c: Option<f64>,
        target_c: f64,
    },
    #[error("controller stopped unexpectedly")]
    ControllerGone,
}

impl RunAbort {
    pub fn name(&self) -> &'static str {
        match self {
            RunAbort::Interrupted => "Interrupted",
            RunAbort::MaxRuntime(_) => "MaxRuntime",
            RunAbort::HeatingRequired { .. } => "HeatingRequired",
            RunAbort::ControllerGone => "ControllerGone",
        }
    }
}

pub struct RunOpts {
    pub max_run_ms: u64,
    pub auto_heat: bool,
    /// Print one line per reached curve while the run is going.
    pub progress: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurveHit {
    pub label: String,
    pub distance_mm: f64,
    pub elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub session: String,
    pub completed: bool,
    pub final_phase: Phase,
    pub duration_ms: u64,
    pub curves_total: usize,
    pub curves_reached: Vec<CurveHit>,
    pub interlock_pauses: u32,
    pub samples_recorded: u64,
    pub run_log: Option<PathBuf>,
}

pub fn sim_cfg(s: &rig_config::Simulator) -> SimCfg {
    SimCfg {
        step_mm: s.step_mm,
        heat_step_c: s.heat_step_c,
        cool_step_c: s.cool_step_c,
        ambient_c: s.ambient_c,
        start_temperature_c: s.start_temperature_c,
        force_per_mm: s.force_per_mm,
    }
}

#[derive(Debug, Default)]
struct Tally {
    path: Option<PathBuf>,
    samples: u64,
}

/// Counts what the wrapped recorder persisted so the summary can report it.
struct TallyRecorder<R> {
    inner: R,
    tally: Arc<Mutex<Tally>>,
}

impl<R: RunRecorder> RunRecorder for TallyRecorder<R> {
    fn start_run(&mut self, session: &SessionConfig) -> std::result::Result<RunHandle, RigError> {
        let handle = self.inner.start_run(session)?;
        if let Ok(mut t) = self.tally.lock() {
            t.path = handle.path.clone();
            t.samples = 0;
        }
        Ok(handle)
    }

    fn append_sample(&mut self, sample: &RecordedSample) -> std::result::Result<(), RigError> {
        self.inner.append_sample(sample)?;
        if let Ok(mut t) = self.tally.lock() {
            t.samples += 1;
        }
        Ok(())
    }

    fn stop_run(&mut self) -> std::result::Result<(), RigError> {
        self.inner.stop_run()
    }
}

/// Deadline and operator interrupt shared by every wait of one run.
struct Watch {
    shutdown: Arc<AtomicBool>,
    deadline: Instant,
    budget_ms: u64,
}

impl Watch {
    fn check(&self) -> Result<()> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(RunAbort::Interrupted.into());
        }
        if Instant::now() >= self.deadline {
            return Err(RunAbort::MaxRuntime(self.budget_ms).into());
        }
        Ok(())
    }
}

pub fn run_session(
    cfg: &rig_config::Config,
    session: &rig_config::SessionFile,
    opts: &RunOpts,
    shutdown: Arc<AtomicBool>,
) -> Result<RunSummary> {
    let _ = LAST_BUDGET_MS.set(opts.max_run_ms);
    let tally = Arc::new(Mutex::new(Tally::default()));
    let recorder = TallyRecorder {
        inner: CsvRunRecorder::new(&RecorderCfg::from(&cfg.recorder)),
        tally: Arc::clone(&tally),
    };

    let rig = Rig::builder()
        .with_link(SimulatedRig::new(sim_cfg(&cfg.simulator)))
        .with_recorder(recorder)
        .with_controller_cfg(ControllerCfg::from(cfg))
        .with_poll_cfg(PollCfg::from(cfg))
        .with_session(SessionConfig::from(session))
        .build()?;

    tracing::info!(
        session = %session.name,
        max_run_ms = opts.max_run_ms,
        auto_heat = opts.auto_heat,
        "run start"
    );
    let started = Instant::now();
    let watch = Watch {
        shutdown,
        deadline: started + Duration::from_millis(opts.max_run_ms),
        budget_ms: opts.max_run_ms,
    };
    let mut summary = RunSummary {
        session: session.name.clone(),
        completed: false,
        final_phase: Phase::Ready,
        duration_ms: 0,
        curves_total: session.curves.len(),
        curves_reached: Vec::new(),
        interlock_pauses: 0,
        samples_recorded: 0,
        run_log: None,
    };

    let outcome = drive(&rig, &watch, opts, &mut summary);
    if let Ok(snap) = rig.snapshot() {
        summary.final_phase = snap.phase;
    }
    // Disables the actuator and the heater even when the run failed.
    rig.shutdown();
    outcome?;

    summary.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    if let Ok(t) = tally.lock() {
        summary.samples_recorded = t.samples;
        summary.run_log.clone_from(&t.path);
    }
    tracing::info!(
        session = %summary.session,
        duration_ms = summary.duration_ms,
        curves = summary.curves_reached.len(),
        "run complete"
    );
    Ok(summary)
}

fn drive(rig: &Rig, watch: &Watch, opts: &RunOpts, summary: &mut RunSummary) -> Result<()> {
    let notices = rig.notices();
    wait_for(rig, watch, |s| s.connected)?;
    start_when_warm(rig, watch, opts.auto_heat)?;

    loop {
        watch.check()?;
        let notice = match notices.recv_timeout(TICK) {
            Ok(n) => n,
            Err(e) if e.is_timeout() => continue,
            Err(_) => return Err(RunAbort::ControllerGone.into()),
        };
        match notice {
            Notice::CurveReached {
                label,
                distance_mm,
                elapsed_ms,
            } => {
                if opts.progress {
                    println!("curve {label:?} reached at {distance_mm:.1} mm ({elapsed_ms} ms)");
                }
                summary.curves_reached.push(CurveHit {
                    label,
                    distance_mm,
                    elapsed_ms,
                });
            }
            Notice::PhaseChanged {
                to: Phase::InsertionCompleted,
                ..
            } => {
                rig.retract()?;
            }
            Notice::PhaseChanged {
                to: Phase::Paused | Phase::RetractionPaused,
                ..
            } => {
                // Nothing else pauses a CLI run: the bath cooled below target.
                summary.interlock_pauses += 1;
                start_when_warm(rig, watch, opts.auto_heat)?;
            }
            Notice::PhaseChanged {
                to: Phase::RetractionCompleted,
                ..
            } => {
                rig.acknowledge()?;
                summary.completed = true;
                return Ok(());
            }
            Notice::Connectivity { connected: false } => {
                tracing::warn!("device link lost; telemetry is simulated until it returns");
            }
            _ => {}
        }
    }
}

/// Start (or resume) motion, heating the bath first when allowed to.
fn start_when_warm(rig: &Rig, watch: &Watch, auto_heat: bool) -> Result<()> {
    loop {
        watch.check()?;
        match rig.start() {
            Ok(phase) => {
                tracing::info!(%phase, "motion started");
                return Ok(());
            }
            Err(CommandError::Rejected(RejectReason::HeatingRequired)) => {
                let snap = rig.snapshot()?;
                if !auto_heat {
                    return Err(RunAbort::HeatingRequired {
                        current_c: snap.last_reading.map(|r| r.temperature_c),
                        target_c: snap.interlock.target_temperature_c.unwrap_or_default(),
                    }
                    .into());
                }
                if snap.interlock.state != InterlockState::HeaterOn {
                    rig.heater(true)?;
                    tracing::info!(
                        target_c = snap.interlock.target_temperature_c,
                        "heater on, waiting for bath temperature"
                    );
                }
                wait_for(rig, watch, |s| s.interlock.is_heating_complete)?;
            }
            Err(CommandError::Rejected(RejectReason::DeviceDisconnected)) => {
                wait_for(rig, watch, |s| s.connected)?;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn wait_for(rig: &Rig, watch: &Watch, done: impl Fn(&ProcessSnapshot) -> bool) -> Result<()> {
    loop {
        watch.check()?;
        if done(&rig.snapshot()?) {
            return Ok(());
        }
        std::thread::sleep(TICK);
    }
}
