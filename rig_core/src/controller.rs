//! Process controller: the state machine driving one insertion/retraction run.
//!
//! All mutations happen through `&mut self`, so a single owner (the runtime
//! actor, or a test) serializes user commands and telemetry. Device commands
//! are sent before the phase changes: a failed command leaves the phase as
//! it was.

use crate::config::ControllerCfg;
use crate::curve::{CurveStatus, CurveThresholdTracker};
use crate::error::{CommandError, RejectReason, RigError};
use crate::hw_error::map_hw_error;
use crate::interlock::{InterlockEvent, InterlockStatus, TemperatureInterlock};
use crate::recorder::{RecordedSample, RunRecorder};
use crate::session::SessionConfig;
use crate::status::{Notice, Phase};
use crate::types::{ChartSample, SensorReading};
use crate::util::within_mm;
use rig_traits::{Clock, DeviceCommand, DeviceLink, MonotonicClock};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Operator commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Start,
    Pause,
    Retract,
    Reset,
    /// Leave `RetractionCompleted` for `Ready`.
    Acknowledge,
    Heater {
        on: bool,
    },
}

impl UserCommand {
    pub fn name(&self) -> &'static str {
        match self {
            UserCommand::Start => "start",
            UserCommand::Pause => "pause",
            UserCommand::Retract => "retract",
            UserCommand::Reset => "reset",
            UserCommand::Acknowledge => "acknowledge",
            UserCommand::Heater { on: true } => "heater-on",
            UserCommand::Heater { on: false } => "heater-off",
        }
    }
}

/// Everything an operator surface needs to render the process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessSnapshot {
    pub phase: Phase,
    pub session: Option<String>,
    pub connected: bool,
    pub recording: bool,
    pub last_reading: Option<SensorReading>,
    pub chart: Vec<ChartSample>,
    pub curves: Vec<CurveStatus>,
    pub interlock: InterlockStatus,
}

pub struct ProcessController<L, R> {
    link: L,
    recorder: R,
    cfg: ControllerCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    phase: Phase,
    session: Option<SessionConfig>,
    curves: CurveThresholdTracker,
    interlock: TemperatureInterlock,
    chart: Vec<ChartSample>,
    run_origin_ms: u64,
    recording: bool,
    connected: bool,
    last_reading: Option<SensorReading>,
    last_temperature_c: Option<f64>,
    notices: Vec<Notice>,
    shut_down: bool,
}

impl<L, R> std::fmt::Debug for ProcessController<L, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessController")
            .field("phase", &self.phase)
            .field("session", &self.session.as_ref().map(|s| s.name.as_str()))
            .field("connected", &self.connected)
            .field("recording", &self.recording)
            .finish()
    }
}

impl<L: DeviceLink, R: RunRecorder> ProcessController<L, R> {
    pub fn new(link: L, recorder: R, cfg: ControllerCfg) -> Self {
        let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
        let epoch = clock.now();
        Self::with_clock(link, recorder, cfg, clock, epoch)
    }

    /// Construct with an explicit clock. `epoch` must be the same instant the
    /// poller stamps readings against.
    pub fn with_clock(
        link: L,
        recorder: R,
        cfg: ControllerCfg,
        clock: Arc<dyn Clock + Send + Sync>,
        epoch: Instant,
    ) -> Self {
        Self {
            link,
            recorder,
            interlock: TemperatureInterlock::new(cfg.interlock),
            cfg,
            clock,
            epoch,
            phase: Phase::Ready,
            session: None,
            curves: CurveThresholdTracker::default(),
            chart: Vec::new(),
            run_origin_ms: 0,
            recording: false,
            connected: false,
            last_reading: None,
            last_temperature_c: None,
            notices: Vec::new(),
            shut_down: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> Option<&SessionConfig> {
        self.session.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn chart(&self) -> &[ChartSample] {
        &self.chart
    }

    pub fn curves(&self) -> &CurveThresholdTracker {
        &self.curves
    }

    pub fn interlock_status(&self) -> InterlockStatus {
        self.interlock.status()
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            phase: self.phase,
            session: self.session.as_ref().map(|s| s.name.clone()),
            connected: self.connected,
            recording: self.recording,
            last_reading: self.last_reading,
            chart: self.chart.clone(),
            curves: self.curves.statuses().to_vec(),
            interlock: self.interlock.status(),
        }
    }

    /// Take the notices accumulated since the last call.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // ── Session binding ──────────────────────────────────────────────────────

    pub fn bind_session(&mut self, session: SessionConfig) -> Result<Phase, CommandError> {
        if !self.phase.accepts_session() {
            return Err(RejectReason::RunActive.into());
        }
        if session.curves.len() > rig_config::MAX_CURVES {
            return Err(RejectReason::TooManyCurves.into());
        }
        tracing::info!(
            session = %session.name,
            target_distance_mm = session.target_distance_mm,
            target_temperature_c = session.target_temperature_c,
            curves = session.curves.len(),
            "session bound"
        );
        self.curves =
            CurveThresholdTracker::new(&session.curves).with_rounding(self.cfg.rounding);
        self.interlock
            .set_target(Some(session.target_temperature_c), self.last_temperature_c);
        self.chart.clear();
        self.session = Some(session);
        Ok(self.phase)
    }

    pub fn unbind_session(&mut self) -> Result<Phase, CommandError> {
        if !self.phase.accepts_session() {
            return Err(RejectReason::RunActive.into());
        }
        if let Some(s) = self.session.take() {
            tracing::info!(session = %s.name, "session unbound");
        }
        self.curves = CurveThresholdTracker::default();
        self.interlock.set_target(None, self.last_temperature_c);
        self.chart.clear();
        Ok(self.phase)
    }

    // ── Commands ─────────────────────────────────────────────────────────────

    pub fn handle(&mut self, cmd: UserCommand) -> Result<Phase, CommandError> {
        let result = match cmd {
            UserCommand::Start => self.start(),
            UserCommand::Pause => self.pause(),
            UserCommand::Retract => self.retract(),
            UserCommand::Reset => self.reset(),
            UserCommand::Acknowledge => self.acknowledge(),
            UserCommand::Heater { on } => self.heater(on),
        };
        if let Err(CommandError::Rejected(reason)) = &result {
            tracing::info!(command = cmd.name(), phase = %self.phase, %reason, "command declined");
        }
        result
    }

    /// Begin a run from `Ready`, or resume from either paused phase.
    pub fn start(&mut self) -> Result<Phase, CommandError> {
        let resume = match self.phase {
            Phase::Ready => false,
            Phase::Paused | Phase::RetractionPaused => true,
            Phase::Homing => return Err(RejectReason::Homing.into()),
            other => return Err(RejectReason::InvalidPhase(other).into()),
        };
        let (target_distance_mm, force_threshold_mn) = self.gate_motion()?;
        self.send(DeviceCommand::Start {
            target_distance_mm,
            force_threshold_mn,
            resume,
        })?;
        self.interlock.clear_drop();
        if resume {
            let to = if self.phase == Phase::Paused {
                Phase::Insertion
            } else {
                Phase::Retraction
            };
            self.transition(to);
        } else {
            self.run_origin_ms = self.now_ms();
            self.chart.clear();
            self.curves.reset();
            self.begin_recording();
            self.transition(Phase::Insertion);
        }
        Ok(self.phase)
    }

    /// Halt a moving run. Outside `Insertion`/`Retraction` this is a no-op.
    pub fn pause(&mut self) -> Result<Phase, CommandError> {
        let to = match self.phase {
            Phase::Insertion => Phase::Paused,
            Phase::Retraction => Phase::RetractionPaused,
            _ => return Ok(self.phase),
        };
        self.send(DeviceCommand::Stop)?;
        self.transition(to);
        Ok(self.phase)
    }

    /// Begin retraction after insertion completed, or resume a paused one.
    pub fn retract(&mut self) -> Result<Phase, CommandError> {
        match self.phase {
            Phase::InsertionCompleted => {
                let stroke_mm = self
                    .session
                    .as_ref()
                    .map(|s| s.retraction_stroke_mm)
                    .ok_or(RejectReason::NoSessionBound)?;
                if !self.connected {
                    return Err(RejectReason::DeviceDisconnected.into());
                }
                self.send(DeviceCommand::Retract { stroke_mm })?;
                self.transition(Phase::Retraction);
                Ok(self.phase)
            }
            Phase::RetractionPaused => self.start(),
            _ => Err(RejectReason::RetractNotEnabled.into()),
        }
    }

    /// Re-home the actuator from any phase, discarding the current run.
    pub fn reset(&mut self) -> Result<Phase, CommandError> {
        self.send(DeviceCommand::Reset)?;
        self.chart.clear();
        self.curves.reset();
        self.interlock.clear();
        self.stop_recording();
        self.transition(Phase::Homing);
        Ok(self.phase)
    }

    pub fn acknowledge(&mut self) -> Result<Phase, CommandError> {
        if self.phase != Phase::RetractionCompleted {
            return Err(RejectReason::InvalidPhase(self.phase).into());
        }
        self.transition(Phase::Ready);
        Ok(self.phase)
    }

    pub fn heater(&mut self, on: bool) -> Result<Phase, CommandError> {
        self.interlock.begin_heater()?;
        let sent = self.send(DeviceCommand::Heater { on });
        self.interlock
            .finish_heater(on, sent.is_ok(), self.last_temperature_c);
        sent?;
        Ok(self.phase)
    }

    /// Device finished its homing cycle.
    pub fn homing_signal(&mut self) -> Phase {
        if self.phase == Phase::Homing {
            tracing::info!("homing complete");
            self.transition(Phase::Ready);
        } else {
            tracing::trace!(phase = %self.phase, "homing signal ignored");
        }
        self.phase
    }

    // ── Telemetry ────────────────────────────────────────────────────────────

    /// Feed one poller reading. `fresh` is false for duplicates of the
    /// previous reading; those are not recorded.
    pub fn on_reading(&mut self, reading: &SensorReading, fresh: bool) {
        let real = !reading.is_simulated();
        if real != self.connected {
            self.connected = real;
            if real {
                tracing::info!("device link restored");
            } else {
                tracing::warn!("device unreachable; telemetry is simulated");
            }
            self.notices.push(Notice::Connectivity { connected: real });
        }
        self.last_reading = Some(*reading);

        if fresh && (real || self.cfg.record_simulated) {
            self.record(reading);
        }
        // Placeholders never drive the process.
        if !real {
            return;
        }

        self.last_temperature_c = Some(reading.temperature_c);
        self.apply_interlock(reading.temperature_c);

        let elapsed_ms = reading.timestamp_ms.saturating_sub(self.run_origin_ms);
        match self.phase {
            Phase::Insertion => {
                self.push_chart(elapsed_ms, reading);
                for c in self.curves.evaluate(reading.distance_mm, elapsed_ms) {
                    tracing::info!(curve = %c.label, distance_mm = c.distance_mm, elapsed_ms, "curve reached");
                    self.notices.push(Notice::CurveReached {
                        label: c.label,
                        distance_mm: c.distance_mm,
                        elapsed_ms,
                    });
                }
                let target = self.session.as_ref().map(|s| s.target_distance_mm);
                if let Some(target) = target
                    && within_mm(
                        reading.distance_mm,
                        target,
                        self.cfg.tolerance_mm,
                        self.cfg.rounding,
                    )
                {
                    tracing::info!(distance_mm = reading.distance_mm, "insertion target reached");
                    self.transition(Phase::InsertionCompleted);
                }
            }
            Phase::Retraction => {
                self.push_chart(elapsed_ms, reading);
                if within_mm(
                    reading.distance_mm,
                    0.0,
                    self.cfg.tolerance_mm,
                    self.cfg.rounding,
                ) {
                    tracing::info!("retraction back at zero");
                    self.chart.clear();
                    self.curves.reset();
                    self.stop_recording();
                    self.transition(Phase::RetractionCompleted);
                }
            }
            _ => {}
        }
    }

    /// Best-effort device disable and recorder close. Never fails; errors are
    /// logged. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        if let Err(e) = self.send(DeviceCommand::Disable) {
            tracing::warn!(error = %e, "disable on shutdown failed");
        }
        self.stop_recording();
        tracing::info!(phase = %self.phase, "controller shut down");
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    fn transition(&mut self, to: Phase) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        tracing::info!(from = %from, to = %to, "phase changed");
        self.notices.push(Notice::PhaseChanged { from, to });
    }

    /// Session, connectivity and interlock guards shared by start and resume.
    /// Returns the insertion target and force threshold.
    fn gate_motion(&mut self) -> Result<(f64, f64), CommandError> {
        let Some(session) = self.session.as_ref() else {
            return Err(RejectReason::NoSessionBound.into());
        };
        let target_c = session.target_temperature_c;
        let motion = (session.target_distance_mm, session.force_threshold_mn);
        if !self.connected {
            return Err(RejectReason::DeviceDisconnected.into());
        }
        if let Err(reason) = self.interlock.check_start(self.last_temperature_c) {
            tracing::warn!(
                current_c = ?self.last_temperature_c,
                target_c,
                "start declined until the bath is at temperature"
            );
            self.notices.push(Notice::HeatingRequired {
                current_c: self.last_temperature_c,
                target_c,
            });
            return Err(reason.into());
        }
        Ok(motion)
    }

    fn send(&mut self, cmd: DeviceCommand) -> Result<(), RigError> {
        match self.link.send_command(cmd, self.cfg.command_timeout()) {
            Ok(()) => {
                tracing::debug!(command = cmd.name(), phase = %self.phase, "device command sent");
                Ok(())
            }
            Err(e) => {
                let err = map_hw_error(&*e);
                tracing::warn!(command = cmd.name(), error = %err, "device command failed");
                Err(err)
            }
        }
    }

    fn apply_interlock(&mut self, temperature_c: f64) {
        match self
            .interlock
            .observe(temperature_c, self.phase.is_progressing())
        {
            InterlockEvent::None => {}
            InterlockEvent::Satisfied => {
                tracing::info!(temperature_c, "bath at temperature");
                self.notices
                    .push(Notice::InterlockSatisfied { temperature_c });
            }
            InterlockEvent::Dropped => {
                let target_c = self
                    .session
                    .as_ref()
                    .map_or(f64::NAN, |s| s.target_temperature_c);
                tracing::warn!(temperature_c, target_c, "temperature dropped; pausing run");
                self.notices.push(Notice::TemperatureDrop {
                    temperature_c,
                    target_c,
                });
                // Retried on the next reading while the run keeps moving.
                if let Err(e) = self.pause() {
                    tracing::warn!(error = %e, "pause on temperature drop failed");
                }
            }
        }
    }

    fn push_chart(&mut self, elapsed_ms: u64, reading: &SensorReading) {
        self.chart.push(ChartSample {
            elapsed_ms,
            distance_mm: reading.distance_mm,
            force_mn: reading.force_mn,
        });
    }

    fn begin_recording(&mut self) {
        self.stop_recording();
        let Some(session) = self.session.as_ref() else {
            return;
        };
        match self.recorder.start_run(session) {
            Ok(handle) => {
                tracing::info!(run = %handle, "recording started");
                self.recording = true;
            }
            Err(e) => {
                tracing::warn!(error = %e, "recorder failed to start; run continues unrecorded");
            }
        }
    }

    fn stop_recording(&mut self) {
        if !self.recording {
            return;
        }
        self.recording = false;
        if let Err(e) = self.recorder.stop_run() {
            tracing::warn!(error = %e, "recorder failed to stop cleanly");
        }
    }

    fn record(&mut self, reading: &SensorReading) {
        if !self.recording {
            return;
        }
        let elapsed_ms = reading.timestamp_ms.saturating_sub(self.run_origin_ms);
        let sample = RecordedSample::new(reading, elapsed_ms, self.phase);
        if let Err(e) = self.recorder.append_sample(&sample) {
            tracing::warn!(error = %e, "failed to record sample");
        }
    }
}
