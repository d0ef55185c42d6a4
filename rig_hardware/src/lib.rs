#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Device controller backends.
//!
//! Only a simulated rig lives here: the serial transport of the real
//! controller is owned by a separate integration layer. The simulator moves
//! one step per read so tests can reason about positions tick by tick.
pub mod error;

use crate::error::HwError;
use rig_traits::{BoxError, ConnectionStatus, DeviceCommand, DeviceLink, Measurement};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Tuning of the simulated rig.
#[derive(Debug, Clone)]
pub struct SimCfg {
    pub step_mm: f64,
    pub heat_step_c: f64,
    pub cool_step_c: f64,
    pub ambient_c: f64,
    pub start_temperature_c: f64,
    pub force_per_mm: f64,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            step_mm: 25.0,
            heat_step_c: 0.5,
            cool_step_c: 0.05,
            ambient_c: 22.0,
            start_temperature_c: 22.0,
            force_per_mm: 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Motion {
    Idle,
    Forward { target_mm: f64 },
    Backward { until_mm: f64 },
    Homing,
}

/// Highest bath temperature the simulated heater can reach.
const MAX_BATH_C: f64 = 80.0;

#[derive(Debug)]
struct SimState {
    cfg: SimCfg,
    position_mm: f64,
    temperature_c: f64,
    heater_on: bool,
    motion: Motion,
    /// Motion interrupted by the last Stop; a resume continues it.
    paused: Option<Motion>,
    homing_done: bool,
    connected: bool,
    reject_commands: u32,
    read_delay: Duration,
    commands: Vec<DeviceCommand>,
}

impl SimState {
    fn advance(&mut self) {
        let step = self.cfg.step_mm;
        match self.motion {
            Motion::Idle => {}
            Motion::Forward { target_mm } => {
                self.position_mm = (self.position_mm + step).min(target_mm);
                if self.position_mm >= target_mm {
                    self.motion = Motion::Idle;
                }
            }
            Motion::Backward { until_mm } => {
                self.position_mm = (self.position_mm - step).max(until_mm);
                if self.position_mm <= until_mm {
                    self.motion = Motion::Idle;
                }
            }
            Motion::Homing => {
                self.position_mm = (self.position_mm - 2.0 * step).max(0.0);
                if self.position_mm <= 0.0 {
                    self.motion = Motion::Idle;
                    self.homing_done = true;
                }
            }
        }

        if self.heater_on {
            self.temperature_c = (self.temperature_c + self.cfg.heat_step_c).min(MAX_BATH_C);
        } else {
            self.temperature_c = (self.temperature_c - self.cfg.cool_step_c).max(self.cfg.ambient_c);
        }
    }

    fn force_mn(&self) -> f64 {
        match self.motion {
            Motion::Forward { .. } => self.position_mm * self.cfg.force_per_mm,
            Motion::Backward { .. } => self.position_mm * self.cfg.force_per_mm * 0.3,
            Motion::Idle | Motion::Homing => 0.0,
        }
    }
}

/// Simulated device controller.
///
/// Cheap to clone: clones drive the same simulated hardware, which lets a
/// test keep a handle for fault injection while the rig owns another.
#[derive(Debug, Clone)]
pub struct SimulatedRig {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedRig {
    fn default() -> Self {
        Self::new(SimCfg::default())
    }
}

impl SimulatedRig {
    pub fn new(cfg: SimCfg) -> Self {
        let temperature_c = cfg.start_temperature_c;
        Self {
            state: Arc::new(Mutex::new(SimState {
                cfg,
                position_mm: 0.0,
                temperature_c,
                heater_on: false,
                motion: Motion::Idle,
                paused: None,
                homing_done: false,
                connected: true,
                reject_commands: 0,
                read_delay: Duration::ZERO,
                commands: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A poisoned lock only means a test thread panicked mid-update; the
        // numeric state is still usable.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Simulate cable unplug / replug.
    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    /// Force the bath temperature (e.g. to simulate a cooling fault).
    pub fn set_temperature(&self, temperature_c: f64) {
        self.lock().temperature_c = temperature_c;
    }

    pub fn set_position(&self, position_mm: f64) {
        self.lock().position_mm = position_mm;
    }

    /// Make the next `n` commands fail with `HwError::Rejected`.
    pub fn reject_next_commands(&self, n: u32) {
        self.lock().reject_commands = n;
    }

    /// Make every read take this long before answering.
    pub fn set_read_delay(&self, delay: Duration) {
        self.lock().read_delay = delay;
    }

    pub fn position_mm(&self) -> f64 {
        self.lock().position_mm
    }

    pub fn temperature_c(&self) -> f64 {
        self.lock().temperature_c
    }

    pub fn heater_on(&self) -> bool {
        self.lock().heater_on
    }

    /// Commands accepted so far, in arrival order.
    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.lock().commands.clone()
    }

    fn read(&self, timeout: Duration) -> error::Result<Measurement> {
        let delay = {
            let st = self.lock();
            if !st.connected {
                return Err(HwError::Disconnected);
            }
            st.read_delay
        };
        if !delay.is_zero() {
            // Never block past the caller's timeout.
            std::thread::sleep(delay.min(timeout));
            if delay > timeout {
                return Err(HwError::Timeout);
            }
        }
        let mut st = self.lock();
        st.advance();
        let m = Measurement {
            distance_mm: st.position_mm,
            force_mn: st.force_mn(),
            temperature_c: st.temperature_c,
            homing_done: st.homing_done,
        };
        tracing::trace!(
            distance_mm = m.distance_mm,
            force_mn = m.force_mn,
            temperature_c = m.temperature_c,
            "sim read"
        );
        Ok(m)
    }

    fn command(&self, cmd: DeviceCommand) -> error::Result<()> {
        let mut st = self.lock();
        if !st.connected {
            return Err(HwError::Disconnected);
        }
        if st.reject_commands > 0 {
            st.reject_commands -= 1;
            return Err(HwError::Rejected(cmd.name().to_string()));
        }
        match cmd {
            DeviceCommand::Start {
                target_distance_mm,
                resume,
                ..
            } => {
                st.homing_done = false;
                let forward = Motion::Forward {
                    target_mm: target_distance_mm,
                };
                st.motion = match st.paused.take() {
                    Some(paused) if resume => paused,
                    _ => forward,
                };
            }
            DeviceCommand::Stop => {
                if st.motion != Motion::Idle {
                    st.paused = Some(st.motion);
                }
                st.motion = Motion::Idle;
            }
            DeviceCommand::Retract { stroke_mm } => {
                let until_mm = (st.position_mm - stroke_mm).max(0.0);
                st.paused = None;
                st.motion = Motion::Backward { until_mm };
            }
            DeviceCommand::Reset => {
                st.homing_done = false;
                st.paused = None;
                st.motion = Motion::Homing;
            }
            DeviceCommand::Heater { on } => st.heater_on = on,
            DeviceCommand::Disable => {
                st.motion = Motion::Idle;
                st.paused = None;
                st.heater_on = false;
            }
        }
        st.commands.push(cmd);
        tracing::debug!(command = cmd.name(), "sim command accepted");
        Ok(())
    }
}

impl DeviceLink for SimulatedRig {
    fn read_sensors(&mut self, timeout: Duration) -> Result<Measurement, BoxError> {
        Ok(self.read(timeout)?)
    }

    fn send_command(&mut self, cmd: DeviceCommand, _timeout: Duration) -> Result<(), BoxError> {
        Ok(self.command(cmd)?)
    }

    fn check_connection(&mut self) -> ConnectionStatus {
        ConnectionStatus {
            connected: self.lock().connected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_millis(100);

    #[test]
    fn forward_motion_stops_at_target() {
        let mut rig = SimulatedRig::new(SimCfg {
            step_mm: 40.0,
            ..SimCfg::default()
        });
        rig.send_command(
            DeviceCommand::Start {
                target_distance_mm: 100.0,
                force_threshold_mn: 1000.0,
                resume: false,
            },
            T,
        )
        .unwrap();
        let d: Vec<f64> = (0..4)
            .map(|_| rig.read_sensors(T).unwrap().distance_mm)
            .collect();
        assert_eq!(d, vec![40.0, 80.0, 100.0, 100.0]);
    }

    #[test]
    fn reset_homes_to_zero_and_flags_done() {
        let mut rig = SimulatedRig::default();
        rig.set_position(60.0);
        rig.send_command(DeviceCommand::Reset, T).unwrap();
        let first = rig.read_sensors(T).unwrap();
        assert!(first.distance_mm > 0.0);
        assert!(!first.homing_done);
        let second = rig.read_sensors(T).unwrap();
        assert_eq!(second.distance_mm, 0.0);
        assert!(second.homing_done);
    }

    #[test]
    fn heater_raises_temperature_and_disable_turns_it_off() {
        let mut rig = SimulatedRig::default();
        rig.send_command(DeviceCommand::Heater { on: true }, T).unwrap();
        let t1 = rig.read_sensors(T).unwrap().temperature_c;
        let t2 = rig.read_sensors(T).unwrap().temperature_c;
        assert!(t2 > t1);
        rig.send_command(DeviceCommand::Disable, T).unwrap();
        assert!(!rig.heater_on());
    }

    #[test]
    fn disconnected_rig_fails_reads_and_commands() {
        let mut rig = SimulatedRig::default();
        rig.set_connected(false);
        assert!(!rig.check_connection().connected);
        let err = rig.read_sensors(T).unwrap_err();
        assert!(err.downcast_ref::<HwError>().is_some());
        assert!(rig.send_command(DeviceCommand::Stop, T).is_err());
        assert!(rig.commands().is_empty());
    }

    #[test]
    fn slow_read_times_out() {
        let mut rig = SimulatedRig::default();
        rig.set_read_delay(Duration::from_millis(30));
        let err = rig.read_sensors(Duration::from_millis(5)).unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }
}
