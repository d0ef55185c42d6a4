//! Temperature interlock gating Start on the bath temperature.
//!
//! States:
//! - `Idle`: nothing requested yet (or heater switched off).
//! - `HeatingRequired`: a Start was declined, or a drop paused the run.
//! - `HeaterOn`: heater confirmed on, waiting for target temperature.
//! - `Satisfied`: target reached; Start is allowed.

use crate::config::InterlockCfg;
use crate::error::RejectReason;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterlockState {
    Idle,
    HeatingRequired,
    HeaterOn,
    Satisfied,
}

/// Snapshot of the interlock for the operator surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InterlockStatus {
    pub state: InterlockState,
    pub is_heating_required: bool,
    pub is_heating_complete: bool,
    pub target_temperature_c: Option<f64>,
    /// True while a heater command is in flight.
    pub heater_button_disabled: bool,
    pub was_temperature_drop: bool,
}

/// What a reading did to the interlock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InterlockEvent {
    None,
    /// Target reached while heating was pending.
    Satisfied,
    /// Temperature fell below target during an active run.
    Dropped,
}

#[derive(Debug, Clone)]
pub struct TemperatureInterlock {
    cfg: InterlockCfg,
    state: InterlockState,
    target_c: Option<f64>,
    heater_in_flight: bool,
    heater_on: bool,
    was_drop: bool,
}

impl TemperatureInterlock {
    pub fn new(cfg: InterlockCfg) -> Self {
        Self {
            cfg,
            state: InterlockState::Idle,
            target_c: None,
            heater_in_flight: false,
            heater_on: false,
            was_drop: false,
        }
    }

    fn active_target(&self) -> Option<f64> {
        if self.cfg.enabled { self.target_c } else { None }
    }

    /// Bind a new target temperature (None when no session is bound).
    /// A `Satisfied` interlock is re-derived against the new target.
    pub fn set_target(&mut self, target_c: Option<f64>, latest_c: Option<f64>) {
        self.target_c = target_c;
        if self.state == InterlockState::Satisfied && !self.at_target(latest_c) {
            self.state = if self.heater_on {
                InterlockState::HeaterOn
            } else {
                InterlockState::Idle
            };
        }
    }

    fn at_target(&self, latest_c: Option<f64>) -> bool {
        match (self.active_target(), latest_c) {
            (None, _) => true,
            (Some(target), Some(t)) => t >= target,
            (Some(_), None) => false,
        }
    }

    /// Gate a Start. A decline moves the interlock to `HeatingRequired`.
    pub fn check_start(&mut self, latest_c: Option<f64>) -> Result<(), RejectReason> {
        let Some(target) = self.active_target() else {
            return Ok(());
        };
        match self.state {
            InterlockState::Satisfied if self.at_target(latest_c) => Ok(()),
            // The bath cooled since it was last satisfied.
            InterlockState::Satisfied => {
                self.state = if self.heater_on {
                    InterlockState::HeaterOn
                } else {
                    InterlockState::HeatingRequired
                };
                Err(RejectReason::HeatingRequired)
            }
            InterlockState::HeatingRequired | InterlockState::HeaterOn => {
                Err(RejectReason::HeatingRequired)
            }
            InterlockState::Idle => match latest_c {
                Some(t) if t >= target => {
                    self.state = InterlockState::Satisfied;
                    Ok(())
                }
                _ => {
                    self.state = InterlockState::HeatingRequired;
                    Err(RejectReason::HeatingRequired)
                }
            },
        }
    }

    /// Feed one real temperature reading.
    pub fn observe(&mut self, temperature_c: f64, run_progressing: bool) -> InterlockEvent {
        let Some(target) = self.active_target() else {
            return InterlockEvent::None;
        };
        if matches!(
            self.state,
            InterlockState::HeatingRequired | InterlockState::HeaterOn
        ) && temperature_c >= target
        {
            self.state = InterlockState::Satisfied;
            return InterlockEvent::Satisfied;
        }
        if run_progressing && temperature_c < target - self.cfg.drop_hysteresis_c {
            self.was_drop = true;
            self.state = InterlockState::HeatingRequired;
            return InterlockEvent::Dropped;
        }
        InterlockEvent::None
    }

    /// Claim the heater control; only one heater command may be in flight.
    pub fn begin_heater(&mut self) -> Result<(), RejectReason> {
        if self.heater_in_flight {
            return Err(RejectReason::HeaterBusy);
        }
        self.heater_in_flight = true;
        Ok(())
    }

    /// Settle a heater command. Failed commands only release the control.
    pub fn finish_heater(&mut self, on: bool, succeeded: bool, latest_c: Option<f64>) {
        self.heater_in_flight = false;
        if !succeeded {
            return;
        }
        if !on {
            self.clear();
            return;
        }
        self.heater_on = true;
        self.state = if self.active_target().is_some() && self.at_target(latest_c) {
            InterlockState::Satisfied
        } else {
            InterlockState::HeaterOn
        };
    }

    /// A run resumed; the drop has been dealt with.
    pub fn clear_drop(&mut self) {
        self.was_drop = false;
    }

    /// Back to idle defaults. The bound target is kept.
    pub fn clear(&mut self) {
        self.state = InterlockState::Idle;
        self.heater_in_flight = false;
        self.heater_on = false;
        self.was_drop = false;
    }

    pub fn state(&self) -> InterlockState {
        self.state
    }

    pub fn status(&self) -> InterlockStatus {
        InterlockStatus {
            state: self.state,
            is_heating_required: matches!(
                self.state,
                InterlockState::HeatingRequired | InterlockState::HeaterOn
            ),
            is_heating_complete: self.state == InterlockState::Satisfied,
            target_temperature_c: self.target_c,
            heater_button_disabled: self.heater_in_flight,
            was_temperature_drop: self.was_drop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed(target: f64) -> TemperatureInterlock {
        let mut i = TemperatureInterlock::new(InterlockCfg::default());
        i.set_target(Some(target), None);
        i
    }

    #[test]
    fn cold_start_is_declined_then_satisfied_by_reading() {
        let mut i = armed(37.0);
        assert_eq!(i.check_start(Some(30.0)), Err(RejectReason::HeatingRequired));
        assert!(i.status().is_heating_required);
        assert_eq!(i.observe(36.9, false), InterlockEvent::None);
        assert_eq!(i.observe(37.0, false), InterlockEvent::Satisfied);
        assert!(i.status().is_heating_complete);
        assert_eq!(i.check_start(Some(37.0)), Ok(()));
    }

    #[test]
    fn warm_bath_passes_immediately() {
        let mut i = armed(37.0);
        assert_eq!(i.check_start(Some(37.2)), Ok(()));
        assert_eq!(i.state(), InterlockState::Satisfied);
    }

    #[test]
    fn no_reading_yet_counts_as_cold() {
        let mut i = armed(37.0);
        assert_eq!(i.check_start(None), Err(RejectReason::HeatingRequired));
    }

    #[test]
    fn disabled_interlock_never_gates() {
        let mut i = TemperatureInterlock::new(InterlockCfg {
            enabled: false,
            drop_hysteresis_c: 0.0,
        });
        i.set_target(Some(37.0), None);
        assert_eq!(i.check_start(Some(10.0)), Ok(()));
        assert_eq!(i.observe(10.0, true), InterlockEvent::None);
    }

    #[test]
    fn drop_respects_hysteresis() {
        let mut i = TemperatureInterlock::new(InterlockCfg {
            enabled: true,
            drop_hysteresis_c: 0.5,
        });
        i.set_target(Some(37.0), None);
        i.check_start(Some(37.0)).unwrap();
        assert_eq!(i.observe(36.6, true), InterlockEvent::None);
        assert_eq!(i.observe(36.4, true), InterlockEvent::Dropped);
        let st = i.status();
        assert!(st.was_temperature_drop);
        assert!(st.is_heating_required);
    }

    #[test]
    fn heater_flow_and_busy_guard() {
        let mut i = armed(37.0);
        i.begin_heater().unwrap();
        assert!(i.status().heater_button_disabled);
        assert_eq!(i.begin_heater(), Err(RejectReason::HeaterBusy));
        i.finish_heater(true, true, Some(30.0));
        assert_eq!(i.state(), InterlockState::HeaterOn);
        assert!(!i.status().heater_button_disabled);

        i.begin_heater().unwrap();
        i.finish_heater(false, true, Some(30.0));
        let st = i.status();
        assert_eq!(st.state, InterlockState::Idle);
        assert!(!st.is_heating_required && !st.is_heating_complete);
        assert!(!st.was_temperature_drop);
        assert_eq!(st.target_temperature_c, Some(37.0));
    }

    #[test]
    fn satisfied_is_rechecked_against_the_latest_temperature() {
        let mut i = armed(37.0);
        assert_eq!(i.check_start(Some(38.0)), Ok(()));
        assert_eq!(i.check_start(Some(20.0)), Err(RejectReason::HeatingRequired));
        assert_eq!(i.state(), InterlockState::HeatingRequired);
        assert_eq!(i.observe(37.5, false), InterlockEvent::Satisfied);
        assert_eq!(i.check_start(Some(37.5)), Ok(()));
    }

    #[test]
    fn hotter_target_falls_back_to_heater_on() {
        let mut i = armed(30.0);
        i.begin_heater().unwrap();
        i.finish_heater(true, true, Some(31.0));
        assert_eq!(i.state(), InterlockState::Satisfied);

        i.set_target(Some(45.0), Some(31.0));
        assert_eq!(i.state(), InterlockState::HeaterOn);
        assert!(i.status().is_heating_required);
        assert_eq!(i.check_start(Some(31.0)), Err(RejectReason::HeatingRequired));

        // A cooler target keeps it satisfied.
        assert_eq!(i.observe(45.0, false), InterlockEvent::Satisfied);
        i.set_target(Some(40.0), Some(45.0));
        assert_eq!(i.state(), InterlockState::Satisfied);
    }

    #[test]
    fn failed_heater_command_changes_nothing_but_releases_control() {
        let mut i = armed(37.0);
        i.begin_heater().unwrap();
        i.finish_heater(true, false, Some(30.0));
        assert_eq!(i.state(), InterlockState::Idle);
        assert!(!i.status().heater_button_disabled);
    }
}
