mod common;

use common::*;
use rig_core::{
    CommandError, ControllerCfg, InterlockCfg, InterlockState, Notice, Phase, RejectReason,
    SessionConfig,
};
use rig_traits::DeviceCommand;

fn cold_bench() -> Bench {
    let mut b = bench();
    b.ctl.bind_session(session()).unwrap();
    feed(&mut b.ctl, 0, 0.0, 30.0);
    b
}

#[test]
fn cold_bath_declines_start_until_heated() {
    let mut b = cold_bench();
    assert_eq!(
        b.ctl.start(),
        Err(CommandError::Rejected(RejectReason::HeatingRequired))
    );
    assert_eq!(b.ctl.phase(), Phase::Ready);
    assert!(b.ctl.interlock_status().is_heating_required);
    assert!(b.ctl.drain_notices().iter().any(|n| matches!(
        n,
        Notice::HeatingRequired { target_c, .. } if *target_c == 37.0
    )));

    assert_eq!(b.ctl.heater(true), Ok(Phase::Ready));
    assert_eq!(b.ctl.interlock_status().state, InterlockState::HeaterOn);
    feed(&mut b.ctl, 1500, 0.0, 36.0);
    assert_eq!(
        b.ctl.start(),
        Err(CommandError::Rejected(RejectReason::HeatingRequired))
    );
    feed(&mut b.ctl, 3000, 0.0, 37.0);
    let st = b.ctl.interlock_status();
    assert!(st.is_heating_complete);
    assert!(!st.is_heating_required);
    assert_eq!(b.ctl.start(), Ok(Phase::Insertion));
}

#[test]
fn binding_a_hotter_session_requires_heating_again() {
    let mut b = bench();
    b.ctl
        .bind_session(SessionConfig::new("cool", 500.0, 2000.0, 30.0))
        .unwrap();
    feed(&mut b.ctl, 0, 0.0, 31.0);
    b.ctl.heater(true).unwrap();
    assert_eq!(b.ctl.interlock_status().state, InterlockState::Satisfied);

    b.ctl
        .bind_session(SessionConfig::new("hot", 500.0, 2000.0, 45.0))
        .unwrap();
    let st = b.ctl.interlock_status();
    assert_eq!(st.state, InterlockState::HeaterOn);
    assert!(!st.is_heating_complete);
    feed(&mut b.ctl, 1500, 0.0, 31.0);
    assert_eq!(
        b.ctl.start(),
        Err(CommandError::Rejected(RejectReason::HeatingRequired))
    );
    feed(&mut b.ctl, 3000, 0.0, 45.0);
    assert_eq!(b.ctl.start(), Ok(Phase::Insertion));
}

#[test]
fn bath_that_cooled_after_a_cycle_blocks_the_next_start() {
    let mut b = ready_bench();
    b.ctl.start().unwrap();
    feed(&mut b.ctl, 1500, 500.0, 37.5);
    b.ctl.retract().unwrap();
    feed(&mut b.ctl, 3000, 0.0, 37.5);
    assert_eq!(b.ctl.acknowledge(), Ok(Phase::Ready));

    feed(&mut b.ctl, 4500, 0.0, 20.0);
    assert_eq!(b.ctl.phase(), Phase::Ready);
    assert_eq!(
        b.ctl.start(),
        Err(CommandError::Rejected(RejectReason::HeatingRequired))
    );
    assert_eq!(b.ctl.phase(), Phase::Ready);
    assert!(b.ctl.interlock_status().is_heating_required);
}

#[test]
fn heater_on_when_already_warm_satisfies_immediately() {
    let mut b = ready_bench();
    b.ctl.heater(true).unwrap();
    assert_eq!(b.ctl.interlock_status().state, InterlockState::Satisfied);
}

#[test]
fn temperature_drop_pauses_and_blocks_resume() {
    let mut b = ready_bench();
    b.ctl.start().unwrap();
    feed(&mut b.ctl, 1500, 100.0, 36.5);
    assert_eq!(b.ctl.phase(), Phase::Paused);
    let st = b.ctl.interlock_status();
    assert!(st.was_temperature_drop);
    assert!(st.is_heating_required);
    assert_eq!(b.link.commands().last(), Some(&DeviceCommand::Stop));

    assert_eq!(
        b.ctl.start(),
        Err(CommandError::Rejected(RejectReason::HeatingRequired))
    );
    feed(&mut b.ctl, 3000, 100.0, 37.1);
    assert_eq!(b.ctl.start(), Ok(Phase::Insertion));
    assert!(!b.ctl.interlock_status().was_temperature_drop);
}

#[test]
fn drop_during_retraction_pauses_retraction() {
    let mut b = ready_bench();
    b.ctl.start().unwrap();
    feed(&mut b.ctl, 1500, 500.0, 37.5);
    b.ctl.retract().unwrap();
    feed(&mut b.ctl, 3000, 400.0, 35.0);
    assert_eq!(b.ctl.phase(), Phase::RetractionPaused);
}

#[test]
fn failed_implicit_pause_is_retried_on_the_next_reading() {
    let mut b = ready_bench();
    b.ctl.start().unwrap();
    b.link.fail_next_commands(1);
    feed(&mut b.ctl, 1500, 100.0, 36.0);
    assert_eq!(b.ctl.phase(), Phase::Insertion);
    feed(&mut b.ctl, 3000, 125.0, 36.0);
    assert_eq!(b.ctl.phase(), Phase::Paused);
}

#[test]
fn drop_while_paused_does_not_send_more_stops() {
    let mut b = ready_bench();
    b.ctl.start().unwrap();
    b.ctl.pause().unwrap();
    let before = b.link.commands().len();
    feed(&mut b.ctl, 1500, 100.0, 30.0);
    assert_eq!(b.link.commands().len(), before);
    assert!(!b.ctl.interlock_status().was_temperature_drop);
}

#[test]
fn hysteresis_tolerates_small_dips() {
    let mut b = bench_with(ControllerCfg {
        interlock: InterlockCfg {
            enabled: true,
            drop_hysteresis_c: 0.5,
        },
        ..ControllerCfg::default()
    });
    b.ctl.bind_session(session()).unwrap();
    feed(&mut b.ctl, 0, 0.0, 37.0);
    b.ctl.start().unwrap();
    feed(&mut b.ctl, 1500, 100.0, 36.6);
    assert_eq!(b.ctl.phase(), Phase::Insertion);
    feed(&mut b.ctl, 3000, 150.0, 36.4);
    assert_eq!(b.ctl.phase(), Phase::Paused);
}

#[test]
fn heater_off_resets_interlock_fields() {
    let mut b = ready_bench();
    b.ctl.start().unwrap();
    feed(&mut b.ctl, 1500, 100.0, 36.0);
    assert!(b.ctl.interlock_status().was_temperature_drop);
    b.ctl.heater(false).unwrap();
    let st = b.ctl.interlock_status();
    assert_eq!(st.state, InterlockState::Idle);
    assert!(!st.is_heating_required);
    assert!(!st.is_heating_complete);
    assert!(!st.was_temperature_drop);
    assert!(!st.heater_button_disabled);
}

#[test]
fn failed_heater_command_reenables_the_control() {
    let mut b = cold_bench();
    b.link.fail_next_commands(1);
    assert!(matches!(b.ctl.heater(true), Err(CommandError::Device(_))));
    let st = b.ctl.interlock_status();
    assert!(!st.heater_button_disabled);
    assert_eq!(st.state, InterlockState::Idle);
}

#[test]
fn disabled_interlock_allows_cold_start() {
    let mut b = bench_with(ControllerCfg {
        interlock: InterlockCfg {
            enabled: false,
            drop_hysteresis_c: 0.0,
        },
        ..ControllerCfg::default()
    });
    b.ctl.bind_session(session()).unwrap();
    feed(&mut b.ctl, 0, 0.0, 20.0);
    assert_eq!(b.ctl.start(), Ok(Phase::Insertion));
    feed(&mut b.ctl, 1500, 100.0, 15.0);
    assert_eq!(b.ctl.phase(), Phase::Insertion);
}

#[test]
fn reset_clears_interlock_state() {
    let mut b = cold_bench();
    let _ = b.ctl.start();
    assert!(b.ctl.interlock_status().is_heating_required);
    b.ctl.reset().unwrap();
    let st = b.ctl.interlock_status();
    assert!(!st.is_heating_required);
    assert_eq!(st.target_temperature_c, Some(37.0));
}
