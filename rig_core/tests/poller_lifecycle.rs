//! Poller thread lifecycle: shutdown on drop and on consumer disconnect.

use crossbeam_channel as xch;
use rig_core::mocks::{ScriptedLink, measurement};
use rig_core::poller::{PollEvent, PollMode, PollModeHandle, TelemetryPoller};
use rig_core::PollCfg;
use rig_traits::{Clock, MonotonicClock};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn cfg() -> PollCfg {
    PollCfg {
        process_interval_ms: 10,
        manual_interval_ms: 10,
        read_timeout_ms: 10,
    }
}

fn spawn(link: ScriptedLink, tx: xch::Sender<PollEvent>, interval_ms: u64) -> TelemetryPoller {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let epoch = clock.now();
    TelemetryPoller::spawn(
        link,
        PollCfg {
            process_interval_ms: interval_ms,
            ..cfg()
        },
        PollModeHandle::new(PollMode::Process),
        clock,
        epoch,
        move |ev| tx.send(ev).is_ok(),
    )
    .unwrap()
}

#[test]
fn first_tick_is_immediate_and_drop_joins_promptly() {
    let link = ScriptedLink::new();
    link.push(measurement(12.0, 3.0, 37.0));
    let (tx, rx) = xch::unbounded();
    // Long interval: drop must interrupt the wait instead of sleeping it out.
    let poller = spawn(link, tx, 60_000);
    let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(matches!(
        first,
        PollEvent::Reading { reading, fresh: true } if reading.distance_mm == 12.0
    ));
    let t0 = Instant::now();
    drop(poller);
    assert!(t0.elapsed() < Duration::from_secs(2));
}

#[test]
fn poller_exits_when_consumer_disconnects() {
    let (tx, rx) = xch::unbounded();
    let poller = spawn(ScriptedLink::new(), tx, 5);
    let _ = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    drop(rx);
    // The next send fails and the thread ends on its own; drop just joins.
    std::thread::sleep(Duration::from_millis(30));
    drop(poller);
}

#[test]
fn mode_switch_is_visible_through_the_poller() {
    let (tx, _rx) = xch::unbounded();
    let poller = spawn(ScriptedLink::new(), tx, 10);
    poller.set_mode(PollMode::Manual);
    assert_eq!(poller.mode(), PollMode::Manual);
}

#[test]
fn repeated_spawn_and_drop_does_not_hang() {
    for _ in 0..10 {
        let (tx, rx) = xch::unbounded();
        let poller = spawn(ScriptedLink::new(), tx, 5);
        let _ = rx.recv_timeout(Duration::from_secs(2));
        drop(poller);
    }
}
