//! Background telemetry polling.
//!
//! Spawns a thread that shares the device link, reads one measurement per
//! tick and hands each result to a sink. While the device is unreachable the
//! poller emits placeholder readings (last known values, tagged simulated) so
//! observers keep seeing a live stream.
//!
//! Each `TelemetryPoller` spawns exactly one thread, which is shut down and
//! joined when the poller is dropped. The next tick is scheduled only after
//! the previous read has settled, so ticks never overlap.
use crate::config::PollCfg;
use crate::error::RigError;
use crate::hw_error::map_hw_error;
use crate::types::SensorReading;
use crossbeam_channel as xch;
use rig_traits::{Clock, DeviceLink, Measurement};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// Poll cadence selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// A session is bound; poll at the process interval.
    Process,
    /// No session; poll at the manual sampling interval.
    Manual,
}

/// Shared, lock-free handle to switch the cadence of a running poller.
#[derive(Debug, Clone)]
pub struct PollModeHandle(Arc<AtomicU8>);

impl PollModeHandle {
    pub fn new(mode: PollMode) -> Self {
        let h = Self(Arc::new(AtomicU8::new(0)));
        h.set(mode);
        h
    }

    pub fn set(&self, mode: PollMode) {
        let v = match mode {
            PollMode::Process => 0,
            PollMode::Manual => 1,
        };
        self.0.store(v, Ordering::Relaxed);
    }

    pub fn get(&self) -> PollMode {
        match self.0.load(Ordering::Relaxed) {
            0 => PollMode::Process,
            _ => PollMode::Manual,
        }
    }
}

/// What one tick produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollEvent {
    Reading {
        reading: SensorReading,
        /// False when identical (rounded distance and force) to the previous one.
        fresh: bool,
    },
    /// The device reports its homing cycle is done.
    HomingSignal,
}

/// Per-tick state: de-duplication and the last real measurement.
#[derive(Debug, Default)]
pub struct PollState {
    last_key: Option<(i64, i64, crate::types::Provenance)>,
    last_real: Option<Measurement>,
    failing: bool,
}

impl PollState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one poll tick against `link`, stamping readings at `clock.ms_since(epoch)`.
    pub fn tick<L: DeviceLink + ?Sized>(
        &mut self,
        link: &mut L,
        timeout: Duration,
        clock: &dyn Clock,
        epoch: Instant,
    ) -> Vec<PollEvent> {
        let started = clock.now();
        let result = read_once(link, timeout).and_then(|m| {
            // A read that returned after its deadline is as good as lost.
            if clock.now().saturating_duration_since(started) > timeout {
                Err(RigError::Timeout)
            } else {
                Ok(m)
            }
        });
        let ts = clock.ms_since(epoch);

        let mut events = Vec::with_capacity(2);
        let (reading, homing) = match result {
            Ok(m) => {
                if self.failing {
                    tracing::info!("telemetry restored");
                    self.failing = false;
                }
                self.last_real = Some(m);
                (SensorReading::real(ts, &m), m.homing_done)
            }
            Err(e) => {
                if !self.failing {
                    tracing::warn!(error = %e, "telemetry read failed; emitting placeholders");
                    self.failing = true;
                } else {
                    tracing::trace!(error = %e, "telemetry still failing");
                }
                let held = self.last_real.unwrap_or_default();
                (SensorReading::simulated(ts, &held), false)
            }
        };
        let key = reading.dedup_key();
        let fresh = self.last_key != Some(key);
        self.last_key = Some(key);
        events.push(PollEvent::Reading { reading, fresh });
        if homing {
            events.push(PollEvent::HomingSignal);
        }
        events
    }
}

fn read_once<L: DeviceLink + ?Sized>(link: &mut L, timeout: Duration) -> Result<Measurement, RigError> {
    if !link.check_connection().connected {
        return Err(RigError::Connectivity("link reports disconnected".into()));
    }
    let m = link.read_sensors(timeout).map_err(|e| map_hw_error(&*e))?;
    let finite = m.distance_mm.is_finite() && m.force_mn.is_finite() && m.temperature_c.is_finite();
    if !finite {
        return Err(RigError::Protocol("non-finite measurement".into()));
    }
    Ok(m)
}

pub struct TelemetryPoller {
    /// Dropping the sender wakes the thread immediately.
    shutdown_tx: Option<xch::Sender<()>>,
    mode: PollModeHandle,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl TelemetryPoller {
    /// Spawn the polling thread. `sink` receives every event in order and
    /// returns false once its consumer is gone, which ends the thread.
    pub fn spawn<L, F>(
        mut link: L,
        cfg: PollCfg,
        mode: PollModeHandle,
        clock: Arc<dyn Clock + Send + Sync>,
        epoch: Instant,
        mut sink: F,
    ) -> std::io::Result<Self>
    where
        L: DeviceLink + Send + 'static,
        F: FnMut(PollEvent) -> bool + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = xch::bounded::<()>(1);
        let thread_mode = mode.clone();
        let timeout = cfg.read_timeout();

        let join_handle = std::thread::Builder::new()
            .name("rig-poller".into())
            .spawn(move || {
                let mut state = PollState::new();
                'poll: loop {
                    for ev in state.tick(&mut link, timeout, clock.as_ref(), epoch) {
                        if !sink(ev) {
                            tracing::debug!("poller consumer disconnected, exiting thread");
                            break 'poll;
                        }
                    }
                    let interval_ms = match thread_mode.get() {
                        PollMode::Process => cfg.process_interval_ms,
                        PollMode::Manual => cfg.manual_interval_ms,
                    };
                    match shutdown_rx.recv_timeout(Duration::from_millis(interval_ms)) {
                        Err(xch::RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(xch::RecvTimeoutError::Disconnected) => {
                            tracing::debug!("poller received shutdown signal");
                            break;
                        }
                    }
                }
                tracing::trace!("poller thread exiting cleanly");
            })?;

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            mode,
            join_handle: Some(join_handle),
        })
    }

    pub fn set_mode(&self, mode: PollMode) {
        self.mode.set(mode);
    }

    pub fn mode(&self) -> PollMode {
        self.mode.get()
    }
}

impl Drop for TelemetryPoller {
    fn drop(&mut self) {
        // Disconnecting the channel interrupts the inter-tick wait; an
        // in-flight read finishes within its timeout first.
        drop(self.shutdown_tx.take());
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("poller thread joined"),
                Err(e) => tracing::warn!(?e, "poller thread panicked during shutdown"),
            }
        }
    }
}
