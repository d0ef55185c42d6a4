//! The running rig: one controller thread plus one poller thread.
//!
//! The controller thread owns the `ProcessController` and the recorder and
//! drains a single event queue fed by the poller (telemetry) and by `Rig`
//! handles (commands, session binding, snapshot queries). Every state change
//! therefore happens on one thread, in arrival order.

use crate::builder::{Missing, RigBuilder};
use crate::config::{ControllerCfg, PollCfg};
use crate::controller::{ProcessController, ProcessSnapshot, UserCommand};
use crate::error::{CommandError, Result};
use crate::link::SharedLink;
use crate::poller::{PollEvent, PollMode, PollModeHandle, TelemetryPoller};
use crate::recorder::RunRecorder;
use crate::session::SessionConfig;
use crate::status::{Notice, Phase};
use crossbeam_channel as xch;
use eyre::WrapErr;
use rig_traits::{Clock, DeviceLink};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Notices beyond this many unread ones are dropped.
const NOTICE_CAPACITY: usize = 256;

type Reply<T> = xch::Sender<std::result::Result<T, CommandError>>;
type BoxedController =
    ProcessController<SharedLink<Box<dyn DeviceLink + Send>>, Box<dyn RunRecorder + Send>>;

enum Event {
    Poll(PollEvent),
    Command(UserCommand, Reply<Phase>),
    /// `None` unbinds the current session.
    Bind(Option<SessionConfig>, Reply<Phase>),
    Snapshot(Reply<ProcessSnapshot>),
    Shutdown,
}

/// Handle to a running rig. Dropping it stops polling, disables the device
/// (best effort) and joins both threads.
pub struct Rig {
    tx: xch::Sender<Event>,
    notices: xch::Receiver<Notice>,
    mode: PollModeHandle,
    poller: Option<TelemetryPoller>,
    actor: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Rig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rig")
            .field("poll_mode", &self.mode.get())
            .field("running", &self.actor.is_some())
            .finish()
    }
}

impl Rig {
    /// Start building a Rig.
    pub fn builder() -> RigBuilder<Missing> {
        RigBuilder::default()
    }

    pub(crate) fn spawn(
        link: Box<dyn DeviceLink + Send>,
        recorder: Box<dyn RunRecorder + Send>,
        controller_cfg: ControllerCfg,
        poll_cfg: PollCfg,
        clock: Arc<dyn Clock + Send + Sync>,
        session: Option<SessionConfig>,
    ) -> Result<Self> {
        let epoch = clock.now();
        let link = SharedLink::new(link);
        let mut controller: BoxedController = ProcessController::with_clock(
            link.clone(),
            recorder,
            controller_cfg,
            Arc::clone(&clock),
            epoch,
        );

        let mode = PollModeHandle::new(PollMode::Manual);
        if let Some(session) = session {
            controller
                .bind_session(session)
                .map_err(|e| eyre::eyre!("bind session: {e}"))?;
            mode.set(PollMode::Process);
        }

        let (tx, rx) = xch::unbounded();
        let (notice_tx, notice_rx) = xch::bounded(NOTICE_CAPACITY);
        let actor_mode = mode.clone();
        let actor = std::thread::Builder::new()
            .name("rig-controller".into())
            .spawn(move || run_actor(controller, rx, notice_tx, actor_mode))
            .wrap_err("spawn controller thread")?;

        let poll_tx = tx.clone();
        let poller = TelemetryPoller::spawn(link, poll_cfg, mode.clone(), clock, epoch, move |ev| {
            poll_tx.send(Event::Poll(ev)).is_ok()
        });
        let poller = match poller {
            Ok(p) => p,
            Err(e) => {
                let _ = tx.send(Event::Shutdown);
                let _ = actor.join();
                return Err(e).wrap_err("spawn poller thread");
            }
        };

        tracing::info!(mode = ?mode.get(), "rig started");
        Ok(Self {
            tx,
            notices: notice_rx,
            mode,
            poller: Some(poller),
            actor: Some(actor),
        })
    }

    fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Event,
    ) -> std::result::Result<T, CommandError> {
        let (reply_tx, reply_rx) = xch::bounded(1);
        self.tx
            .send(make(reply_tx))
            .map_err(|_| CommandError::Stopped)?;
        reply_rx.recv().map_err(|_| CommandError::Stopped)?
    }

    pub fn command(&self, cmd: UserCommand) -> std::result::Result<Phase, CommandError> {
        self.request(|reply| Event::Command(cmd, reply))
    }

    pub fn start(&self) -> std::result::Result<Phase, CommandError> {
        self.command(UserCommand::Start)
    }

    pub fn pause(&self) -> std::result::Result<Phase, CommandError> {
        self.command(UserCommand::Pause)
    }

    pub fn retract(&self) -> std::result::Result<Phase, CommandError> {
        self.command(UserCommand::Retract)
    }

    pub fn reset(&self) -> std::result::Result<Phase, CommandError> {
        self.command(UserCommand::Reset)
    }

    pub fn acknowledge(&self) -> std::result::Result<Phase, CommandError> {
        self.command(UserCommand::Acknowledge)
    }

    pub fn heater(&self, on: bool) -> std::result::Result<Phase, CommandError> {
        self.command(UserCommand::Heater { on })
    }

    /// Bind a session; switches the poller to the process cadence.
    pub fn bind_session(&self, session: SessionConfig) -> std::result::Result<Phase, CommandError> {
        self.request(|reply| Event::Bind(Some(session), reply))
    }

    /// Drop the bound session; switches the poller to manual sampling.
    pub fn unbind_session(&self) -> std::result::Result<Phase, CommandError> {
        self.request(|reply| Event::Bind(None, reply))
    }

    pub fn snapshot(&self) -> std::result::Result<ProcessSnapshot, CommandError> {
        self.request(Event::Snapshot)
    }

    /// Stream of notices. Clones share the same queue.
    pub fn notices(&self) -> xch::Receiver<Notice> {
        self.notices.clone()
    }

    pub fn poll_mode(&self) -> PollMode {
        self.mode.get()
    }

    /// Stop polling, disable the device and join both threads.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Poller first so no reading races the final disable.
        drop(self.poller.take());
        if let Some(actor) = self.actor.take() {
            let _ = self.tx.send(Event::Shutdown);
            match actor.join() {
                Ok(()) => tracing::trace!("controller thread joined"),
                Err(e) => tracing::warn!(?e, "controller thread panicked during shutdown"),
            }
        }
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_actor(
    mut ctl: BoxedController,
    rx: xch::Receiver<Event>,
    notices: xch::Sender<Notice>,
    mode: PollModeHandle,
) {
    while let Ok(ev) = rx.recv() {
        match ev {
            Event::Poll(PollEvent::Reading { reading, fresh }) => ctl.on_reading(&reading, fresh),
            Event::Poll(PollEvent::HomingSignal) => {
                ctl.homing_signal();
            }
            Event::Command(cmd, reply) => {
                let _ = reply.send(ctl.handle(cmd));
            }
            Event::Bind(session, reply) => {
                let next = if session.is_some() {
                    PollMode::Process
                } else {
                    PollMode::Manual
                };
                let result = match session {
                    Some(s) => ctl.bind_session(s),
                    None => ctl.unbind_session(),
                };
                if result.is_ok() {
                    mode.set(next);
                }
                let _ = reply.send(result);
            }
            Event::Snapshot(reply) => {
                let _ = reply.send(Ok(ctl.snapshot()));
            }
            Event::Shutdown => break,
        }
        publish(&mut ctl, &notices);
    }
    ctl.shutdown();
    publish(&mut ctl, &notices);
    tracing::trace!("controller thread exiting cleanly");
}

fn publish(ctl: &mut BoxedController, notices: &xch::Sender<Notice>) {
    for n in ctl.drain_notices() {
        if let Err(xch::TrySendError::Full(n)) = notices.try_send(n) {
            tracing::trace!(?n, "notice queue full; dropping");
        }
    }
}
