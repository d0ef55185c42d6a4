//! Type-state builder for `Rig`.
//!
//! The builder enforces at compile time that a device link is provided before
//! `build()` is available. `try_build()` is always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use rig_traits::{Clock, DeviceLink, MonotonicClock};

use crate::config::{ControllerCfg, PollCfg};
use crate::error::{BuildError, Result};
use crate::recorder::{NullRecorder, RunRecorder};
use crate::runner::Rig;
use crate::session::SessionConfig;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Rig`. All settings are validated on `build()`.
pub struct RigBuilder<L> {
    link: Option<Box<dyn DeviceLink + Send>>,
    recorder: Option<Box<dyn RunRecorder + Send>>,
    controller: Option<ControllerCfg>,
    poll: Option<PollCfg>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    session: Option<SessionConfig>,
    _l: PhantomData<L>,
}

impl Default for RigBuilder<Missing> {
    fn default() -> Self {
        Self {
            link: None,
            recorder: None,
            controller: None,
            poll: None,
            clock: None,
            session: None,
            _l: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Single source of truth for runtime config validation.
fn validate(poll: &PollCfg, controller: &ControllerCfg) -> Result<()> {
    if poll.process_interval_ms == 0 || poll.manual_interval_ms == 0 {
        return Err(invalid("poll intervals must be >= 1 ms"));
    }
    if poll.read_timeout_ms == 0 {
        return Err(invalid("read timeout must be >= 1 ms"));
    }
    if controller.command_timeout_ms == 0 {
        return Err(invalid("command timeout must be >= 1 ms"));
    }
    // A stalled device must not outlive one process poll period.
    if poll.read_timeout_ms > poll.process_interval_ms {
        return Err(invalid("read timeout must not exceed the process poll interval"));
    }
    if controller.command_timeout_ms > poll.process_interval_ms {
        return Err(invalid(
            "command timeout must not exceed the process poll interval",
        ));
    }
    let h = controller.interlock.drop_hysteresis_c;
    if !h.is_finite() || h < 0.0 {
        return Err(invalid("drop hysteresis must be finite and >= 0"));
    }
    Ok(())
}

impl<L> RigBuilder<L> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Rig> {
        let link = self
            .link
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLink))?;
        let controller = self.controller.unwrap_or_default();
        let poll = self.poll.unwrap_or_default();
        validate(&poll, &controller)?;

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };
        let recorder: Box<dyn RunRecorder + Send> = match self.recorder {
            Some(r) => r,
            None => Box::new(NullRecorder),
        };

        Rig::spawn(link, recorder, controller, poll, clock, self.session)
    }

    /// Recorder for run logs; defaults to `NullRecorder`.
    pub fn with_recorder(mut self, recorder: impl RunRecorder + Send + 'static) -> Self {
        self.recorder = Some(Box::new(recorder));
        self
    }
    pub fn with_controller_cfg(mut self, cfg: ControllerCfg) -> Self {
        self.controller = Some(cfg);
        self
    }
    pub fn with_poll_cfg(mut self, cfg: PollCfg) -> Self {
        self.poll = Some(cfg);
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Bind a session before the first reading arrives.
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = Some(session);
        self
    }
}

// Setter that advances type-state
impl RigBuilder<Missing> {
    pub fn with_link(self, link: impl DeviceLink + Send + 'static) -> RigBuilder<Set> {
        RigBuilder {
            link: Some(Box::new(link)),
            recorder: self.recorder,
            controller: self.controller,
            poll: self.poll,
            clock: self.clock,
            session: self.session,
            _l: PhantomData,
        }
    }
}

impl RigBuilder<Set> {
    pub fn build(self) -> Result<Rig> {
        self.try_build()
    }
}
