//! Test doubles for driving the controller without hardware.

use crate::error::RigError;
use crate::recorder::{RecordedSample, RunHandle, RunRecorder};
use crate::session::SessionConfig;
use rig_traits::{BoxError, ConnectionStatus, DeviceCommand, DeviceLink, Measurement};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Shorthand for a measurement without the homing flag.
pub fn measurement(distance_mm: f64, force_mn: f64, temperature_c: f64) -> Measurement {
    Measurement {
        distance_mm,
        force_mn,
        temperature_c,
        homing_done: false,
    }
}

#[derive(Debug)]
struct Script {
    reads: VecDeque<Result<Measurement, String>>,
    last: Measurement,
    commands: Vec<DeviceCommand>,
    fail_commands: u32,
    connected: bool,
}

/// A device link that replays queued reads and logs accepted commands.
///
/// Once the queue is empty the last measurement is repeated. Clones share
/// the script, so a test can keep one handle after moving the other away.
#[derive(Debug, Clone)]
pub struct ScriptedLink {
    script: Arc<Mutex<Script>>,
}

impl Default for ScriptedLink {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                reads: VecDeque::new(),
                last: Measurement::default(),
                commands: Vec::new(),
                fail_commands: 0,
                connected: true,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn push(&self, m: Measurement) {
        self.lock().reads.push_back(Ok(m));
    }

    pub fn push_error(&self, msg: &str) {
        self.lock().reads.push_back(Err(msg.to_string()));
    }

    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    /// Fail the next `n` commands.
    pub fn fail_next_commands(&self, n: u32) {
        self.lock().fail_commands = n;
    }

    /// Commands accepted so far.
    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.lock().commands.clone()
    }

    pub fn pending_reads(&self) -> usize {
        self.lock().reads.len()
    }
}

impl DeviceLink for ScriptedLink {
    fn read_sensors(&mut self, _timeout: Duration) -> Result<Measurement, BoxError> {
        let mut s = self.lock();
        match s.reads.pop_front() {
            Some(Ok(m)) => {
                s.last = m;
                Ok(m)
            }
            Some(Err(msg)) => Err(msg.into()),
            None => Ok(s.last),
        }
    }

    fn send_command(&mut self, cmd: DeviceCommand, _timeout: Duration) -> Result<(), BoxError> {
        let mut s = self.lock();
        if s.fail_commands > 0 {
            s.fail_commands -= 1;
            return Err(format!("scripted failure: {}", cmd.name()).into());
        }
        s.commands.push(cmd);
        Ok(())
    }

    fn check_connection(&mut self) -> ConnectionStatus {
        ConnectionStatus {
            connected: self.lock().connected,
        }
    }
}

/// What a `SpyRecorder` has seen.
#[derive(Debug, Clone, Default)]
pub struct SpyLog {
    pub started: usize,
    pub stopped: usize,
    pub samples: Vec<RecordedSample>,
    pub fail_appends: bool,
    pub fail_start: bool,
}

/// A recorder that keeps everything in memory for assertions.
#[derive(Debug, Clone, Default)]
pub struct SpyRecorder {
    log: Arc<Mutex<SpyLog>>,
}

impl SpyRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SpyLog> {
        self.log.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn log(&self) -> SpyLog {
        self.lock().clone()
    }

    pub fn fail_appends(&self, fail: bool) {
        self.lock().fail_appends = fail;
    }

    pub fn fail_start(&self, fail: bool) {
        self.lock().fail_start = fail;
    }
}

impl RunRecorder for SpyRecorder {
    fn start_run(&mut self, session: &SessionConfig) -> Result<RunHandle, RigError> {
        let mut log = self.lock();
        if log.fail_start {
            return Err(RigError::Recorder("spy start failure".into()));
        }
        log.started += 1;
        Ok(RunHandle {
            id: format!("{}#{}", session.name, log.started),
            path: None,
        })
    }

    fn append_sample(&mut self, sample: &RecordedSample) -> Result<(), RigError> {
        let mut log = self.lock();
        if log.fail_appends {
            return Err(RigError::Recorder("spy append failure".into()));
        }
        log.samples.push(*sample);
        Ok(())
    }

    fn stop_run(&mut self) -> Result<(), RigError> {
        self.lock().stopped += 1;
        Ok(())
    }
}
