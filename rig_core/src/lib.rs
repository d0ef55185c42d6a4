#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core process control for the catheter trackability rig (hardware-agnostic).
//!
//! All device interactions go through `rig_traits::DeviceLink`.
//!
//! ## Architecture
//!
//! - **Controller**: phase state machine for insertion and retraction (`controller`)
//! - **Interlock**: start gating on bath temperature (`interlock`)
//! - **Curves**: one-shot checkpoint flags along the insertion path (`curve`)
//! - **Poller**: background telemetry thread with placeholder fallback (`poller`)
//! - **Recorder**: per-run sample persistence (`recorder`)
//! - **Runtime**: `Rig` owns one controller thread and one poller thread (`runner`)
//!
//! Distances are compared in whole millimetres, truncated by default; see `util::within_mm`.

pub mod builder;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod curve;
pub mod error;
pub mod hw_error;
pub mod interlock;
pub mod link;
pub mod mocks;
pub mod poller;
pub mod recorder;
pub mod runner;
pub mod session;
pub mod status;
pub mod types;
pub mod util;

pub use builder::RigBuilder;
pub use config::{ControllerCfg, InterlockCfg, PollCfg, RecorderCfg};
pub use controller::{ProcessController, ProcessSnapshot, UserCommand};
pub use curve::{CurveStatus, CurveThresholdTracker};
pub use error::{BuildError, CommandError, RejectReason, Result, RigError};
pub use interlock::{InterlockState, InterlockStatus, TemperatureInterlock};
pub use poller::{PollEvent, PollMode, TelemetryPoller};
pub use recorder::{CsvRunRecorder, NullRecorder, RecordedSample, RunHandle, RunRecorder};
pub use runner::Rig;
pub use session::{Curve, SessionConfig};
pub use status::{Notice, Phase};
pub use types::{ChartSample, Provenance, SensorReading};
pub use util::Rounding;
