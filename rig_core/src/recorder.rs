//! Run recording: persists every fresh sample of a run.
//!
//! The controller calls `start_run` when a run begins, `append_sample` per
//! fresh reading and `stop_run` when the run completes or is reset. Recorder
//! failures are logged by the controller and never block the test.

use crate::config::RecorderCfg;
use crate::error::RigError;
use crate::session::SessionConfig;
use crate::status::Phase;
use crate::types::{Provenance, SensorReading};
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifies one recorded run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub id: String,
    pub path: Option<PathBuf>,
}

impl std::fmt::Display for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(p) => write!(f, "{} ({})", self.id, p.display()),
            None => f.write_str(&self.id),
        }
    }
}

/// One row of a run log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecordedSample {
    pub timestamp_ms: u64,
    pub elapsed_ms: u64,
    pub distance_mm: f64,
    pub force_mn: f64,
    pub temperature_c: f64,
    pub provenance: Provenance,
    pub phase: Phase,
}

impl RecordedSample {
    pub fn new(reading: &SensorReading, elapsed_ms: u64, phase: Phase) -> Self {
        Self {
            timestamp_ms: reading.timestamp_ms,
            elapsed_ms,
            distance_mm: reading.distance_mm,
            force_mn: reading.force_mn,
            temperature_c: reading.temperature_c,
            provenance: reading.provenance,
            phase,
        }
    }
}

pub trait RunRecorder {
    fn start_run(&mut self, session: &SessionConfig) -> Result<RunHandle, RigError>;
    fn append_sample(&mut self, sample: &RecordedSample) -> Result<(), RigError>;
    fn stop_run(&mut self) -> Result<(), RigError>;
}

impl<R: RunRecorder + ?Sized> RunRecorder for Box<R> {
    fn start_run(&mut self, session: &SessionConfig) -> Result<RunHandle, RigError> {
        (**self).start_run(session)
    }
    fn append_sample(&mut self, sample: &RecordedSample) -> Result<(), RigError> {
        (**self).append_sample(sample)
    }
    fn stop_run(&mut self) -> Result<(), RigError> {
        (**self).stop_run()
    }
}

impl<R: RunRecorder + ?Sized> RunRecorder for &mut R {
    fn start_run(&mut self, session: &SessionConfig) -> Result<RunHandle, RigError> {
        (**self).start_run(session)
    }
    fn append_sample(&mut self, sample: &RecordedSample) -> Result<(), RigError> {
        (**self).append_sample(sample)
    }
    fn stop_run(&mut self) -> Result<(), RigError> {
        (**self).stop_run()
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

impl RunRecorder for NullRecorder {
    fn start_run(&mut self, session: &SessionConfig) -> Result<RunHandle, RigError> {
        Ok(RunHandle {
            id: session.name.clone(),
            path: None,
        })
    }
    fn append_sample(&mut self, _sample: &RecordedSample) -> Result<(), RigError> {
        Ok(())
    }
    fn stop_run(&mut self) -> Result<(), RigError> {
        Ok(())
    }
}

/// CSV column order.
pub const CSV_HEADER: [&str; 7] = [
    "timestamp_ms",
    "elapsed_ms",
    "distance_mm",
    "force_mn",
    "temperature_c",
    "provenance",
    "phase",
];

/// Writes one CSV file per run: `<dir>/<session>-<unix secs>.csv`.
pub struct CsvRunRecorder {
    dir: PathBuf,
    active: Option<(PathBuf, csv::Writer<File>)>,
}

impl CsvRunRecorder {
    pub fn new(cfg: &RecorderCfg) -> Self {
        Self {
            dir: cfg.dir.clone(),
            active: None,
        }
    }

    /// Path of the run currently being written, if any.
    pub fn current_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|(p, _)| p.as_path())
    }

    fn next_path(&self, session: &str) -> PathBuf {
        let stem: String = session
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mut path = self.dir.join(format!("{stem}-{secs}.csv"));
        let mut n = 1u32;
        while path.exists() {
            path = self.dir.join(format!("{stem}-{secs}-{n}.csv"));
            n += 1;
        }
        path
    }
}

fn rec_err(what: &str, path: &Path, e: impl std::fmt::Display) -> RigError {
    RigError::Recorder(format!("{what} {}: {e}", path.display()))
}

impl RunRecorder for CsvRunRecorder {
    fn start_run(&mut self, session: &SessionConfig) -> Result<RunHandle, RigError> {
        if self.active.is_some() {
            // A run that was never stopped; close it before opening the next.
            self.stop_run()?;
        }
        std::fs::create_dir_all(&self.dir).map_err(|e| rec_err("create", &self.dir, e))?;
        let path = self.next_path(&session.name);
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .map_err(|e| rec_err("open", &path, e))?;
        writer
            .write_record(CSV_HEADER)
            .map_err(|e| rec_err("write header to", &path, e))?;
        writer.flush().map_err(|e| rec_err("flush", &path, e))?;
        tracing::info!(path = %path.display(), session = %session.name, "run log opened");
        let handle = RunHandle {
            id: session.name.clone(),
            path: Some(path.clone()),
        };
        self.active = Some((path, writer));
        Ok(handle)
    }

    fn append_sample(&mut self, sample: &RecordedSample) -> Result<(), RigError> {
        let Some((path, writer)) = self.active.as_mut() else {
            return Err(RigError::Recorder("no run in progress".into()));
        };
        writer
            .serialize(sample)
            .map_err(|e| rec_err("append to", path, e))?;
        // Flush per row so a crash loses at most the sample in flight.
        writer.flush().map_err(|e| rec_err("flush", path, e))
    }

    fn stop_run(&mut self) -> Result<(), RigError> {
        match self.active.take() {
            Some((path, mut writer)) => {
                writer.flush().map_err(|e| rec_err("flush", &path, e))?;
                tracing::info!(path = %path.display(), "run log closed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_sanitized() {
        let rec = CsvRunRecorder::new(&RecorderCfg {
            dir: PathBuf::from("/tmp/unused"),
        });
        let p = rec.next_path("6F guide / arch");
        let name = p.file_name().and_then(|n| n.to_str()).unwrap();
        assert!(name.starts_with("6F_guide___arch-"));
        assert!(name.ends_with(".csv"));
    }

    #[test]
    fn append_without_run_is_an_error() {
        let mut rec = CsvRunRecorder::new(&RecorderCfg::default());
        let reading = SensorReading {
            timestamp_ms: 0,
            distance_mm: 0.0,
            force_mn: 0.0,
            temperature_c: 0.0,
            provenance: Provenance::Real,
        };
        let err = rec
            .append_sample(&RecordedSample::new(&reading, 0, Phase::Insertion))
            .unwrap_err();
        assert!(matches!(err, RigError::Recorder(_)));
        assert!(rec.stop_run().is_ok());
    }
}
