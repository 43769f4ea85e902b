//! Optional per-tick motion telemetry, written as CSV for offline
//! analysis of tracking behavior.

use std::path::Path;

use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct TelemetryRow {
    /// Seconds since the log was opened.
    pub time: f64,
    /// Whether this tick consumed a detection.
    pub measured: bool,
    pub cmd_yaw: Option<f64>,
    pub cmd_pitch: Option<f64>,
    /// Capture-to-tick latency of the consumed detection, seconds.
    pub latency: Option<f64>,
    pub target_lost: bool,
}

pub struct TelemetryLog {
    writer: csv::Writer<std::fs::File>,
    start: f64,
}

impl TelemetryLog {
    pub fn create<P: AsRef<Path>>(path: P, now: f64) -> Result<Self> {
        let writer = csv::Writer::from_path(path)?;
        Ok(Self { writer, start: now })
    }

    pub fn append(&mut self, now: f64, mut row: TelemetryRow) {
        row.time = now - self.start;
        if let Err(e) = self.writer.serialize(&row) {
            tracing::warn!("telemetry write failed: {e}");
        }
        let _ = self.writer.flush();
    }
}
