//! Core type definitions for the fixate gaze tracking controller.
//!
//! This crate holds the value types exchanged between the perception
//! pipeline, the head tracker and the actuator, the on-disk tuning
//! document, and the multipart wire framing shared by every channel.

mod command;
mod detect;
mod joints;
pub mod tuning;
pub mod wire;

pub use command::ControlCommand;
pub use detect::{BBox, Detection};
pub use joints::{JointSample, JOINT_RECORD_SIZE};
pub use tuning::TuningConfig;

/// Current wall clock as seconds since the unix epoch.
///
/// All channel publishers stamp with this clock, so latency arithmetic
/// (`now - capture_ts`) is valid across processes on the same host.
pub fn unix_time() -> f64 {
    let now = chrono::Utc::now();
    (now.timestamp() as f64) + (now.timestamp_subsec_nanos() as f64 * 1e-9)
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("malformed wire message: {0}")]
    MalformedMessage(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
