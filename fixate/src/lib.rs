//! Operator-in-the-loop visual head tracking for a remote robot.
//!
//! The process subscribes to timestamped video and joint-state
//! channels, delegates per-frame inference to an external perception
//! service, and drives the robot's head through a bounded, smoothed
//! 100 Hz control loop decoupled from perception throughput.

pub mod actuator;
pub mod command_listener;
pub mod config;
pub mod error;
pub mod frame;
pub mod frame_receiver;
pub mod interpreter;
pub mod launcher;
pub mod mailbox;
pub mod orchestrator;
pub mod perception;
pub mod robot;
pub mod state_buffer;
pub mod subscribe;
pub mod telemetry;

pub use config::{parse_config_file, FixateConfig};
pub use error::{FixateError, Result};
pub use launcher::{fixate_start, init_tracing};
pub use orchestrator::Orchestrator;
