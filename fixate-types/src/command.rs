use serde::{Deserialize, Serialize};

/// Output of one head-tracker tick, consumed by the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ControlCommand {
    /// Absolute joint targets with a fraction-of-maximum speed in `(0, 1]`.
    Position {
        yaw: f64,
        pitch: f64,
        speed: f64,
    },
    /// Joint velocities, rad/s. Reserved: the upstream shim exposes only
    /// set-angles, so the actuator drops these after logging. Writing
    /// `Velocity { 0, 0 }` still serves to overwrite a pending position
    /// command in the actuator mailbox.
    Velocity {
        yaw: f64,
        pitch: f64,
    },
}
