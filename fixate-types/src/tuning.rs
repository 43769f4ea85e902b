//! Runtime tuning parameters.
//!
//! The tuning document is a single JSON file re-read on a ~1 s cadence by
//! the control thread. Each successful parse publishes a fresh immutable
//! snapshot; a parse error leaves the prior snapshot in force. Nothing in
//! here is ever mutated in place.

use serde::{Deserialize, Serialize};

/// Which control strategy the head tracker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Smoothed position scheduling through the native set-angles call.
    #[default]
    Native,
    /// PID over the normalized pixel error, emitting velocities.
    Pid,
}

/// Kalman filter parameters (pixel space).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KalmanTuning {
    #[serde(default = "default_process_noise")]
    pub process_noise: f64,
    /// Unusually large by design: in pixel space a large R makes the
    /// filter smooth detector jitter heavily.
    #[serde(default = "default_measurement_noise")]
    pub measurement_noise: f64,
    /// Seconds of lead added to the prediction horizon so the command
    /// anticipates where the target will be when the actuator catches up.
    #[serde(default)]
    pub latency_comp: f64,
}

fn default_process_noise() -> f64 {
    0.1
}
fn default_measurement_noise() -> f64 {
    150.0
}

impl Default for KalmanTuning {
    fn default() -> Self {
        Self {
            process_noise: default_process_noise(),
            measurement_noise: default_measurement_noise(),
            latency_comp: 0.05,
        }
    }
}

/// Native position-mode controller parameters. Angles are radians,
/// velocities rad/s, accelerations rad/s².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NativeTuning {
    /// Full horizontal field of view of the camera.
    pub fov_x: f64,
    /// Full vertical field of view of the camera.
    pub fov_y: f64,
    /// Normalized-error deadzones per axis.
    pub deadzone_x: f64,
    pub deadzone_y: f64,
    pub max_velocity: f64,
    pub max_accel: f64,
    /// Proportional gain of the trapezoidal scheduler.
    pub gain_p: f64,
    /// Blend gain of the alpha-beta velocity estimator.
    pub gain_v: f64,
    /// The estimator clamps instantaneous velocity to
    /// `estimator_limit_multiplier * max_velocity`.
    pub estimator_limit_multiplier: f64,
    /// Target smoothing factors per axis; EMA alpha is `1 - smoothing`.
    pub smoothing_x: f64,
    pub smoothing_y: f64,
    /// Ghost-pursuit velocity decay applied per tick without a detection.
    pub vel_decay: f64,
    /// Speed fraction forwarded with every position command.
    pub fraction_max_speed: f64,
    /// Seconds without a measurement before the target is declared lost.
    pub target_lost_timeout: f64,
}

impl Default for NativeTuning {
    fn default() -> Self {
        Self {
            fov_x: 1.0,
            fov_y: 0.77,
            deadzone_x: 0.02,
            deadzone_y: 0.03,
            max_velocity: 2.0,
            max_accel: 10.0,
            gain_p: 8.0,
            gain_v: 0.1,
            estimator_limit_multiplier: 1.5,
            smoothing_x: 0.5,
            smoothing_y: 0.5,
            vel_decay: 0.95,
            fraction_max_speed: 0.2,
            target_lost_timeout: 0.5,
        }
    }
}

/// PID velocity-mode controller parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidTuning {
    pub base_kp: f64,
    /// Adaptive gain: `kp = base_kp + boost_kp * max(|err_x|, |err_y|)`.
    pub boost_kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub max_output: f64,
}

impl Default for PidTuning {
    fn default() -> Self {
        Self {
            base_kp: 0.03,
            boost_kp: 0.0,
            ki: 0.01,
            kd: 0.025,
            max_output: 0.12,
        }
    }
}

/// Safety clamps for time deltas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyTuning {
    pub min_dt: f64,
    pub max_dt: f64,
    /// Cap on the dt used to advance a ghost target.
    pub propagation_dt: f64,
}

impl Default for SafetyTuning {
    fn default() -> Self {
        Self {
            min_dt: 0.001,
            max_dt: 0.05,
            propagation_dt: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StiffnessTuning {
    pub min: f64,
}

impl Default for StiffnessTuning {
    fn default() -> Self {
        Self { min: 0.65 }
    }
}

/// The complete tuning snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TuningConfig {
    pub control_mode: ControlMode,
    pub kalman: KalmanTuning,
    pub native: NativeTuning,
    pub pid: PidTuning,
    pub safety: SafetyTuning,
    pub stiffness: StiffnessTuning,
}

impl TuningConfig {
    pub fn from_json(buf: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(buf)?)
    }
}
