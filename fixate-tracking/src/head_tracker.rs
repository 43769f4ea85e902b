use std::sync::Arc;

use fixate_types::tuning::ControlMode;
use fixate_types::{ControlCommand, Detection, TuningConfig};

use crate::native::NativeController;
use crate::pid::{Pid, PidGains};
use crate::pixel_kalman::PixelKalman;

/// Speed fraction of the one-shot recenter command issued after an
/// internal reset.
const RECENTER_SPEED: f64 = 0.1;

/// The core closed-loop tracker.
///
/// One instance is owned by the control thread; nothing else touches it.
/// Every call to [`HeadTracker::update`] is one control tick, driven by
/// the caller's clock so tests can script time.
pub struct HeadTracker {
    width: f64,
    height: f64,
    tuning: Arc<TuningConfig>,
    kf: PixelKalman,
    native: NativeController,
    pid_yaw: Pid,
    pid_pitch: Pid,
    last_update: Option<f64>,
}

impl HeadTracker {
    pub fn new(width: u32, height: u32, tuning: Arc<TuningConfig>) -> Self {
        Self {
            width: width as f64,
            height: height as f64,
            tuning,
            kf: PixelKalman::default(),
            native: NativeController::default(),
            pid_yaw: Pid::default(),
            pid_pitch: Pid::default(),
            last_update: None,
        }
    }

    /// Swap in a fresh tuning snapshot (hot reload).
    pub fn set_tuning(&mut self, tuning: Arc<TuningConfig>) {
        self.tuning = tuning;
    }

    /// Re-initialize all smoothers, estimators, schedulers and the
    /// Kalman state. Called on target change, reacquisition, and
    /// invariant violation.
    pub fn reset(&mut self) {
        self.kf.reset();
        self.native.reset();
        self.pid_yaw.reset();
        self.pid_pitch.reset();
        self.last_update = None;
    }

    fn recenter() -> ControlCommand {
        ControlCommand::Position {
            yaw: 0.0,
            pitch: 0.0,
            speed: RECENTER_SPEED,
        }
    }

    /// Normalized errors in [-1, 1]: positive x error means the target
    /// is left of center (positive yaw), positive y error below center
    /// (positive pitch).
    fn normalized_error(&self, px: f64, py: f64) -> (f64, f64) {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        (-(px - half_w) / half_w, (py - half_h) / half_h)
    }

    /// One control tick.
    ///
    /// `current_state` is the head (yaw, pitch): the interpolated sample
    /// at the detection's capture time when a detection is present, else
    /// the latest sample available. `now` is the wall clock of this tick.
    pub fn update(
        &mut self,
        detection: Option<&Detection>,
        current_state: Option<(f64, f64)>,
        now: f64,
    ) -> Option<ControlCommand> {
        let tuning = self.tuning.clone();
        let safety = &tuning.safety;

        let dt = match self.last_update {
            Some(prev) => (now - prev).clamp(safety.min_dt, safety.max_dt),
            None => safety.min_dt,
        };
        self.last_update = Some(now);

        // Predict forward through the estimated perception latency so the
        // command anticipates where the target will be when it lands.
        let (mut target_x, mut target_y) = self
            .kf
            .predict(dt + tuning.kalman.latency_comp, &tuning.kalman);

        if let Some(det) = detection {
            let (cx, cy) = det.bbox.center();
            match self.kf.correct(cx, cy, &tuning.kalman) {
                Some((fx, fy)) => {
                    target_x = fx;
                    target_y = fy;
                }
                None => {
                    self.reset();
                    return Some(Self::recenter());
                }
            }
        }

        if !self.kf.is_healthy() {
            tracing::warn!("non-finite kalman state; resetting tracker");
            self.reset();
            return Some(Self::recenter());
        }

        match tuning.control_mode {
            ControlMode::Native => {
                // The raw detection error drives position mode. The
                // filtered estimate lags during ego-motion, which turns
                // into overshoot once fed back through the head command.
                let error = detection.map(|det| {
                    let (cx, cy) = det.bbox.center();
                    self.normalized_error(cx, cy)
                });
                // Angles synchronized to the capture time take precedence
                // over the latest sample.
                let current = detection
                    .and_then(|det| det.source_angles)
                    .or(current_state);
                self.native
                    .update(error, current, dt, now, &tuning.native, safety)
                    .map(|(yaw, pitch, speed)| ControlCommand::Position { yaw, pitch, speed })
            }
            ControlMode::Pid => {
                let (err_x, err_y) = self.normalized_error(target_x, target_y);
                let kp = tuning.pid.base_kp
                    + tuning.pid.boost_kp * err_x.abs().max(err_y.abs());
                let gains_x = PidGains {
                    kp,
                    ki: tuning.pid.ki,
                    kd: tuning.pid.kd,
                    max_output: tuning.pid.max_output,
                    deadzone: tuning.native.deadzone_x,
                };
                let gains_y = PidGains {
                    deadzone: tuning.native.deadzone_y,
                    ..gains_x
                };
                let yaw = self.pid_yaw.update(err_x, dt, &gains_x);
                let pitch = self.pid_pitch.update(err_y, dt, &gains_y);
                Some(ControlCommand::Velocity { yaw, pitch })
            }
        }
    }
}
