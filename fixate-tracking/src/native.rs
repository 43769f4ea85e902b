use fixate_types::tuning::{NativeTuning, SafetyTuning};

use crate::filters::{AlphaBetaEstimator, ExponentialSmoother};
use crate::scheduler::{SchedulerLimits, TrapezoidalScheduler};

/// Per-axis filter chain: smoothed target, velocity estimate, motion
/// scheduler.
#[derive(Debug, Default)]
struct Axis {
    smoother: ExponentialSmoother,
    estimator: AlphaBetaEstimator,
    scheduler: TrapezoidalScheduler,
}

impl Axis {
    fn reset(&mut self) {
        self.smoother.reset();
        self.estimator.reset();
        self.scheduler.reset();
    }

    fn observe(
        &mut self,
        error: f64,
        current: f64,
        arrival_time: f64,
        fov: f64,
        deadzone: f64,
        smoothing: f64,
        tuning: &NativeTuning,
    ) {
        let error = if error.abs() <= deadzone { 0.0 } else { error };

        // fov is the total field of view, so the offset is error * fov/2.
        // `current` is the joint angle at capture time when available,
        // which keeps the robot's own motion out of the error signal.
        let raw_target = current + error * fov * 0.5;

        self.smoother.update(raw_target, smoothing);
        self.estimator.update(
            raw_target,
            arrival_time,
            tuning.gain_v,
            tuning.max_velocity * tuning.estimator_limit_multiplier,
        );
    }

    /// Ghost pursuit: advance the smoothed target by the scheduler's
    /// decayed velocity so motion tapers instead of freezing.
    fn propagate(&mut self, dt: f64, tuning: &NativeTuning, safety: &SafetyTuning) {
        let p_dt = dt.min(safety.propagation_dt);
        let v = self.scheduler.velocity() * tuning.vel_decay;
        self.smoother.advance(v * p_dt);
    }
}

/// Position-mode controller: deadzone, ego-motion compensated target
/// reconstruction, exponential smoothing, and trapezoidal scheduling,
/// independently per axis.
#[derive(Debug, Default)]
pub struct NativeController {
    yaw: Axis,
    pitch: Axis,
}

impl NativeController {
    pub fn reset(&mut self) {
        self.yaw.reset();
        self.pitch.reset();
    }

    /// One control tick.
    ///
    /// `error` is the raw normalized detection error (absent while the
    /// detection is missing); `current` the head (yaw, pitch) to use as
    /// the target reference; `arrival_time` the wall-clock time the
    /// measurement arrived. Returns the next `(yaw, pitch, speed)`
    /// position command, or `None` until both a target and the head
    /// state have been seen.
    pub fn update(
        &mut self,
        error: Option<(f64, f64)>,
        current: Option<(f64, f64)>,
        dt: f64,
        arrival_time: f64,
        tuning: &NativeTuning,
        safety: &SafetyTuning,
    ) -> Option<(f64, f64, f64)> {
        match (error, current) {
            (Some((err_x, err_y)), Some((cur_yaw, cur_pitch))) => {
                self.yaw.observe(
                    err_x,
                    cur_yaw,
                    arrival_time,
                    tuning.fov_x,
                    tuning.deadzone_x,
                    tuning.smoothing_x,
                    tuning,
                );
                self.pitch.observe(
                    err_y,
                    cur_pitch,
                    arrival_time,
                    tuning.fov_y,
                    tuning.deadzone_y,
                    tuning.smoothing_y,
                    tuning,
                );
            }
            _ => {
                self.yaw.propagate(dt, tuning, safety);
                self.pitch.propagate(dt, tuning, safety);
            }
        }

        let target_yaw = self.yaw.smoother.value()?;
        let target_pitch = self.pitch.smoother.value()?;
        let (cur_yaw, cur_pitch) = current?;

        let inner_dt = dt.clamp(safety.min_dt, safety.max_dt);
        let limits = SchedulerLimits {
            max_velocity: tuning.max_velocity,
            max_accel: tuning.max_accel,
            kp: tuning.gain_p,
        };

        // The estimator's velocity is deliberately not fed forward; it
        // only informs propagation. Feed-forward stays zero.
        let cmd_yaw = self
            .yaw
            .scheduler
            .update(target_yaw, cur_yaw, inner_dt, 0.0, &limits);
        let cmd_pitch = self
            .pitch
            .scheduler
            .update(target_pitch, cur_pitch, inner_dt, 0.0, &limits);

        Some((cmd_yaw, cmd_pitch, tuning.fraction_max_speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tuning() -> NativeTuning {
        NativeTuning::default()
    }

    fn safety() -> SafetyTuning {
        SafetyTuning::default()
    }

    #[test]
    fn no_command_before_first_observation() {
        let mut ctrl = NativeController::default();
        let out = ctrl.update(None, Some((0.0, 0.0)), 0.01, 0.0, &tuning(), &safety());
        assert!(out.is_none());
    }

    #[test]
    fn no_command_without_head_state() {
        let mut ctrl = NativeController::default();
        let out = ctrl.update(Some((0.5, 0.0)), None, 0.01, 0.0, &tuning(), &safety());
        assert!(out.is_none());
    }

    #[test]
    fn centered_error_holds_position() {
        let mut ctrl = NativeController::default();
        for k in 0..30 {
            let t = k as f64 * 0.01;
            let out = ctrl
                .update(Some((0.0, 0.0)), Some((0.0, 0.0)), 0.01, t, &tuning(), &safety())
                .unwrap();
            assert_relative_eq!(out.0, 0.0, epsilon = 1e-9);
            assert_relative_eq!(out.1, 0.0, epsilon = 1e-9);
        }
        assert_eq!(ctrl.yaw.scheduler.velocity(), 0.0);
    }

    #[test]
    fn ghost_pursuit_tapers_with_decay() {
        let mut ctrl = NativeController::default();
        let mut t = 0.0;
        for _ in 0..20 {
            ctrl.update(Some((-0.5, 0.0)), Some((0.0, 0.0)), 0.01, t, &tuning(), &safety());
            t += 0.01;
        }
        let v_before = ctrl.yaw.scheduler.velocity();
        assert!(v_before.abs() > 0.0);
        let target_before = ctrl.yaw.smoother.value().unwrap();
        ctrl.update(None, Some((0.0, 0.0)), 0.01, t, &tuning(), &safety());
        let target_after = ctrl.yaw.smoother.value().unwrap();
        // target moved in the direction of the scheduler velocity
        assert!((target_after - target_before).signum() == v_before.signum());
        assert!((target_after - target_before).abs() <= v_before.abs() * 0.01 + 1e-12);
    }

    #[test]
    fn propagation_dt_is_capped() {
        let mut ctrl = NativeController::default();
        ctrl.update(Some((-0.5, 0.0)), Some((0.0, 0.0)), 0.01, 0.0, &tuning(), &safety());
        for k in 1..10 {
            ctrl.update(
                Some((-0.5, 0.0)),
                Some((0.0, 0.0)),
                0.01,
                k as f64 * 0.01,
                &tuning(),
                &safety(),
            );
        }
        let before = ctrl.yaw.smoother.value().unwrap();
        let v = ctrl.yaw.scheduler.velocity();
        // a wild dt must not advance the ghost target more than the cap
        ctrl.update(None, Some((0.0, 0.0)), 10.0, 1.0, &tuning(), &safety());
        let after = ctrl.yaw.smoother.value().unwrap();
        assert!((after - before).abs() <= v.abs() * safety().propagation_dt + 1e-9);
    }
}
