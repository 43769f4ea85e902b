/// Trapezoidal motion scheduler for one joint axis.
///
/// Velocity toward the target is proportional (`kp`), clamped to
/// `±max_velocity`, slew-rate limited to `±max_accel * dt` against the
/// previous velocity, then integrated into the commanded position.
///
/// Invariants, per call with the same limits:
/// `|v_k - v_{k-1}| <= max_accel * dt` and
/// `|cmd_k - cmd_{k-1}| <= max_velocity * dt`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrapezoidalScheduler {
    velocity: f64,
    last_cmd: Option<f64>,
}

pub struct SchedulerLimits {
    pub max_velocity: f64,
    pub max_accel: f64,
    pub kp: f64,
}

impl TrapezoidalScheduler {
    pub fn reset(&mut self) {
        self.velocity = 0.0;
        self.last_cmd = None;
    }

    /// Current scheduler velocity, rad/s.
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn last_cmd(&self) -> Option<f64> {
        self.last_cmd
    }

    /// Compute the next commanded position. The first call seeds the
    /// command at the measured position and returns it unchanged.
    pub fn update(
        &mut self,
        target: f64,
        current: f64,
        dt: f64,
        feed_forward: f64,
        limits: &SchedulerLimits,
    ) -> f64 {
        let last_cmd = match self.last_cmd {
            None => {
                self.last_cmd = Some(current);
                self.velocity = 0.0;
                return current;
            }
            Some(c) => c,
        };

        let desired = ((target - last_cmd) * limits.kp + feed_forward)
            .clamp(-limits.max_velocity, limits.max_velocity);

        let max_dv = limits.max_accel * dt;
        let dv = (desired - self.velocity).clamp(-max_dv, max_dv);
        self.velocity += dv;

        let cmd = last_cmd + self.velocity * dt;
        self.last_cmd = Some(cmd);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const LIMITS: SchedulerLimits = SchedulerLimits {
        max_velocity: 2.0,
        max_accel: 10.0,
        kp: 8.0,
    };

    #[test]
    fn first_call_seeds_at_current_position() {
        let mut s = TrapezoidalScheduler::default();
        let cmd = s.update(1.0, 0.25, 0.01, 0.0, &LIMITS);
        assert_eq!(cmd, 0.25);
        assert_eq!(s.velocity(), 0.0);
    }

    #[test]
    fn velocity_slew_is_bounded() {
        let mut s = TrapezoidalScheduler::default();
        s.update(0.0, 0.0, 0.01, 0.0, &LIMITS);
        let mut prev_v = s.velocity();
        for _ in 0..100 {
            s.update(-0.3125, 0.0, 0.01, 0.0, &LIMITS);
            let v = s.velocity();
            assert!(
                (v - prev_v).abs() <= LIMITS.max_accel * 0.01 + 1e-12,
                "dv {} exceeds bound",
                v - prev_v
            );
            assert!(v.abs() <= LIMITS.max_velocity + 1e-12);
            prev_v = v;
        }
    }

    #[test]
    fn position_step_is_bounded_by_max_velocity() {
        let mut s = TrapezoidalScheduler::default();
        let mut prev = s.update(0.0, 0.0, 0.01, 0.0, &LIMITS);
        for _ in 0..200 {
            let cmd = s.update(5.0, 0.0, 0.01, 0.0, &LIMITS);
            assert!((cmd - prev).abs() <= LIMITS.max_velocity * 0.01 + 1e-12);
            prev = cmd;
        }
    }

    #[test]
    fn settles_on_target_without_overshoot() {
        let mut s = TrapezoidalScheduler::default();
        let target = -0.3125;
        s.update(target, 0.0, 0.01, 0.0, &LIMITS);
        let mut cmd = 0.0;
        for _ in 0..100 {
            cmd = s.update(target, 0.0, 0.01, 0.0, &LIMITS);
            assert!(cmd >= target * 1.02, "overshoot: {cmd}");
        }
        assert_relative_eq!(cmd, target, epsilon = target.abs() * 0.05);
    }
}
