/// PID controller over the normalized pixel error for one axis,
/// emitting a joint velocity.
///
/// The integrator is clamped to ±0.5 and zeroed whenever the error is
/// inside the deadzone.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pid {
    prev_error: f64,
    integral: f64,
    last_output: f64,
}

pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub max_output: f64,
    pub deadzone: f64,
}

const INTEGRAL_CLAMP: f64 = 0.5;

impl Pid {
    pub fn reset(&mut self) {
        self.prev_error = 0.0;
        self.integral = 0.0;
        self.last_output = 0.0;
    }

    pub fn update(&mut self, error: f64, dt: f64, gains: &PidGains) -> f64 {
        if dt <= 1e-4 {
            return self.last_output;
        }

        let error = if error.abs() <= gains.deadzone {
            self.integral = 0.0;
            0.0
        } else {
            error
        };

        let p_term = gains.kp * error;
        let d_term = gains.kd * (error - self.prev_error) / dt;

        self.integral = (self.integral + error * dt).clamp(-INTEGRAL_CLAMP, INTEGRAL_CLAMP);
        let i_term = gains.ki * self.integral;

        let output =
            (p_term + d_term + i_term).clamp(-gains.max_output, gains.max_output);

        self.prev_error = error;
        self.last_output = output;
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn gains() -> PidGains {
        PidGains {
            kp: 0.1,
            ki: 0.01,
            kd: 0.0,
            max_output: 0.12,
            deadzone: 0.02,
        }
    }

    #[test]
    fn proportional_response() {
        let mut pid = Pid::default();
        let u = pid.update(0.5, 0.01, &gains());
        assert_relative_eq!(u, 0.1 * 0.5 + 0.01 * 0.5 * 0.01, epsilon = 1e-12);
    }

    #[test]
    fn error_inside_deadzone_is_ignored_and_resets_integral() {
        let mut pid = Pid::default();
        pid.update(0.5, 0.01, &gains());
        let u = pid.update(0.019, 0.01, &gains());
        assert_eq!(pid.integral, 0.0);
        assert_relative_eq!(u, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn error_exactly_at_deadzone_is_zeroed() {
        let mut pid = Pid::default();
        let u = pid.update(0.02, 0.01, &gains());
        assert_eq!(u, 0.0);
    }

    #[test]
    fn output_is_clamped() {
        let mut pid = Pid::default();
        let u = pid.update(100.0, 0.01, &gains());
        assert_eq!(u, 0.12);
    }

    #[test]
    fn integral_is_clamped() {
        let mut pid = Pid::default();
        for _ in 0..10_000 {
            pid.update(1.0, 0.01, &gains());
        }
        assert!(pid.integral <= INTEGRAL_CLAMP);
    }

    #[test]
    fn tiny_dt_returns_previous_output() {
        let mut pid = Pid::default();
        let u1 = pid.update(0.5, 0.01, &gains());
        let u2 = pid.update(-0.5, 1e-5, &gains());
        assert_eq!(u1, u2);
    }
}
