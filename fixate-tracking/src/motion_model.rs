use nalgebra::{Matrix4, U4};

use adskalman::TransitionModelLinearNoControl;

/// Constant velocity motion model in pixel coordinates, parameterized by
/// `dt`. Calling `calc_for_dt()` returns a motion model for a specific
/// `dt`.
///
/// The state vector is [x y xvel yvel].
#[derive(Debug)]
pub struct ConstantVelocity2DModel {
    process_noise: f64,
}

impl ConstantVelocity2DModel {
    pub fn new(process_noise: f64) -> Self {
        Self { process_noise }
    }

    /// For a given `dt`, create a new instance of the motion model.
    pub fn calc_for_dt(&self, dt: f64) -> MotionModel2DFixedDt {
        // This is "A" in most Kalman filter descriptions.
        #[rustfmt::skip]
        let transition_model = Matrix4::<f64>::new(
            1.0, 0.0,  dt, 0.0,
            0.0, 1.0, 0.0,  dt,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0);
        let transition_model_transpose = transition_model.transpose();

        // Q is a fixed diagonal per prediction step, not the
        // dt-discretized form.
        let transition_noise_covariance = Matrix4::<f64>::identity() * self.process_noise;
        MotionModel2DFixedDt {
            transition_model,
            transition_model_transpose,
            transition_noise_covariance,
        }
    }
}

/// Constant velocity motion model for fixed dt.
///
/// The state vector is [x y xvel yvel].
#[derive(Debug)]
pub struct MotionModel2DFixedDt {
    transition_model: Matrix4<f64>,
    transition_model_transpose: Matrix4<f64>,
    transition_noise_covariance: Matrix4<f64>,
}

impl TransitionModelLinearNoControl<f64, U4> for MotionModel2DFixedDt {
    fn F(&self) -> &Matrix4<f64> {
        &self.transition_model
    }
    fn FT(&self) -> &Matrix4<f64> {
        &self.transition_model_transpose
    }
    fn Q(&self) -> &Matrix4<f64> {
        &self.transition_noise_covariance
    }
}
