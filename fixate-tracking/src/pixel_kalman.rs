use adskalman::{
    CovarianceUpdateMethod, ObservationModel as _, StateAndCovariance,
    TransitionModelLinearNoControl as _,
};
use nalgebra::{Matrix4, Vector2, Vector4, U4};

use fixate_types::tuning::KalmanTuning;

use crate::motion_model::ConstantVelocity2DModel;
use crate::observation_model::ObservationModel2D;

/// Diagonal of the covariance prior after a reset.
const PRIOR_COVARIANCE: f64 = 10.0;

/// Constant-velocity Kalman filter over the target's pixel position.
///
/// State vector is [x y xvel yvel]. The filter is re-seeded from the
/// diagonal prior on every tracker reset.
#[derive(Debug)]
pub struct PixelKalman {
    estimate: StateAndCovariance<f64, U4>,
}

impl Default for PixelKalman {
    fn default() -> Self {
        Self {
            estimate: Self::prior(),
        }
    }
}

impl PixelKalman {
    fn prior() -> StateAndCovariance<f64, U4> {
        StateAndCovariance::new(
            Vector4::zeros(),
            Matrix4::identity() * PRIOR_COVARIANCE,
        )
    }

    pub fn reset(&mut self) {
        self.estimate = Self::prior();
    }

    /// Advance the state by `dt` seconds and return the predicted pixel
    /// position.
    pub fn predict(&mut self, dt: f64, tuning: &KalmanTuning) -> (f64, f64) {
        let model = ConstantVelocity2DModel::new(tuning.process_noise);
        self.estimate = model.calc_for_dt(dt).predict(&self.estimate);
        let state = self.estimate.state();
        (state[0], state[1])
    }

    /// Correct with a measured pixel position and return the filtered
    /// position. `None` means the innovation update failed numerically;
    /// the caller resets.
    pub fn correct(&mut self, x: f64, y: f64, tuning: &KalmanTuning) -> Option<(f64, f64)> {
        let obs_model = ObservationModel2D::new(tuning.measurement_noise);
        let observation = Vector2::new(x, y);
        match obs_model.update(
            &self.estimate,
            &observation,
            CovarianceUpdateMethod::JosephForm,
        ) {
            Ok(posterior) => {
                self.estimate = posterior;
                let state = self.estimate.state();
                Some((state[0], state[1]))
            }
            Err(e) => {
                tracing::warn!("kalman update failed: {e}");
                None
            }
        }
    }

    /// False when the state or covariance has gone non-finite.
    pub fn is_healthy(&self) -> bool {
        self.estimate.state().iter().all(|v| v.is_finite())
            && self.estimate.covariance().iter().all(|v| v.is_finite())
    }

    pub fn estimate(&self) -> &StateAndCovariance<f64, U4> {
        &self.estimate
    }
}
