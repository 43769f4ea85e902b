use nalgebra::{Matrix2, OMatrix, OVector, U2, U4};

use adskalman::ObservationModel;

/// Position-only observation of the [x y xvel yvel] state.
#[derive(Debug)]
pub struct ObservationModel2D {
    observation_matrix: OMatrix<f64, U2, U4>,
    observation_matrix_transpose: OMatrix<f64, U4, U2>,
    observation_noise_covariance: Matrix2<f64>,
}

impl ObservationModel2D {
    pub fn new(measurement_noise: f64) -> Self {
        #[rustfmt::skip]
        let observation_matrix = OMatrix::<f64, U2, U4>::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0);
        let observation_matrix_transpose = observation_matrix.transpose();
        let observation_noise_covariance = Matrix2::<f64>::identity() * measurement_noise;
        Self {
            observation_matrix,
            observation_matrix_transpose,
            observation_noise_covariance,
        }
    }
}

impl ObservationModel<f64, U4, U2> for ObservationModel2D {
    fn H(&self) -> &OMatrix<f64, U2, U4> {
        &self.observation_matrix
    }
    fn HT(&self) -> &OMatrix<f64, U4, U2> {
        &self.observation_matrix_transpose
    }
    fn R(&self) -> &Matrix2<f64> {
        &self.observation_noise_covariance
    }
    fn predict_observation(&self, state: &OVector<f64, U4>) -> OVector<f64, U2> {
        self.observation_matrix * state
    }
}
