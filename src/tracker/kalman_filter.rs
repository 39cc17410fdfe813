//! Kalman filter for centroid tracking using ndarray and a nalgebra-based inverse.
//!
//! State layout is `[x, y, vx, vy]` for the constant-velocity model and
//! `[x, y, vx, vy, ax, ay]` for the constant-acceleration model. Only the
//! position is measured.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Motion model used by the prediction step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MotionModel {
    #[default]
    ConstantVelocity,
    ConstantAcceleration,
}

impl MotionModel {
    /// Dimension of the state vector.
    pub fn state_dim(self) -> usize {
        match self {
            MotionModel::ConstantVelocity => 4,
            MotionModel::ConstantAcceleration => 6,
        }
    }
}

/// Noise parameters, all standard deviations in pixels (per frame).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KalmanNoise {
    /// Detector measurement noise
    pub measurement: f64,
    /// Process noise on position
    pub position: f64,
    /// Process noise on velocity
    pub velocity: f64,
    /// Process noise on acceleration (constant-acceleration model only)
    pub acceleration: f64,
}

impl Default for KalmanNoise {
    fn default() -> Self {
        Self {
            measurement: 2.0,
            position: 1.0,
            velocity: 2.0,
            acceleration: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    model: MotionModel,
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    noise: KalmanNoise,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new(MotionModel::default(), KalmanNoise::default())
    }
}

impl KalmanFilter {
    pub fn new(model: MotionModel, noise: KalmanNoise) -> Self {
        let n = model.state_dim();
        let mut motion_mat = Array2::eye(n);
        for i in 0..2 {
            motion_mat[[i, 2 + i]] = 1.0;
        }
        if model == MotionModel::ConstantAcceleration {
            for i in 0..2 {
                motion_mat[[i, 4 + i]] = 0.5;
                motion_mat[[2 + i, 4 + i]] = 1.0;
            }
        }

        let mut update_mat = Array2::zeros((2, n));
        for i in 0..2 {
            update_mat[[i, i]] = 1.0;
        }

        Self {
            model,
            motion_mat,
            update_mat,
            noise,
        }
    }

    pub fn model(&self) -> MotionModel {
        self.model
    }

    /// Diagonal covariance from per-block standard deviations.
    fn diagonal(&self, position: f64, velocity: f64, acceleration: f64) -> Array2<f64> {
        let n = self.model.state_dim();
        let mut cov = Array2::zeros((n, n));
        for i in 0..n {
            let std = match i {
                0 | 1 => position,
                2 | 3 => velocity,
                _ => acceleration,
            };
            cov[[i, i]] = std * std;
        }
        cov
    }

    /// Create a track state from an unassociated measurement. Velocity and
    /// acceleration start at zero with a wide uncertainty.
    pub fn initiate(&self, measurement: [f64; 2]) -> (Array1<f64>, Array2<f64>) {
        let mut mean = Array1::zeros(self.model.state_dim());
        mean[0] = measurement[0];
        mean[1] = measurement[1];

        let cov = self.diagonal(
            2.0 * self.noise.measurement,
            10.0 * self.noise.velocity,
            10.0 * self.noise.acceleration,
        );

        (mean, cov)
    }

    pub fn predict(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let motion_cov = self.diagonal(
            self.noise.position,
            self.noise.velocity,
            self.noise.acceleration,
        );

        let new_mean = self.motion_mat.dot(mean);
        let new_covariance = self.motion_mat.dot(covariance).dot(&self.motion_mat.t()) + motion_cov;

        (new_mean, new_covariance)
    }

    /// Project the state into measurement space.
    pub fn project(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let r = self.noise.measurement * self.noise.measurement;
        let innovation_cov = Array2::from_diag(&Array1::from_elem(2, r));

        let mean_proj = self.update_mat.dot(mean);
        let covariance_proj =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + innovation_cov;

        (mean_proj, covariance_proj)
    }

    /// Fold a position measurement into the state. Returns `None` when the
    /// innovation covariance cannot be inverted.
    pub fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 2],
    ) -> Option<(Array1<f64>, Array2<f64>)> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let innovation = Array1::from_vec(measurement.to_vec()) - projected_mean;

        // K = P * H^T * S^-1
        let s_inv = invert_2x2(&projected_cov)?;
        let pht = covariance.dot(&self.update_mat.t());
        let kalman_gain = pht.dot(&s_inv);

        let new_mean = mean + &kalman_gain.dot(&innovation);
        let new_covariance = covariance - &kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());

        Some((new_mean, new_covariance))
    }
}

/// Invert a 2x2 matrix using nalgebra (pure Rust).
fn invert_2x2(m: &Array2<f64>) -> Option<Array2<f64>> {
    let nm = nalgebra::Matrix2::new(m[[0, 0]], m[[0, 1]], m[[1, 0]], m[[1, 1]]);
    let inv = nm.try_inverse()?;
    let mut res = Array2::zeros((2, 2));
    for i in 0..2 {
        for j in 0..2 {
            res[[i, j]] = inv[(i, j)];
        }
    }
    Some(res)
}
