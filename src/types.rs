use nalgebra as na;
use serde::{Deserialize, Serialize};

/// Board-to-camera pose as an axis-angle rotation and a translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RvecTvec {
    pub rvec: [f64; 3],
    pub tvec: [f64; 3],
}

impl RvecTvec {
    pub fn new(rvec: &na::DVector<f64>, tvec: &na::DVector<f64>) -> RvecTvec {
        RvecTvec {
            rvec: [rvec[0], rvec[1], rvec[2]],
            tvec: [tvec[0], tvec[1], tvec[2]],
        }
    }
    pub fn na_rvec(&self) -> na::DVector<f64> {
        na::dvector![self.rvec[0], self.rvec[1], self.rvec[2]]
    }
    pub fn na_tvec(&self) -> na::DVector<f64> {
        na::dvector![self.tvec[0], self.tvec[1], self.tvec[2]]
    }
    pub fn to_na_isometry3(&self) -> na::Isometry3<f64> {
        na::Isometry3::new(
            na::Vector3::from(self.tvec),
            na::Vector3::from(self.rvec),
        )
    }
}

pub trait ToRvecTvec {
    fn to_rvec_tvec(&self) -> RvecTvec;
}

impl ToRvecTvec for na::Isometry3<f64> {
    fn to_rvec_tvec(&self) -> RvecTvec {
        let rvec = self.rotation.scaled_axis();
        let tvec = self.translation.vector;
        RvecTvec {
            rvec: [rvec.x, rvec.y, rvec.z],
            tvec: [tvec.x, tvec.y, tvec.z],
        }
    }
}

/// Output of the calibration solve.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationResult {
    pub camera_matrix: na::Matrix3<f64>,
    /// `[k1, k2, p1, p2, k3]`
    pub distortion: [f64; 5],
    /// One pose per observation, in observation order.
    pub poses: Vec<RvecTvec>,
    /// RMS reprojection residual over all points.
    pub rms: f64,
    pub image_size: (u32, u32),
}

impl CalibrationResult {
    pub fn fx(&self) -> f64 {
        self.camera_matrix[(0, 0)]
    }
    pub fn fy(&self) -> f64 {
        self.camera_matrix[(1, 1)]
    }
    pub fn cx(&self) -> f64 {
        self.camera_matrix[(0, 2)]
    }
    pub fn cy(&self) -> f64 {
        self.camera_matrix[(1, 2)]
    }
}

pub fn camera_matrix(fx: f64, fy: f64, cx: f64, cy: f64) -> na::Matrix3<f64> {
    na::Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0)
}

/// Pixel rectangle `(x, y, width, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}
