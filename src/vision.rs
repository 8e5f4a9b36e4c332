//! Computer vision primitives the calibration workflow is built on.
//!
//! The workflow only talks to [`VisionBackend`], so tests can swap in a
//! backend with scripted detections.

use glam::Vec2;
use image::{DynamicImage, GrayImage};
use nalgebra as na;

use crate::camera_model::{CameraModel, OpenCVModel5, undistort_image};
use crate::config::{CalibConfig, CalibrateOptions, DetectorConfig, SubpixConfig};
use crate::detection;
use crate::error::Result;
use crate::types::{CalibrationResult, Roi, RvecTvec};

pub trait VisionBackend: Sync {
    /// Inner corners in board order, `None` when the pattern is not found.
    fn detect_checkerboard(&self, gray: &GrayImage, pattern_size: (usize, usize)) -> Option<Vec<Vec2>>;

    fn refine_corners_subpixel(&self, gray: &GrayImage, corners: &mut [Vec2]);

    fn calibrate_camera(
        &self,
        object_points: &[Vec<glam::Vec3>],
        image_points: &[Vec<Vec2>],
        image_size: (u32, u32),
    ) -> Result<CalibrationResult>;

    fn project_points(
        &self,
        p3ds: &[glam::Vec3],
        pose: &RvecTvec,
        camera_matrix: &na::Matrix3<f64>,
        distortion: &[f64; 5],
    ) -> Vec<Vec2>;

    fn compute_optimal_undistortion_matrix(
        &self,
        camera_matrix: &na::Matrix3<f64>,
        distortion: &[f64; 5],
        image_size: (u32, u32),
        alpha: f64,
    ) -> (na::Matrix3<f64>, Roi);

    fn undistort_image(
        &self,
        img: &DynamicImage,
        camera_matrix: &na::Matrix3<f64>,
        distortion: &[f64; 5],
        new_camera_matrix: &na::Matrix3<f64>,
    ) -> DynamicImage;
}

/// Pure Rust backend: `chess-corners` detection with grid search from
/// `calib-targets-chessboard`, gradient based refinement and a
/// Levenberg-Marquardt calibration solve.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend {
    pub detector: DetectorConfig,
    pub subpix: SubpixConfig,
    pub calibrate: CalibrateOptions,
}

impl NativeBackend {
    pub fn from_config(config: &CalibConfig) -> NativeBackend {
        NativeBackend {
            detector: config.detector,
            subpix: config.subpix,
            calibrate: config.calibrate,
        }
    }
}

impl VisionBackend for NativeBackend {
    fn detect_checkerboard(&self, gray: &GrayImage, pattern_size: (usize, usize)) -> Option<Vec<Vec2>> {
        detection::find_chessboard_corners(gray, pattern_size, &self.detector)
    }

    fn refine_corners_subpixel(&self, gray: &GrayImage, corners: &mut [Vec2]) {
        detection::subpix::corner_sub_pix(&detection::gray_view(gray), corners, &self.subpix);
    }

    fn calibrate_camera(
        &self,
        object_points: &[Vec<glam::Vec3>],
        image_points: &[Vec<Vec2>],
        image_size: (u32, u32),
    ) -> Result<CalibrationResult> {
        crate::optimization::calibrate_camera(object_points, image_points, image_size, &self.calibrate)
    }

    fn project_points(
        &self,
        p3ds: &[glam::Vec3],
        pose: &RvecTvec,
        camera_matrix: &na::Matrix3<f64>,
        distortion: &[f64; 5],
    ) -> Vec<Vec2> {
        let model = OpenCVModel5::from_calibration(camera_matrix, distortion, 0, 0);
        crate::util::project_points(&model, pose, p3ds)
    }

    fn compute_optimal_undistortion_matrix(
        &self,
        camera_matrix: &na::Matrix3<f64>,
        distortion: &[f64; 5],
        image_size: (u32, u32),
        alpha: f64,
    ) -> (na::Matrix3<f64>, Roi) {
        let model = OpenCVModel5::from_calibration(camera_matrix, distortion, image_size.0, image_size.1);
        model.estimate_new_camera_matrix_for_undistort(alpha, Some(image_size))
    }

    fn undistort_image(
        &self,
        img: &DynamicImage,
        camera_matrix: &na::Matrix3<f64>,
        distortion: &[f64; 5],
        new_camera_matrix: &na::Matrix3<f64>,
    ) -> DynamicImage {
        let model = OpenCVModel5::from_calibration(camera_matrix, distortion, img.width(), img.height());
        undistort_image(&model, img, new_camera_matrix)
    }
}
