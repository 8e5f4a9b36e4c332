use glam::Vec2;
use nalgebra as na;
use serde::Serialize;

use crate::camera_model::{CameraModel, OpenCVModel5};
use crate::error::{CalibError, Result};
use crate::types::{CalibrationResult, RvecTvec};
use crate::vision::VisionBackend;

/// Projects board points through a pose and the distorted pinhole model.
pub fn project_points(model: &OpenCVModel5<f64>, pose: &RvecTvec, p3ds: &[glam::Vec3]) -> Vec<Vec2> {
    let transform = pose.to_na_isometry3();
    p3ds.iter()
        .map(|p| {
            let p_cam = transform * na::Point3::new(p.x as f64, p.y as f64, p.z as f64);
            let p2d = model.project_one(&p_cam.coords);
            Vec2::new(p2d.x as f32, p2d.y as f32)
        })
        .collect()
}

/// Mean reprojection error, averaged first within each view then across
/// views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReprojectionError {
    pub total: f64,
    /// `||observed - projected||_2 / n_points` for each view, where the norm
    /// runs over the stacked coordinates of the view.
    pub per_view: Vec<f64>,
}

pub fn reprojection_error(
    backend: &dyn VisionBackend,
    result: &CalibrationResult,
    object_points: &[Vec<glam::Vec3>],
    image_points: &[Vec<Vec2>],
) -> Result<ReprojectionError> {
    if object_points.is_empty() {
        return Err(CalibError::NoObservations);
    }
    if object_points.len() != image_points.len() || object_points.len() != result.poses.len() {
        return Err(CalibError::InvalidInput(format!(
            "{} poses, {} object point sets, {} image point sets",
            result.poses.len(),
            object_points.len(),
            image_points.len()
        )));
    }
    let per_view = result
        .poses
        .iter()
        .zip(object_points)
        .zip(image_points)
        .map(|((pose, obj), img)| {
            let projected =
                backend.project_points(obj, pose, &result.camera_matrix, &result.distortion);
            let sum_sq: f64 = projected
                .iter()
                .zip(img)
                .map(|(p, q)| (p.as_dvec2() - q.as_dvec2()).length_squared())
                .sum();
            if projected.is_empty() {
                0.0
            } else {
                sum_sq.sqrt() / projected.len() as f64
            }
        })
        .collect::<Vec<_>>();
    let total = per_view.iter().sum::<f64>() / per_view.len() as f64;
    Ok(ReprojectionError { total, per_view })
}

/// Average and median of the per point reprojection distances, in pixels.
pub fn point_error_stats(
    backend: &dyn VisionBackend,
    result: &CalibrationResult,
    object_points: &[Vec<glam::Vec3>],
    image_points: &[Vec<Vec2>],
) -> (f64, f64) {
    let mut errors: Vec<f64> = result
        .poses
        .iter()
        .zip(object_points)
        .zip(image_points)
        .flat_map(|((pose, obj), img)| {
            backend
                .project_points(obj, pose, &result.camera_matrix, &result.distortion)
                .into_iter()
                .zip(img)
                .map(|(p, q)| (p.as_dvec2() - q.as_dvec2()).length())
                .collect::<Vec<_>>()
        })
        .collect();
    if errors.is_empty() {
        return (0.0, 0.0);
    }
    errors.sort_by(|a, b| a.total_cmp(b));
    let avg = errors.iter().sum::<f64>() / errors.len() as f64;
    let med = errors[errors.len() / 2];
    (avg, med)
}
