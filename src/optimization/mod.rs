pub mod factors;
pub mod homography;

pub use homography::{find_homography, init_intrinsics, pose_from_homography};

use std::collections::HashMap;

use log::{debug, info};
use nalgebra as na;
use tiny_solver::optimizer::OptimizerOptions;
use tiny_solver::{LevenbergMarquardtOptimizer, Optimizer};

use crate::camera_model::OpenCVModel5;
use crate::config::CalibrateOptions;
use crate::error::{CalibError, Result};
use crate::types::{CalibrationResult, RvecTvec, ToRvecTvec};
use factors::ReprojectionFactor;

const INTRINSICS: &str = "intrinsics";
const IDX_P1: usize = 6;
const IDX_P2: usize = 7;
const IDX_K3: usize = 8;

fn rvec_name(i: usize) -> String {
    format!("rvec{}", i)
}

fn tvec_name(i: usize) -> String {
    format!("tvec{}", i)
}

fn check_correspondences(
    object_points: &[Vec<glam::Vec3>],
    image_points: &[Vec<glam::Vec2>],
) -> Result<()> {
    if object_points.is_empty() {
        return Err(CalibError::NoObservations);
    }
    if object_points.len() != image_points.len() {
        return Err(CalibError::InvalidInput(format!(
            "{} object point sets but {} image point sets",
            object_points.len(),
            image_points.len()
        )));
    }
    for (i, (obj, img)) in object_points.iter().zip(image_points).enumerate() {
        if obj.len() != img.len() {
            return Err(CalibError::InvalidInput(format!(
                "view {} has {} object points and {} image points",
                i,
                obj.len(),
                img.len()
            )));
        }
        if obj.len() < 4 {
            return Err(CalibError::InvalidInput(format!(
                "view {} has only {} points",
                i,
                obj.len()
            )));
        }
        if obj.iter().any(|p| p.z != 0.0) {
            return Err(CalibError::InvalidInput(format!(
                "view {} object points are not on the z = 0 plane",
                i
            )));
        }
    }
    Ok(())
}

/// Runs Levenberg-Marquardt over the shared intrinsics and one pose per view.
/// Intrinsic entries listed in `fixed` keep their initial value.
fn solve(
    object_points: &[Vec<glam::Vec3>],
    image_points: &[Vec<glam::Vec2>],
    initial_values: &HashMap<String, na::DVector<f64>>,
    fixed: &[usize],
    max_iterations: usize,
) -> Result<HashMap<String, na::DVector<f64>>> {
    let mut problem = tiny_solver::Problem::new();
    for (i, (obj, img)) in object_points.iter().zip(image_points).enumerate() {
        let cost = ReprojectionFactor::new(obj, img);
        let rvec = rvec_name(i);
        let tvec = tvec_name(i);
        problem.add_residual_block(
            cost.residual_num(),
            &[INTRINSICS, rvec.as_str(), tvec.as_str()],
            Box::new(cost),
            None,
        );
    }
    for &idx in fixed {
        problem.fix_variable(INTRINSICS, idx);
    }
    let optimizer = LevenbergMarquardtOptimizer::default();
    let options = OptimizerOptions {
        max_iteration: max_iterations,
        ..OptimizerOptions::default()
    };
    optimizer
        .optimize(&problem, initial_values, Some(options))
        .ok_or_else(|| CalibError::SolverFailed("levenberg-marquardt did not converge".to_string()))
}

/// Root mean square of the point reprojection distances.
pub fn rms_reprojection(
    model: &OpenCVModel5<f64>,
    poses: &[RvecTvec],
    object_points: &[Vec<glam::Vec3>],
    image_points: &[Vec<glam::Vec2>],
) -> f64 {
    let mut sum_sq = 0.0;
    let mut count = 0usize;
    for ((pose, obj), img) in poses.iter().zip(object_points).zip(image_points) {
        let projected = crate::util::project_points(model, pose, obj);
        for (p, q) in projected.iter().zip(img) {
            sum_sq += (p.as_dvec2() - q.as_dvec2()).length_squared();
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        (sum_sq / count as f64).sqrt()
    }
}

/// Estimates the pinhole intrinsics, the five distortion coefficients and one
/// board pose per view from planar correspondences.
///
/// Intrinsics start from the board homographies with the principal point at
/// the image center and zero distortion. A first solve keeps the distortion
/// at zero, the second one releases every coefficient not fixed by
/// `options`.
pub fn calibrate_camera(
    object_points: &[Vec<glam::Vec3>],
    image_points: &[Vec<glam::Vec2>],
    image_size: (u32, u32),
    options: &CalibrateOptions,
) -> Result<CalibrationResult> {
    check_correspondences(object_points, image_points)?;
    if image_size.0 == 0 || image_size.1 == 0 {
        return Err(CalibError::InvalidInput("image size is zero".to_string()));
    }

    let homographies = object_points
        .iter()
        .zip(image_points)
        .map(|(obj, img)| {
            let src: Vec<_> = obj
                .iter()
                .map(|p| na::Vector2::new(p.x as f64, p.y as f64))
                .collect();
            let dst: Vec<_> = img
                .iter()
                .map(|p| na::Vector2::new(p.x as f64, p.y as f64))
                .collect();
            find_homography(&src, &dst)
        })
        .collect::<Result<Vec<_>>>()?;
    let k0 = init_intrinsics(&homographies, image_size);
    debug!(
        "initial fx {:.2} fy {:.2} cx {:.2} cy {:.2}",
        k0[(0, 0)],
        k0[(1, 1)],
        k0[(0, 2)],
        k0[(1, 2)]
    );

    let mut initial_values = HashMap::<String, na::DVector<f64>>::new();
    initial_values.insert(
        INTRINSICS.to_string(),
        na::dvector![k0[(0, 0)], k0[(1, 1)], k0[(0, 2)], k0[(1, 2)], 0.0, 0.0, 0.0, 0.0, 0.0],
    );
    for (i, hm) in homographies.iter().enumerate() {
        let rt = pose_from_homography(&k0, hm)?.to_rvec_tvec();
        initial_values.insert(rvec_name(i), rt.na_rvec());
        initial_values.insert(tvec_name(i), rt.na_tvec());
    }

    let no_distortion = [4, 5, IDX_P1, IDX_P2, IDX_K3];
    let stage1 = solve(
        object_points,
        image_points,
        &initial_values,
        &no_distortion,
        options.max_iterations,
    )?;

    let mut fixed = Vec::new();
    if options.zero_tangent_dist {
        fixed.extend([IDX_P1, IDX_P2]);
    }
    if options.fix_k3 {
        fixed.push(IDX_K3);
    }
    let result = solve(
        object_points,
        image_points,
        &stage1,
        &fixed,
        options.max_iterations,
    )?;

    let intrinsics = result
        .get(INTRINSICS)
        .ok_or_else(|| CalibError::SolverFailed("intrinsics missing from solution".to_string()))?;
    let model = OpenCVModel5::new(intrinsics, image_size.0, image_size.1);
    let poses = (0..object_points.len())
        .map(|i| match (result.get(&rvec_name(i)), result.get(&tvec_name(i))) {
            (Some(r), Some(t)) => Ok(RvecTvec::new(r, t)),
            _ => Err(CalibError::SolverFailed(format!("pose {} missing from solution", i))),
        })
        .collect::<Result<Vec<_>>>()?;
    if intrinsics.iter().any(|v| !v.is_finite()) || model.fx <= 0.0 || model.fy <= 0.0 {
        return Err(CalibError::SolverFailed(format!(
            "invalid intrinsics {:?}",
            intrinsics.as_slice()
        )));
    }

    let rms = rms_reprojection(&model, &poses, object_points, image_points);
    info!(
        "calibrated {} views: fx {:.3} fy {:.3} cx {:.3} cy {:.3}, rms {:.4} px",
        poses.len(),
        model.fx,
        model.fy,
        model.cx,
        model.cy,
        rms
    );
    Ok(CalibrationResult {
        camera_matrix: crate::types::camera_matrix(model.fx, model.fy, model.cx, model.cy),
        distortion: model.distortion(),
        poses,
        rms,
        image_size,
    })
}
