//! The calibration workflow: observe, accumulate, solve, report, export.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use nalgebra as na;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::board::Board;
use crate::config::CalibConfig;
use crate::data_loader::{collect_image_paths, load_frame_features, load_image};
use crate::detected_points::FeatureAccumulator;
use crate::error::{CalibError, Result};
use crate::types::{CalibrationResult, Roi};
use crate::util::{reprojection_error, ReprojectionError};
use crate::vision::VisionBackend;
use crate::visualization::Visualizer;

/// Free scaling parameter of the undistortion demo: keep every source pixel.
pub const UNDISTORT_ALPHA: f64 = 1.0;

pub struct Calibration {
    pub image_paths: Vec<PathBuf>,
    pub observations: FeatureAccumulator,
    pub result: CalibrationResult,
    pub error: ReprojectionError,
}

/// Solves the camera from accumulated observations and measures the
/// reprojection error of the solution.
pub fn calibrate_observations(
    observations: &FeatureAccumulator,
    backend: &dyn VisionBackend,
) -> Result<(CalibrationResult, ReprojectionError)> {
    if observations.is_empty() {
        return Err(CalibError::NoObservations);
    }
    let image_size = observations.image_size()?;
    let object_points = observations.object_points();
    let image_points = observations.image_points();
    let result = backend.calibrate_camera(&object_points, &image_points, image_size)?;
    let error = reprojection_error(backend, &result, &object_points, &image_points)?;
    Ok((result, error))
}

/// Calibrates from every `*.jp*g` image in `dir`.
pub fn run_calibration(
    dir: &Path,
    config: &CalibConfig,
    backend: &dyn VisionBackend,
    visualizer: Option<&Visualizer>,
) -> Result<Calibration> {
    let board = Board::from_config(&config.board);
    let image_paths = collect_image_paths(dir)?;
    let observations = load_frame_features(&image_paths, &board, backend, visualizer)?;
    let (result, error) = calibrate_observations(&observations, backend)?;
    Ok(Calibration {
        image_paths,
        observations,
        result,
        error,
    })
}

pub struct UndistortDemo {
    pub path: PathBuf,
    pub original: DynamicImage,
    pub undistorted: DynamicImage,
    pub optimal_camera_matrix: na::Matrix3<f64>,
    pub roi: Roi,
}

/// Undistorts one randomly picked image.
///
/// Any candidate may be picked, including images the board was not found in.
/// Candidates that fail to decode are skipped and the next random one is
/// tried. The optimal matrix for `alpha = 1` is computed and reported, while
/// the image itself is undistorted into the calibrated camera matrix.
pub fn undistort_demo(
    candidates: &[PathBuf],
    result: &CalibrationResult,
    backend: &dyn VisionBackend,
    seed: Option<u64>,
) -> Result<UndistortDemo> {
    let mut rng = match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_os_rng(),
    };
    let mut order: Vec<&PathBuf> = candidates.iter().collect();
    order.shuffle(&mut rng);

    let mut last_err = CalibError::InvalidInput("no image to undistort".to_string());
    let mut picked = None;
    for path in order {
        match load_image(path) {
            Ok(img) => {
                picked = Some((path.clone(), img));
                break;
            }
            Err(e) => {
                log::warn!("{}: {}", path.display(), e);
                last_err = e;
            }
        }
    }
    let Some((path, original)) = picked else {
        return Err(last_err);
    };
    let w_h = (original.width(), original.height());
    let (optimal_camera_matrix, roi) = backend.compute_optimal_undistortion_matrix(
        &result.camera_matrix,
        &result.distortion,
        w_h,
        UNDISTORT_ALPHA,
    );
    let undistorted = backend.undistort_image(
        &original,
        &result.camera_matrix,
        &result.distortion,
        &result.camera_matrix,
    );
    log::info!("undistorted {}", path.display());
    Ok(UndistortDemo {
        path,
        original,
        undistorted,
        optimal_camera_matrix,
        roi,
    })
}
