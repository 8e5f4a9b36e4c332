use std::path::{Path, PathBuf};

use glam::Vec2;
use glob::{Pattern, glob};
use image::{DynamicImage, ImageReader};
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;

use crate::board::Board;
use crate::detected_points::{FeatureAccumulator, FrameFeature};
use crate::error::{CalibError, Result};
use crate::vision::VisionBackend;
use crate::visualization::Visualizer;

/// `.jpg`, `.jpeg`, and anything else matching `*.jp*g`.
pub const IMAGE_PATTERN: &str = "*.jp*g";

/// Images directly inside `dir` matching [`IMAGE_PATTERN`], sorted.
pub fn collect_image_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    // brackets and stars in the folder name are literal
    let pattern = Path::new(&Pattern::escape(&dir.to_string_lossy())).join(IMAGE_PATTERN);
    let mut sorted_path: Vec<PathBuf> = glob(&pattern.to_string_lossy())?
        .filter_map(|p| p.ok())
        .filter(|p| p.is_file())
        .collect();
    sorted_path.sort();
    if sorted_path.is_empty() {
        return Err(CalibError::NoImages {
            dir: dir.to_path_buf(),
        });
    }
    log::debug!("{} images in {}", sorted_path.len(), dir.display());
    Ok(sorted_path)
}

pub fn load_image(path: &Path) -> Result<DynamicImage> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
}

/// Detects the board in one image and refines the corners.
///
/// Returns `None` when the full pattern is not visible.
pub fn observe_image(backend: &dyn VisionBackend, img: &DynamicImage, board: &Board) -> Option<Vec<Vec2>> {
    let gray = img.to_luma8();
    let mut corners = backend.detect_checkerboard(&gray, board.pattern_size())?;
    if corners.len() != board.len() {
        log::warn!(
            "detector returned {} corners, expected {}",
            corners.len(),
            board.len()
        );
        return None;
    }
    backend.refine_corners_subpixel(&gray, &mut corners);
    Some(corners)
}

/// Observes every image and accumulates the successful ones in path order.
///
/// Images that fail to decode or do not show the whole board are skipped.
/// A resolution different from the first accepted image is an error.
pub fn load_frame_features(
    paths: &[PathBuf],
    board: &Board,
    backend: &dyn VisionBackend,
    visualizer: Option<&Visualizer>,
) -> Result<FeatureAccumulator> {
    let observations: Vec<_> = paths
        .par_iter()
        .enumerate()
        .progress_count(paths.len() as u64)
        .map(|(idx, path)| {
            let img = match load_image(path) {
                Ok(img) => img,
                Err(e) => {
                    log::warn!("skipping {}: {}", path.display(), e);
                    return None;
                }
            };
            let corners = observe_image(backend, &img, board);
            if let Some(vis) = visualizer {
                if let Err(e) = vis.log_detection(idx, &img, corners.as_deref(), board.pattern_size()) {
                    log::warn!("visualization failed for {}: {}", path.display(), e);
                }
            }
            Some(((img.width(), img.height()), corners))
        })
        .collect();

    let mut accumulator = FeatureAccumulator::new();
    for (path, observation) in paths.iter().zip(observations) {
        match observation {
            Some((img_w_h, Some(corners))) => {
                log::info!("{}: found {} corners", path.display(), corners.len());
                accumulator.push(FrameFeature::new(
                    path.clone(),
                    img_w_h,
                    &board.object_points,
                    &corners,
                ))?;
            }
            Some((_, None)) => log::warn!("{}: pattern not found", path.display()),
            None => {}
        }
    }
    log::info!(
        "checkerboard found in {} of {} images",
        accumulator.len(),
        paths.len()
    );
    Ok(accumulator)
}
