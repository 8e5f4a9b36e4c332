//! Checkerboard inner corner detection.
//!
//! ChESS corners come from `chess-corners`, `calib-targets-chessboard` links
//! them into a labelled grid, and the grid is turned into board order here.
//! [`subpix`] refines the ordered corners afterwards.

pub mod subpix;

use std::collections::HashMap;

use calib_targets_chessboard::{ChessboardDetector, ChessboardParams, GridGraphParams};
use calib_targets_core::{Corner, GrayImageView};
use chess_corners::{ChessConfig, CornerDescriptor, find_chess_corners_image};
use glam::Vec2;
use image::GrayImage;

use crate::config::DetectorConfig;

pub fn chess_config(config: &DetectorConfig) -> ChessConfig {
    let mut cfg = ChessConfig::single_scale();
    cfg.params.threshold_rel = config.threshold_rel;
    cfg.params.nms_radius = config.nms_radius as _;
    cfg
}

/// Grid search parameters for a board with `pattern_size` inner corners.
/// Only complete boards are accepted.
pub fn chessboard_params(pattern_size: (usize, usize)) -> ChessboardParams {
    let (nx, ny) = pattern_size;
    ChessboardParams {
        min_corners: (nx * ny) as _,
        expected_rows: Some(ny as _),
        expected_cols: Some(nx as _),
        completeness_threshold: 1.0,
        ..ChessboardParams::default()
    }
}

pub fn gray_view(img: &GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

fn adapt_chess_corner(c: &CornerDescriptor) -> Corner {
    Corner {
        position: [c.x, c.y].into(),
        orientation: c.orientation,
        orientation_cluster: None,
        strength: c.response,
    }
}

/// Raw ChESS corners at sub-pixel positions.
pub fn detect_corners(img: &GrayImage, config: &DetectorConfig) -> Vec<Corner> {
    find_chess_corners_image(img, &chess_config(config))
        .iter()
        .map(adapt_chess_corner)
        .collect()
}

/// Finds the `pattern_size = (corners_x, corners_y)` inner corners of a
/// checkerboard. Corners are returned row by row, x varying fastest, or `None`
/// when the full pattern is not visible.
pub fn find_chessboard_corners(
    img: &GrayImage,
    pattern_size: (usize, usize),
    config: &DetectorConfig,
) -> Option<Vec<Vec2>> {
    let (nx, ny) = pattern_size;
    if nx < 2 || ny < 2 {
        return None;
    }
    let corners = detect_corners(img, config);
    log::trace!("{} chess corners", corners.len());
    if corners.len() < nx * ny {
        return None;
    }

    let detector =
        ChessboardDetector::new(chessboard_params(pattern_size)).with_grid_search(GridGraphParams::default());
    let result = detector.detect_from_corners(&corners)?;

    let mut lattice = HashMap::new();
    for c in result
        .inliers
        .iter()
        .filter_map(|&idx| result.detection.corners.get(idx))
    {
        let Some(g) = c.grid else {
            continue;
        };
        if lattice
            .insert((g.i, g.j), Vec2::new(c.position.x, c.position.y))
            .is_some()
        {
            return None;
        }
    }
    order_lattice(&lattice, pattern_size)
}

/// Maps grid cells onto board coordinates.
///
/// The board x axis follows the grid side with `corners_x` cells. The board y
/// axis is chosen so that x cross y is positive in the image, and the whole
/// labelling is turned by 180 degrees when x would point left.
pub fn order_lattice(
    lattice: &HashMap<(i32, i32), Vec2>,
    pattern_size: (usize, usize),
) -> Option<Vec<Vec2>> {
    let (nx, ny) = pattern_size;
    if nx < 2 || ny < 2 || lattice.len() != nx * ny {
        return None;
    }
    let min_i = lattice.keys().map(|k| k.0).min()?;
    let max_i = lattice.keys().map(|k| k.0).max()?;
    let min_j = lattice.keys().map(|k| k.1).min()?;
    let max_j = lattice.keys().map(|k| k.1).max()?;
    let wi = (max_i - min_i + 1) as usize;
    let wj = (max_j - min_j + 1) as usize;
    let i_is_x = if wi == nx && wj == ny {
        true
    } else if wi == ny && wj == nx {
        false
    } else {
        return None;
    };

    let mut table = vec![None; wi * wj];
    for (&(i, j), &p) in lattice {
        table[(i - min_i) as usize + (j - min_j) as usize * wi] = Some(p);
    }
    let table: Vec<Vec2> = table.into_iter().collect::<Option<Vec<_>>>()?;

    let at = |bx: usize, by: usize, flip_x: bool, flip_y: bool| -> Vec2 {
        let bx = if flip_x { nx - 1 - bx } else { bx };
        let by = if flip_y { ny - 1 - by } else { by };
        let (i, j) = if i_is_x { (bx, by) } else { (by, bx) };
        table[i + j * wi]
    };

    let mean_steps = |flip_x: bool, flip_y: bool| -> (Vec2, Vec2) {
        let mut dx = Vec2::ZERO;
        let mut dy = Vec2::ZERO;
        for by in 0..ny {
            for bx in 0..nx - 1 {
                dx += at(bx + 1, by, flip_x, flip_y) - at(bx, by, flip_x, flip_y);
            }
        }
        for by in 0..ny - 1 {
            for bx in 0..nx {
                dy += at(bx, by + 1, flip_x, flip_y) - at(bx, by, flip_x, flip_y);
            }
        }
        (dx / ((nx - 1) * ny) as f32, dy / (nx * (ny - 1)) as f32)
    };

    let mut flip_x = false;
    let mut flip_y = false;
    let (dx, dy) = mean_steps(flip_x, flip_y);
    if dx.perp_dot(dy) < 0.0 {
        flip_y = true;
    }
    if dx.x < 0.0 {
        flip_x = !flip_x;
        flip_y = !flip_y;
    }

    let mut ordered = Vec::with_capacity(nx * ny);
    for by in 0..ny {
        for bx in 0..nx {
            ordered.push(at(bx, by, flip_x, flip_y));
        }
    }
    Some(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice(
        nx: i32,
        ny: i32,
        origin: Vec2,
        u: Vec2,
        v: Vec2,
        label: impl Fn(i32, i32) -> (i32, i32),
    ) -> (Vec<Vec2>, HashMap<(i32, i32), Vec2>) {
        let mut pts = Vec::new();
        let mut cells = HashMap::new();
        for y in 0..ny {
            for x in 0..nx {
                let p = origin + u * x as f32 + v * y as f32;
                pts.push(p);
                cells.insert(label(x, y), p);
            }
        }
        (pts, cells)
    }

    #[test]
    fn ordered_row_major_with_x_to_the_right() {
        // labels shifted and reversed the way a grid search may hand them back
        let (pts, cells) = lattice(
            5,
            4,
            Vec2::new(100.0, 80.0),
            Vec2::new(20.0, 0.0),
            Vec2::new(0.0, 20.0),
            |x, y| (7 - x, -3 - y),
        );
        let ordered = order_lattice(&cells, (5, 4)).unwrap();
        for (a, b) in ordered.iter().zip(&pts) {
            assert!(a.distance(*b) < 1e-4);
        }
    }

    #[test]
    fn transposed_labels_are_accepted() {
        let (pts, cells) = lattice(
            5,
            4,
            Vec2::new(100.0, 80.0),
            Vec2::new(20.0, 0.0),
            Vec2::new(0.0, 20.0),
            |x, y| (y, x),
        );
        let ordered = order_lattice(&cells, (5, 4)).unwrap();
        assert!((ordered[0] - pts[0]).length() < 1e-4);
        assert!((ordered[19] - pts[19]).length() < 1e-4);
    }

    #[test]
    fn mirrored_lattice_keeps_handedness() {
        // rows stacked upwards: the y axis has to be flipped
        let (_, cells) = lattice(
            5,
            4,
            Vec2::new(100.0, 200.0),
            Vec2::new(20.0, 0.0),
            Vec2::new(0.0, -20.0),
            |x, y| (x, y),
        );
        let ordered = order_lattice(&cells, (5, 4)).unwrap();
        assert!((ordered[0] - Vec2::new(100.0, 140.0)).length() < 1e-4);
        assert!((ordered[4] - Vec2::new(180.0, 140.0)).length() < 1e-4);
    }

    #[test]
    fn wrong_size_is_rejected() {
        let (_, mut cells) = lattice(
            5,
            4,
            Vec2::new(100.0, 80.0),
            Vec2::new(20.0, 0.0),
            Vec2::new(0.0, 20.0),
            |x, y| (x, y),
        );
        assert!(order_lattice(&cells, (6, 4)).is_none());
        cells.remove(&(2, 2));
        assert!(order_lattice(&cells, (5, 4)).is_none());
    }

    #[test]
    fn params_ask_for_the_full_board() {
        let params = chessboard_params((8, 6));
        assert_eq!(params.expected_cols, Some(8));
        assert_eq!(params.expected_rows, Some(6));
        let cfg = chess_config(&DetectorConfig::default());
        assert_eq!(cfg.params.threshold_rel, DetectorConfig::default().threshold_rel);
    }
}
