//! Renders checkerboard views through a known camera, for datasets with
//! ground truth.

use glam::Vec2;
use image::{GrayImage, Luma};
use nalgebra as na;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::board::{Board, BoardConfig};
use crate::camera_model::{CameraModel, OpenCVModel5};
use crate::types::{Roi, RvecTvec, ToRvecTvec};

const BLACK: f32 = 30.0;
const WHITE: f32 = 225.0;
const BACKGROUND: f32 = 110.0;

/// Serializable description of the synthetic camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticCamera {
    pub width: u32,
    pub height: u32,
    /// `[fx, fy, cx, cy, k1, k2, p1, p2, k3]`
    pub params: [f64; 9],
}

impl SyntheticCamera {
    pub fn model(&self) -> OpenCVModel5<f64> {
        OpenCVModel5::new(
            &na::DVector::from_row_slice(&self.params),
            self.width,
            self.height,
        )
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        SyntheticCamera {
            width: 640,
            height: 480,
            params: [520.0, 515.0, 322.0, 236.0, -0.12, 0.05, 0.001, -0.0008, 0.0],
        }
    }
}

/// Intensity of the board at board coordinates `(u, v)`.
///
/// Squares extend one square beyond the outermost inner corners, with a white
/// margin of one more square around them.
fn board_intensity(board: &BoardConfig, u: f64, v: f64) -> f32 {
    let s = board.square_size as f64;
    let a = (u / s).floor() as i64 + 1;
    let b = (v / s).floor() as i64 + 1;
    let nx = board.corners_x as i64;
    let ny = board.corners_y as i64;
    if a < -1 || b < -1 || a > nx + 1 || b > ny + 1 {
        BACKGROUND
    } else if a < 0 || b < 0 || a > nx || b > ny {
        WHITE
    } else if (a + b) % 2 == 0 {
        BLACK
    } else {
        WHITE
    }
}

/// Ray-plane intersection in board coordinates, `None` behind the camera.
fn pixel_to_board(
    model: &OpenCVModel5<f64>,
    board_from_cam: &na::Isometry3<f64>,
    x: f64,
    y: f64,
) -> Option<(f64, f64)> {
    let ray = model.unproject_one(&na::Vector2::new(x, y));
    let origin = board_from_cam.translation.vector;
    let dir = board_from_cam.rotation * ray;
    if dir.z.abs() < 1e-12 {
        return None;
    }
    let s = -origin.z / dir.z;
    if s <= 0.0 {
        return None;
    }
    let p = origin + dir * s;
    Some((p.x, p.y))
}

/// Renders the board seen from `pose` with `supersample x supersample`
/// samples per pixel.
pub fn render_checkerboard(
    model: &OpenCVModel5<f64>,
    pose: &RvecTvec,
    board: &BoardConfig,
    supersample: u32,
) -> GrayImage {
    let n = supersample.max(1);
    let board_from_cam = pose.to_na_isometry3().inverse();
    GrayImage::from_par_fn(model.width, model.height, |x, y| {
        let mut sum = 0.0f32;
        for sy in 0..n {
            for sx in 0..n {
                let px = x as f64 + (sx as f64 + 0.5) / n as f64 - 0.5;
                let py = y as f64 + (sy as f64 + 0.5) / n as f64 - 0.5;
                sum += match pixel_to_board(model, &board_from_cam, px, py) {
                    Some((u, v)) => board_intensity(board, u, v),
                    None => BACKGROUND,
                };
            }
        }
        Luma([(sum / (n * n) as f32).round().clamp(0.0, 255.0) as u8])
    })
}

/// Paints `roi` with a flat value.
pub fn occlude(img: &mut GrayImage, roi: Roi, value: u8) {
    let x1 = (roi.x + roi.width).min(img.width());
    let y1 = (roi.y + roi.height).min(img.height());
    for y in roi.y..y1 {
        for x in roi.x..x1 {
            img.put_pixel(x, y, Luma([value]));
        }
    }
}

/// Ground truth image positions of the inner corners in board order.
pub fn project_corners(model: &OpenCVModel5<f64>, pose: &RvecTvec, board: &BoardConfig) -> Vec<Vec2> {
    crate::util::project_points(model, pose, &Board::from_config(board).object_points)
}

/// Bounding box of the whole printed board, margin included, in board
/// coordinates.
fn board_outline(board: &BoardConfig) -> [na::Point3<f64>; 4] {
    let s = board.square_size as f64;
    let x0 = -2.0 * s;
    let y0 = -2.0 * s;
    let x1 = (board.corners_x as f64 + 1.0) * s;
    let y1 = (board.corners_y as f64 + 1.0) * s;
    [
        na::Point3::new(x0, y0, 0.0),
        na::Point3::new(x1, y0, 0.0),
        na::Point3::new(x1, y1, 0.0),
        na::Point3::new(x0, y1, 0.0),
    ]
}

/// Random board pose with the whole board, margin included, at least
/// `border` pixels inside the image.
pub fn random_board_pose<R: Rng>(
    rng: &mut R,
    model: &OpenCVModel5<f64>,
    board: &BoardConfig,
    border: f64,
) -> Option<RvecTvec> {
    let s = board.square_size as f64;
    let center = na::Vector3::new(
        (board.corners_x as f64 - 1.0) * s * 0.5,
        (board.corners_y as f64 - 1.0) * s * 0.5,
        0.0,
    );
    let board_width = (board.corners_x as f64 + 3.0) * s;
    let outline = board_outline(board);
    for _ in 0..200 {
        let fill = rng.random_range(0.45..0.75);
        let distance = model.fx * board_width / (fill * model.width as f64);
        let rotation = na::Rotation3::from_euler_angles(
            rng.random_range(-0.45..0.45),
            rng.random_range(-0.45..0.45),
            rng.random_range(-0.3..0.3),
        );
        let offset = na::Vector3::new(
            rng.random_range(-0.15..0.15) * distance,
            rng.random_range(-0.1..0.1) * distance,
            distance,
        );
        let translation = offset - rotation * center;
        let pose = na::Isometry3::from_parts(
            na::Translation3::from(translation),
            na::UnitQuaternion::from_rotation_matrix(&rotation),
        );
        let inside = outline.iter().all(|p| {
            let pc = pose * p;
            if pc.z <= 0.0 {
                return false;
            }
            let uv = model.project_one(&pc.coords);
            uv.x >= border
                && uv.y >= border
                && uv.x <= model.width as f64 - 1.0 - border
                && uv.y <= model.height as f64 - 1.0 - border
        });
        if inside {
            return Some(pose.to_rvec_tvec());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn corner_pixels_straddle_both_colours() {
        let camera = SyntheticCamera::default();
        let model = camera.model();
        let board = BoardConfig::default();
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
        let pose = random_board_pose(&mut rng, &model, &board, 20.0).unwrap();
        let img = render_checkerboard(&model, &pose, &board, 2);
        let corners = project_corners(&model, &pose, &board);
        assert_eq!(corners.len(), board.num_corners());
        for c in corners {
            assert!(c.x > 20.0 && c.y > 20.0);
            assert!(c.x < 620.0 && c.y < 460.0);
        }
        let min = img.pixels().map(|p| p.0[0]).min().unwrap();
        let max = img.pixels().map(|p| p.0[0]).max().unwrap();
        assert!(min <= 40 && max >= 215);
    }
}
