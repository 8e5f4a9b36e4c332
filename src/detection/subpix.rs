//! Iterative sub-pixel corner refinement.
//!
//! At the true corner every image gradient inside the window is orthogonal
//! to the vector from the corner to the gradient's location. Each iteration
//! solves the weighted least squares system built from that condition.

use calib_targets_core::{GrayImageView, sample_bilinear};
use glam::Vec2;

use crate::config::SubpixConfig;

fn gaussian_weights(half_window: usize) -> Vec<f32> {
    let hw = half_window as f32;
    (-(half_window as i32)..=half_window as i32)
        .map(|i| {
            let x = i as f32;
            (-(x * x) / (hw * hw)).exp()
        })
        .collect()
}

/// Refines `corners` in place. A corner that drifts more than the half
/// window away from its start is put back.
pub fn corner_sub_pix(img: &GrayImageView<'_>, corners: &mut [Vec2], config: &SubpixConfig) {
    let hw = config.half_window.max(1);
    let weights = gaussian_weights(hw);
    let eps2 = (config.epsilon * config.epsilon) as f32;
    let max_iterations = config.max_iterations.max(1);
    let n = 2 * hw + 3;
    let mut patch = vec![0.0f32; n * n];

    for corner in corners.iter_mut() {
        let start = *corner;
        let mut current = start;
        for _ in 0..max_iterations {
            for (r, row) in patch.chunks_mut(n).enumerate() {
                let y = current.y + r as f32 - (hw + 1) as f32;
                for (c, v) in row.iter_mut().enumerate() {
                    *v = sample_bilinear(img, current.x + c as f32 - (hw + 1) as f32, y);
                }
            }

            let (mut a, mut b, mut c) = (0.0f64, 0.0f64, 0.0f64);
            let (mut bb1, mut bb2) = (0.0f64, 0.0f64);
            for i in 0..=2 * hw {
                let py = i as f64 - hw as f64;
                for j in 0..=2 * hw {
                    let px = j as f64 - hw as f64;
                    let m = (weights[i] * weights[j]) as f64;
                    let (r, col) = (i + 1, j + 1);
                    let gx = (patch[r * n + col + 1] - patch[r * n + col - 1]) as f64;
                    let gy = (patch[(r + 1) * n + col] - patch[(r - 1) * n + col]) as f64;
                    let gxx = gx * gx * m;
                    let gxy = gx * gy * m;
                    let gyy = gy * gy * m;
                    a += gxx;
                    b += gxy;
                    c += gyy;
                    bb1 += gxx * px + gxy * py;
                    bb2 += gxy * px + gyy * py;
                }
            }
            let det = a * c - b * b;
            if det.abs() <= f64::EPSILON {
                break;
            }
            let offset = Vec2::new(
                ((c * bb1 - b * bb2) / det) as f32,
                ((a * bb2 - b * bb1) / det) as f32,
            );
            current += offset;
            if current.x < 0.0
                || current.y < 0.0
                || current.x >= img.width as f32
                || current.y >= img.height as f32
                || offset.length_squared() <= eps2
            {
                break;
            }
        }
        let drift = current - start;
        *corner = if drift.x.abs() > hw as f32 || drift.y.abs() > hw as f32 {
            start
        } else {
            current
        };
    }
}
