use log::debug;
use nalgebra as na;

use crate::error::{CalibError, Result};

/// Row of the right singular vectors belonging to the smallest singular value.
fn null_vector(a: &na::DMatrix<f64>) -> Result<na::DVector<f64>> {
    // A^T A keeps nine rows even when fewer than five points are given.
    let ata = a.transpose() * a;
    let svd = ata.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| CalibError::SolverFailed("svd did not return V^T".to_string()))?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .ok_or_else(|| CalibError::SolverFailed("empty svd".to_string()))?;
    Ok(v_t.row(min_idx).transpose())
}

fn normalize_points(points: &[na::Vector2<f64>]) -> (Vec<na::Vector2<f64>>, na::Matrix3<f64>) {
    let n = points.len() as f64;
    let mean = points.iter().fold(na::Vector2::zeros(), |acc, p| acc + p) / n;
    let mean_dist = points.iter().map(|p| (p - mean).norm()).sum::<f64>() / n;
    let scale = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    let normalized = points.iter().map(|p| (p - mean) * scale).collect();
    let t = na::Matrix3::new(
        scale,
        0.0,
        -mean.x * scale,
        0.0,
        scale,
        -mean.y * scale,
        0.0,
        0.0,
        1.0,
    );
    (normalized, t)
}

/// Normalized DLT homography mapping `src` onto `dst`, scaled so `H[2,2] = 1`.
pub fn find_homography(src: &[na::Vector2<f64>], dst: &[na::Vector2<f64>]) -> Result<na::Matrix3<f64>> {
    if src.len() != dst.len() || src.len() < 4 {
        return Err(CalibError::InvalidInput(format!(
            "homography needs at least 4 point pairs, got {} and {}",
            src.len(),
            dst.len()
        )));
    }
    let (src_n, ts) = normalize_points(src);
    let (dst_n, td) = normalize_points(dst);
    let mut a = na::DMatrix::<f64>::zeros(2 * src.len(), 9);
    for (i, (s, d)) in src_n.iter().zip(&dst_n).enumerate() {
        let (x, y, u, v) = (s.x, s.y, d.x, d.y);
        let r0 = 2 * i;
        let r1 = r0 + 1;
        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;
        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }
    let h = null_vector(&a)?;
    let hn = na::Matrix3::from_row_slice(h.as_slice());
    let td_inv = td
        .try_inverse()
        .ok_or_else(|| CalibError::SolverFailed("singular normalization".to_string()))?;
    let mut hm = td_inv * hn * ts;
    if hm[(2, 2)].abs() > 1e-12 {
        hm /= hm[(2, 2)];
    }
    Ok(hm)
}

/// Focal lengths from the orthogonality of the board axes, with the
/// principal point fixed at the image center.
///
/// Each homography contributes two equations in `1/fx^2` and `1/fy^2`.
/// Falls back to `max(w, h)` when the views carry no perspective.
pub fn init_intrinsics(homographies: &[na::Matrix3<f64>], image_size: (u32, u32)) -> na::Matrix3<f64> {
    let cx = (image_size.0 as f64 - 1.0) * 0.5;
    let cy = (image_size.1 as f64 - 1.0) * 0.5;
    let fallback = image_size.0.max(image_size.1) as f64;

    let mut a = na::DMatrix::<f64>::zeros(2 * homographies.len(), 2);
    let mut b = na::DVector::<f64>::zeros(2 * homographies.len());
    for (i, hm) in homographies.iter().enumerate() {
        let mut hm = *hm;
        for c in 0..3 {
            hm[(0, c)] -= hm[(2, c)] * cx;
            hm[(1, c)] -= hm[(2, c)] * cy;
        }
        let h = hm.column(0).normalize();
        let v = hm.column(1).normalize();
        let d1 = ((hm.column(0) + hm.column(1)) * 0.5).normalize();
        let d2 = ((hm.column(0) - hm.column(1)) * 0.5).normalize();
        a[(2 * i, 0)] = h[0] * v[0];
        a[(2 * i, 1)] = h[1] * v[1];
        a[(2 * i + 1, 0)] = d1[0] * d2[0];
        a[(2 * i + 1, 1)] = d1[1] * d2[1];
        b[2 * i] = -h[2] * v[2];
        b[2 * i + 1] = -d1[2] * d2[2];
    }

    let ata = a.transpose() * &a;
    let atb = a.transpose() * &b;
    let focal = ata.try_inverse().map(|inv| inv * atb).and_then(|f| {
        let fx = (1.0 / f[0].abs()).sqrt();
        let fy = (1.0 / f[1].abs()).sqrt();
        (fx.is_finite() && fy.is_finite() && fx > 1.0 && fy > 1.0).then_some((fx, fy))
    });
    let (fx, fy) = focal.unwrap_or_else(|| {
        debug!("focal length initialization degenerate, using {}", fallback);
        (fallback, fallback)
    });
    crate::types::camera_matrix(fx, fy, cx, cy)
}

/// Board pose from `K^-1 H`, rotation projected back onto SO(3).
pub fn pose_from_homography(k: &na::Matrix3<f64>, hm: &na::Matrix3<f64>) -> Result<na::Isometry3<f64>> {
    let k_inv = k
        .try_inverse()
        .ok_or_else(|| CalibError::SolverFailed("camera matrix not invertible".to_string()))?;
    let mut r1 = k_inv * hm.column(0);
    let mut r2 = k_inv * hm.column(1);
    let mut t = k_inv * hm.column(2);
    let scale = 2.0 / (r1.norm() + r2.norm()).max(1e-18);
    r1 *= scale;
    r2 *= scale;
    t *= scale;
    // the board has to be in front of the camera
    if t.z < 0.0 {
        r1 = -r1;
        r2 = -r2;
        t = -t;
    }
    let r3 = r1.cross(&r2);
    let r = na::Matrix3::from_columns(&[r1, r2, r3]);
    let svd = r.svd(true, true);
    let (u, v_t) = svd
        .u
        .zip(svd.v_t)
        .ok_or_else(|| CalibError::SolverFailed("svd failed on rotation".to_string()))?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        r = -r;
    }
    let rotation = na::UnitQuaternion::from_matrix(&r);
    Ok(na::Isometry3::from_parts(na::Translation3::from(t), rotation))
}
