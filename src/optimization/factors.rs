use nalgebra as na;
use tiny_solver::factors::Factor;

use crate::camera_model::OpenCVModel5;

/// Reprojection residuals of one board view.
///
/// Parameter blocks are `[intrinsics, rvec, tvec]`, residuals are laid out
/// as `[du0, dv0, du1, dv1, ...]`.
#[derive(Debug, Clone)]
pub struct ReprojectionFactor {
    pub p3ds: Vec<na::Point3<f64>>,
    pub p2ds: Vec<na::Vector2<f64>>,
}

impl ReprojectionFactor {
    pub fn new(p3ds: &[glam::Vec3], p2ds: &[glam::Vec2]) -> ReprojectionFactor {
        ReprojectionFactor {
            p3ds: p3ds
                .iter()
                .map(|p| na::Point3::new(p.x as f64, p.y as f64, p.z as f64))
                .collect(),
            p2ds: p2ds
                .iter()
                .map(|p| na::Vector2::new(p.x as f64, p.y as f64))
                .collect(),
        }
    }

    pub fn residual_num(&self) -> usize {
        self.p2ds.len() * 2
    }
}

impl<T: na::RealField> Factor<T> for ReprojectionFactor {
    fn residual_func(&self, params: &[na::DVector<T>]) -> na::DVector<T> {
        // params[intrinsics, rvec, tvec]
        let rvec = na::Vector3::new(
            params[1][0].clone(),
            params[1][1].clone(),
            params[1][2].clone(),
        );
        let tvec = na::Vector3::new(
            params[2][0].clone(),
            params[2][1].clone(),
            params[2][2].clone(),
        );
        let transform = na::Isometry3::new(tvec, rvec);
        let mut residuals = na::DVector::zeros(self.residual_num());
        for (i, (p3d, p2d)) in self.p3ds.iter().zip(&self.p2ds).enumerate() {
            let p3d: na::Point3<T> = p3d.cast();
            let p3d_t = transform.clone() * p3d;
            let p2d_p = OpenCVModel5::project_one_impl(&params[0], &p3d_t.coords);
            residuals[2 * i] = p2d_p[0].clone() - T::from_f64(p2d.x).unwrap();
            residuals[2 * i + 1] = p2d_p[1].clone() - T::from_f64(p2d.y).unwrap();
        }
        residuals
    }
}
