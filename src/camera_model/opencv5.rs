use super::generic::CameraModel;
use nalgebra as na;

/// Pinhole camera with OpenCV's five coefficient radial-tangential distortion.
///
/// Parameter layout is `[fx, fy, cx, cy, k1, k2, p1, p2, k3]`.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenCVModel5<T: na::RealField + Clone> {
    pub fx: T,
    pub fy: T,
    pub cx: T,
    pub cy: T,
    pub k1: T,
    pub k2: T,
    pub p1: T,
    pub p2: T,
    pub k3: T,
    pub width: u32,
    pub height: u32,
}

pub const OPENCV5_PARAM_NUM: usize = 9;

impl<T: na::RealField + Clone> OpenCVModel5<T> {
    pub fn new(params: &na::DVector<T>, width: u32, height: u32) -> OpenCVModel5<T> {
        OpenCVModel5 {
            fx: params[0].clone(),
            fy: params[1].clone(),
            cx: params[2].clone(),
            cy: params[3].clone(),
            k1: params[4].clone(),
            k2: params[5].clone(),
            p1: params[6].clone(),
            p2: params[7].clone(),
            k3: params[8].clone(),
            width,
            height,
        }
    }

    pub fn params(&self) -> na::DVector<T> {
        na::dvector![
            self.fx.clone(),
            self.fy.clone(),
            self.cx.clone(),
            self.cy.clone(),
            self.k1.clone(),
            self.k2.clone(),
            self.p1.clone(),
            self.p2.clone(),
            self.k3.clone()
        ]
    }

    /// Applies the distortion polynomial to a point on the normalized plane.
    pub fn distort_impl(params: &na::DVector<T>, xn: T, yn: T) -> (T, T) {
        let k1 = &params[4];
        let k2 = &params[5];
        let p1 = &params[6];
        let p2 = &params[7];
        let k3 = &params[8];
        let one = T::one();
        let two = one.clone() + one.clone();

        let xy = xn.clone() * yn.clone();
        let x2 = xn.clone() * xn.clone();
        let y2 = yn.clone() * yn.clone();
        let r2 = x2.clone() + y2.clone();
        let r4 = r2.clone() * r2.clone();
        let r6 = r4.clone() * r2.clone();
        let radial = one + k1.clone() * r2.clone() + k2.clone() * r4 + k3.clone() * r6;

        let xd = xn * radial.clone()
            + two.clone() * p1.clone() * xy.clone()
            + p2.clone() * (r2.clone() + two.clone() * x2);
        let yd = yn * radial
            + p1.clone() * (r2 + two.clone() * y2)
            + two * p2.clone() * xy;
        (xd, yd)
    }

    pub fn project_one_impl(params: &na::DVector<T>, pt: &na::Vector3<T>) -> na::Vector2<T> {
        let fx = &params[0];
        let fy = &params[1];
        let cx = &params[2];
        let cy = &params[3];

        let xn = pt[0].clone() / pt[2].clone();
        let yn = pt[1].clone() / pt[2].clone();
        let (xd, yd) = Self::distort_impl(params, xn, yn);

        na::Vector2::new(fx.clone() * xd + cx.clone(), fy.clone() * yd + cy.clone())
    }
}

impl OpenCVModel5<f64> {
    pub fn from_calibration(
        camera_matrix: &na::Matrix3<f64>,
        distortion: &[f64; 5],
        width: u32,
        height: u32,
    ) -> OpenCVModel5<f64> {
        OpenCVModel5 {
            fx: camera_matrix[(0, 0)],
            fy: camera_matrix[(1, 1)],
            cx: camera_matrix[(0, 2)],
            cy: camera_matrix[(1, 2)],
            k1: distortion[0],
            k2: distortion[1],
            p1: distortion[2],
            p2: distortion[3],
            k3: distortion[4],
            width,
            height,
        }
    }

    pub fn distortion(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    /// Inverts the distortion on the normalized plane by fixed point iteration.
    pub fn undistort_normalized(&self, xd: f64, yd: f64) -> (f64, f64) {
        let (mut x, mut y) = (xd, yd);
        for _ in 0..20 {
            let r2 = x * x + y * y;
            let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2;
            let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            let x_next = (xd - dx) / radial;
            let y_next = (yd - dy) / radial;
            let converged = (x_next - x).abs() < 1e-12 && (y_next - y).abs() < 1e-12;
            x = x_next;
            y = y_next;
            if converged {
                break;
            }
        }
        (x, y)
    }
}

impl CameraModel for OpenCVModel5<f64> {
    fn params(&self) -> na::DVector<f64> {
        OpenCVModel5::params(self)
    }

    fn width(&self) -> f64 {
        self.width as f64
    }

    fn height(&self) -> f64 {
        self.height as f64
    }

    fn project_one(&self, pt: &na::Vector3<f64>) -> na::Vector2<f64> {
        Self::project_one_impl(&OpenCVModel5::params(self), pt)
    }

    fn unproject_one(&self, pt: &na::Vector2<f64>) -> na::Vector3<f64> {
        let xd = (pt[0] - self.cx) / self.fx;
        let yd = (pt[1] - self.cy) / self.fy;
        let (x, y) = self.undistort_normalized(xd, yd);
        na::Vector3::new(x, y, 1.0)
    }
}
