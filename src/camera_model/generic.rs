use image::{DynamicImage, GenericImageView, Pixel};
use nalgebra as na;
use rayon::prelude::*;

use crate::types::Roi;

/// Bilinear lookup with a constant black border.
fn sample_bilinear<P>(img: &image::ImageBuffer<P, Vec<u8>>, x: f32, y: f32) -> P
where
    P: Pixel<Subpixel = u8>,
{
    let (w, h) = img.dimensions();
    let max_x = (w - 1) as f32;
    let max_y = (h - 1) as f32;
    let zero = *P::from_slice(&[0u8; 4][..P::CHANNEL_COUNT as usize]);
    if x.is_nan() || y.is_nan() || x < -1e-3 || y < -1e-3 || x > max_x + 1e-3 || y > max_y + 1e-3
    {
        return zero;
    }
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let ax = x - x0 as f32;
    let ay = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);
    let mut out = zero;
    for (c, o) in out.channels_mut().iter_mut().enumerate() {
        let top = p00.channels()[c] as f32 * (1.0 - ax) + p10.channels()[c] as f32 * ax;
        let bottom = p01.channels()[c] as f32 * (1.0 - ax) + p11.channels()[c] as f32 * ax;
        *o = (top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Resamples `src` at the coordinates stored in the two maps.
///
/// Gray images stay gray, everything else is resampled as RGB8.
pub fn remap(src: &DynamicImage, map0: &na::DMatrix<f32>, map1: &na::DMatrix<f32>) -> DynamicImage {
    let (r, c) = map0.shape();
    match src {
        DynamicImage::ImageLuma8(img) => {
            let out_img = image::GrayImage::from_par_fn(c as u32, r as u32, |x, y| {
                let (row, col) = (y as usize, x as usize);
                sample_bilinear(img, map0[(row, col)], map1[(row, col)])
            });
            DynamicImage::ImageLuma8(out_img)
        }
        other => {
            let img = other.to_rgb8();
            let out_img = image::RgbImage::from_par_fn(c as u32, r as u32, |x, y| {
                let (row, col) = (y as usize, x as usize);
                sample_bilinear(&img, map0[(row, col)], map1[(row, col)])
            });
            DynamicImage::ImageRgb8(out_img)
        }
    }
}

pub trait CameraModel
where
    Self: Sync,
{
    fn params(&self) -> na::DVector<f64>;
    fn width(&self) -> f64;
    fn height(&self) -> f64;
    fn project_one(&self, pt: &na::Vector3<f64>) -> na::Vector2<f64>;
    /// Returns the ray `(x, y, 1)` on the normalized plane.
    fn unproject_one(&self, pt: &na::Vector2<f64>) -> na::Vector3<f64>;

    /// Camera matrix for the undistorted image.
    ///
    /// `alpha = 0` keeps only valid pixels, `alpha = 1` keeps every source
    /// pixel. The returned roi is the all-valid region in the new image.
    fn estimate_new_camera_matrix_for_undistort(
        &self,
        alpha: f64,
        new_w_h: Option<(u32, u32)>,
    ) -> (na::Matrix3<f64>, Roi) {
        let (new_w, new_h) = new_w_h.unwrap_or((self.width() as u32, self.height() as u32));
        let (inner, outer) = undistorted_rectangles(self);
        let alpha = alpha.clamp(0.0, 1.0);

        let scale = |rect: &RectF| {
            let fx = (new_w as f64 - 1.0) / rect.width;
            let fy = (new_h as f64 - 1.0) / rect.height;
            (fx, fy, -fx * rect.x, -fy * rect.y)
        };
        let (fx0, fy0, cx0, cy0) = scale(&inner);
        let (fx1, fy1, cx1, cy1) = scale(&outer);
        let fx = fx0 * (1.0 - alpha) + fx1 * alpha;
        let fy = fy0 * (1.0 - alpha) + fy1 * alpha;
        let cx = cx0 * (1.0 - alpha) + cx1 * alpha;
        let cy = cy0 * (1.0 - alpha) + cy1 * alpha;

        const EPS: f64 = 1e-6;
        let x0 = (inner.x * fx + cx - EPS).ceil().max(0.0);
        let y0 = (inner.y * fy + cy - EPS).ceil().max(0.0);
        let x1 = ((inner.x + inner.width) * fx + cx + EPS).floor().min(new_w as f64 - 1.0);
        let y1 = ((inner.y + inner.height) * fy + cy + EPS).floor().min(new_h as f64 - 1.0);
        let roi = if x1 >= x0 && y1 >= y0 {
            Roi {
                x: x0 as u32,
                y: y0 as u32,
                width: (x1 - x0 + 1.0) as u32,
                height: (y1 - y0 + 1.0) as u32,
            }
        } else {
            Roi::default()
        };
        (crate::types::camera_matrix(fx, fy, cx, cy), roi)
    }

    /// Maps every pixel of the undistorted image, described by
    /// `projection_mat`, to its source location in the distorted image.
    fn init_undistort_map(
        &self,
        projection_mat: &na::Matrix3<f64>,
        new_w_h: (u32, u32),
    ) -> (na::DMatrix<f32>, na::DMatrix<f32>) {
        init_undistort_map(self, projection_mat, new_w_h)
    }
}

struct RectF {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// Largest rectangle inside and smallest rectangle around the undistorted
/// image border, on the normalized plane.
fn undistorted_rectangles<M: CameraModel + ?Sized>(model: &M) -> (RectF, RectF) {
    const N: usize = 9;
    let w = model.width();
    let h = model.height();
    let (mut ix0, mut ix1, mut iy0, mut iy1) = (f64::MIN, f64::MAX, f64::MIN, f64::MAX);
    let (mut ox0, mut ox1, mut oy0, mut oy1) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
    for i in 0..N {
        for j in 0..N {
            let p = na::Vector2::new(
                j as f64 * (w - 1.0) / (N - 1) as f64,
                i as f64 * (h - 1.0) / (N - 1) as f64,
            );
            let ray = model.unproject_one(&p);
            let (x, y) = (ray[0], ray[1]);
            ox0 = ox0.min(x);
            ox1 = ox1.max(x);
            oy0 = oy0.min(y);
            oy1 = oy1.max(y);
            if j == 0 {
                ix0 = ix0.max(x);
            }
            if j == N - 1 {
                ix1 = ix1.min(x);
            }
            if i == 0 {
                iy0 = iy0.max(y);
            }
            if i == N - 1 {
                iy1 = iy1.min(y);
            }
        }
    }
    (
        RectF {
            x: ix0,
            y: iy0,
            width: ix1 - ix0,
            height: iy1 - iy0,
        },
        RectF {
            x: ox0,
            y: oy0,
            width: ox1 - ox0,
            height: oy1 - oy0,
        },
    )
}

pub fn init_undistort_map<M: CameraModel + ?Sized>(
    camera_model: &M,
    projection_mat: &na::Matrix3<f64>,
    new_w_h: (u32, u32),
) -> (na::DMatrix<f32>, na::DMatrix<f32>) {
    let fx = projection_mat[(0, 0)];
    let fy = projection_mat[(1, 1)];
    let cx = projection_mat[(0, 2)];
    let cy = projection_mat[(1, 2)];
    let (w, h) = (new_w_h.0 as usize, new_w_h.1 as usize);
    let (xvec, yvec): (Vec<f32>, Vec<f32>) = (0..w * h)
        .into_par_iter()
        .map(|idx| {
            let (x, y) = ((idx % w) as f64, (idx / w) as f64);
            let ray = na::Vector3::new((x - cx) / fx, (y - cy) / fy, 1.0);
            let p2d = camera_model.project_one(&ray);
            (p2d[0] as f32, p2d[1] as f32)
        })
        .unzip();
    let xmap = na::DMatrix::from_row_slice(h, w, &xvec);
    let ymap = na::DMatrix::from_row_slice(h, w, &yvec);
    (xmap, ymap)
}

/// Undistorts `img` into a camera described by `new_camera_mat` at the same
/// resolution.
pub fn undistort_image<M: CameraModel + ?Sized>(
    camera_model: &M,
    img: &DynamicImage,
    new_camera_mat: &na::Matrix3<f64>,
) -> DynamicImage {
    let (xmap, ymap) = init_undistort_map(camera_model, new_camera_mat, img.dimensions());
    remap(img, &xmap, &ymap)
}
