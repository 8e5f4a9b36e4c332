use std::io::Cursor;
use std::path::Path;

use glam::Vec2;
use image::{DynamicImage, GenericImage, Rgb, RgbImage};
use rerun::RecordingStream;

use crate::error::{CalibError, Result};

/// Colour of one board row, so the corner order is visible in overlays.
pub fn row_color(row: usize, rows: usize) -> (u8, u8, u8) {
    let c = colorous::TURBO.eval_rational(row, rows.max(2));
    (c.r, c.g, c.b)
}

/// rerun use top left corner as (0, 0)
pub fn rerun_shift(p2ds: &[Vec2]) -> Vec<(f32, f32)> {
    p2ds.iter().map(|p| (p.x + 0.5, p.y + 0.5)).collect()
}

fn put_pixel_checked(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_line(img: &mut RgbImage, p0: Vec2, p1: Vec2, color: Rgb<u8>) {
    let steps = (p1 - p0).abs().max_element().ceil().max(1.0) as usize;
    for s in 0..=steps {
        let p = p0.lerp(p1, s as f32 / steps as f32);
        put_pixel_checked(img, p.x.round() as i64, p.y.round() as i64, color);
    }
}

fn draw_circle(img: &mut RgbImage, center: Vec2, radius: f32, color: Rgb<u8>) {
    let n = (radius * 8.0).ceil().max(8.0) as usize;
    for s in 0..n {
        let a = s as f32 / n as f32 * std::f32::consts::TAU;
        let p = center + Vec2::new(a.cos(), a.sin()) * radius;
        put_pixel_checked(img, p.x.round() as i64, p.y.round() as i64, color);
    }
}

/// Copy of `img` with the corners circled and joined in board order, one
/// colour per row.
pub fn draw_corners(img: &DynamicImage, corners: &[Vec2], pattern_size: (usize, usize)) -> RgbImage {
    let mut canvas = img.to_rgb8();
    let (nx, ny) = pattern_size;
    if nx == 0 {
        return canvas;
    }
    let radius = (img.width().max(img.height()) as f32 / 200.0).max(3.0);
    for (i, p) in corners.iter().enumerate() {
        let (r, g, b) = row_color(i / nx, ny);
        let color = Rgb([r, g, b]);
        draw_circle(&mut canvas, *p, radius, color);
        if i + 1 < corners.len() {
            draw_line(&mut canvas, *p, corners[i + 1], color);
        }
    }
    canvas
}

/// Two images next to each other, the smaller one padded with black.
pub fn side_by_side(left: &DynamicImage, right: &DynamicImage) -> Result<RgbImage> {
    let (lw, lh) = (left.width(), left.height());
    let (rw, rh) = (right.width(), right.height());
    let mut canvas = RgbImage::new(lw + rw, lh.max(rh));
    canvas
        .copy_from(&left.to_rgb8(), 0, 0)
        .map_err(CalibError::Image)?;
    canvas
        .copy_from(&right.to_rgb8(), lw, 0)
        .map_err(CalibError::Image)?;
    Ok(canvas)
}

/// Streams the calibration run to a rerun viewer or `.rrd` file.
pub struct Visualizer {
    recording: RecordingStream,
}

impl Visualizer {
    pub fn new(recording: RecordingStream) -> Visualizer {
        Visualizer { recording }
    }

    pub fn save(path: &Path) -> Result<Visualizer> {
        let recording = rerun::RecordingStreamBuilder::new("checkerboard_calibration").save(path)?;
        Ok(Visualizer::new(recording))
    }

    pub fn spawn() -> Result<Visualizer> {
        let recording = rerun::RecordingStreamBuilder::new("checkerboard_calibration").spawn()?;
        Ok(Visualizer::new(recording))
    }

    pub fn recording(&self) -> &RecordingStream {
        &self.recording
    }

    pub fn log_image_as_compressed(
        &self,
        topic: &str,
        img: &DynamicImage,
        format: image::ImageFormat,
    ) -> Result<()> {
        let mut bytes: Vec<u8> = Vec::new();
        img.to_rgb8().write_to(&mut Cursor::new(&mut bytes), format)?;
        let image = rerun::EncodedImage::from_file_contents(bytes);
        self.recording.log(format!("{}/image", topic), &image)?;
        Ok(())
    }

    pub fn log_corners(&self, topic: &str, corners: &[Vec2], pattern_size: (usize, usize)) -> Result<()> {
        let (nx, ny) = pattern_size;
        let colors: Vec<_> = (0..corners.len())
            .map(|i| {
                let (r, g, b) = row_color(i / nx.max(1), ny);
                rerun::Color::from_rgb(r, g, b)
            })
            .collect();
        let labels: Vec<_> = (0..corners.len())
            .map(|i| format!("({}, {})", i % nx.max(1), i / nx.max(1)))
            .collect();
        self.recording.log(
            format!("{}/corners", topic),
            &rerun::Points2D::new(rerun_shift(corners))
                .with_colors(colors)
                .with_labels(labels)
                .with_radii([rerun::Radius::new_ui_points(5.0)]),
        )?;
        Ok(())
    }

    /// One frame per processed image: the picture and, when found, its corners.
    pub fn log_detection(
        &self,
        frame_idx: usize,
        img: &DynamicImage,
        corners: Option<&[Vec2]>,
        pattern_size: (usize, usize),
    ) -> Result<()> {
        self.recording.set_time_sequence("frame", frame_idx as i64);
        self.log_image_as_compressed("cam0", img, image::ImageFormat::Jpeg)?;
        match corners {
            Some(corners) => self.log_corners("cam0", corners, pattern_size),
            None => {
                self.recording
                    .log("cam0/corners", &rerun::Clear::flat())?;
                Ok(())
            }
        }
    }

    /// Original on the left, undistorted on the right.
    pub fn log_undistortion(&self, original: &DynamicImage, undistorted: &DynamicImage) -> Result<()> {
        let pair = DynamicImage::ImageRgb8(side_by_side(original, undistorted)?);
        self.recording.set_time_sequence("frame", 0);
        self.log_image_as_compressed("undistortion", &pair, image::ImageFormat::Png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_marks_corners_with_row_colours() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::new(64, 48));
        let corners = [
            Vec2::new(10.0, 10.0),
            Vec2::new(30.0, 10.0),
            Vec2::new(10.0, 30.0),
            Vec2::new(30.0, 30.0),
        ];
        let overlay = draw_corners(&img, &corners, (2, 2));
        assert_eq!(overlay.dimensions(), (64, 48));
        let (r, g, b) = row_color(0, 2);
        // the line between the first two corners
        assert_eq!(overlay.get_pixel(20, 10).0, [r, g, b]);
        assert_ne!(row_color(0, 2), row_color(1, 2));
    }

    #[test]
    fn side_by_side_pads_the_shorter_image() {
        let left = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, Rgb([255, 0, 0])));
        let right = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 5, Rgb([0, 0, 255])));
        let pair = side_by_side(&left, &right).unwrap();
        assert_eq!(pair.dimensions(), (6, 5));
        assert_eq!(pair.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(pair.get_pixel(5, 4).0, [0, 0, 255]);
        assert_eq!(pair.get_pixel(0, 4).0, [0, 0, 0]);
    }

    #[test]
    fn encoded_images_log_into_memory_recording() {
        let (recording, storage) = rerun::RecordingStreamBuilder::new("visualization_test")
            .memory()
            .unwrap();
        let vis = Visualizer::new(recording);
        let img = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(16, 12, image::Luma([200])));
        vis.log_image_as_compressed("cam0", &img, image::ImageFormat::Png)
            .unwrap();
        vis.log_undistortion(&img, &img).unwrap();
        assert!(!storage.take().is_empty());
    }
}
