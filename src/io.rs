pub mod npz;

use std::io::Write;
use std::path::{Path, PathBuf};

use nalgebra as na;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{CalibError, Result};
use crate::types::{CalibrationResult, RvecTvec};
use crate::util::ReprojectionError;
use npz::NpyArray;

pub const CALIB_DATA_FILE: &str = "calib_data.npz";

/// Serializes an object to a JSON file.
pub fn object_to_json<T: Serialize>(output_path: &Path, object: &T) -> Result<()> {
    let j = serde_json::to_string_pretty(object)?;
    let mut file = std::fs::File::create(output_path)?;
    file.write_all(j.as_bytes())?;
    Ok(())
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Arrays stored in `calib_data.npz`.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationArchive {
    pub camera_matrix: na::Matrix3<f64>,
    pub distortion: [f64; 5],
    pub poses: Vec<RvecTvec>,
}

impl From<&CalibrationResult> for CalibrationArchive {
    fn from(result: &CalibrationResult) -> Self {
        CalibrationArchive {
            camera_matrix: result.camera_matrix,
            distortion: result.distortion,
            poses: result.poses.clone(),
        }
    }
}

impl CalibrationArchive {
    /// `mtx` 3x3, `dist` 1x5, `rvecs` and `tvecs` Nx3x1.
    pub fn to_arrays(&self) -> Result<Vec<(&'static str, NpyArray)>> {
        let n = self.poses.len();
        let mtx: Vec<f64> = (0..3)
            .flat_map(|r| (0..3).map(move |c| (r, c)))
            .map(|(r, c)| self.camera_matrix[(r, c)])
            .collect();
        Ok(vec![
            ("mtx", NpyArray::new(vec![3, 3], mtx)?),
            ("dist", NpyArray::new(vec![1, 5], self.distortion.to_vec())?),
            (
                "rvecs",
                NpyArray::new(vec![n, 3, 1], self.poses.iter().flat_map(|p| p.rvec).collect())?,
            ),
            (
                "tvecs",
                NpyArray::new(vec![n, 3, 1], self.poses.iter().flat_map(|p| p.tvec).collect())?,
            ),
        ])
    }

    fn from_arrays(mtx: NpyArray, dist: NpyArray, rvecs: NpyArray, tvecs: NpyArray) -> Result<Self> {
        let shape_err = |name: &str, shape: &[usize]| CalibError::Npy {
            name: name.to_string(),
            reason: format!("unexpected shape {:?}", shape),
        };
        if mtx.data.len() != 9 {
            return Err(shape_err("mtx", &mtx.shape));
        }
        if dist.data.len() != 5 {
            return Err(shape_err("dist", &dist.shape));
        }
        if rvecs.data.len() % 3 != 0 || rvecs.data.len() != tvecs.data.len() {
            return Err(shape_err("rvecs", &rvecs.shape));
        }
        let poses = rvecs
            .data
            .chunks_exact(3)
            .zip(tvecs.data.chunks_exact(3))
            .map(|(r, t)| RvecTvec {
                rvec: [r[0], r[1], r[2]],
                tvec: [t[0], t[1], t[2]],
            })
            .collect();
        Ok(CalibrationArchive {
            camera_matrix: na::Matrix3::from_row_slice(&mtx.data),
            distortion: [dist.data[0], dist.data[1], dist.data[2], dist.data[3], dist.data[4]],
            poses,
        })
    }
}

/// Writes `<dir>/calib_data.npz` and returns its path.
pub fn write_calibration_npz(dir: &Path, result: &CalibrationResult) -> Result<PathBuf> {
    let path = dir.join(CALIB_DATA_FILE);
    let arrays = CalibrationArchive::from(result).to_arrays()?;
    let refs: Vec<_> = arrays.iter().map(|(k, a)| (*k, a)).collect();
    npz::save_npz(&path, &refs)?;
    log::info!("saved {}", path.display());
    Ok(path)
}

pub fn read_calibration_npz(path: &Path) -> Result<CalibrationArchive> {
    let mut archive = npz::open_npz(path)?;
    let mtx = npz::read_npz_array(&mut archive, "mtx")?;
    let dist = npz::read_npz_array(&mut archive, "dist")?;
    let rvecs = npz::read_npz_array(&mut archive, "rvecs")?;
    let tvecs = npz::read_npz_array(&mut archive, "tvecs")?;
    CalibrationArchive::from_arrays(mtx, dist, rvecs, tvecs)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicParameters {
    pub fx: f64,
    pub fy: f64,
    pub height_px: u32,
    pub ppx: f64,
    pub ppy: f64,
    pub width_px: u32,
}

/// Radial `rk*` and tangential `tp*` coefficients. `rk1, rk2, tp1, tp2, rk3`
/// are the entries of the distortion vector in storage order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistortionParameters {
    pub rk1: f64,
    pub rk2: f64,
    pub rk3: f64,
    pub tp1: f64,
    pub tp2: f64,
}

/// Parameter block consumed by downstream tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBlock {
    pub intrinsic_parameters: IntrinsicParameters,
    pub distortion_parameters: DistortionParameters,
}

impl ParameterBlock {
    pub fn new(result: &CalibrationResult) -> ParameterBlock {
        let [rk1, rk2, tp1, tp2, rk3] = result.distortion;
        ParameterBlock {
            intrinsic_parameters: IntrinsicParameters {
                fx: result.fx(),
                fy: result.fy(),
                height_px: result.image_size.1,
                ppx: result.cx(),
                ppy: result.cy(),
                width_px: result.image_size.0,
            },
            distortion_parameters: DistortionParameters {
                rk1,
                rk2,
                rk3,
                tp1,
                tp2,
            },
        }
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Serialize)]
struct CalibrationReport {
    timestamp: String,
    images: usize,
    observations: usize,
    skipped: usize,
    image_size: (u32, u32),
    camera_matrix: [[f64; 3]; 3],
    distortion: [f64; 5],
    rms: f64,
    total_error: f64,
    views: Vec<ViewReport>,
    parameters: ParameterBlock,
}

#[derive(Serialize)]
struct ViewReport {
    path: String,
    error: f64,
    rvec: [f64; 3],
    tvec: [f64; 3],
}

fn local_timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// JSON report with the solved model, per view errors and poses.
///
/// `num_images` counts every matched image, `view_paths` only the ones the
/// board was found in.
pub fn write_detailed_report(
    output_path: &Path,
    result: &CalibrationResult,
    error: &ReprojectionError,
    view_paths: &[PathBuf],
    num_images: usize,
) -> Result<()> {
    let k = &result.camera_matrix;
    let views = result
        .poses
        .iter()
        .zip(&error.per_view)
        .enumerate()
        .map(|(i, (pose, err))| ViewReport {
            path: view_paths
                .get(i)
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            error: *err,
            rvec: pose.rvec,
            tvec: pose.tvec,
        })
        .collect();
    let report = CalibrationReport {
        timestamp: local_timestamp(),
        images: num_images,
        observations: result.poses.len(),
        skipped: num_images.saturating_sub(result.poses.len()),
        image_size: result.image_size,
        camera_matrix: [
            [k[(0, 0)], k[(0, 1)], k[(0, 2)]],
            [k[(1, 0)], k[(1, 1)], k[(1, 2)]],
            [k[(2, 0)], k[(2, 1)], k[(2, 2)]],
        ],
        distortion: result.distortion,
        rms: result.rms,
        total_error: error.total,
        views,
        parameters: ParameterBlock::new(result),
    };
    object_to_json(output_path, &report)
}

/// Short text summary of the point reprojection distances.
pub fn write_report(output_path: &Path, num_views: usize, avg_med: (f64, f64)) -> Result<()> {
    let mut s = String::new();
    s += format!("Calibrated from {} views\n\n", num_views).as_str();
    s += format!("    average reprojection error: {:.5} px\n", avg_med.0).as_str();
    s += format!("    median  reprojection error: {:.5} px\n", avg_med.1).as_str();
    let mut file = std::fs::File::create(output_path)?;
    file.write_all(s.as_bytes())?;
    Ok(())
}
