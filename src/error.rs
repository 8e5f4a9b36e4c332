use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the calibration workflow.
#[derive(Debug, Error)]
pub enum CalibError {
    #[error("no images matching *.jp*g found in {dir}")]
    NoImages { dir: PathBuf },

    #[error("no observations: the checkerboard was not found in any image")]
    NoObservations,

    #[error(
        "resolution mismatch in {path}: expected {}x{}, found {}x{}",
        expected.0, expected.1, found.0, found.1
    )]
    ResolutionMismatch {
        path: PathBuf,
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("calibration solve failed: {0}")]
    SolverFailed(String),

    #[error("invalid npy data in {name}: {reason}")]
    Npy { name: String, reason: String },

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Glob(#[from] glob::PatternError),

    #[error(transparent)]
    Recording(#[from] rerun::RecordingStreamError),
}

pub type Result<T> = std::result::Result<T, CalibError>;
