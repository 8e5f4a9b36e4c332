pub mod board;
pub mod camera_model;
pub mod config;
pub mod data_loader;
pub mod detected_points;
pub mod detection;
pub mod error;
pub mod io;
pub mod optimization;
pub mod pipeline;
pub mod synthetic;
pub mod types;
pub mod util;
pub mod vision;
pub mod visualization;

pub use error::{CalibError, Result};
