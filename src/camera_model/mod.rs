pub mod generic;
pub mod opencv5;

pub use generic::{remap, undistort_image, CameraModel};
pub use opencv5::OpenCVModel5;
