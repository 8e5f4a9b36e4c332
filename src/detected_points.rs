use glam;
use std::path::PathBuf;

use crate::error::{CalibError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeaturePoint {
    pub p2d: glam::Vec2,
    pub p3d: glam::Vec3,
}

/// One image's correspondences. Only built when the pattern was found.
#[derive(Debug, Clone)]
pub struct FrameFeature {
    pub path: PathBuf,
    pub img_w_h: (u32, u32),
    pub features: Vec<FeaturePoint>,
}

impl FrameFeature {
    pub fn new(path: PathBuf, img_w_h: (u32, u32), p3ds: &[glam::Vec3], p2ds: &[glam::Vec2]) -> Self {
        let features = p3ds
            .iter()
            .zip(p2ds)
            .map(|(p3d, p2d)| FeaturePoint {
                p2d: *p2d,
                p3d: *p3d,
            })
            .collect();
        FrameFeature {
            path,
            img_w_h,
            features,
        }
    }

    pub fn p3ds(&self) -> Vec<glam::Vec3> {
        self.features.iter().map(|f| f.p3d).collect()
    }

    pub fn p2ds(&self) -> Vec<glam::Vec2> {
        self.features.iter().map(|f| f.p2d).collect()
    }
}

/// Ordered collection of observations that survived corner detection.
///
/// Every frame must share the resolution of the first one pushed.
#[derive(Debug, Default)]
pub struct FeatureAccumulator {
    frames: Vec<FrameFeature>,
}

impl FeatureAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: FrameFeature) -> Result<()> {
        if let Some(first) = self.frames.first() {
            if first.img_w_h != frame.img_w_h {
                return Err(CalibError::ResolutionMismatch {
                    path: frame.path,
                    expected: first.img_w_h,
                    found: frame.img_w_h,
                });
            }
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn image_size(&self) -> Result<(u32, u32)> {
        self.frames
            .first()
            .map(|f| f.img_w_h)
            .ok_or(CalibError::NoObservations)
    }

    pub fn frames(&self) -> &[FrameFeature] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn object_points(&self) -> Vec<Vec<glam::Vec3>> {
        self.frames.iter().map(FrameFeature::p3ds).collect()
    }

    pub fn image_points(&self) -> Vec<Vec<glam::Vec2>> {
        self.frames.iter().map(FrameFeature::p2ds).collect()
    }
}
