//! Visibility oracles: which estimated points could have produced an
//! observation this iteration.
//!
//! Oracles never fail. When their scene data is missing or inconsistent they
//! report every point as visible and log the degraded mode.

use std::sync::atomic::{AtomicBool, Ordering};

use nalgebra::Vector3;
use tracing::warn;

use crate::error::TrackingError;
use crate::geometry::{CameraModel, SE3};

/// One flag per estimated point; `true` means the point may explain data.
pub type VisibilityMask = Vec<bool>;

/// Classifies estimated points as visible or occluded.
///
/// Must be deterministic for a fixed scene and pose.
pub trait VisibilityOracle {
    fn visible(&self, points: &[Vector3<f64>]) -> VisibilityMask;
}

impl<T: VisibilityOracle + ?Sized> VisibilityOracle for Box<T> {
    fn visible(&self, points: &[Vector3<f64>]) -> VisibilityMask {
        (**self).visible(points)
    }
}

/// Every point is visible.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllVisible;

impl VisibilityOracle for AllVisible {
    fn visible(&self, points: &[Vector3<f64>]) -> VisibilityMask {
        vec![true; points.len()]
    }
}

/// An explicit per-point mask, e.g. from an external segmentation.
#[derive(Debug, Clone, Default)]
pub struct FixedMask {
    mask: Vec<bool>,
}

impl FixedMask {
    pub fn new(mask: Vec<bool>) -> Self {
        Self { mask }
    }

    /// Points in `hidden` are occluded, the rest of `n` points are visible.
    pub fn hiding(n: usize, hidden: impl IntoIterator<Item = usize>) -> Self {
        let mut mask = vec![true; n];
        for i in hidden {
            if let Some(flag) = mask.get_mut(i) {
                *flag = false;
            }
        }
        Self { mask }
    }

    pub fn set_mask(&mut self, mask: Vec<bool>) {
        self.mask = mask;
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }
}

impl VisibilityOracle for FixedMask {
    fn visible(&self, points: &[Vector3<f64>]) -> VisibilityMask {
        if self.mask.len() != points.len() {
            warn!(
                "Visibility mask has {} entries for {} points, assuming all visible",
                self.mask.len(),
                points.len()
            );
            return vec![true; points.len()];
        }
        self.mask.clone()
    }
}

/// Row-major depth image in meters. Zero or non-finite pixels carry no
/// measurement.
#[derive(Debug, Clone)]
pub struct DepthImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl DepthImage {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self, TrackingError> {
        if data.len() != width * height {
            return Err(TrackingError::DimensionMismatch {
                expected: width * height,
                actual: data.len(),
                context: "depth image pixels".to_string(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Image filled with a single depth value.
    pub fn constant(width: usize, height: usize, depth: f32) -> Self {
        Self {
            width,
            height,
            data: vec![depth; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn set(&mut self, col: usize, row: usize, depth: f32) {
        if col < self.width && row < self.height {
            self.data[row * self.width + col] = depth;
        }
    }

    /// Measured depth at a pixel, if any.
    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let d = self.data[row * self.width + col];
        (d.is_finite() && d > 0.0).then_some(d as f64)
    }
}

/// Occlusion test against a depth image seen from a pinhole camera.
///
/// A point is hidden when it projects outside the image or behind the camera,
/// or when the measured depth at its pixel is closer than the point by more
/// than `tolerance`. Pixels without a measurement do not occlude.
#[derive(Debug)]
pub struct DepthImageVisibility {
    camera: CameraModel,
    /// Camera pose T_wc.
    pose_wc: SE3,
    depth: Option<DepthImage>,
    tolerance: f64,
    warned: AtomicBool,
}

impl DepthImageVisibility {
    pub fn new(camera: CameraModel, pose_wc: SE3, tolerance: f64) -> Self {
        Self {
            camera,
            pose_wc,
            depth: None,
            tolerance,
            warned: AtomicBool::new(false),
        }
    }

    pub fn set_depth(&mut self, depth: DepthImage) {
        self.depth = Some(depth);
        self.warned.store(false, Ordering::Relaxed);
    }

    pub fn clear_depth(&mut self) {
        self.depth = None;
    }

    fn degrade(&self, n: usize, reason: &str) -> VisibilityMask {
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!("Depth visibility degraded ({}), assuming all visible", reason);
        }
        vec![true; n]
    }
}

impl VisibilityOracle for DepthImageVisibility {
    fn visible(&self, points: &[Vector3<f64>]) -> VisibilityMask {
        let Some(depth) = &self.depth else {
            return self.degrade(points.len(), "no depth image");
        };
        if depth.width() != self.camera.width || depth.height() != self.camera.height {
            return self.degrade(points.len(), "depth image size does not match camera");
        }

        points
            .iter()
            .map(|p| {
                let Some((u, v, z)) = self.camera.project(p, &self.pose_wc) else {
                    return false;
                };
                let Some((col, row)) = self.camera.pixel(u, v) else {
                    return false;
                };
                match depth.get(col, row) {
                    Some(measured) => measured >= z - self.tolerance,
                    None => true,
                }
            })
            .collect()
    }
}

/// Logical AND of several oracles: a point is visible only if every oracle
/// agrees.
#[derive(Default)]
pub struct MultiVisibility {
    oracles: Vec<Box<dyn VisibilityOracle + Send + Sync>>,
}

impl MultiVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, oracle: impl VisibilityOracle + Send + Sync + 'static) -> Self {
        self.oracles.push(Box::new(oracle));
        self
    }

    pub fn len(&self) -> usize {
        self.oracles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oracles.is_empty()
    }
}

impl VisibilityOracle for MultiVisibility {
    fn visible(&self, points: &[Vector3<f64>]) -> VisibilityMask {
        let mut mask = vec![true; points.len()];
        for oracle in &self.oracles {
            for (flag, v) in mask.iter_mut().zip(oracle.visible(points)) {
                *flag &= v;
            }
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> CameraModel {
        CameraModel::new(100.0, 100.0, 50.0, 50.0, 100, 100)
    }

    /// Camera at the origin looking down +Z.
    fn oracle_with_depth(depth: f32) -> DepthImageVisibility {
        let mut oracle = DepthImageVisibility::new(camera(), SE3::identity(), 0.02);
        oracle.set_depth(DepthImage::constant(100, 100, depth));
        oracle
    }

    #[test]
    fn test_fixed_mask() {
        let points = vec![Vector3::zeros(); 4];
        let oracle = FixedMask::hiding(4, [1, 3]);
        assert_eq!(oracle.visible(&points), vec![true, false, true, false]);
    }

    #[test]
    fn test_fixed_mask_length_mismatch_degrades() {
        let oracle = FixedMask::new(vec![false; 3]);
        assert_eq!(oracle.visible(&vec![Vector3::zeros(); 5]), vec![true; 5]);
    }

    #[test]
    fn test_depth_occlusion() {
        let oracle = oracle_with_depth(1.0);
        let points = vec![
            // In front of the measured surface
            Vector3::new(0.0, 0.0, 0.8),
            // On the surface, within tolerance
            Vector3::new(0.0, 0.0, 1.01),
            // Behind the surface
            Vector3::new(0.0, 0.0, 1.5),
            // Behind the camera
            Vector3::new(0.0, 0.0, -1.0),
            // Outside the image
            Vector3::new(10.0, 0.0, 1.0),
        ];
        assert_eq!(
            oracle.visible(&points),
            vec![true, true, false, false, false]
        );
    }

    #[test]
    fn test_missing_depth_pixel_does_not_occlude() {
        let mut oracle = oracle_with_depth(1.0);
        let mut depth = DepthImage::constant(100, 100, 1.0);
        depth.set(50, 50, 0.0);
        oracle.set_depth(depth);
        assert_eq!(oracle.visible(&[Vector3::new(0.0, 0.0, 2.0)]), vec![true]);
    }

    #[test]
    fn test_missing_depth_image_assumes_visible() {
        let mut oracle = oracle_with_depth(1.0);
        oracle.clear_depth();
        let points = vec![Vector3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0)];
        assert_eq!(oracle.visible(&points), vec![true, true]);

        let mut mismatched = DepthImageVisibility::new(camera(), SE3::identity(), 0.02);
        mismatched.set_depth(DepthImage::constant(10, 10, 1.0));
        assert_eq!(mismatched.visible(&points), vec![true, true]);
    }

    #[test]
    fn test_depth_image_size_checked() {
        assert!(DepthImage::new(4, 4, vec![1.0; 15]).is_err());
        assert!(DepthImage::new(4, 4, vec![1.0; 16]).is_ok());
    }

    #[test]
    fn test_multi_visibility_is_conjunction() {
        let points = vec![Vector3::new(0.0, 0.0, 0.5), Vector3::new(0.0, 0.0, 3.0)];
        let oracle = MultiVisibility::new()
            .with(FixedMask::new(vec![false, true]))
            .with(oracle_with_depth(1.0));
        assert_eq!(oracle.len(), 2);
        assert_eq!(oracle.visible(&points), vec![false, false]);
        assert_eq!(MultiVisibility::new().visible(&points), vec![true, true]);
    }
}
