//! Pinhole camera model used by depth-based visibility.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::SE3;

/// Pinhole intrinsics plus image size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: usize,
    pub height: usize,
}

impl CameraModel {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, width: usize, height: usize) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
        }
    }

    /// Project a world point given the camera pose `T_wc`.
    ///
    /// Returns `(u, v, depth)` or `None` when the point is behind the camera.
    pub fn project(&self, point_world: &Vector3<f64>, pose_wc: &SE3) -> Option<(f64, f64, f64)> {
        let p_cam = pose_wc.inverse().transform_point(point_world);

        if p_cam.z <= 0.0 {
            return None;
        }

        let u = self.fx * p_cam.x / p_cam.z + self.cx;
        let v = self.fy * p_cam.y / p_cam.z + self.cy;

        Some((u, v, p_cam.z))
    }

    /// Pixel containing `(u, v)`, if inside the image.
    pub fn pixel(&self, u: f64, v: f64) -> Option<(usize, usize)> {
        if !(u >= 0.0 && v >= 0.0) {
            return None;
        }
        let (col, row) = (u.floor() as usize, v.floor() as usize);
        (col < self.width && row < self.height).then_some((col, row))
    }
}
