//! Geometry utilities: SE3 transforms, pinhole projection, rigid alignment.

pub mod camera;
pub mod rigid_fit;
pub mod se3;

pub use camera::CameraModel;
pub use rigid_fit::fit_rigid_transform;
pub use se3::SE3;
