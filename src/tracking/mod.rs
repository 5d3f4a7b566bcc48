//! Tracking core: fuses a simulated object with point-cloud observations.
//!
//! Per frame the tracker repeats, until convergence or the iteration cap:
//! - read the live estimated points from the simulated object
//! - ask the visibility oracle which of them could be observed
//! - E-step: soft, occlusion-aware correspondences with an outlier bucket
//! - M-step: pull each point toward its weighted target and step physics

pub mod correspondence;
pub mod diagnostics;
pub mod initialization;
pub mod points;
pub mod publication;
pub mod result;
pub mod state;
pub mod tracked_object;
pub mod tracker;
pub mod visibility;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use correspondence::CorrespondenceWeights;
pub use diagnostics::DiagnosticsPublisher;
pub use initialization::{
    InitializationService, ObjectInitMsg, create_object_from_service, to_tracked_object,
};
pub use points::{EstimatedPointSet, ObservedPoint, ObservedPointSet};
pub use publication::{TrackedObjectMsg, to_tracked_object_message};
pub use result::{CorrespondenceMetrics, IterationDiagnostics, IterationResult, TimingStats};
pub use state::TrackingState;
pub use tracked_object::{TrackedBox, TrackedObject, TrackedRope, TrackedTowel};
pub use tracker::PhysicsTracker;
pub use visibility::{
    AllVisible, DepthImage, DepthImageVisibility, FixedMask, MultiVisibility, VisibilityMask,
    VisibilityOracle,
};

/// Which geometric encoding a tracked object uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// Ordered nodes along a curve.
    Rope,
    /// Row-major grid over a surface.
    Towel,
    /// Lattice on the faces of a cuboid.
    Box,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Rope => "rope",
            ObjectType::Towel => "towel",
            ObjectType::Box => "box",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
