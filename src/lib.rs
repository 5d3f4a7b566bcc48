pub mod config;
pub mod error;
pub mod geometry;
pub mod io;
pub mod simulation;
pub mod tracking;

pub use config::{
    FactoryConfig, LowEvidencePolicy, NoiseModel, PhysicsConfig, TrackerConfig, TrackingConfig,
};
pub use error::TrackingError;
pub use tracking::{
    ObjectType, ObservedPointSet, PhysicsTracker, TrackedObject, TrackingState, VisibilityOracle,
};
