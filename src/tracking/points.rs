//! Estimated (model) and observed point sets.

use nalgebra::Vector3;

use crate::error::TrackingError;

/// Current belief about the object's shape: one position and one isotropic
/// standard deviation per representative point.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatedPointSet {
    pub positions: Vec<Vector3<f64>>,
    pub stdev: Vec<f64>,
}

impl EstimatedPointSet {
    pub fn new(positions: Vec<Vector3<f64>>, stdev: Vec<f64>) -> Self {
        debug_assert_eq!(positions.len(), stdev.len());
        Self { positions, stdev }
    }

    pub fn with_uniform_stdev(positions: Vec<Vector3<f64>>, stdev: f64) -> Self {
        let n = positions.len();
        Self::new(positions, vec![stdev; n])
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// One sample of a filtered point cloud.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedPoint {
    pub position: Vector3<f64>,
    pub color: Option<[u8; 3]>,
}

impl ObservedPoint {
    pub fn new(position: Vector3<f64>) -> Self {
        Self {
            position,
            color: None,
        }
    }

    pub fn with_color(position: Vector3<f64>, color: [u8; 3]) -> Self {
        Self {
            position,
            color: Some(color),
        }
    }
}

/// Observation for one frame. Every point is guaranteed finite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedPointSet {
    points: Vec<ObservedPoint>,
}

impl ObservedPointSet {
    /// Validate and wrap a frame's points.
    pub fn new(points: Vec<ObservedPoint>) -> Result<Self, TrackingError> {
        if let Some(index) = points
            .iter()
            .position(|p| !p.position.iter().all(|c| c.is_finite()))
        {
            return Err(TrackingError::MalformedObservation { index });
        }
        Ok(Self { points })
    }

    pub fn from_positions(positions: &[Vector3<f64>]) -> Result<Self, TrackingError> {
        Self::new(positions.iter().copied().map(ObservedPoint::new).collect())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[ObservedPoint] {
        &self.points
    }

    pub fn positions(&self) -> Vec<Vector3<f64>> {
        self.points.iter().map(|p| p.position).collect()
    }
}
