//! Per-iteration results and diagnostics structures.
//!
//! These types describe what happened during one refinement iteration:
//! - state of the per-frame refinement loop
//! - how far the estimated points moved
//! - correspondence counts and outlier statistics
//! - timing information for profiling

use nalgebra::Vector3;

use crate::tracking::{CorrespondenceWeights, EstimatedPointSet, TrackingState};

/// Summary of one `do_iteration` call.
#[derive(Debug, Clone)]
pub struct IterationResult {
    pub state: TrackingState,
    /// 1-based iteration index within the current frame.
    pub iteration: usize,
    /// Mean distance moved by the estimated points during this iteration (m).
    pub mean_displacement: f64,
    pub metrics: CorrespondenceMetrics,
    pub timing: TimingStats,
}

/// Scalar metrics useful for debugging correspondence quality.
#[derive(Debug, Clone, Default)]
pub struct CorrespondenceMetrics {
    pub n_observed: usize,
    pub n_visible: usize,
    /// Observed points whose outlier share exceeds one half.
    pub n_outliers: usize,
    pub mean_outlier_weight: f64,
    /// Visible points whose total responsibility fell below the threshold.
    pub n_low_evidence: usize,
    /// Mean per-point stdev after re-estimation (m).
    pub mean_stdev: f64,
}

/// Timing breakdown for an iteration.
#[derive(Debug, Clone, Default)]
pub struct TimingStats {
    pub total_ms: f64,
    pub e_step_ms: f64,
    pub m_step_ms: f64,
    pub physics_ms: f64,
}

/// Read-only snapshot of one iteration for external inspection.
#[derive(Debug, Clone)]
pub struct IterationDiagnostics {
    /// Frame counter (number of `update_input` calls so far).
    pub frame: usize,
    pub iteration: usize,
    /// Estimated points and stdev the E-step ran against.
    pub estimated: EstimatedPointSet,
    pub observed: Vec<Vector3<f64>>,
    pub visibility: Vec<bool>,
    pub weights: CorrespondenceWeights,
    /// Offsets handed to the tracked object.
    pub corrections: Vec<Vector3<f64>>,
}
