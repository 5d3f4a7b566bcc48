//! Physics tracker: the per-frame correspondence-and-correction loop.
//!
//! The owning control loop pushes one observation per frame with
//! `update_input` and then calls `do_iteration` as often as it likes (or
//! `run_until_converged`). Each iteration:
//! - reads the live points from the tracked object
//! - asks the visibility oracle which points may explain data
//! - E-step: soft correspondences with an outlier bucket, stdev update
//! - M-step: offsets toward the weighted targets blended with the physics
//!   prediction, applied to the object
//! - advances the simulation by one physics step
//!
//! Nothing here blocks or spawns threads.

use std::time::Instant;

use nalgebra::Vector3;
use tracing::{debug, info, warn};

use crate::config::{LowEvidencePolicy, TrackerConfig};
use crate::error::TrackingError;
use crate::tracking::result::{
    CorrespondenceMetrics, IterationDiagnostics, IterationResult, TimingStats,
};
use crate::tracking::{
    CorrespondenceWeights, DiagnosticsPublisher, EstimatedPointSet, ObservedPointSet,
    TrackedObject, TrackingState, VisibilityOracle,
};

/// Tracks one object against a stream of point-cloud frames.
pub struct PhysicsTracker<V: VisibilityOracle> {
    object: TrackedObject,
    visibility: V,
    config: TrackerConfig,

    /// Per-point stdev, re-estimated after every E-step.
    stdev: Vec<f64>,

    /// Observation of the current frame.
    observation: ObservedPointSet,
    observed_positions: Vec<Vector3<f64>>,

    /// Object points when the current observation arrived.
    predicted: Vec<Vector3<f64>>,

    /// Refinement state machine for the current frame.
    state: TrackingState,

    /// Number of observations received.
    frame_count: usize,

    /// Iterations run on the current frame.
    iteration: usize,

    last_diagnostics: Option<IterationDiagnostics>,
    publisher: Option<DiagnosticsPublisher>,
}

impl<V: VisibilityOracle> PhysicsTracker<V> {
    pub fn new(
        object: TrackedObject,
        visibility: V,
        config: TrackerConfig,
    ) -> Result<Self, TrackingError> {
        config.validate()?;
        let n = object.num_points();
        if n == 0 {
            return Err(TrackingError::malformed_init(
                "tracked object has no representative points",
            ));
        }
        let stdev = vec![config.noise.prior_distance; n];
        let predicted = object.points();

        debug!(
            "Tracker created for {} with {} points",
            object.object_type(),
            n
        );

        Ok(Self {
            object,
            visibility,
            config,
            stdev,
            observation: ObservedPointSet::empty(),
            observed_positions: Vec::new(),
            predicted,
            state: TrackingState::AwaitingObservation,
            frame_count: 0,
            iteration: 0,
            last_diagnostics: None,
            publisher: None,
        })
    }

    /// Also push every iteration snapshot through `publisher`.
    pub fn with_diagnostics_publisher(mut self, publisher: DiagnosticsPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Replace the current observation. Does not run inference.
    pub fn update_input(&mut self, observation: ObservedPointSet) {
        self.observed_positions = observation.positions();
        self.observation = observation;
        self.predicted = self.object.points();
        self.frame_count += 1;
        self.iteration = 0;
        self.state = TrackingState::Refining;
    }

    /// Run exactly one E-step + M-step + physics step.
    pub fn do_iteration(&mut self) -> Result<IterationResult, TrackingError> {
        let t_start = Instant::now();
        let n = self.object.num_points();

        let before = self.object.points();
        let estimated = EstimatedPointSet::new(before.clone(), self.stdev.clone());

        let mut visibility = self.visibility.visible(&before);
        if visibility.len() != n {
            warn!(
                "Visibility oracle returned {} flags for {} points, assuming all visible",
                visibility.len(),
                n
            );
            visibility = vec![true; n];
        }

        // --- E-step ---
        let t_e = Instant::now();
        let observed = &self.observed_positions;
        let weights = if observed.is_empty() {
            CorrespondenceWeights::empty(n)
        } else {
            CorrespondenceWeights::compute(&estimated, &visibility, observed, &self.config.noise)
        };
        self.stdev = weights.update_stdev(&estimated, observed, &self.config.noise);
        let e_step_ms = t_e.elapsed().as_secs_f64() * 1000.0;

        // --- M-step ---
        let t_m = Instant::now();
        let (corrections, n_low_evidence) =
            self.compute_corrections(&estimated.positions, &visibility, &weights);
        self.object.apply_correction(&corrections)?;
        let m_step_ms = t_m.elapsed().as_secs_f64() * 1000.0;

        // --- Physics ---
        let t_p = Instant::now();
        self.object.step_physics(self.config.physics_dt);
        let physics_ms = t_p.elapsed().as_secs_f64() * 1000.0;

        let after = self.object.points();
        let mean_displacement = before
            .iter()
            .zip(&after)
            .map(|(a, b)| (b - a).norm())
            .sum::<f64>()
            / n as f64;

        self.iteration += 1;
        self.update_state(mean_displacement);

        let metrics = self.metrics(&visibility, &weights, n_low_evidence);
        debug!(
            "Frame {} iter {}: observed={} visible={} outliers={} low_evidence={} disp={:.6}",
            self.frame_count,
            self.iteration,
            metrics.n_observed,
            metrics.n_visible,
            metrics.n_outliers,
            metrics.n_low_evidence,
            mean_displacement
        );

        let snapshot = IterationDiagnostics {
            frame: self.frame_count,
            iteration: self.iteration,
            estimated,
            observed: self.observed_positions.clone(),
            visibility,
            weights,
            corrections,
        };
        if let Some(publisher) = self.publisher.as_mut() {
            publisher.publish(snapshot.clone());
        }
        self.last_diagnostics = Some(snapshot);

        Ok(IterationResult {
            state: self.state,
            iteration: self.iteration,
            mean_displacement,
            metrics,
            timing: TimingStats {
                total_ms: t_start.elapsed().as_secs_f64() * 1000.0,
                e_step_ms,
                m_step_ms,
                physics_ms,
            },
        })
    }

    /// Iterate on the current observation until convergence or the cap.
    pub fn run_until_converged(&mut self) -> Result<IterationResult, TrackingError> {
        loop {
            let result = self.do_iteration()?;
            if result.state.is_terminal() {
                return Ok(result);
            }
        }
    }

    /// `update_input` followed by `run_until_converged`.
    pub fn track_frame(
        &mut self,
        observation: ObservedPointSet,
    ) -> Result<IterationResult, TrackingError> {
        self.update_input(observation);
        self.run_until_converged()
    }

    /// Live estimate: positions read from the simulation plus current stdev.
    pub fn estimated_points(&self) -> EstimatedPointSet {
        EstimatedPointSet::new(self.object.points(), self.stdev.clone())
    }

    pub fn object(&self) -> &TrackedObject {
        &self.object
    }

    /// Mutable access for the owning control loop (e.g. grasp attachment)
    /// between iterations.
    pub fn object_mut(&mut self) -> &mut TrackedObject {
        &mut self.object
    }

    pub fn visibility(&self) -> &V {
        &self.visibility
    }

    pub fn visibility_mut(&mut self) -> &mut V {
        &mut self.visibility
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn observation(&self) -> &ObservedPointSet {
        &self.observation
    }

    pub fn last_diagnostics(&self) -> Option<&IterationDiagnostics> {
        self.last_diagnostics.as_ref()
    }

    /// Reset every stdev to the prior scale.
    pub fn reset_stdev(&mut self) {
        self.stdev = vec![self.config.noise.prior_distance; self.object.num_points()];
    }

    /// Offsets for every point, plus the number of visible points that
    /// lacked evidence.
    fn compute_corrections(
        &self,
        estimated: &[Vector3<f64>],
        visibility: &[bool],
        weights: &CorrespondenceWeights,
    ) -> (Vec<Vector3<f64>>, usize) {
        let n = estimated.len();
        if !self.config.apply_evidence || self.observed_positions.is_empty() {
            return (vec![Vector3::zeros(); n], 0);
        }

        let targets =
            weights.weighted_targets(&self.observed_positions, self.config.min_total_responsibility);
        let rest = self.object.rest_points();
        let gain = self.config.correction_gain;
        let prior_count = self.config.prediction_prior_count;

        let mut n_low_evidence = 0;
        let corrections: Vec<Vector3<f64>> = (0..n)
            .map(|i| {
                if !visibility[i] {
                    return Vector3::zeros();
                }
                match targets[i] {
                    Some(target) => {
                        let evidence = weights.total_responsibility(i);
                        let blended = (self.predicted[i] * prior_count + target * evidence)
                            / (prior_count + evidence);
                        (blended - estimated[i]) * gain
                    }
                    None => {
                        n_low_evidence += 1;
                        match self.config.low_evidence {
                            LowEvidencePolicy::HoldPosition => Vector3::zeros(),
                            LowEvidencePolicy::DecayToRest { rate } => {
                                (rest[i] - estimated[i]) * rate
                            }
                        }
                    }
                }
            })
            .collect();
        (corrections, n_low_evidence)
    }

    fn update_state(&mut self, mean_displacement: f64) {
        if mean_displacement < self.config.convergence_epsilon {
            debug!(
                "Frame {} converged after {} iterations",
                self.frame_count, self.iteration
            );
            self.state = TrackingState::Converged;
        } else if self.iteration >= self.config.max_iterations {
            info!(
                "Frame {} hit the iteration cap ({}), mean displacement {:.6}",
                self.frame_count, self.config.max_iterations, mean_displacement
            );
            self.state = TrackingState::IterationCapReached;
        } else {
            self.state = TrackingState::Refining;
        }
    }

    fn metrics(
        &self,
        visibility: &[bool],
        weights: &CorrespondenceWeights,
        n_low_evidence: usize,
    ) -> CorrespondenceMetrics {
        let m = weights.num_observed();
        let mean_outlier_weight = if m > 0 {
            weights.outlier.sum() / m as f64
        } else {
            0.0
        };
        CorrespondenceMetrics {
            n_observed: m,
            n_visible: visibility.iter().filter(|&&v| v).count(),
            n_outliers: weights.outlier.iter().filter(|&&w| w > 0.5).count(),
            mean_outlier_weight,
            n_low_evidence,
            mean_stdev: self.stdev.iter().sum::<f64>() / self.stdev.len().max(1) as f64,
        }
    }
}
