//! Configuration for the tracker, the simulated bodies, and the object factory.
//!
//! All values are plain data passed in at construction time. Every struct
//! uses `#[serde(default)]` so a YAML file only needs the keys it overrides:
//!
//! ```yaml
//! tracker:
//!   correction_gain: 0.5
//!   noise:
//!     prior_distance: 0.02
//! physics:
//!   gravity: [0.0, 0.0, -9.81]
//!   ground_height: 0.0
//! ```

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::TrackingError;

/// Per-point noise model used by the correspondence step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseModel {
    /// Prior distance scale (m). Initial per-point stdev, and the stdev the
    /// estimate relaxes to when a point has no evidence.
    pub prior_distance: f64,
    /// Distance (m) between an observed point and the fake node that
    /// explains outliers.
    pub outlier_distance: f64,
    /// Prior weight of the outlier explanation relative to one model point.
    pub outlier_prior: f64,
    /// Pseudo-count of the stdev prior when re-estimating per-point stdev.
    pub stdev_prior_count: f64,
}

impl Default for NoiseModel {
    fn default() -> Self {
        Self {
            prior_distance: 0.03,
            outlier_distance: 0.06,
            outlier_prior: 1.0,
            stdev_prior_count: 10.0,
        }
    }
}

/// What a visible point with negligible responsibility does.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum LowEvidencePolicy {
    /// Receive no correction; the point moves only under physics.
    HoldPosition,
    /// Pull toward the object's rest pose by `rate` of the remaining gap.
    DecayToRest {
        /// Fraction of the gap closed per iteration, in (0, 1].
        rate: f64,
    },
}

impl Default for LowEvidencePolicy {
    fn default() -> Self {
        Self::HoldPosition
    }
}

/// Parameters of the correspondence-and-correction loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Noise model for likelihoods and stdev estimation.
    pub noise: NoiseModel,
    /// Fraction of the target offset applied per iteration, in (0, 1].
    pub correction_gain: f64,
    /// Physics time advanced per iteration (s).
    pub physics_dt: f64,
    /// Mean point displacement (m) below which a frame is converged.
    pub convergence_epsilon: f64,
    /// Hard cap on iterations per observation frame.
    pub max_iterations: usize,
    /// Minimum total responsibility for a point to be corrected toward data.
    pub min_total_responsibility: f64,
    /// Pseudo-count of the physics prediction when forming M-step targets.
    /// A point's target is `(c·predicted + Σw·evidence) / (c + Σw)`, so sparse
    /// evidence is averaged over frames while dense evidence dominates.
    pub prediction_prior_count: f64,
    /// Behaviour of visible points without evidence.
    pub low_evidence: LowEvidencePolicy,
    /// When false the E-step still runs but no correction is applied.
    pub apply_evidence: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            noise: NoiseModel::default(),
            correction_gain: 0.3,
            physics_dt: 0.03,
            convergence_epsilon: 1e-4,
            max_iterations: 20,
            min_total_responsibility: 0.1,
            prediction_prior_count: 10.0,
            low_evidence: LowEvidencePolicy::HoldPosition,
            apply_evidence: true,
        }
    }
}

/// Parameters shared by every simulated body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity acceleration (m/s²).
    pub gravity: [f64; 3],
    /// Height of the support plane, if any.
    pub ground_height: Option<f64>,
    /// Fraction of velocity removed per sub-step, in [0, 1).
    pub velocity_damping: f64,
    /// Constraint projection sweeps per sub-step.
    pub solver_iterations: usize,
    /// Nominal sub-step length (s).
    pub fixed_timestep: f64,
    /// Upper bound on sub-steps per `step` call.
    pub max_substeps: usize,
    /// Stiffness of the skip-one bending constraints, in [0, 1].
    pub bend_stiffness: f64,
    /// Stiffness of cloth shear diagonals, in [0, 1].
    pub shear_stiffness: f64,
}

impl PhysicsConfig {
    pub fn gravity_vector(&self) -> Vector3<f64> {
        Vector3::new(self.gravity[0], self.gravity[1], self.gravity[2])
    }

    /// Same parameters without gravity or ground; useful for free-floating tests.
    pub fn weightless() -> Self {
        Self {
            gravity: [0.0, 0.0, 0.0],
            ground_height: None,
            ..Self::default()
        }
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, 0.0, -9.81],
            ground_height: Some(0.0),
            velocity_damping: 0.3,
            solver_iterations: 10,
            fixed_timestep: 0.015,
            max_substeps: 2,
            bend_stiffness: 0.1,
            shear_stiffness: 0.5,
        }
    }
}

/// Parameters used when turning an initialization description into a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Target spacing between towel nodes (m).
    pub node_distance: f64,
    /// Towel mass per area (kg/m²).
    pub surface_density: f64,
    /// Rope material density (kg/m³).
    pub rope_density: f64,
    /// Box mass (kg).
    pub box_mass: f64,
    /// Samples per box edge; the box exposes its surface lattice.
    pub box_samples_per_edge: usize,
    /// Collision half-thickness of cloth nodes (m).
    pub cloth_margin: f64,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            node_distance: 0.1,
            surface_density: 0.5,
            rope_density: 1000.0,
            box_mass: 1.0,
            box_samples_per_edge: 3,
            cloth_margin: 0.005,
        }
    }
}

/// Complete configuration of a tracking session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub tracker: TrackerConfig,
    pub physics: PhysicsConfig,
    pub factory: FactoryConfig,
}

impl TrackingConfig {
    /// Load a configuration from a YAML file. Missing keys keep their defaults.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let config: TrackingConfig = serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<(), TrackingError> {
        self.tracker.validate()?;
        self.physics.validate()?;
        self.factory.validate()
    }
}

fn require_positive(value: f64, name: &str) -> Result<(), TrackingError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TrackingError::configuration(format!(
            "{} must be positive and finite, got {}",
            name, value
        )))
    }
}

fn require_unit_interval(value: f64, name: &str) -> Result<(), TrackingError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TrackingError::configuration(format!(
            "{} must lie in [0, 1], got {}",
            name, value
        )))
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), TrackingError> {
        require_positive(self.noise.prior_distance, "noise.prior_distance")?;
        require_positive(self.noise.outlier_distance, "noise.outlier_distance")?;
        require_positive(self.noise.outlier_prior, "noise.outlier_prior")?;
        if !(self.noise.stdev_prior_count >= 0.0) {
            return Err(TrackingError::configuration(
                "noise.stdev_prior_count must be non-negative",
            ));
        }
        require_positive(self.correction_gain, "correction_gain")?;
        require_unit_interval(self.correction_gain, "correction_gain")?;
        require_positive(self.physics_dt, "physics_dt")?;
        require_positive(self.convergence_epsilon, "convergence_epsilon")?;
        if self.max_iterations == 0 {
            return Err(TrackingError::configuration("max_iterations must be at least 1"));
        }
        if !(self.min_total_responsibility >= 0.0) {
            return Err(TrackingError::configuration(
                "min_total_responsibility must be non-negative",
            ));
        }
        if !(self.prediction_prior_count.is_finite() && self.prediction_prior_count >= 0.0) {
            return Err(TrackingError::configuration(format!(
                "prediction_prior_count must be non-negative and finite, got {}",
                self.prediction_prior_count
            )));
        }
        if let LowEvidencePolicy::DecayToRest { rate } = self.low_evidence {
            require_positive(rate, "low_evidence.rate")?;
            require_unit_interval(rate, "low_evidence.rate")?;
        }
        Ok(())
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<(), TrackingError> {
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(TrackingError::configuration("gravity must be finite"));
        }
        if !(0.0..1.0).contains(&self.velocity_damping) {
            return Err(TrackingError::configuration(format!(
                "velocity_damping must lie in [0, 1), got {}",
                self.velocity_damping
            )));
        }
        require_positive(self.fixed_timestep, "fixed_timestep")?;
        if self.max_substeps == 0 {
            return Err(TrackingError::configuration("max_substeps must be at least 1"));
        }
        require_unit_interval(self.bend_stiffness, "bend_stiffness")?;
        require_unit_interval(self.shear_stiffness, "shear_stiffness")
    }
}

impl FactoryConfig {
    pub fn validate(&self) -> Result<(), TrackingError> {
        require_positive(self.node_distance, "node_distance")?;
        require_positive(self.surface_density, "surface_density")?;
        require_positive(self.rope_density, "rope_density")?;
        require_positive(self.box_mass, "box_mass")?;
        if self.box_samples_per_edge < 2 {
            return Err(TrackingError::configuration(
                "box_samples_per_edge must be at least 2",
            ));
        }
        if !(self.cloth_margin >= 0.0) {
            return Err(TrackingError::configuration("cloth_margin must be non-negative"));
        }
        Ok(())
    }
}
