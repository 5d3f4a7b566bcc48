//! Soft, occlusion-aware correspondence between model and observed points.
//!
//! Each observed point j distributes unit probability mass over the visible
//! model points and one outlier bucket. Likelihoods are isotropic Gaussians
//! evaluated in the log domain:
//!
//! ```text
//! log L_ij      = -d_ij² / (2 σ_i²) - 3 ln σ_i
//! log L_outlier = ln π_out - d_out² / (2 σ_p²) - 3 ln σ_p
//! ```
//!
//! where the outlier behaves like a fake model point at `outlier_distance`
//! with the prior scale σ_p.

use nalgebra::{DMatrix, DVector, Vector3};

use crate::config::NoiseModel;
use crate::tracking::EstimatedPointSet;

/// Responsibilities of model points (rows) for observed points (columns),
/// plus the outlier bucket's share of each observed point.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrespondenceWeights {
    /// N × M, zero rows for invisible model points.
    pub weights: DMatrix<f64>,
    /// Length M.
    pub outlier: DVector<f64>,
}

impl CorrespondenceWeights {
    /// No observed points: every model point gets zero responsibility.
    pub fn empty(num_model_points: usize) -> Self {
        Self {
            weights: DMatrix::zeros(num_model_points, 0),
            outlier: DVector::zeros(0),
        }
    }

    /// E-step.
    pub fn compute(
        estimated: &EstimatedPointSet,
        visible: &[bool],
        observed: &[Vector3<f64>],
        noise: &NoiseModel,
    ) -> Self {
        let n = estimated.len();
        let m = observed.len();
        let mut weights = DMatrix::zeros(n, m);
        let mut outlier = DVector::zeros(m);

        let prior = noise.prior_distance;
        let log_outlier = noise.outlier_prior.ln()
            - noise.outlier_distance.powi(2) / (2.0 * prior * prior)
            - 3.0 * prior.ln();

        let visible_idx: Vec<usize> = (0..n).filter(|&i| visible.get(i) == Some(&true)).collect();
        let mut log_l = vec![0.0; visible_idx.len()];

        for (j, obs) in observed.iter().enumerate() {
            let mut max_log = log_outlier;
            for (k, &i) in visible_idx.iter().enumerate() {
                let sigma = estimated.stdev[i];
                let d2 = (obs - estimated.positions[i]).norm_squared();
                log_l[k] = -d2 / (2.0 * sigma * sigma) - 3.0 * sigma.ln();
                max_log = max_log.max(log_l[k]);
            }

            if !max_log.is_finite() {
                // Nothing can explain the point (no visible points, no outlier mass)
                outlier[j] = 1.0;
                continue;
            }

            let outlier_term = (log_outlier - max_log).exp();
            let mut total = outlier_term;
            for value in log_l.iter_mut() {
                *value = (*value - max_log).exp();
                total += *value;
            }

            for (k, &i) in visible_idx.iter().enumerate() {
                weights[(i, j)] = log_l[k] / total;
            }
            outlier[j] = outlier_term / total;
        }

        Self { weights, outlier }
    }

    pub fn num_model_points(&self) -> usize {
        self.weights.nrows()
    }

    pub fn num_observed(&self) -> usize {
        self.weights.ncols()
    }

    /// Σ_j w_ij for model point i.
    pub fn total_responsibility(&self, i: usize) -> f64 {
        self.weights.row(i).sum()
    }

    /// Mass assigned to observed point j across model points and the outlier.
    pub fn observed_mass(&self, j: usize) -> f64 {
        self.weights.column(j).sum() + self.outlier[j]
    }

    /// M-step targets: the responsibility-weighted mean of the observation for
    /// each model point, or `None` when its total responsibility is below
    /// `min_total`.
    pub fn weighted_targets(
        &self,
        observed: &[Vector3<f64>],
        min_total: f64,
    ) -> Vec<Option<Vector3<f64>>> {
        (0..self.num_model_points())
            .map(|i| {
                let row = self.weights.row(i);
                let total = row.sum();
                if total < min_total || total <= 0.0 {
                    return None;
                }
                let sum: Vector3<f64> = row
                    .iter()
                    .zip(observed)
                    .map(|(&w, o)| o * w)
                    .sum();
                Some(sum / total)
            })
            .collect()
    }

    /// Re-estimate per-point standard deviations.
    ///
    /// `σ_i² = (c σ_p² + Σ_j w_ij d_ij² / 3) / (c + Σ_j w_ij)`, so points
    /// without evidence relax to the prior scale.
    pub fn update_stdev(
        &self,
        estimated: &EstimatedPointSet,
        observed: &[Vector3<f64>],
        noise: &NoiseModel,
    ) -> Vec<f64> {
        let c = noise.stdev_prior_count;
        let prior_var = noise.prior_distance * noise.prior_distance;

        estimated
            .positions
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let mut mass = 0.0;
                let mut spread = 0.0;
                for (j, o) in observed.iter().enumerate() {
                    let w = self.weights[(i, j)];
                    if w > 0.0 {
                        mass += w;
                        spread += w * (o - e).norm_squared() / 3.0;
                    }
                }
                let denom = c + mass;
                if denom <= 0.0 {
                    return noise.prior_distance;
                }
                ((c * prior_var + spread) / denom).sqrt()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(n: usize) -> EstimatedPointSet {
        let positions = (0..n).map(|i| Vector3::new(0.1 * i as f64, 0.0, 0.0)).collect();
        EstimatedPointSet::with_uniform_stdev(positions, 0.03)
    }

    #[test]
    fn test_observed_mass_sums_to_one() {
        let estimated = line(5);
        let observed = vec![
            Vector3::new(0.01, 0.0, 0.0),
            Vector3::new(0.15, 0.02, 0.0),
            Vector3::new(0.4, -0.01, 0.01),
            Vector3::new(3.0, 3.0, 3.0),
        ];
        let visible = vec![true, false, true, true, false];
        let w = CorrespondenceWeights::compute(&estimated, &visible, &observed, &NoiseModel::default());

        for j in 0..observed.len() {
            assert_relative_eq!(w.observed_mass(j), 1.0, epsilon = 1e-12);
        }
        assert!(w.weights.iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn test_invisible_points_get_no_responsibility() {
        let estimated = line(4);
        // Observation lies right on the hidden point
        let observed = vec![Vector3::new(0.1, 0.0, 0.0)];
        let visible = vec![true, false, true, true];
        let w = CorrespondenceWeights::compute(&estimated, &visible, &observed, &NoiseModel::default());

        assert_eq!(w.weights[(1, 0)], 0.0);
        assert_eq!(w.total_responsibility(1), 0.0);
    }

    #[test]
    fn test_far_point_goes_to_outlier() {
        let estimated = line(3);
        let observed = vec![Vector3::new(0.0, 0.0, 1.0)];
        let w = CorrespondenceWeights::compute(
            &estimated,
            &[true, true, true],
            &observed,
            &NoiseModel::default(),
        );
        assert!(w.outlier[0] > 0.999);
        assert!(w.outlier[0].is_finite());
    }

    #[test]
    fn test_no_visible_points_everything_outlier() {
        let estimated = line(3);
        let observed = vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.1, 0.0, 0.0)];
        let mut noise = NoiseModel::default();
        noise.outlier_prior = 0.0;
        let w = CorrespondenceWeights::compute(&estimated, &[false; 3], &observed, &noise);
        assert_eq!(w.outlier[0], 1.0);
        assert_eq!(w.outlier[1], 1.0);
        assert_eq!(w.weights.sum(), 0.0);
    }

    #[test]
    fn test_targets_follow_weighted_mean() {
        let estimated = line(2);
        let observed = vec![Vector3::new(0.0, 0.01, 0.0), Vector3::new(0.0, -0.01, 0.0)];
        let w = CorrespondenceWeights::compute(
            &estimated,
            &[true, true],
            &observed,
            &NoiseModel::default(),
        );
        let targets = w.weighted_targets(&observed, 0.1);

        // Both observations are symmetric around point 0
        let t0 = targets[0].unwrap();
        assert_relative_eq!(t0, Vector3::zeros(), epsilon = 1e-12);
        // Point 1 is too far to collect evidence
        assert!(targets[1].is_none());
    }

    #[test]
    fn test_stdev_relaxes_to_prior_without_evidence() {
        let estimated = EstimatedPointSet::with_uniform_stdev(vec![Vector3::zeros()], 0.5);
        let w = CorrespondenceWeights::empty(1);
        let stdev = w.update_stdev(&estimated, &[], &NoiseModel::default());
        assert_relative_eq!(stdev[0], 0.03, epsilon = 1e-12);
    }

    #[test]
    fn test_stdev_shrinks_with_tight_evidence() {
        let estimated = line(1);
        let observed = vec![Vector3::new(0.001, 0.0, 0.0); 50];
        let noise = NoiseModel::default();
        let w = CorrespondenceWeights::compute(&estimated, &[true], &observed, &noise);
        let stdev = w.update_stdev(&estimated, &observed, &noise);
        assert!(stdev[0] < noise.prior_distance);
    }
}
