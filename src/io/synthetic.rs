//! Synthetic observer: noisy, occlusion-aware samples of known points.

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::error::TrackingError;
use crate::tracking::ObservedPointSet;

/// Generates observations from ground-truth points. Reproducible for a
/// given seed.
#[derive(Debug, Clone)]
pub struct SyntheticObserver {
    rng: StdRng,
    noise: Normal<f64>,
    samples_per_point: usize,
    outliers_per_frame: usize,
    outlier_min: Vector3<f64>,
    outlier_max: Vector3<f64>,
}

impl SyntheticObserver {
    pub fn new(seed: u64, noise_stdev: f64, samples_per_point: usize) -> Result<Self, TrackingError> {
        let noise = Normal::new(0.0, noise_stdev).map_err(|e| {
            TrackingError::configuration(format!("invalid noise stdev {}: {}", noise_stdev, e))
        })?;
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            noise,
            samples_per_point,
            outliers_per_frame: 0,
            outlier_min: Vector3::zeros(),
            outlier_max: Vector3::zeros(),
        })
    }

    /// Add `count` uniform outliers inside the box `[min, max]` to every frame.
    pub fn with_outliers(mut self, count: usize, min: Vector3<f64>, max: Vector3<f64>) -> Self {
        self.outliers_per_frame = count;
        self.outlier_min = min;
        self.outlier_max = max;
        self
    }

    /// Sample a frame. Points flagged `false` in `visible` produce no samples;
    /// an empty `visible` means every point is seen.
    pub fn observe(
        &mut self,
        truth: &[Vector3<f64>],
        visible: &[bool],
    ) -> Result<ObservedPointSet, TrackingError> {
        let mut samples = Vec::with_capacity(truth.len() * self.samples_per_point);
        for (i, p) in truth.iter().enumerate() {
            if !visible.is_empty() && !visible.get(i).copied().unwrap_or(false) {
                continue;
            }
            for _ in 0..self.samples_per_point {
                let jitter = Vector3::new(
                    self.noise.sample(&mut self.rng),
                    self.noise.sample(&mut self.rng),
                    self.noise.sample(&mut self.rng),
                );
                samples.push(p + jitter);
            }
        }
        for _ in 0..self.outliers_per_frame {
            let mut q = Vector3::zeros();
            for k in 0..3 {
                let (lo, hi) = (self.outlier_min[k], self.outlier_max[k]);
                q[k] = if hi > lo { self.rng.gen_range(lo..hi) } else { lo };
            }
            samples.push(q);
        }
        ObservedPointSet::from_positions(&samples)
    }
}
