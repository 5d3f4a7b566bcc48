//! Rectangular cloth (towel) simulated as a particle grid.

use nalgebra::Vector3;

use crate::config::PhysicsConfig;

use super::particle::{DistanceConstraint, Particle, ParticleSystem};

/// A cloth sheet spanned by four corners and discretized into a regular grid.
///
/// Node `(ix, iy)` is stored at index `iy * resolution_x + ix`. Corners are
/// ordered so that `corners[0] → corners[1]` runs along x and
/// `corners[0] → corners[3]` runs along y.
#[derive(Debug, Clone)]
pub struct ClothSheet {
    system: ParticleSystem,
    resolution_x: usize,
    resolution_y: usize,
}

impl ClothSheet {
    /// Build a sheet of total `mass` over a bilinear patch through `corners`.
    pub fn new(
        corners: &[Vector3<f64>; 4],
        resolution_x: usize,
        resolution_y: usize,
        mass: f64,
        margin: f64,
        physics: PhysicsConfig,
    ) -> Self {
        let rx = resolution_x.max(2);
        let ry = resolution_y.max(2);
        let node_mass = mass / (rx * ry) as f64;

        let mut particles = Vec::with_capacity(rx * ry);
        for iy in 0..ry {
            let t = iy as f64 / (ry - 1) as f64;
            for ix in 0..rx {
                let s = ix as f64 / (rx - 1) as f64;
                let x = corners[0] * (1.0 - s) * (1.0 - t)
                    + corners[1] * s * (1.0 - t)
                    + corners[2] * s * t
                    + corners[3] * (1.0 - s) * t;
                particles.push(Particle::new(x, node_mass));
            }
        }

        let idx = |ix: usize, iy: usize| iy * rx + ix;
        let mut constraints = Vec::new();
        let mut link = |a: usize, b: usize, stiffness: f64| {
            constraints.push(DistanceConstraint::between(&particles, a, b, stiffness));
        };
        let shear = physics.shear_stiffness;
        let bend = physics.bend_stiffness;
        for iy in 0..ry {
            for ix in 0..rx {
                // Structural
                if ix + 1 < rx {
                    link(idx(ix, iy), idx(ix + 1, iy), 1.0);
                }
                if iy + 1 < ry {
                    link(idx(ix, iy), idx(ix, iy + 1), 1.0);
                }
                // Shear
                if shear > 0.0 && ix + 1 < rx && iy + 1 < ry {
                    link(idx(ix, iy), idx(ix + 1, iy + 1), shear);
                    link(idx(ix + 1, iy), idx(ix, iy + 1), shear);
                }
                // Bending
                if bend > 0.0 && ix + 2 < rx {
                    link(idx(ix, iy), idx(ix + 2, iy), bend);
                }
                if bend > 0.0 && iy + 2 < ry {
                    link(idx(ix, iy), idx(ix, iy + 2), bend);
                }
            }
        }

        Self {
            system: ParticleSystem::new(particles, constraints, margin, physics),
            resolution_x: rx,
            resolution_y: ry,
        }
    }

    pub fn resolution(&self) -> (usize, usize) {
        (self.resolution_x, self.resolution_y)
    }

    pub fn num_nodes(&self) -> usize {
        self.system.len()
    }

    /// Live node positions, row-major.
    pub fn nodes(&self) -> Vec<Vector3<f64>> {
        self.system.positions()
    }

    pub fn node(&self, ix: usize, iy: usize) -> Option<Vector3<f64>> {
        if ix >= self.resolution_x || iy >= self.resolution_y {
            return None;
        }
        Some(self.system.particles[iy * self.resolution_x + ix].x)
    }

    pub fn total_mass(&self) -> f64 {
        self.system.total_mass()
    }

    pub fn displace(&mut self, offsets: &[Vector3<f64>]) {
        self.system.displace(offsets);
    }

    pub fn step(&mut self, dt: f64) {
        self.system.step(dt);
    }
}
