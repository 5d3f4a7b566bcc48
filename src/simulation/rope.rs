//! Rope simulated as a chain of capsule nodes.

use std::f64::consts::PI;

use nalgebra::Vector3;

use crate::config::PhysicsConfig;

use super::particle::{DistanceConstraint, Particle, ParticleSystem};

/// A rope: one particle per node, stretch constraints between neighbours and
/// weak bending constraints between every other node.
#[derive(Debug, Clone)]
pub struct CapsuleRope {
    system: ParticleSystem,
    radius: f64,
}

impl CapsuleRope {
    /// Build a rope through `nodes` with the given capsule radius.
    ///
    /// Each node carries the mass of half of each adjacent segment, computed
    /// from the capsule volume and `density`.
    pub fn new(nodes: &[Vector3<f64>], radius: f64, density: f64, physics: PhysicsConfig) -> Self {
        let n = nodes.len();
        let cross_section = PI * radius * radius;

        let mut masses = vec![0.0; n];
        for i in 0..n.saturating_sub(1) {
            let segment_mass = density * cross_section * (nodes[i + 1] - nodes[i]).norm();
            masses[i] += 0.5 * segment_mass;
            masses[i + 1] += 0.5 * segment_mass;
        }

        let particles: Vec<Particle> = nodes
            .iter()
            .zip(&masses)
            .map(|(x, &m)| Particle::new(*x, m.max(f64::MIN_POSITIVE)))
            .collect();

        let mut constraints = Vec::with_capacity(2 * n);
        for i in 0..n.saturating_sub(1) {
            constraints.push(DistanceConstraint::between(&particles, i, i + 1, 1.0));
        }
        if physics.bend_stiffness > 0.0 {
            for i in 0..n.saturating_sub(2) {
                constraints.push(DistanceConstraint::between(
                    &particles,
                    i,
                    i + 2,
                    physics.bend_stiffness,
                ));
            }
        }

        Self {
            system: ParticleSystem::new(particles, constraints, radius, physics),
            radius,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.system.len()
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Live node positions.
    pub fn nodes(&self) -> Vec<Vector3<f64>> {
        self.system.positions()
    }

    pub fn total_mass(&self) -> f64 {
        self.system.total_mass()
    }

    /// Sum of segment lengths at the current configuration.
    pub fn length(&self) -> f64 {
        self.system
            .particles
            .windows(2)
            .map(|w| (w[1].x - w[0].x).norm())
            .sum()
    }

    /// Pin (`true`) or release a node, e.g. when a gripper holds it.
    pub fn set_pinned(&mut self, node: usize, pinned: bool, mass: f64) {
        if let Some(p) = self.system.particles.get_mut(node) {
            p.inv_mass = if pinned || mass <= 0.0 { 0.0 } else { 1.0 / mass };
            if pinned {
                p.v = Vector3::zeros();
            }
        }
    }

    pub fn displace(&mut self, offsets: &[Vector3<f64>]) {
        self.system.displace(offsets);
    }

    pub fn step(&mut self, dt: f64) {
        self.system.step(dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn straight_nodes(n: usize, spacing: f64, height: f64) -> Vec<Vector3<f64>> {
        (0..n)
            .map(|i| Vector3::new(i as f64 * spacing, 0.0, height))
            .collect()
    }

    #[test]
    fn test_mass_from_capsule_volume() {
        let rope = CapsuleRope::new(
            &straight_nodes(11, 0.1, 0.5),
            0.01,
            1000.0,
            PhysicsConfig::default(),
        );
        let expected = 1000.0 * PI * 0.01 * 0.01 * 1.0;
        assert_relative_eq!(rope.total_mass(), expected, epsilon = 1e-9);
        assert_eq!(rope.num_nodes(), 11);
    }

    #[test]
    fn test_rope_settles_on_ground() {
        let mut rope = CapsuleRope::new(
            &straight_nodes(10, 0.1, 0.3),
            0.01,
            1000.0,
            PhysicsConfig::default(),
        );
        for _ in 0..400 {
            rope.step(0.03);
        }
        for node in rope.nodes() {
            assert_relative_eq!(node.z, 0.01, epsilon = 1e-6);
        }
        assert_relative_eq!(rope.length(), 0.9, epsilon = 1e-3);
    }

    #[test]
    fn test_pulling_one_node_drags_neighbour() {
        let mut rope = CapsuleRope::new(
            &straight_nodes(5, 0.1, 0.0),
            0.01,
            1000.0,
            PhysicsConfig::weightless(),
        );
        let before = rope.nodes();

        let mut offsets = vec![Vector3::zeros(); 5];
        offsets[4] = Vector3::new(0.05, 0.0, 0.0);
        rope.displace(&offsets);
        rope.step(0.03);

        let after = rope.nodes();
        assert!(after[3].x > before[3].x);
    }

    #[test]
    fn test_pinned_node_holds() {
        let mut rope = CapsuleRope::new(
            &straight_nodes(5, 0.1, 1.0),
            0.01,
            1000.0,
            PhysicsConfig {
                ground_height: None,
                ..PhysicsConfig::default()
            },
        );
        rope.set_pinned(0, true, 0.0);
        for _ in 0..20 {
            rope.step(0.03);
        }
        let nodes = rope.nodes();
        assert_eq!(nodes[0], Vector3::new(0.0, 0.0, 1.0));
        assert!(nodes[4].z < 1.0);
    }
}
