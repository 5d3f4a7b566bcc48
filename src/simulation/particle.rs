//! Position-based particle solver shared by the rope and the cloth.
//!
//! Each sub-step integrates gravity into velocity, predicts positions,
//! projects distance constraints (Gauss-Seidel), resolves ground contact and
//! recovers velocity from the positional change.

use nalgebra::Vector3;

use crate::config::PhysicsConfig;

/// A simulated point mass.
#[derive(Debug, Clone)]
pub struct Particle {
    /// Position in world frame (m).
    pub x: Vector3<f64>,
    /// Velocity (m/s).
    pub v: Vector3<f64>,
    /// Inverse mass (1/kg). Zero pins the particle in place.
    pub inv_mass: f64,
}

impl Particle {
    pub fn new(x: Vector3<f64>, mass: f64) -> Self {
        Self {
            x,
            v: Vector3::zeros(),
            inv_mass: if mass > 0.0 { 1.0 / mass } else { 0.0 },
        }
    }

    pub fn mass(&self) -> f64 {
        if self.inv_mass > 0.0 {
            1.0 / self.inv_mass
        } else {
            f64::INFINITY
        }
    }
}

/// Keeps two particles at a rest distance.
#[derive(Debug, Clone)]
pub struct DistanceConstraint {
    pub a: usize,
    pub b: usize,
    pub rest_length: f64,
    /// Fraction of the violation removed per projection, in [0, 1].
    pub stiffness: f64,
}

impl DistanceConstraint {
    /// Constraint at the current distance between `a` and `b`.
    pub fn between(particles: &[Particle], a: usize, b: usize, stiffness: f64) -> Self {
        Self {
            a,
            b,
            rest_length: (particles[b].x - particles[a].x).norm(),
            stiffness,
        }
    }
}

/// Particles plus the constraints that hold them together.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    pub particles: Vec<Particle>,
    pub constraints: Vec<DistanceConstraint>,
    /// Collision radius of each particle against the ground plane (m).
    pub collision_radius: f64,
    physics: PhysicsConfig,
}

impl ParticleSystem {
    pub fn new(
        particles: Vec<Particle>,
        constraints: Vec<DistanceConstraint>,
        collision_radius: f64,
        physics: PhysicsConfig,
    ) -> Self {
        Self {
            particles,
            constraints,
            collision_radius,
            physics,
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn positions(&self) -> Vec<Vector3<f64>> {
        self.particles.iter().map(|p| p.x).collect()
    }

    pub fn total_mass(&self) -> f64 {
        self.particles
            .iter()
            .filter(|p| p.inv_mass > 0.0)
            .map(Particle::mass)
            .sum()
    }

    pub fn physics(&self) -> &PhysicsConfig {
        &self.physics
    }

    /// Move particles directly by `offsets` without touching their velocity.
    ///
    /// Pinned particles ignore their offset. Callers guarantee the length.
    pub fn displace(&mut self, offsets: &[Vector3<f64>]) {
        for (p, offset) in self.particles.iter_mut().zip(offsets) {
            if p.inv_mass > 0.0 {
                p.x += offset;
            }
        }
    }

    /// Advance by `dt`, split into at most `max_substeps` sub-steps.
    pub fn step(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let n = substep_count(dt, &self.physics);
        let h = dt / n as f64;
        for _ in 0..n {
            self.substep(h);
        }
    }

    fn substep(&mut self, h: f64) {
        let gravity = self.physics.gravity_vector();
        let retain = 1.0 - self.physics.velocity_damping;

        let mut predicted: Vec<Vector3<f64>> = Vec::with_capacity(self.particles.len());
        for p in self.particles.iter_mut() {
            if p.inv_mass > 0.0 {
                p.v = (p.v + gravity * h) * retain;
                predicted.push(p.x + p.v * h);
            } else {
                predicted.push(p.x);
            }
        }

        for _ in 0..self.physics.solver_iterations {
            for c in &self.constraints {
                project_distance(&self.particles, &mut predicted, c);
            }
            self.project_ground(&mut predicted);
        }

        for (p, q) in self.particles.iter_mut().zip(predicted) {
            if p.inv_mass > 0.0 {
                p.v = (q - p.x) / h;
                p.x = q;
            }
        }
    }

    fn project_ground(&self, predicted: &mut [Vector3<f64>]) {
        let Some(ground) = self.physics.ground_height else {
            return;
        };
        let floor = ground + self.collision_radius;
        for (p, q) in self.particles.iter().zip(predicted.iter_mut()) {
            if p.inv_mass > 0.0 && q.z < floor {
                q.z = floor;
            }
        }
    }
}

/// Number of sub-steps for a step of `dt`, following the fixed-timestep rule.
pub(crate) fn substep_count(dt: f64, physics: &PhysicsConfig) -> usize {
    let wanted = (dt / physics.fixed_timestep).ceil() as usize;
    wanted.clamp(1, physics.max_substeps.max(1))
}

fn project_distance(particles: &[Particle], predicted: &mut [Vector3<f64>], c: &DistanceConstraint) {
    let wa = particles[c.a].inv_mass;
    let wb = particles[c.b].inv_mass;
    let w = wa + wb;
    if w <= 0.0 {
        return;
    }

    let d = predicted[c.b] - predicted[c.a];
    let len = d.norm();
    if len < 1e-12 {
        return;
    }

    // Move both ends along the segment, split by inverse mass
    let correction = d * ((len - c.rest_length) / len * c.stiffness / w);
    predicted[c.a] += correction * wa;
    predicted[c.b] -= correction * wb;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pair(physics: PhysicsConfig) -> ParticleSystem {
        let particles = vec![
            Particle::new(Vector3::new(0.0, 0.0, 1.0), 1.0),
            Particle::new(Vector3::new(0.5, 0.0, 1.0), 1.0),
        ];
        let constraint = DistanceConstraint::between(&particles, 0, 1, 1.0);
        ParticleSystem::new(particles, vec![constraint], 0.01, physics)
    }

    #[test]
    fn test_free_fall_moves_down() {
        let mut system = pair(PhysicsConfig {
            ground_height: None,
            ..PhysicsConfig::default()
        });
        system.step(0.03);

        assert!(system.particles[0].x.z < 1.0);
        assert!(system.particles[0].v.z < 0.0);
    }

    #[test]
    fn test_ground_supports_particles() {
        let mut system = pair(PhysicsConfig::default());
        for _ in 0..300 {
            system.step(0.03);
        }
        for p in &system.particles {
            assert_relative_eq!(p.x.z, 0.01, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_constraint_restores_rest_length() {
        let mut system = pair(PhysicsConfig::weightless());
        system.displace(&[Vector3::zeros(), Vector3::new(0.2, 0.0, 0.0)]);
        system.step(0.03);

        let len = (system.particles[1].x - system.particles[0].x).norm();
        assert_relative_eq!(len, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_displace_keeps_velocity() {
        let mut system = pair(PhysicsConfig::weightless());
        system.displace(&[Vector3::new(0.0, 0.1, 0.0), Vector3::new(0.0, 0.1, 0.0)]);

        assert_eq!(system.particles[0].v, Vector3::zeros());
        assert_relative_eq!(system.particles[1].x.y, 0.1);
    }

    #[test]
    fn test_pinned_particle_stays() {
        let mut system = pair(PhysicsConfig {
            ground_height: None,
            ..PhysicsConfig::default()
        });
        system.particles[0].inv_mass = 0.0;
        for _ in 0..10 {
            system.step(0.03);
        }
        assert_eq!(system.particles[0].x, Vector3::new(0.0, 0.0, 1.0));
        assert!(system.particles[1].x.z < 1.0);
    }

    #[test]
    fn test_substep_count() {
        let physics = PhysicsConfig::default();
        assert_eq!(substep_count(0.03, &physics), 2);
        assert_eq!(substep_count(0.01, &physics), 1);
        assert_eq!(substep_count(1.0, &physics), 2);

        let no_cap = PhysicsConfig {
            max_substeps: 0,
            ..PhysicsConfig::default()
        };
        assert_eq!(substep_count(0.03, &no_cap), 1);
    }
}
