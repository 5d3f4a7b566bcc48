//! Rigid box body with a sampled surface lattice.

use nalgebra::{UnitQuaternion, Vector3};

use crate::config::PhysicsConfig;
use crate::geometry::{fit_rigid_transform, SE3};

use super::particle::substep_count;

/// A rigid cuboid. Its representative points are a lattice on the surface,
/// expressed in the body frame and carried by `pose`.
#[derive(Debug, Clone)]
pub struct BoxBody {
    /// Body to world transform.
    pose: SE3,
    linear_velocity: Vector3<f64>,
    angular_velocity: Vector3<f64>,
    mass: f64,
    half_extents: Vector3<f64>,
    local_points: Vec<Vector3<f64>>,
    physics: PhysicsConfig,
}

impl BoxBody {
    pub fn new(
        mass: f64,
        half_extents: Vector3<f64>,
        pose: SE3,
        samples_per_edge: usize,
        physics: PhysicsConfig,
    ) -> Self {
        Self {
            pose,
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            mass,
            half_extents,
            local_points: surface_lattice(&half_extents, samples_per_edge),
            physics,
        }
    }

    pub fn pose(&self) -> &SE3 {
        &self.pose
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn half_extents(&self) -> Vector3<f64> {
        self.half_extents
    }

    pub fn num_points(&self) -> usize {
        self.local_points.len()
    }

    pub fn linear_velocity(&self) -> Vector3<f64> {
        self.linear_velocity
    }

    pub fn angular_velocity(&self) -> Vector3<f64> {
        self.angular_velocity
    }

    pub fn set_velocity(&mut self, linear: Vector3<f64>, angular: Vector3<f64>) {
        self.linear_velocity = linear;
        self.angular_velocity = angular;
    }

    /// Surface lattice points in world frame.
    pub fn sample_points(&self) -> Vec<Vector3<f64>> {
        self.pose.transform_points(&self.local_points)
    }

    /// The eight corners in world frame.
    pub fn corners(&self) -> Vec<Vector3<f64>> {
        let h = self.half_extents;
        let mut corners = Vec::with_capacity(8);
        for sx in [-1.0, 1.0] {
            for sy in [-1.0, 1.0] {
                for sz in [-1.0, 1.0] {
                    let local = Vector3::new(sx * h.x, sy * h.y, sz * h.z);
                    corners.push(self.pose.transform_point(&local));
                }
            }
        }
        corners
    }

    /// Move the box so its points best match `points + offsets` in the
    /// least-squares sense. Velocities are left untouched.
    pub fn displace(&mut self, offsets: &[Vector3<f64>]) {
        if offsets.iter().all(|o| o.norm_squared() == 0.0) {
            return;
        }
        let current = self.sample_points();
        let target: Vec<Vector3<f64>> = current.iter().zip(offsets).map(|(p, o)| p + o).collect();
        if let Some(delta) = fit_rigid_transform(&current, &target) {
            self.pose = delta.compose(&self.pose);
        }
    }

    /// Advance by `dt` with gravity, damping and ground contact.
    pub fn step(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let n = substep_count(dt, &self.physics);
        let h = dt / n as f64;
        let gravity = self.physics.gravity_vector();
        let retain = 1.0 - self.physics.velocity_damping;

        for _ in 0..n {
            self.linear_velocity = (self.linear_velocity + gravity * h) * retain;
            self.angular_velocity *= retain;

            self.pose.translation += self.linear_velocity * h;
            let spin = UnitQuaternion::from_scaled_axis(self.angular_velocity * h);
            self.pose.rotation = spin * self.pose.rotation;

            self.resolve_ground();
        }
    }

    fn resolve_ground(&mut self) {
        let Some(ground) = self.physics.ground_height else {
            return;
        };
        let lowest = self
            .corners()
            .iter()
            .map(|c| c.z)
            .fold(f64::INFINITY, f64::min);
        if lowest < ground {
            self.pose.translation.z += ground - lowest;
            if self.linear_velocity.z < 0.0 {
                self.linear_velocity.z = 0.0;
            }
        }
    }
}

/// Points of an `n`×`n`×`n` grid over the box that lie on its surface.
fn surface_lattice(half_extents: &Vector3<f64>, samples_per_edge: usize) -> Vec<Vector3<f64>> {
    let n = samples_per_edge.max(2);
    let coord = |i: usize, h: f64| -h + 2.0 * h * i as f64 / (n - 1) as f64;
    let on_face = |i: usize| i == 0 || i == n - 1;

    let mut points = Vec::new();
    for ix in 0..n {
        for iy in 0..n {
            for iz in 0..n {
                if on_face(ix) || on_face(iy) || on_face(iz) {
                    points.push(Vector3::new(
                        coord(ix, half_extents.x),
                        coord(iy, half_extents.y),
                        coord(iz, half_extents.z),
                    ));
                }
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box(physics: PhysicsConfig) -> BoxBody {
        BoxBody::new(
            1.0,
            Vector3::new(0.1, 0.05, 0.02),
            SE3::from_translation(Vector3::new(0.0, 0.0, 0.5)),
            3,
            physics,
        )
    }

    #[test]
    fn test_surface_lattice_counts() {
        let h = Vector3::new(1.0, 1.0, 1.0);
        assert_eq!(surface_lattice(&h, 2).len(), 8);
        assert_eq!(surface_lattice(&h, 3).len(), 26);
        assert_eq!(surface_lattice(&h, 4).len(), 56);
    }

    #[test]
    fn test_points_follow_pose() {
        let body = BoxBody::new(
            1.0,
            Vector3::new(0.1, 0.1, 0.1),
            SE3::from_yaw(std::f64::consts::FRAC_PI_2, Vector3::new(1.0, 0.0, 0.0)),
            2,
            PhysicsConfig::weightless(),
        );
        let points = body.sample_points();
        let centroid: Vector3<f64> = points.iter().sum::<Vector3<f64>>() / points.len() as f64;
        assert_relative_eq!(centroid, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_falls_and_rests_on_ground() {
        let mut body = unit_box(PhysicsConfig::default());
        for _ in 0..300 {
            body.step(0.03);
        }
        let lowest = body
            .corners()
            .iter()
            .map(|c| c.z)
            .fold(f64::INFINITY, f64::min);
        assert_relative_eq!(lowest, 0.0, epsilon = 1e-9);
        assert_relative_eq!(body.pose().translation.z, 0.02, epsilon = 1e-9);
    }

    #[test]
    fn test_displace_translation_keeps_velocity() {
        let mut body = unit_box(PhysicsConfig::weightless());
        body.set_velocity(Vector3::new(0.1, 0.0, 0.0), Vector3::zeros());
        let before = body.sample_points();
        let offset = Vector3::new(0.0, 0.02, 0.0);
        body.displace(&vec![offset; body.num_points()]);

        for (a, b) in before.iter().zip(body.sample_points()) {
            assert_relative_eq!(b - a, offset, epsilon = 1e-9);
        }
        assert_relative_eq!(body.linear_velocity(), Vector3::new(0.1, 0.0, 0.0));
    }

    #[test]
    fn test_displace_recovers_rotation() {
        let mut body = unit_box(PhysicsConfig::weightless());
        let rotated = SE3::from_yaw(0.1, Vector3::zeros());
        let center = body.pose().translation;
        let offsets: Vec<Vector3<f64>> = body
            .sample_points()
            .iter()
            .map(|p| rotated.transform_point(&(p - center)) + center - p)
            .collect();
        body.displace(&offsets);

        let angle = body.pose().rotation.angle();
        assert_relative_eq!(angle, 0.1, epsilon = 1e-9);
        assert_relative_eq!(body.pose().translation, center, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_offsets_leave_pose() {
        let mut body = unit_box(PhysicsConfig::weightless());
        let pose = body.pose().clone();
        body.displace(&vec![Vector3::zeros(); body.num_points()]);
        assert_eq!(body.pose(), &pose);
    }
}
