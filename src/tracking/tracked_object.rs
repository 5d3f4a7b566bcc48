//! Tracked object variants: adapters between the tracker and a simulated body.
//!
//! Each variant exposes a fixed, ordered set of representative points read
//! live from its simulation, accepts one corrective offset per point, and
//! advances its simulation on request. The simulation is held behind a
//! shared handle so external holders can inspect it between iterations.

use nalgebra::Vector3;

use crate::error::TrackingError;
use crate::simulation::{BoxBody, CapsuleRope, ClothSheet, SimHandle, share};
use crate::tracking::ObjectType;

/// Rope variant: one point per capsule node, in order along the rope.
#[derive(Debug, Clone)]
pub struct TrackedRope {
    sim: SimHandle<CapsuleRope>,
    rest_points: Vec<Vector3<f64>>,
}

impl TrackedRope {
    pub fn new(rope: CapsuleRope) -> Self {
        let rest_points = rope.nodes();
        Self {
            sim: share(rope),
            rest_points,
        }
    }

    pub fn sim(&self) -> SimHandle<CapsuleRope> {
        self.sim.clone()
    }

    pub fn radius(&self) -> f64 {
        self.sim.read().radius()
    }
}

/// Towel variant: one point per cloth node, row-major over the grid.
#[derive(Debug, Clone)]
pub struct TrackedTowel {
    sim: SimHandle<ClothSheet>,
    rest_points: Vec<Vector3<f64>>,
}

impl TrackedTowel {
    pub fn new(cloth: ClothSheet) -> Self {
        let rest_points = cloth.nodes();
        Self {
            sim: share(cloth),
            rest_points,
        }
    }

    pub fn sim(&self) -> SimHandle<ClothSheet> {
        self.sim.clone()
    }

    /// Grid resolution (x, y).
    pub fn resolution(&self) -> (usize, usize) {
        self.sim.read().resolution()
    }
}

/// Box variant: the surface lattice of a rigid body. Corrections are applied
/// as the best rigid motion matching the requested offsets.
#[derive(Debug, Clone)]
pub struct TrackedBox {
    sim: SimHandle<BoxBody>,
    rest_points: Vec<Vector3<f64>>,
}

impl TrackedBox {
    pub fn new(body: BoxBody) -> Self {
        let rest_points = body.sample_points();
        Self {
            sim: share(body),
            rest_points,
        }
    }

    pub fn sim(&self) -> SimHandle<BoxBody> {
        self.sim.clone()
    }
}

/// Closed set of trackable objects.
#[derive(Debug, Clone)]
pub enum TrackedObject {
    Rope(TrackedRope),
    Towel(TrackedTowel),
    RigidBox(TrackedBox),
}

impl TrackedObject {
    pub fn object_type(&self) -> ObjectType {
        match self {
            TrackedObject::Rope(_) => ObjectType::Rope,
            TrackedObject::Towel(_) => ObjectType::Towel,
            TrackedObject::RigidBox(_) => ObjectType::Box,
        }
    }

    /// Number of representative points; fixed for the object's lifetime.
    pub fn num_points(&self) -> usize {
        self.rest_points().len()
    }

    /// Representative points read from the live simulation.
    pub fn points(&self) -> Vec<Vector3<f64>> {
        match self {
            TrackedObject::Rope(r) => r.sim.read().nodes(),
            TrackedObject::Towel(t) => t.sim.read().nodes(),
            TrackedObject::RigidBox(b) => b.sim.read().sample_points(),
        }
    }

    /// Points at construction time.
    pub fn rest_points(&self) -> &[Vector3<f64>] {
        match self {
            TrackedObject::Rope(r) => &r.rest_points,
            TrackedObject::Towel(t) => &t.rest_points,
            TrackedObject::RigidBox(b) => &b.rest_points,
        }
    }

    /// Move the simulation by one offset per representative point.
    ///
    /// Deformable bodies move their nodes directly; the box takes the rigid
    /// motion closest to the offsets. Velocities are not changed.
    pub fn apply_correction(&mut self, offsets: &[Vector3<f64>]) -> Result<(), TrackingError> {
        let expected = self.num_points();
        if offsets.len() != expected {
            return Err(TrackingError::DimensionMismatch {
                expected,
                actual: offsets.len(),
                context: "correction offsets".to_string(),
            });
        }
        match self {
            TrackedObject::Rope(r) => r.sim.write().displace(offsets),
            TrackedObject::Towel(t) => t.sim.write().displace(offsets),
            TrackedObject::RigidBox(b) => b.sim.write().displace(offsets),
        }
        Ok(())
    }

    /// Advance the owned simulation by `dt` seconds.
    pub fn step_physics(&mut self, dt: f64) {
        match self {
            TrackedObject::Rope(r) => r.sim.write().step(dt),
            TrackedObject::Towel(t) => t.sim.write().step(dt),
            TrackedObject::RigidBox(b) => b.sim.write().step(dt),
        }
    }

    /// Independent copy with its own simulation state.
    pub fn deep_clone(&self) -> Self {
        match self {
            TrackedObject::Rope(r) => TrackedObject::Rope(TrackedRope {
                sim: share(r.sim.read().clone()),
                rest_points: r.rest_points.clone(),
            }),
            TrackedObject::Towel(t) => TrackedObject::Towel(TrackedTowel {
                sim: share(t.sim.read().clone()),
                rest_points: t.rest_points.clone(),
            }),
            TrackedObject::RigidBox(b) => TrackedObject::RigidBox(TrackedBox {
                sim: share(b.sim.read().clone()),
                rest_points: b.rest_points.clone(),
            }),
        }
    }
}

impl From<CapsuleRope> for TrackedObject {
    fn from(rope: CapsuleRope) -> Self {
        TrackedObject::Rope(TrackedRope::new(rope))
    }
}

impl From<ClothSheet> for TrackedObject {
    fn from(cloth: ClothSheet) -> Self {
        TrackedObject::Towel(TrackedTowel::new(cloth))
    }
}

impl From<BoxBody> for TrackedObject {
    fn from(body: BoxBody) -> Self {
        TrackedObject::RigidBox(TrackedBox::new(body))
    }
}
