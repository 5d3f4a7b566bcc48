//! Physics backends for the tracked object variants.
//!
//! - `particle`: position-based particle solver (shared by rope and cloth)
//! - `rope`: capsule chain
//! - `cloth`: rectangular particle sheet
//! - `rigid`: rigid box with a surface point lattice

pub mod cloth;
pub mod particle;
pub mod rigid;
pub mod rope;

use std::sync::Arc;

use parking_lot::RwLock;

pub use cloth::ClothSheet;
pub use particle::{DistanceConstraint, Particle, ParticleSystem};
pub use rigid::BoxBody;
pub use rope::CapsuleRope;

/// Simulation state shared between the tracker and other holders
/// (publishers, viewers). Lifetime equals that of the longest holder.
pub type SimHandle<T> = Arc<RwLock<T>>;

/// Wrap a simulated body in a shared handle.
pub fn share<T>(body: T) -> SimHandle<T> {
    Arc::new(RwLock::new(body))
}
