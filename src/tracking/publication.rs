//! Encoding of the tracked state into an external message.

use serde::{Deserialize, Serialize};

use crate::error::TrackingError;
use crate::tracking::{ObjectType, TrackedObject};

/// Variant-specific external representation of a tracked object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackedObjectMsg {
    /// Ordered nodes along the rope.
    Rope { nodes: Vec<[f64; 3]> },
    /// Grid resolution and row-major nodes.
    Towel {
        resolution_x: usize,
        resolution_y: usize,
        nodes: Vec<[f64; 3]>,
    },
}

impl TrackedObjectMsg {
    pub fn object_type(&self) -> ObjectType {
        match self {
            TrackedObjectMsg::Rope { .. } => ObjectType::Rope,
            TrackedObjectMsg::Towel { .. } => ObjectType::Towel,
        }
    }

    pub fn nodes(&self) -> &[[f64; 3]] {
        match self {
            TrackedObjectMsg::Rope { nodes } | TrackedObjectMsg::Towel { nodes, .. } => nodes,
        }
    }
}

/// Encode the object's current points. Boxes have no encoding and report
/// `NotSerializable` instead of an empty message.
pub fn to_tracked_object_message(object: &TrackedObject) -> Result<TrackedObjectMsg, TrackingError> {
    let nodes = || {
        object
            .points()
            .iter()
            .map(|p| [p.x, p.y, p.z])
            .collect::<Vec<_>>()
    };
    match object {
        TrackedObject::Rope(_) => Ok(TrackedObjectMsg::Rope { nodes: nodes() }),
        TrackedObject::Towel(towel) => {
            let (resolution_x, resolution_y) = towel.resolution();
            Ok(TrackedObjectMsg::Towel {
                resolution_x,
                resolution_y,
                nodes: nodes(),
            })
        }
        TrackedObject::RigidBox(_) => Err(TrackingError::NotSerializable(object.object_type())),
    }
}
