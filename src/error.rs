//! Error types for tracking and object construction.
//!
//! Degenerate numeric cases (empty observation, total occlusion, points with
//! no evidence) are not errors; they are handled by the tracker's fallback
//! policy. Everything here indicates a caller/core desynchronization or a
//! construction request that cannot be honored.

use thiserror::Error;

use crate::tracking::ObjectType;

/// Errors raised by the tracking core and the object factory.
#[derive(Debug, Clone, Error)]
pub enum TrackingError {
    /// The initialization description carried a type tag we do not know.
    #[error("unrecognized initialization type: {0}")]
    UnrecognizedInitType(String),

    /// The initialization description was recognized but its geometry is unusable.
    #[error("malformed initialization: {context}")]
    MalformedInit {
        /// What was wrong with the description.
        context: String,
    },

    /// A per-point vector did not have the tracked object's point count.
    #[error("dimension mismatch for {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// What was expected.
        expected: usize,
        /// What was received.
        actual: usize,
        /// Which vector was wrong (e.g. "correction offsets").
        context: String,
    },

    /// An observed point had non-finite coordinates.
    #[error("malformed observation: point {index} is not finite")]
    MalformedObservation {
        /// Index of the offending point within the frame.
        index: usize,
    },

    /// The object variant has no external message encoding.
    #[error("tracked object of type {0} is not serializable")]
    NotSerializable(ObjectType),

    /// A configuration value is out of range.
    #[error("configuration error: {description}")]
    Configuration {
        /// Description of the offending value.
        description: String,
    },

    /// The initialization collaborator did not produce a description.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
}

impl TrackingError {
    pub(crate) fn malformed_init(context: impl Into<String>) -> Self {
        Self::MalformedInit {
            context: context.into(),
        }
    }

    pub(crate) fn configuration(description: impl Into<String>) -> Self {
        Self::Configuration {
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_display() {
        let err = TrackingError::DimensionMismatch {
            expected: 10,
            actual: 9,
            context: "correction offsets".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains("9"));
        assert!(msg.contains("correction offsets"));
    }

    #[test]
    fn test_not_serializable_names_type() {
        let err = TrackingError::NotSerializable(ObjectType::Box);
        assert!(err.to_string().contains("box"));
    }

    #[test]
    fn test_unrecognized_type_display() {
        let err = TrackingError::UnrecognizedInitType("sponge".to_string());
        assert_eq!(err.to_string(), "unrecognized initialization type: sponge");
    }
}
