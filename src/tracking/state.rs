//! Per-frame refinement state machine.

/// State of the refinement loop for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    /// No observation received yet.
    AwaitingObservation,
    /// An observation is held and refinement is ongoing.
    Refining,
    /// Mean point displacement dropped below the convergence threshold.
    Converged,
    /// The per-frame iteration cap was hit before convergence.
    IterationCapReached,
}

impl TrackingState {
    /// Whether further iterations on the current frame are pointless.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converged | Self::IterationCapReached)
    }
}

impl Default for TrackingState {
    fn default() -> Self {
        Self::AwaitingObservation
    }
}
