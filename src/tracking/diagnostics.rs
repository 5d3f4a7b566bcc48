//! Non-blocking publication of iteration snapshots.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::debug;

use crate::tracking::IterationDiagnostics;

/// Pushes snapshots to an external consumer without ever blocking the
/// tracking loop. Snapshots are dropped while the channel is full.
#[derive(Debug)]
pub struct DiagnosticsPublisher {
    sender: Sender<IterationDiagnostics>,
    dropped: usize,
}

impl DiagnosticsPublisher {
    pub fn new(sender: Sender<IterationDiagnostics>) -> Self {
        Self { sender, dropped: 0 }
    }

    /// Publisher plus the receiving end of a channel holding `capacity` snapshots.
    pub fn bounded(capacity: usize) -> (Self, Receiver<IterationDiagnostics>) {
        let (sender, receiver) = bounded(capacity);
        (Self::new(sender), receiver)
    }

    pub fn publish(&mut self, snapshot: IterationDiagnostics) {
        match self.sender.try_send(snapshot) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                debug!("Diagnostics channel full, dropped {} snapshots", self.dropped);
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
                debug!("Diagnostics consumer disconnected");
            }
        }
    }

    /// Snapshots that could not be delivered.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}
