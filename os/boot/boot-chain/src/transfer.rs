use crate::entry::EntryPoint;
use crate::handoff::{HandoffError, StageArgs};

/// Hands control to a loaded stage.
pub trait ControlTransfer {
    /// Jump to `entry` with `args`.
    ///
    /// Returns only if the transfer could not be performed or the stage
    /// returned.
    #[must_use]
    fn transfer(&mut self, entry: EntryPoint, args: StageArgs) -> HandoffError;
}

/// A transfer request seen by [`RecordingTransfer`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TransferRecord {
    pub entry: EntryPoint,
    pub args: StageArgs,
}

/// Records transfer requests instead of performing them.
///
/// Every request "returns", reported as [`HandoffError::StageReturned`].
#[derive(Debug, Default, Clone)]
pub struct RecordingTransfer {
    last: Option<TransferRecord>,
    calls: usize,
}

impl RecordingTransfer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: None,
            calls: 0,
        }
    }

    /// The most recent request.
    #[must_use]
    pub const fn last(&self) -> Option<TransferRecord> {
        self.last
    }

    /// Number of requests seen.
    #[must_use]
    pub const fn calls(&self) -> usize {
        self.calls
    }
}

impl ControlTransfer for RecordingTransfer {
    fn transfer(&mut self, entry: EntryPoint, args: StageArgs) -> HandoffError {
        log::debug!("Recording transfer to {entry}");
        self.last = Some(TransferRecord { entry, args });
        self.calls += 1;
        HandoffError::StageReturned
    }
}
