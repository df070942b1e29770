use crate::base::transfererror::TransferError;

/// Final outcome of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The transfer ran to completion; response data is on the handle.
    Success,
    /// The engine gave up on the transfer with the given error.
    Failure(TransferError),
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success)
    }
}

/// The current state of a transfer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferState {
    /// Freshly created, no configuration yet.
    #[default]
    Idle,

    /// Configured and ready to be attached to a session.
    Configured,

    /// Attached to a session, waiting to be started.
    Added,

    /// The engine is actively driving this transfer.
    Running,

    /// The engine reported an outcome for this transfer.
    Completed(TransferOutcome),

    /// Detached from its session; ownership is back with the caller.
    Removed,
}

impl TransferState {
    /// True while the handle is attached to a session in any phase.
    pub fn is_attached(&self) -> bool {
        matches!(
            self,
            TransferState::Added | TransferState::Running | TransferState::Completed(_)
        )
    }
}
