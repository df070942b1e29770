use std::io;
use thiserror::Error;

/// Unrecoverable condition reported by the engine itself during a driving
/// call, as opposed to the failure of one transfer.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum EngineError {
    #[error("Engine was handed a transfer it does not know")]
    BadHandle,
    #[error("Engine was handed a socket it is not tracking")]
    BadSocket,
    #[error("Engine out of memory")]
    OutOfMemory,
    #[error("Engine internal failure: {0}")]
    Internal(String),
}

/// Structural misuse of a session or handle.
///
/// These fail synchronously at the violating call. Per-transfer network
/// failures never appear here; they are delivered through completion
/// messages as [`TransferError`](crate::base::transfererror::TransferError).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum MultiError {
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Unknown impersonation profile: {0}")]
    UnknownProfile(String),
    #[error("Session is closed")]
    SessionClosed,
    #[error("Handle is closed")]
    HandleClosed,
    #[error("Handle has no configuration")]
    HandleUnconfigured,
    #[error("Handle is already attached to a session")]
    HandleAttached,
    #[error("Handle is not attached to this session")]
    HandleNotAttached,
    #[error("Transfer is still running")]
    StillRunning,
    #[error("Transfer already has a pending completion slot")]
    AlreadySubmitted,
    #[error("Transfer was cancelled before completion")]
    Cancelled,
    #[error("Transfer finished without producing a completion message")]
    LostTransfer,
    #[error("Engine failure")]
    Engine(#[from] EngineError),
    #[error("Readiness wait failed: {0:?}")]
    Wait(io::ErrorKind),
}

impl From<io::Error> for MultiError {
    fn from(err: io::Error) -> Self {
        MultiError::Wait(err.kind())
    }
}
