//! The engine boundary.
//!
//! The orchestration layer never calls into the wire-level engine's
//! internals. It drives the engine through [`TransferEngine`] and observes it
//! exclusively through the typed events drained from
//! [`poll_event`](TransferEngine::poll_event). Keeping the engine's push-style
//! notifications behind a pollable queue bounds reentrancy: no caller code
//! runs from inside the engine.

use std::time::Duration;

use crate::base::multierror::EngineError;
use crate::base::transferstate::TransferOutcome;
use crate::transfer::{ResponseSink, TransferConfig, TransferId};

/// OS-level socket descriptor as the engine reports it.
pub type Socket = i32;

/// Sentinel descriptor meaning "the armed timer fired, not a socket".
pub const TIMEOUT_SOCKET: Socket = -1;

/// Readiness bits handed to [`TransferEngine::drive_socket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Events(u32);

impl Events {
    pub const INPUT: u32 = 0x01;
    pub const OUTPUT: u32 = 0x02;
    pub const ERROR: u32 = 0x04;

    pub fn new() -> Self {
        Events(0)
    }

    /// Mark the socket readable.
    pub fn input(mut self) -> Self {
        self.0 |= Self::INPUT;
        self
    }

    /// Mark the socket writable.
    pub fn output(mut self) -> Self {
        self.0 |= Self::OUTPUT;
        self
    }

    /// Mark the socket errored or hung up.
    pub fn error(mut self) -> Self {
        self.0 |= Self::ERROR;
        self
    }

    pub fn has_input(&self) -> bool {
        self.0 & Self::INPUT != 0
    }

    pub fn has_output(&self) -> bool {
        self.0 & Self::OUTPUT != 0
    }

    pub fn has_error(&self) -> bool {
        self.0 & Self::ERROR != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// Which readiness conditions the engine wants watched on a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interest {
    /// Stop watching the socket entirely.
    #[default]
    None,
    Read,
    Write,
    Both,
}

impl Interest {
    pub fn wants_read(&self) -> bool {
        matches!(self, Interest::Read | Interest::Both)
    }

    pub fn wants_write(&self) -> bool {
        matches!(self, Interest::Write | Interest::Both)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Interest::None)
    }
}

/// Typed notification drained from the engine after a driving call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Watch (or with `Interest::None`, unwatch) a socket.
    Socket { socket: Socket, interest: Interest },
    /// Replace the single pending timer. `None` clears it.
    Timer { timeout: Option<Duration> },
    /// A transfer finished.
    Done {
        id: TransferId,
        outcome: TransferOutcome,
    },
}

/// Contract between the orchestration layer and the transfer engine.
///
/// The session owns the engine exclusively, so every method takes
/// `&mut self`; `Send` lets a session move into the reactor task.
///
/// After any driving call (`drive`, `drive_socket`) the caller must drain
/// `poll_event` to empty before relying on registry, timer, or completion
/// state.
pub trait TransferEngine: Send {
    /// Begin a transfer. Response data flows through `sink`; the outcome
    /// arrives later as [`EngineEvent::Done`].
    fn start(
        &mut self,
        id: TransferId,
        config: &TransferConfig,
        sink: ResponseSink,
    ) -> Result<(), EngineError>;

    /// Abort a running transfer. No `Done` event may follow for `id`.
    fn cancel(&mut self, id: TransferId);

    /// Advance every running transfer as far as possible without blocking.
    fn drive(&mut self) -> Result<(), EngineError>;

    /// Advance the transfers affected by one ready socket, or by timer
    /// expiry when `socket` is [`TIMEOUT_SOCKET`].
    fn drive_socket(&mut self, socket: Socket, events: Events) -> Result<(), EngineError>;

    /// Drain one pending event, oldest first.
    fn poll_event(&mut self) -> Option<EngineEvent>;
}
