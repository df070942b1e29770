//! Multi-transfer orchestration.
//!
//! [`MultiSession`] owns a set of concurrent transfer handles and drives them
//! through one [`TransferEngine`](crate::engine::TransferEngine). Completion
//! surfaces as a blocking return value ([`execute`](MultiSession::execute)),
//! a drainable queue of [`CompletionMessage`]s, or per-transfer
//! [`CompletionFuture`]s.
//!
//! Internal components mirror the engine's event model: a socket watch
//! registry, a single replaceable timer deadline, and a FIFO completion
//! queue, all mutated only while applying engine events.

mod queue;
mod session;
mod sockets;
mod timer;
mod waiter;

// Re-exports for convenience
pub use queue::CompletionMessage;
pub use session::{CompletionFuture, MultiSession, SocketSink, TimerSink};
pub use waiter::WakeHandle;
