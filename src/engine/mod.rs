//! Transfer engine boundary.
//!
//! Everything wire-level lives behind the [`TransferEngine`] trait: the
//! orchestration layer starts, cancels, and drives opaque transfers and
//! drains typed [`EngineEvent`]s back out. [`ScriptedEngine`] is the
//! in-process implementation used by tests, demos, and benchmarks.

mod drive;
mod scripted;

pub use drive::{EngineEvent, Events, Interest, Socket, TransferEngine, TIMEOUT_SOCKET};
pub use scripted::{Script, ScriptBook, ScriptedEngine};
