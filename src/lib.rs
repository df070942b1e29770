//! # mimicnet
//!
//! A multi-transfer orchestration layer for browser-impersonating HTTP(S)
//! transfers.
//!
//! `mimicnet` owns a set of concurrent transfer handles and drives an opaque
//! wire-level engine through its event loop, surfacing completion as a
//! blocking return value, a drainable message queue, or asynchronous
//! per-transfer callbacks and futures.
//!
//! ## Features
//!
//! - **Three completion modes**: blocking `execute`, a caller-owned
//!   `perform`/`wait`/`info_read` polling loop, and a socket/timer reactor
//! - **Browser impersonation**: per-transfer fingerprint profile selection
//!   (`chrome136`, `firefox135`, ...) passed through to the engine
//! - **Exactly-once completion**: each transfer resolves one future or fires
//!   one callback, never both, never twice
//! - **Deterministic cancellation**: removing a running transfer aborts it
//!   and suppresses its completion message
//! - **Hermetic testing**: a scripted in-process engine exercises every
//!   orchestration path without network access
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mimicnet::engine::ScriptedEngine;
//! use mimicnet::multi::MultiSession;
//! use mimicnet::transfer::{Transfer, TransferConfig};
//!
//! let mut config = TransferConfig::new("https://example.com/")?;
//! config.impersonate("chrome136", true)?;
//! let transfer = Transfer::with_config(config);
//!
//! let mut session = MultiSession::new(ScriptedEngine::new())?;
//! let outcome = session.execute(&transfer)?;
//! println!("success: {}", outcome.is_success());
//! println!("status: {}", transfer.response_code()?);
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Core error and state types
//! - [`engine`] - The transfer engine boundary and the scripted test engine
//! - [`multi`] - The multi-transfer orchestrator (sessions, completion queue)
//! - [`reactor`] - Socket/timer-driven background driver and its handle
//! - [`transfer`] - Transfer handles and per-transfer configuration
//!
//! ## Liveness
//!
//! One session reconciles three liveness models against a shared pool of
//! in-flight transfers:
//! - `execute` blocks the calling thread until one transfer finishes
//! - `perform`/`wait` cooperate with a caller-owned loop, never blocking
//!   beyond an explicit timeout
//! - the reactor reacts to OS readiness and timer expiry, with no polling
//!   caller at all

pub mod base;
pub mod engine;
pub mod multi;
pub mod reactor;
pub mod transfer;
