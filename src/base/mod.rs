//! Base types and error handling.
//!
//! Provides foundational types for the orchestration layer:
//! - [`MultiError`](multierror::MultiError): structural misuse, raised synchronously
//! - [`TransferError`](transfererror::TransferError): per-transfer failure codes matching the engine's numbering
//! - [`TransferState`](transferstate::TransferState): transfer handle lifecycle

pub mod multierror;
pub mod transfererror;
pub mod transferstate;
