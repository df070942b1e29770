//! Transfer handles and configuration.
//!
//! A transfer is configured through [`TransferConfig`], wrapped in a
//! [`Transfer`] handle, and then attached to a
//! [`MultiSession`](crate::multi::MultiSession) which drives it to
//! completion. The handle keeps the accumulated response afterwards.

mod config;
mod handle;

pub use config::{TransferConfig, KNOWN_PROFILES};
pub use handle::{ResponseSink, Transfer, TransferId};
