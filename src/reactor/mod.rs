//! Socket/timer reactor over a [`MultiSession`](crate::multi::MultiSession).
//!
//! [`ReactorDriver::spawn`] turns a session into a background task driven
//! entirely by OS socket readiness and a single rearmable timer;
//! [`ReactorHandle`] is the cloneable front end through which callers add,
//! remove, submit, and send transfers.

mod driver;
mod handle;
mod watch;

pub use driver::ReactorDriver;
pub use handle::ReactorHandle;
