//! Byte-stream link endpoints for the Spine board protocol.
//!
//! The boards talk over a UART; on a host the same byte stream shows up as a
//! Unix domain socket, a TCP connection, a captured file, or stdio. This is
//! the lowest layer of spine. Everything else reads and writes through the
//! [`Link`] type provided here.

pub mod addr;
pub mod error;
pub mod link;

#[cfg(unix)]
pub mod uds;

pub use addr::{LinkAddr, OpenMode};
pub use error::{Result, TransportError};
pub use link::Link;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
