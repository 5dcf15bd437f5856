//! Relaying between the head and body board links.
//!
//! A [`Relay`] reads one frame from its inbound link, offers the payload to a
//! [`MessageHandler`], recomputes the trailer if the handler changed the
//! payload, and writes the frame to its outbound link.

pub mod dispatch;
pub mod error;
pub mod relay;

pub use dispatch::{dispatch, EchoHandler, MessageHandler, PassThrough};
pub use error::{RelayError, Result};
pub use relay::{ForwardPolicy, Relay, RelayConfig, RelayOutcome, RelayStats};
