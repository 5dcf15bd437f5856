//! Framing, relaying and tooling for the Spine link between a robot's head
//! and body boards.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte-stream links (Unix sockets, TCP, capture files, stdio)
//! - [`frame`]: the message catalog, CRC, frame codec and payload layouts
//! - [`relay`]: payload dispatch and the frame relay (behind the `relay` feature)

/// Re-export transport types.
pub mod transport {
    pub use spine_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use spine_frame::*;
}

/// Re-export relay types (requires `relay` feature).
#[cfg(feature = "relay")]
pub mod relay {
    pub use spine_relay::*;
}
