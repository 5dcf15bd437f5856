/// Errors that can occur while relaying frames.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] spine_transport::TransportError),

    /// Frame-level error on the inbound or outbound link.
    #[error("frame error: {0}")]
    Frame(#[from] spine_frame::FrameError),
}

impl RelayError {
    /// True when the inbound link reached end of stream.
    pub fn is_closed(&self) -> bool {
        matches!(self, RelayError::Frame(spine_frame::FrameError::ConnectionClosed))
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
