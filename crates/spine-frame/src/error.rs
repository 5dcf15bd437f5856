use crate::catalog::{Direction, MessageType};

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A sync marker byte did not match at its expected position.
    #[error("sync mismatch at byte {position}: expected 0x{expected:02X}, found 0x{found:02X}")]
    Sync {
        position: usize,
        expected: u8,
        found: u8,
    },

    /// The type code is not cataloged for this direction, or the declared
    /// payload size disagrees with the catalog.
    #[error(
        "{direction} type 0x{code:04X} with declared size {declared} rejected (catalog size {expected:?})"
    )]
    TypeOrSize {
        direction: Direction,
        code: u16,
        declared: usize,
        expected: Option<usize>,
    },

    /// The trailer does not match the CRC computed over the payload.
    #[error("crc mismatch: computed 0x{computed:08X}, trailer 0x{received:08X}")]
    Crc { computed: u32, received: u32 },

    /// Tried to build a frame whose type has no catalog entry in this direction.
    #[error("{message_type} is not cataloged for {direction}")]
    NotCataloged {
        direction: Direction,
        message_type: MessageType,
    },

    /// A payload of the wrong length was supplied for a fixed-size type.
    #[error("payload is {size} bytes, expected {expected}")]
    PayloadSize { size: usize, expected: usize },

    /// The payload exceeds what the frame buffer can hold.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A destination slice is too small for the bytes being written.
    #[error("buffer too small ({available} bytes, need {needed})")]
    BufferTooSmall { needed: usize, available: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for the three wire-level rejections (sync, type/size, CRC).
    ///
    /// These all collapse to the same "invalid frame" outcome: the frame is
    /// discarded and the caller decodes again. Anything else means the
    /// stream itself failed.
    pub fn is_invalid_frame(&self) -> bool {
        matches!(
            self,
            FrameError::Sync { .. } | FrameError::TypeOrSize { .. } | FrameError::Crc { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_rejections_are_invalid_frames() {
        assert!(FrameError::Sync {
            position: 0,
            expected: 0xAA,
            found: 0x00
        }
        .is_invalid_frame());
        assert!(FrameError::TypeOrSize {
            direction: Direction::HeadToBody,
            code: 0xFF00,
            declared: 32,
            expected: None
        }
        .is_invalid_frame());
        assert!(FrameError::Crc {
            computed: 1,
            received: 2
        }
        .is_invalid_frame());
    }

    #[test]
    fn stream_failures_are_not_invalid_frames() {
        assert!(!FrameError::ConnectionClosed.is_invalid_frame());
        assert!(!FrameError::Io(std::io::Error::other("uart gone")).is_invalid_frame());
        assert!(!FrameError::PayloadTooLarge { size: 2000, max: 1280 }.is_invalid_frame());
    }

    #[test]
    fn messages_carry_context() {
        let err = FrameError::TypeOrSize {
            direction: Direction::BodyToHead,
            code: 0x6B61,
            declared: 8,
            expected: Some(4),
        };
        assert_eq!(
            err.to_string(),
            "B2H type 0x6B61 with declared size 8 rejected (catalog size Some(4))"
        );
    }
}
