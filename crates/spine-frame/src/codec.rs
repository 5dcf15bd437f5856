use bytes::{Buf, BufMut};

use crate::catalog::{self, Direction, MessageType, MAX_PAYLOAD};
use crate::crc::{checksum, TRAILER_SIZE};
use crate::error::{FrameError, Result};

/// Frame header: sync (1) + direction tag (3) + type (2) + payload size (2).
pub const HEADER_SIZE: usize = 8;

/// First byte of every frame.
pub const SYNC_BYTE: u8 = 0xAA;

/// Offset of the little-endian message type.
pub const MESSAGE_TYPE_OFFSET: usize = 4;

/// Offset of the little-endian payload size.
pub const PAYLOAD_SIZE_OFFSET: usize = 6;

/// Bytes needed to hold the largest legal frame.
pub const FRAME_CAPACITY: usize = HEADER_SIZE + MAX_PAYLOAD + TRAILER_SIZE;

/// Payload size of the `dataCharacter` text message.
pub const TEXT_PAYLOAD_SIZE: usize = 32;

/// Longest text a `dataCharacter` frame carries; the last byte is the NUL.
pub const MAX_TEXT_LEN: usize = TEXT_PAYLOAD_SIZE - 1;

/// Write the sync marker, type and catalog size into a header.
///
/// Wire format:
/// ```text
/// ┌──────┬───────────┬──────────┬──────────┬───────────┬──────────┐
/// │ 0xAA │ tag (3B)  │ type     │ size     │ payload   │ CRC-32   │
/// │      │ H2B / B2H │ (2B LE)  │ (2B LE)  │ size B    │ (4B LE)  │
/// └──────┴───────────┴──────────┴──────────┴───────────┴──────────┘
/// ```
///
/// Only the header is written; payload and trailer are left untouched.
/// Returns the payload size the catalog fixes for this type.
pub fn populate_header(
    header: &mut [u8],
    direction: Direction,
    message_type: MessageType,
) -> Result<usize> {
    if header.len() < HEADER_SIZE {
        return Err(FrameError::BufferTooSmall {
            needed: HEADER_SIZE,
            available: header.len(),
        });
    }
    let payload_size =
        catalog::size_for(direction, message_type).ok_or(FrameError::NotCataloged {
            direction,
            message_type,
        })?;

    let mut dst = &mut header[..HEADER_SIZE];
    dst.put_slice(&direction.magic());
    dst.put_u16_le(message_type.code());
    dst.put_u16_le(payload_size as u16);
    Ok(payload_size)
}

/// Type and payload size of a successfully decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame {
    pub message_type: MessageType,
    pub payload_size: usize,
}

/// The collapsed view of a decode attempt: a type, or the invalid sentinel
/// (`None`) with a zero payload size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOutcome {
    pub message_type: Option<MessageType>,
    pub payload_size: usize,
}

impl DecodeOutcome {
    pub const INVALID: DecodeOutcome = DecodeOutcome {
        message_type: None,
        payload_size: 0,
    };

    pub fn is_valid(&self) -> bool {
        self.message_type.is_some()
    }
}

impl From<&Result<DecodedFrame>> for DecodeOutcome {
    fn from(result: &Result<DecodedFrame>) -> Self {
        match result {
            Ok(frame) => DecodeOutcome {
                message_type: Some(frame.message_type),
                payload_size: frame.payload_size,
            },
            Err(_) => DecodeOutcome::INVALID,
        }
    }
}

/// One direction's reusable frame buffer.
///
/// Holds exactly one frame: every decode and every encode overwrites it, so
/// the previous frame must be forwarded or copied out before the next one is
/// read. Payload views borrow from it and never outlive the next call.
pub struct FrameBuffer {
    direction: Direction,
    bytes: [u8; FRAME_CAPACITY],
    payload_size: usize,
}

impl FrameBuffer {
    /// Create a zeroed buffer bound to `direction`.
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            bytes: [0u8; FRAME_CAPACITY],
            payload_size: 0,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Payload size of the frame currently held (0 after a failed decode).
    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    pub(crate) fn set_payload_size(&mut self, payload_size: usize) {
        self.payload_size = payload_size;
    }

    /// The whole backing store, including bytes past the current frame.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Header, payload and trailer of the current frame.
    pub fn frame_bytes(&self) -> &[u8] {
        &self.bytes[..HEADER_SIZE + self.payload_size + TRAILER_SIZE]
    }

    /// Header, `payload_size` payload bytes and the trailer that follows them,
    /// whatever they currently contain.
    pub fn wire_bytes(&self, payload_size: usize) -> Result<&[u8]> {
        if payload_size > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: payload_size,
                max: MAX_PAYLOAD,
            });
        }
        Ok(&self.bytes[..HEADER_SIZE + payload_size + TRAILER_SIZE])
    }

    pub fn header(&self) -> &[u8] {
        &self.bytes[..HEADER_SIZE]
    }

    /// Type code currently in the header, known or not.
    pub fn type_code(&self) -> u16 {
        (&self.bytes[MESSAGE_TYPE_OFFSET..]).get_u16_le()
    }

    /// Payload size currently declared in the header.
    pub fn declared_size(&self) -> usize {
        usize::from((&self.bytes[PAYLOAD_SIZE_OFFSET..]).get_u16_le())
    }

    /// Type currently in the header, if it is a known code.
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_code(self.type_code())
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[HEADER_SIZE..HEADER_SIZE + self.payload_size]
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[HEADER_SIZE..HEADER_SIZE + self.payload_size]
    }

    /// Trailer value stored after the current payload.
    pub fn trailer(&self) -> u32 {
        (&self.bytes[HEADER_SIZE + self.payload_size..]).get_u32_le()
    }

    /// Recompute the CRC over the current payload and overwrite the trailer.
    pub fn seal(&mut self) -> u32 {
        let crc = checksum(self.payload());
        let start = HEADER_SIZE + self.payload_size;
        (&mut self.bytes[start..start + TRAILER_SIZE]).put_u32_le(crc);
        crc
    }

    /// Write this direction's header for `message_type` and size the buffer
    /// to its catalog payload. The payload and trailer are not touched.
    pub fn populate_header(&mut self, message_type: MessageType) -> Result<usize> {
        let payload_size = populate_header(&mut self.bytes, self.direction, message_type)?;
        self.payload_size = payload_size;
        Ok(payload_size)
    }

    /// Build a complete frame: header, a copy of `payload`, and its trailer.
    ///
    /// `payload` must be exactly the catalog size for `message_type`.
    pub fn encode(&mut self, message_type: MessageType, payload: &[u8]) -> Result<usize> {
        let expected = catalog::size_for(self.direction, message_type).ok_or(
            FrameError::NotCataloged {
                direction: self.direction,
                message_type,
            },
        )?;
        if payload.len() != expected {
            return Err(FrameError::PayloadSize {
                size: payload.len(),
                expected,
            });
        }

        let payload_size = self.populate_header(message_type)?;
        self.payload_mut().copy_from_slice(payload);
        self.seal();
        Ok(payload_size)
    }

    /// Build a `dataCharacter` frame carrying `text`.
    ///
    /// At most [`MAX_TEXT_LEN`] bytes are copied; longer input is truncated.
    /// The text is NUL-terminated and the rest of the 32-byte field zeroed,
    /// so nothing is ever written past the fixed payload region. Returns the
    /// fixed payload size (32).
    pub fn build_text_message(&mut self, text: &[u8]) -> Result<usize> {
        let payload_size = self.populate_header(MessageType::DataCharacter)?;
        let copied = text.len().min(MAX_TEXT_LEN);

        let payload = self.payload_mut();
        payload.fill(0);
        payload[..copied].copy_from_slice(&text[..copied]);

        self.seal();
        Ok(payload_size)
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("direction", &self.direction)
            .field("type_code", &format_args!("0x{:04X}", self.type_code()))
            .field("payload_size", &self.payload_size)
            .finish()
    }
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone, Default)]
pub struct FrameConfig {
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}
