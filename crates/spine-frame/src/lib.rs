//! Framing for the Spine link between the head and body boards.
//!
//! Every message is framed as:
//! - A 4-byte sync marker: `0xAA` followed by the direction tag (`"H2B"` or `"B2H"`)
//! - A 2-byte little-endian message type code
//! - A 2-byte little-endian payload size, fixed per type by the direction's catalog
//! - The payload
//! - A 4-byte little-endian CRC-32 computed over the payload only
//!
//! Decoding rejects a frame on the first wrong sync byte, on a type/size pair
//! the catalog does not list, or on a CRC mismatch.

pub mod catalog;
pub mod codec;
pub mod crc;
pub mod error;
pub mod payload;
pub mod reader;
pub mod writer;

pub use catalog::{Direction, MessageType, MAX_PAYLOAD};
pub use codec::{
    populate_header, DecodeOutcome, DecodedFrame, FrameBuffer, FrameConfig, FRAME_CAPACITY,
    HEADER_SIZE, MAX_TEXT_LEN,
};
pub use crc::{checksum, TRAILER_SIZE};
pub use error::{FrameError, Result};
pub use payload::PayloadLayout;
pub use reader::{decode_frame, FrameReader};
pub use writer::{send_message, FrameWriter};
