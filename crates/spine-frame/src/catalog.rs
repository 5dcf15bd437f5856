//! Message types and the per-direction payload size catalog.
//!
//! The head-to-body and body-to-head catalogs are independent namespaces.
//! They reuse some codes with different meanings (`dataFrame` is 64 bytes
//! head-to-body and 768 bytes body-to-head), so a type code is only
//! meaningful together with its [`Direction`].

use std::fmt;

/// Largest payload the wire format allows.
pub const MAX_PAYLOAD: usize = 1280;

/// Direction of travel between the two boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Head board to body board, tag `"H2B"`.
    HeadToBody,
    /// Body board to head board, tag `"B2H"`.
    BodyToHead,
}

impl Direction {
    /// The three ASCII tag bytes that follow the sync byte.
    pub const fn tag(self) -> [u8; 3] {
        match self {
            Direction::HeadToBody => *b"H2B",
            Direction::BodyToHead => *b"B2H",
        }
    }

    /// Full 4-byte sync marker: `0xAA` then the direction tag.
    pub const fn magic(self) -> [u8; 4] {
        let tag = self.tag();
        [crate::codec::SYNC_BYTE, tag[0], tag[1], tag[2]]
    }

    /// The opposite direction on the same pair of boards.
    pub const fn reverse(self) -> Self {
        match self {
            Direction::HeadToBody => Direction::BodyToHead,
            Direction::BodyToHead => Direction::HeadToBody,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::HeadToBody => "H2B",
            Direction::BodyToHead => "B2H",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every message type code used on the spine.
///
/// Codes are two ASCII letters sent low byte first, so `dataCharacter`
/// (0x6364) appears on the wire as `'d' 'c'`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    /// Text to or from the test/charger serial port.
    DataCharacter = 0x6364,
    /// Control record (head to body) or telemetry record (body to head).
    DataFrame = 0x6466,
    /// Disconnect the battery and power off.
    Shutdown = 0x6473,
    /// Firmware update block (head to body) or its response (body to head).
    UpdateFirmware = 0x6675,
    /// Switch between boot-loader and application mode.
    Mode = 0x6D64,
    /// Version request (head to body) or version report (body to head).
    Version = 0x7276,
    /// LED control.
    Lights = 0x736C,
    /// Validate the freshly written application image.
    Validate = 0x7374,
    /// Erase the application image.
    Erase = 0x7878,
    /// Boot-loader frame from the body board.
    BootFrame = 0x6662,
    /// Acknowledge from the body board.
    Ack = 0x6B61,
    /// Body board diagnostic, absent from both catalogs.
    Vs = 0x7376,
}

impl MessageType {
    pub const ALL: [MessageType; 12] = [
        MessageType::DataCharacter,
        MessageType::DataFrame,
        MessageType::Shutdown,
        MessageType::UpdateFirmware,
        MessageType::Mode,
        MessageType::Version,
        MessageType::Lights,
        MessageType::Validate,
        MessageType::Erase,
        MessageType::BootFrame,
        MessageType::Ack,
        MessageType::Vs,
    ];

    /// The 16-bit wire code.
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Map a wire code back to a known type.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.code() == code)
    }

    /// Look up a type by its protocol name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.name().eq_ignore_ascii_case(name))
    }

    pub const fn name(self) -> &'static str {
        match self {
            MessageType::DataCharacter => "dataCharacter",
            MessageType::DataFrame => "dataFrame",
            MessageType::Shutdown => "shutdown",
            MessageType::UpdateFirmware => "updateFirmware",
            MessageType::Mode => "mode",
            MessageType::Version => "version",
            MessageType::Lights => "lights",
            MessageType::Validate => "validate",
            MessageType::Erase => "erase",
            MessageType::BootFrame => "bootFrame",
            MessageType::Ack => "ack",
            MessageType::Vs => "VS",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04X})", self.name(), self.code())
    }
}

const HEAD_TO_BODY: &[(MessageType, usize)] = &[
    (MessageType::DataCharacter, 32),
    (MessageType::DataFrame, 64),
    (MessageType::Shutdown, 0),
    (MessageType::UpdateFirmware, 1028),
    (MessageType::Mode, 0),
    (MessageType::Version, 0),
    (MessageType::Lights, 16),
    (MessageType::Validate, 0),
    (MessageType::Erase, 0),
];

const BODY_TO_HEAD: &[(MessageType, usize)] = &[
    (MessageType::DataCharacter, 32),
    (MessageType::UpdateFirmware, 32),
    (MessageType::DataFrame, 768),
    (MessageType::BootFrame, 0),
    (MessageType::Ack, 4),
    (MessageType::Version, 40),
    (MessageType::Validate, 0),
];

/// The catalog entries for one direction, in wire-documentation order.
pub fn entries(direction: Direction) -> &'static [(MessageType, usize)] {
    match direction {
        Direction::HeadToBody => HEAD_TO_BODY,
        Direction::BodyToHead => BODY_TO_HEAD,
    }
}

/// Fixed payload size of `message_type` when sent in `direction`.
///
/// `None` means the type is not legal in that direction, even when the other
/// direction knows it.
pub fn size_for(direction: Direction, message_type: MessageType) -> Option<usize> {
    entries(direction)
        .iter()
        .find(|(ty, _)| *ty == message_type)
        .map(|(_, size)| *size)
}

/// Resolve a raw wire code for `direction` into its type and payload size.
pub fn lookup(direction: Direction, code: u16) -> Option<(MessageType, usize)> {
    let message_type = MessageType::from_code(code)?;
    size_for(direction, message_type).map(|size| (message_type, size))
}

/// Largest payload any catalog entry in `direction` declares.
pub fn largest_payload(direction: Direction) -> usize {
    entries(direction)
        .iter()
        .map(|(_, size)| *size)
        .max()
        .unwrap_or(0)
}
