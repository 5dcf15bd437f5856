//! Payload handlers and the dispatch step of the relay.
//!
//! Each decoded payload is handed to a [`MessageHandler`] as a typed value
//! where a layout exists (`ack`, `dataCharacter`, the body telemetry
//! `dataFrame`) and as raw bytes otherwise. A handler returns `true` to have
//! its edits written back; [`dispatch`] then reports a mutation only if the
//! payload bytes actually changed.

use std::io::Write;

use spine_frame::catalog;
use spine_frame::payload::{Ack, BodyDataFrame, DataCharacter, PayloadLayout};
use spine_frame::{Direction, MessageType, MAX_PAYLOAD};
use tracing::{debug, warn};

/// Per-type payload hooks.
///
/// Every method defaults to observing nothing and changing nothing. Return
/// `true` from a typed hook to write the (possibly edited) value back into
/// the frame.
pub trait MessageHandler {
    /// Body board acknowledgement (body to head only).
    fn on_ack(&mut self, direction: Direction, ack: &mut Ack) -> bool {
        let _ = (direction, ack);
        false
    }

    /// Text payload, either direction.
    fn on_data_character(&mut self, direction: Direction, text: &mut DataCharacter) -> bool {
        let _ = (direction, text);
        false
    }

    /// Body telemetry record (body to head `dataFrame`).
    fn on_body_data_frame(&mut self, direction: Direction, frame: &mut BodyDataFrame) -> bool {
        let _ = (direction, frame);
        false
    }

    /// Any other cataloged type, as raw payload bytes. Edits made to
    /// `payload` are kept as-is.
    fn on_raw(&mut self, direction: Direction, message_type: MessageType, payload: &mut [u8]) {
        let _ = (direction, message_type, payload);
    }

    /// Called in place of a payload hook when the frame failed to decode
    /// and is being forwarded anyway.
    fn on_invalid(&mut self, direction: Direction) {
        let _ = direction;
    }
}

impl<H: MessageHandler + ?Sized> MessageHandler for &mut H {
    fn on_ack(&mut self, direction: Direction, ack: &mut Ack) -> bool {
        (**self).on_ack(direction, ack)
    }

    fn on_data_character(&mut self, direction: Direction, text: &mut DataCharacter) -> bool {
        (**self).on_data_character(direction, text)
    }

    fn on_body_data_frame(&mut self, direction: Direction, frame: &mut BodyDataFrame) -> bool {
        (**self).on_body_data_frame(direction, frame)
    }

    fn on_raw(&mut self, direction: Direction, message_type: MessageType, payload: &mut [u8]) {
        (**self).on_raw(direction, message_type, payload)
    }

    fn on_invalid(&mut self, direction: Direction) {
        (**self).on_invalid(direction)
    }
}

/// Observes nothing and never mutates.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl MessageHandler for PassThrough {}

/// Copies `dataCharacter` text, up to its first NUL, to an auxiliary sink.
///
/// Never mutates. Sink write failures are logged and otherwise ignored so a
/// broken console does not stop the relay.
#[derive(Debug)]
pub struct EchoHandler<W> {
    sink: W,
}

impl<W: Write> EchoHandler<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W: Write> MessageHandler for EchoHandler<W> {
    fn on_data_character(&mut self, direction: Direction, text: &mut DataCharacter) -> bool {
        let result = self
            .sink
            .write_all(text.text())
            .and_then(|()| self.sink.flush());
        if let Err(err) = result {
            warn!(%direction, error = %err, "failed to echo text payload");
        }
        false
    }
}

/// Offer `payload` to `handler` according to its type.
///
/// `message_type` is `None` for a frame that failed to decode; the handler
/// then only sees [`MessageHandler::on_invalid`]. Types with no catalog entry
/// in `direction` are ignored. Returns `true` iff at least one payload byte
/// changed.
pub fn dispatch<H: MessageHandler + ?Sized>(
    direction: Direction,
    message_type: Option<MessageType>,
    payload: &mut [u8],
    handler: &mut H,
) -> bool {
    let Some(message_type) = message_type else {
        handler.on_invalid(direction);
        return false;
    };
    if catalog::size_for(direction, message_type).is_none() {
        debug!(%direction, %message_type, "no catalog entry, skipping dispatch");
        return false;
    }

    match (direction, message_type) {
        (_, MessageType::DataCharacter) => {
            typed::<DataCharacter>(payload, |text| handler.on_data_character(direction, text))
        }
        (Direction::BodyToHead, MessageType::Ack) => {
            typed::<Ack>(payload, |ack| handler.on_ack(direction, ack))
        }
        (Direction::BodyToHead, MessageType::DataFrame) => {
            typed::<BodyDataFrame>(payload, |frame| handler.on_body_data_frame(direction, frame))
        }
        _ => {
            let len = payload.len().min(MAX_PAYLOAD);
            let mut before = [0u8; MAX_PAYLOAD];
            before[..len].copy_from_slice(&payload[..len]);
            handler.on_raw(direction, message_type, payload);
            payload[..len] != before[..len]
        }
    }
}

fn typed<T: PayloadLayout>(payload: &mut [u8], hook: impl FnOnce(&mut T) -> bool) -> bool {
    let mut value = match T::decode(payload) {
        Ok(value) => value,
        Err(err) => {
            debug!(message_type = %T::MESSAGE_TYPE, error = %err, "payload does not fit layout");
            return false;
        }
    };
    if !hook(&mut value) {
        return false;
    }

    let mut edited = [0u8; MAX_PAYLOAD];
    let edited = &mut edited[..T::SIZE];
    if let Err(err) = value.encode(edited) {
        warn!(message_type = %T::MESSAGE_TYPE, error = %err, "failed to re-encode payload");
        return false;
    }
    if edited == payload {
        return false;
    }
    payload.copy_from_slice(edited);
    true
}
