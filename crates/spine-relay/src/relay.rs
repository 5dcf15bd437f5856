use std::io::{Read, Write};

use spine_frame::{
    DecodeOutcome, Direction, FrameConfig, FrameError, FrameReader, FrameWriter, MessageType,
};
use spine_transport::Link;
use tracing::{debug, info, warn};

use crate::dispatch::{dispatch, MessageHandler};
use crate::error::{RelayError, Result};

/// What the relay does with a frame that failed to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ForwardPolicy {
    /// Drop it; nothing is written to the outbound link.
    #[default]
    SuppressInvalid,
    /// Dispatch the invalid sentinel and forward the buffer's header, zero
    /// payload bytes and the four bytes that follow, exactly as the boards'
    /// legacy relay does.
    PassThrough,
}

/// Configuration for one relay direction.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Direction of the frames read from the inbound link.
    pub direction: Direction,
    pub forward_policy: ForwardPolicy,
    /// Timeouts applied to the inbound and outbound links.
    pub frame: FrameConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            direction: Direction::HeadToBody,
            forward_policy: ForwardPolicy::default(),
            frame: FrameConfig::default(),
        }
    }
}

/// Running counters for one relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Frames written to the outbound link.
    pub relayed: u64,
    /// Forwarded frames whose payload a handler changed (trailer recomputed).
    pub mutated: u64,
    /// Decode attempts that ended in an invalid frame.
    pub invalid: u64,
    /// Invalid frames that were not forwarded.
    pub suppressed: u64,
}

/// Result of one [`Relay::relay_one_frame`] call.
#[derive(Debug)]
pub enum RelayOutcome {
    /// Bytes were written to the outbound link. `message_type` is `None` when
    /// an invalid frame was passed through.
    Forwarded {
        message_type: Option<MessageType>,
        payload_size: usize,
        mutated: bool,
    },
    /// An invalid frame was dropped.
    Suppressed(FrameError),
}

impl RelayOutcome {
    pub fn is_forwarded(&self) -> bool {
        matches!(self, RelayOutcome::Forwarded { .. })
    }
}

/// Decodes frames from one link, dispatches them, and forwards them to another.
///
/// One relay covers one direction. For a bidirectional bridge run two relays,
/// one per direction, each on its own pair of link handles.
pub struct Relay<R, W, H> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    handler: H,
    policy: ForwardPolicy,
    stats: RelayStats,
}

impl<R: Read, W: Write, H: MessageHandler> Relay<R, W, H> {
    pub fn new(inbound: R, outbound: W, handler: H, config: RelayConfig) -> Self {
        let reader = FrameReader::with_config(inbound, config.direction, config.frame.clone());
        let writer = FrameWriter::with_config(outbound, config.direction, config.frame);
        Self::from_parts(reader, writer, handler, config.forward_policy)
    }

    fn from_parts(
        reader: FrameReader<R>,
        writer: FrameWriter<W>,
        handler: H,
        policy: ForwardPolicy,
    ) -> Self {
        Self {
            reader,
            writer,
            handler,
            policy,
            stats: RelayStats::default(),
        }
    }

    /// Decode one frame, dispatch it, and forward it (blocking).
    ///
    /// A handler edit triggers a trailer recompute before forwarding; an
    /// untouched frame is forwarded byte for byte. Invalid frames are handled
    /// per [`ForwardPolicy`]. Stream failures and end of stream are returned
    /// as errors and nothing is forwarded.
    pub fn relay_one_frame(&mut self) -> Result<RelayOutcome> {
        let direction = self.reader.direction();
        let result = self.reader.read_frame();
        let decoded = DecodeOutcome::from(&result);

        if let Err(err) = result {
            if !err.is_invalid_frame() {
                return Err(RelayError::Frame(err));
            }
            self.stats.invalid += 1;
            if self.policy == ForwardPolicy::SuppressInvalid {
                self.stats.suppressed += 1;
                warn!(%direction, error = %err, "dropping invalid frame");
                return Ok(RelayOutcome::Suppressed(err));
            }
            warn!(%direction, error = %err, "passing invalid frame through");
        }

        let buffer = self.reader.buffer_mut();
        let mutated = dispatch(
            direction,
            decoded.message_type,
            buffer.payload_mut(),
            &mut self.handler,
        );
        if mutated {
            let crc = buffer.seal();
            self.stats.mutated += 1;
            debug!(%direction, crc, "payload edited, trailer recomputed");
        }

        self.writer.write_frame(buffer)?;
        self.stats.relayed += 1;
        debug!(
            %direction,
            message_type = decoded.message_type.map(MessageType::name),
            payload_size = decoded.payload_size,
            "forwarded frame"
        );

        Ok(RelayOutcome::Forwarded {
            message_type: decoded.message_type,
            payload_size: decoded.payload_size,
            mutated,
        })
    }

    /// Relay frames until the inbound link closes or `keep_going` returns
    /// false. End of stream is a normal stop; other stream failures are
    /// returned.
    pub fn run_while(&mut self, mut keep_going: impl FnMut() -> bool) -> Result<RelayStats> {
        let direction = self.reader.direction();
        while keep_going() {
            match self.relay_one_frame() {
                Ok(_) => {}
                Err(err) if err.is_closed() => {
                    info!(%direction, "inbound link closed");
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        info!(
            %direction,
            relayed = self.stats.relayed,
            mutated = self.stats.mutated,
            invalid = self.stats.invalid,
            suppressed = self.stats.suppressed,
            "relay stopped"
        );
        Ok(self.stats)
    }

    /// Relay frames until the inbound link closes.
    pub fn run(&mut self) -> Result<RelayStats> {
        self.run_while(|| true)
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    pub fn direction(&self) -> Direction {
        self.reader.direction()
    }

    pub fn forward_policy(&self) -> ForwardPolicy {
        self.policy
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Consume the relay and return the inbound stream, outbound stream and handler.
    pub fn into_parts(self) -> (R, W, H) {
        (
            self.reader.into_inner(),
            self.writer.into_inner(),
            self.handler,
        )
    }
}

impl<H: MessageHandler> Relay<Link, Link, H> {
    /// Create a relay between two links and apply the configured timeouts.
    pub fn with_config_link(
        inbound: Link,
        outbound: Link,
        handler: H,
        config: RelayConfig,
    ) -> Result<Self> {
        let reader = FrameReader::with_config_link(inbound, config.direction, config.frame.clone())?;
        let writer = FrameWriter::with_config_link(outbound, config.direction, config.frame)?;
        Ok(Self::from_parts(reader, writer, handler, config.forward_policy))
    }
}
