use std::io::{ErrorKind, Write};

use spine_transport::Link;
use tracing::trace;

use crate::catalog::{Direction, MessageType};
use crate::codec::{FrameBuffer, FrameConfig};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

/// Write header, `payload_size` payload bytes and the trailer from `buffer`.
///
/// The bytes go out exactly as they sit in the buffer; the header is not
/// rewritten and the CRC is not recomputed. Call [`FrameBuffer::seal`] first
/// if the payload was changed.
///
/// `Interrupted` is retried. A write timeout on the stream (reported as
/// `WouldBlock` or `TimedOut`) ends the call with [`FrameError::Io`].
pub fn send_message<W: Write>(stream: &mut W, buffer: &FrameBuffer, payload_size: usize) -> Result<()> {
    let bytes = buffer.wire_bytes(payload_size)?;
    write_all(stream, bytes)?;
    trace!(direction = %buffer.direction(), len = bytes.len(), "wrote frame bytes");
    flush(stream)
}

fn write_all<W: Write>(stream: &mut W, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match stream.write(&bytes[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}

fn flush<W: Write>(stream: &mut W) -> Result<()> {
    loop {
        match stream.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
}

/// Builds and writes frames for one direction to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buffer: FrameBuffer,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T, direction: Direction) -> Self {
        Self::with_config(inner, direction, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, direction: Direction, config: FrameConfig) -> Self {
        Self {
            inner,
            buffer: FrameBuffer::new(direction),
            config,
        }
    }

    /// Encode `payload` as a `message_type` frame and send it.
    pub fn send(&mut self, message_type: MessageType, payload: &[u8]) -> Result<()> {
        let payload_size = self.buffer.encode(message_type, payload)?;
        send_message(&mut self.inner, &self.buffer, payload_size)
    }

    /// Send a `dataCharacter` frame carrying `text`, truncated to 31 bytes.
    pub fn send_text(&mut self, text: &[u8]) -> Result<()> {
        let payload_size = self.buffer.build_text_message(text)?;
        send_message(&mut self.inner, &self.buffer, payload_size)
    }

    /// Write the complete frame currently held by `frame` (blocking).
    pub fn write_frame(&mut self, frame: &FrameBuffer) -> Result<()> {
        send_message(&mut self.inner, frame, frame.payload_size())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        flush(&mut self.inner)
    }

    pub fn direction(&self) -> Direction {
        self.buffer.direction()
    }

    /// The frame most recently built by [`send`](Self::send) or
    /// [`send_text`](Self::send_text).
    pub fn last_frame(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<Link> {
    /// Create a frame writer for a [`Link`] and apply the write timeout.
    pub fn with_config_link(inner: Link, direction: Direction, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, direction, config))
    }
}
