use std::io::{ErrorKind, Read};

use bytes::Buf;
use spine_transport::Link;
use tracing::{debug, trace, warn};

use crate::catalog::{self, Direction};
use crate::codec::{DecodedFrame, FrameBuffer, FrameConfig, HEADER_SIZE, MESSAGE_TYPE_OFFSET};
use crate::crc::{checksum, TRAILER_SIZE};
use crate::error::{FrameError, Result};

/// Decode one frame from `stream` into `buffer`.
///
/// 1. Match the 4-byte sync marker for the buffer's direction, one byte at a
///    time. The first wrong byte fails the call with [`FrameError::Sync`];
///    there is no rescan within a call, the caller decodes again.
/// 2. Read type and declared size, and cross-check them against the
///    catalog. On [`FrameError::TypeOrSize`] nothing past the header has
///    been consumed.
/// 3. Read payload and trailer, then verify the CRC over the payload only
///    ([`FrameError::Crc`] on mismatch).
///
/// On any failure the buffer's payload size is reset to 0; on success the
/// buffer holds the complete frame.
pub fn decode_frame<R: Read>(stream: &mut R, buffer: &mut FrameBuffer) -> Result<DecodedFrame> {
    buffer.set_payload_size(0);
    let direction = buffer.direction();

    sync(stream, buffer.as_bytes_mut(), direction)?;
    read_exact(stream, &mut buffer.as_bytes_mut()[MESSAGE_TYPE_OFFSET..HEADER_SIZE])?;

    let code = buffer.type_code();
    let declared = buffer.declared_size();
    let (message_type, expected) = match catalog::lookup(direction, code) {
        Some((ty, size)) if size == declared => (ty, size),
        found => {
            return Err(FrameError::TypeOrSize {
                direction,
                code,
                declared,
                expected: found.map(|(_, size)| size),
            })
        }
    };

    let end = HEADER_SIZE + expected + TRAILER_SIZE;
    read_exact(stream, &mut buffer.as_bytes_mut()[HEADER_SIZE..end])?;

    let computed = checksum(&buffer.as_bytes()[HEADER_SIZE..HEADER_SIZE + expected]);
    let received = (&buffer.as_bytes()[end - TRAILER_SIZE..end]).get_u32_le();
    if computed != received {
        return Err(FrameError::Crc { computed, received });
    }

    buffer.set_payload_size(expected);
    Ok(DecodedFrame {
        message_type,
        payload_size: expected,
    })
}

fn sync<R: Read>(stream: &mut R, dst: &mut [u8], direction: Direction) -> Result<()> {
    for (position, expected) in direction.magic().into_iter().enumerate() {
        let found = read_byte(stream)?;
        dst[position] = found;
        if found != expected {
            trace!(position, expected, found, "sync byte mismatch");
            return Err(FrameError::Sync {
                position,
                expected,
                found,
            });
        }
    }
    Ok(())
}

fn read_byte<R: Read>(stream: &mut R) -> Result<u8> {
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(_) => return Ok(byte[0]),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
}

fn read_exact<R: Read>(stream: &mut R, dst: &mut [u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < dst.len() {
        match stream.read(&mut dst[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}

/// Reads frames for one direction from any `Read` stream.
///
/// Owns that direction's [`FrameBuffer`]; the frame from the last successful
/// [`read_frame`](Self::read_frame) stays in [`buffer`](Self::buffer) until
/// the next call.
pub struct FrameReader<T> {
    inner: T,
    buffer: FrameBuffer,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T, direction: Direction) -> Self {
        Self::with_config(inner, direction, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, direction: Direction, config: FrameConfig) -> Self {
        Self {
            inner,
            buffer: FrameBuffer::new(direction),
            config,
        }
    }

    /// Make one decode attempt (blocking).
    ///
    /// Invalid frames come back as errors for which
    /// [`FrameError::is_invalid_frame`] is true; the caller may simply call
    /// again. Returns `Err(FrameError::ConnectionClosed)` at end of stream.
    pub fn read_frame(&mut self) -> Result<DecodedFrame> {
        let result = decode_frame(&mut self.inner, &mut self.buffer);
        match &result {
            Ok(frame) => debug!(
                direction = %self.buffer.direction(),
                message_type = frame.message_type.name(),
                payload_size = frame.payload_size,
                "decoded frame"
            ),
            Err(err) if err.is_invalid_frame() => {
                debug!(direction = %self.buffer.direction(), error = %err, "invalid frame")
            }
            Err(_) => {}
        }
        result
    }

    /// Decode repeatedly until a valid frame arrives.
    ///
    /// Invalid frames are skipped and counted; stream failures and end of
    /// stream are returned as-is. Each retry starts wherever the rejected
    /// decode stopped reading: right after the mismatched byte for a sync
    /// failure, after the 8-byte header for a type/size rejection, and after
    /// the whole frame for a CRC mismatch.
    pub fn read_next_valid(&mut self) -> Result<(DecodedFrame, usize)> {
        let mut skipped = 0usize;
        loop {
            match self.read_frame() {
                Ok(frame) => {
                    if skipped > 0 {
                        warn!(
                            direction = %self.buffer.direction(),
                            skipped,
                            "resynchronized after invalid frames"
                        );
                    }
                    return Ok((frame, skipped));
                }
                Err(err) if err.is_invalid_frame() => skipped = skipped.saturating_add(1),
                Err(err) => return Err(err),
            }
        }
    }

    /// The buffer holding the most recently decoded frame.
    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Mutable access for in-place payload rewriting before forwarding.
    pub fn buffer_mut(&mut self) -> &mut FrameBuffer {
        &mut self.buffer
    }

    pub fn direction(&self) -> Direction {
        self.buffer.direction()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<Link> {
    /// Create a frame reader for a [`Link`] and apply the read timeout.
    pub fn with_config_link(inner: Link, direction: Direction, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, direction, config))
    }
}

pub(crate) fn transport_to_frame_error(err: spine_transport::TransportError) -> FrameError {
    match err {
        spine_transport::TransportError::Io(io) | spine_transport::TransportError::Accept(io) => {
            FrameError::Io(io)
        }
        spine_transport::TransportError::Bind { source, .. }
        | spine_transport::TransportError::Connect { source, .. }
        | spine_transport::TransportError::Open { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BufMut;

    use super::*;
    use crate::catalog::MessageType;

    fn hello_h2b_frame() -> Vec<u8> {
        let mut payload = [0u8; 32];
        payload[..10].copy_from_slice(b"Hello H2B!");
        let mut wire = vec![0xAA, b'H', b'2', b'B', 0x64, 0x63, 32, 0];
        wire.extend_from_slice(&payload);
        wire.put_u32_le(checksum(&payload));
        wire
    }

    #[test]
    fn decodes_valid_text_frame() {
        let mut stream = Cursor::new(hello_h2b_frame());
        let mut buffer = FrameBuffer::new(Direction::HeadToBody);

        let frame = decode_frame(&mut stream, &mut buffer).unwrap();

        assert_eq!(frame.message_type, MessageType::DataCharacter);
        assert_eq!(frame.message_type.code(), 0x6364);
        assert_eq!(frame.payload_size, 32);
        assert_eq!(&buffer.payload()[..10], b"Hello H2B!");
        assert_eq!(buffer.frame_bytes(), hello_h2b_frame().as_slice());
    }

    #[test]
    fn unmapped_type_leaves_payload_unread() {
        let mut wire = hello_h2b_frame();
        wire[4] = 0x00;
        wire[5] = 0xFF;
        let mut stream = Cursor::new(wire);
        let mut buffer = FrameBuffer::new(Direction::HeadToBody);

        let result = decode_frame(&mut stream, &mut buffer);

        assert!(matches!(
            result,
            Err(FrameError::TypeOrSize {
                code: 0xFF00,
                declared: 32,
                expected: None,
                ..
            })
        ));
        assert_eq!(buffer.payload_size(), 0);
        assert_eq!(stream.position(), HEADER_SIZE as u64);
    }

    #[test]
    fn declared_size_must_match_catalog() {
        let mut wire = hello_h2b_frame();
        wire[6] = 31;
        let mut stream = Cursor::new(wire);
        let mut buffer = FrameBuffer::new(Direction::HeadToBody);

        let err = decode_frame(&mut stream, &mut buffer).unwrap_err();

        assert!(matches!(
            err,
            FrameError::TypeOrSize {
                declared: 31,
                expected: Some(32),
                ..
            }
        ));
        assert_eq!(stream.position(), HEADER_SIZE as u64);
    }

    #[test]
    fn type_from_other_direction_is_rejected() {
        // ack is only legal body-to-head.
        let mut wire = vec![0xAA, b'H', b'2', b'B', 0x61, 0x6B, 4, 0];
        wire.extend_from_slice(&[1, 0, 0, 0]);
        wire.put_u32_le(checksum(&[1, 0, 0, 0]));
        let mut buffer = FrameBuffer::new(Direction::HeadToBody);

        let err = decode_frame(&mut Cursor::new(wire), &mut buffer).unwrap_err();
        assert!(matches!(err, FrameError::TypeOrSize { expected: None, .. }));
    }

    #[test]
    fn bad_trailer_is_crc_error() {
        let mut wire = hello_h2b_frame();
        let len = wire.len();
        wire[len - 4..].copy_from_slice(&[1, 2, 3, 4]);
        let mut buffer = FrameBuffer::new(Direction::HeadToBody);

        let err = decode_frame(&mut Cursor::new(wire), &mut buffer).unwrap_err();

        assert!(matches!(
            err,
            FrameError::Crc {
                computed: 0x5C3F_FACD,
                received: 0x0403_0201
            }
        ));
        assert_eq!(buffer.payload_size(), 0);
    }

    #[test]
    fn any_flipped_payload_or_trailer_byte_fails_crc() {
        let wire = hello_h2b_frame();
        for idx in HEADER_SIZE..wire.len() {
            let mut corrupted = wire.clone();
            corrupted[idx] ^= 0x40;
            let mut buffer = FrameBuffer::new(Direction::HeadToBody);
            let err = decode_frame(&mut Cursor::new(corrupted), &mut buffer).unwrap_err();
            assert!(matches!(err, FrameError::Crc { .. }), "byte {idx}");
        }
    }

    #[test]
    fn sync_mismatch_fails_without_rescanning() {
        let mut wire = vec![0x00, 0x13];
        wire.extend_from_slice(&hello_h2b_frame());
        let mut stream = Cursor::new(wire);
        let mut buffer = FrameBuffer::new(Direction::HeadToBody);

        let err = decode_frame(&mut stream, &mut buffer).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Sync {
                position: 0,
                expected: 0xAA,
                found: 0x00
            }
        ));
        assert_eq!(stream.position(), 1, "only the offending byte is consumed");
    }

    #[test]
    fn wrong_direction_tag_fails_sync() {
        let mut wire = hello_h2b_frame();
        wire[1..4].copy_from_slice(b"B2H");
        let mut stream = Cursor::new(wire);
        let mut buffer = FrameBuffer::new(Direction::HeadToBody);

        let err = decode_frame(&mut stream, &mut buffer).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Sync {
                position: 1,
                expected: b'H',
                found: b'B'
            }
        ));
        assert_eq!(stream.position(), 2);
    }

    #[test]
    fn empty_payload_frame_decodes() {
        let mut buffer = FrameBuffer::new(Direction::HeadToBody);
        buffer.populate_header(MessageType::Shutdown).unwrap();
        buffer.seal();
        let wire = buffer.frame_bytes().to_vec();
        assert_eq!(wire.len(), HEADER_SIZE + TRAILER_SIZE);

        let mut rx = FrameBuffer::new(Direction::HeadToBody);
        let frame = decode_frame(&mut Cursor::new(wire), &mut rx).unwrap();
        assert_eq!(frame.message_type, MessageType::Shutdown);
        assert_eq!(frame.payload_size, 0);
    }

    #[test]
    fn truncated_stream_reports_connection_closed() {
        let wire = hello_h2b_frame();
        for cut in [0, 3, 6, HEADER_SIZE + 5, wire.len() - 1] {
            let mut buffer = FrameBuffer::new(Direction::HeadToBody);
            let err = decode_frame(&mut Cursor::new(wire[..cut].to_vec()), &mut buffer)
                .unwrap_err();
            assert!(matches!(err, FrameError::ConnectionClosed), "cut at {cut}");
        }
    }

    #[test]
    fn largest_frame_fits_buffer() {
        let mut tx = FrameBuffer::new(Direction::HeadToBody);
        let block: Vec<u8> = (0..1028u32).map(|i| (i % 251) as u8).collect();
        tx.encode(MessageType::UpdateFirmware, &block).unwrap();

        let mut reader = FrameReader::new(Cursor::new(tx.frame_bytes().to_vec()), Direction::HeadToBody);
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload_size, 1028);
        assert_eq!(reader.buffer().payload(), block.as_slice());
    }

    #[test]
    fn byte_at_a_time_stream() {
        let reader = ByteByByteReader {
            bytes: hello_h2b_frame(),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader, Direction::HeadToBody);
        let frame = framed.read_frame().unwrap();
        assert_eq!(frame.message_type, MessageType::DataCharacter);
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(hello_h2b_frame()),
        };
        let mut framed = FrameReader::new(reader, Direction::HeadToBody);
        let frame = framed.read_frame().unwrap();
        assert_eq!(frame.payload_size, 32);
    }

    #[test]
    fn would_block_propagates_io_error() {
        let mut framed = FrameReader::new(WouldBlockReader, Direction::BodyToHead);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
        assert!(!framed.read_frame().unwrap_err().is_invalid_frame());
    }

    #[test]
    fn read_next_valid_skips_garbage_and_bad_frames() {
        let good = hello_h2b_frame();
        let mut bad_crc = good.clone();
        let len = bad_crc.len();
        bad_crc[len - 1] ^= 0xFF;

        let mut wire = vec![0x55, 0x00, 0xAA, b'X'];
        wire.extend_from_slice(&bad_crc);
        wire.extend_from_slice(&good);

        let mut reader = FrameReader::new(Cursor::new(wire), Direction::HeadToBody);
        let (frame, skipped) = reader.read_next_valid().unwrap();

        assert_eq!(frame.message_type, MessageType::DataCharacter);
        assert_eq!(skipped, 4);
        assert_eq!(reader.buffer().frame_bytes(), good.as_slice());
        assert!(matches!(
            reader.read_next_valid(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn read_next_valid_resumes_after_rejected_header() {
        let good = hello_h2b_frame();
        let mut wire = b"\xAAH2B".to_vec();
        wire.extend_from_slice(&MessageType::Ack.code().to_le_bytes());
        wire.extend_from_slice(&0u16.to_le_bytes());
        wire.extend_from_slice(&good);

        let mut reader = FrameReader::new(Cursor::new(wire), Direction::HeadToBody);
        let (frame, skipped) = reader.read_next_valid().unwrap();

        assert_eq!(skipped, 1);
        assert_eq!(frame.message_type, MessageType::DataCharacter);
        assert_eq!(reader.buffer().frame_bytes(), good.as_slice());
    }

    #[test]
    fn consecutive_frames_reuse_buffer() {
        let mut tx = FrameBuffer::new(Direction::BodyToHead);
        let mut wire = Vec::new();
        tx.encode(MessageType::Ack, &7i32.to_le_bytes()).unwrap();
        wire.extend_from_slice(tx.frame_bytes());
        tx.build_text_message(b"booted").unwrap();
        wire.extend_from_slice(tx.frame_bytes());

        let mut reader = FrameReader::new(Cursor::new(wire), Direction::BodyToHead);
        let first = reader.read_frame().unwrap();
        assert_eq!(first.message_type, MessageType::Ack);
        assert_eq!(reader.buffer().payload(), &7i32.to_le_bytes());

        let second = reader.read_frame().unwrap();
        assert_eq!(second.message_type, MessageType::DataCharacter);
        assert_eq!(&reader.buffer().payload()[..7], b"booted\0");
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()), Direction::HeadToBody);
        assert_eq!(reader.direction(), Direction::HeadToBody);
        assert!(reader.config().read_timeout.is_none());
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _ = reader.buffer_mut();
        let _inner = reader.into_inner();
    }

    #[test]
    #[cfg(unix)]
    fn applies_read_timeout_for_link() {
        let dir = std::env::temp_dir().join(format!("spine-reader-timeout-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock = dir.join("rx.sock");
        let listener = spine_transport::UnixDomainSocket::bind(&sock).unwrap();
        let path = sock.clone();
        let client =
            std::thread::spawn(move || spine_transport::UnixDomainSocket::connect(path).unwrap());
        let link = listener.accept().unwrap();
        let _client = client.join().unwrap();

        let cfg = FrameConfig {
            read_timeout: Some(std::time::Duration::from_millis(20)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config_link(link, Direction::BodyToHead, cfg).unwrap();
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(_)));

        drop(listener);
        let _ = std::fs::remove_dir_all(&dir);
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    struct WouldBlockReader;

    impl Read for WouldBlockReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }
}
