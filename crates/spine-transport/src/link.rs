use std::fs::File;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::error::Result;

/// A connected board link. Implements `Read` and `Write`.
///
/// This is the fundamental I/O type returned by [`crate::LinkAddr::open`].
/// Reads block until bytes arrive or the peer closes the stream.
pub struct Link {
    inner: LinkInner,
}

enum LinkInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Tcp(TcpStream),
    File(File),
    Stdio,
}

impl Read for Link {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkInner::Unix(stream) => stream.read(buf),
            LinkInner::Tcp(stream) => stream.read(buf),
            LinkInner::File(file) => file.read(buf),
            LinkInner::Stdio => std::io::stdin().lock().read(buf),
        }
    }
}

impl Write for Link {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkInner::Unix(stream) => stream.write(buf),
            LinkInner::Tcp(stream) => stream.write(buf),
            LinkInner::File(file) => file.write(buf),
            LinkInner::Stdio => std::io::stdout().lock().write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkInner::Unix(stream) => stream.flush(),
            LinkInner::Tcp(stream) => stream.flush(),
            LinkInner::File(file) => file.flush(),
            LinkInner::Stdio => std::io::stdout().lock().flush(),
        }
    }
}

impl Link {
    /// Create a link from a Unix domain socket stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: LinkInner::Unix(stream),
        }
    }

    /// Create a link from a TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: LinkInner::Tcp(stream),
        }
    }

    /// Create a link over an open file (capture replay or capture output).
    pub fn from_file(file: File) -> Self {
        Self {
            inner: LinkInner::File(file),
        }
    }

    /// Create a link that reads stdin and writes stdout.
    pub fn stdio() -> Self {
        Self {
            inner: LinkInner::Stdio,
        }
    }

    /// Set read timeout on the underlying stream.
    ///
    /// Files and stdio have no timeout; the call is accepted and ignored.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            LinkInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            LinkInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            LinkInner::File(_) | LinkInner::Stdio => {
                debug!(kind = self.kind(), "read timeout not supported, ignoring");
                Ok(())
            }
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            LinkInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            LinkInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            LinkInner::File(_) | LinkInner::Stdio => {
                debug!(kind = self.kind(), "write timeout not supported, ignoring");
                Ok(())
            }
        }
    }

    /// Try to clone this link (creates a new descriptor).
    ///
    /// A bidirectional relay reads one direction and writes the other on the
    /// same link, so each direction gets its own handle.
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            #[cfg(unix)]
            LinkInner::Unix(stream) => LinkInner::Unix(stream.try_clone()?),
            LinkInner::Tcp(stream) => LinkInner::Tcp(stream.try_clone()?),
            LinkInner::File(file) => LinkInner::File(file.try_clone()?),
            LinkInner::Stdio => LinkInner::Stdio,
        };
        Ok(Self { inner })
    }

    /// Shut down both halves of a socket link.
    ///
    /// Every handle cloned from this link sees the shutdown, so a read
    /// blocked on another thread returns end of stream. Files and stdio
    /// cannot be shut down; the call is accepted and ignored.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            LinkInner::Unix(stream) => stream.shutdown(Shutdown::Both).map_err(Into::into),
            LinkInner::Tcp(stream) => stream.shutdown(Shutdown::Both).map_err(Into::into),
            LinkInner::File(_) | LinkInner::Stdio => {
                debug!(kind = self.kind(), "shutdown not supported, ignoring");
                Ok(())
            }
        }
    }

    /// Short name of the link kind for diagnostics.
    pub fn kind(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            LinkInner::Unix(_) => "unix",
            LinkInner::Tcp(_) => "tcp",
            LinkInner::File(_) => "file",
            LinkInner::Stdio => "stdio",
        }
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").field("type", &self.kind()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Seek, SeekFrom, Write};

    use super::*;

    fn temp_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("spine-link-{tag}-{}", std::process::id()))
    }

    #[test]
    fn file_link_roundtrip() {
        let path = temp_path("roundtrip");
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .unwrap();
        let mut link = Link::from_file(file);

        link.write_all(&[0xAA, b'B', b'2', b'H']).unwrap();
        link.flush().unwrap();

        let mut reader = link.try_clone().unwrap();
        if let LinkInner::File(file) = &mut reader.inner {
            file.seek(SeekFrom::Start(0)).unwrap();
        }
        let mut bytes = [0u8; 4];
        reader.read_exact(&mut bytes).unwrap();
        assert_eq!(bytes, [0xAA, b'B', b'2', b'H']);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn file_link_ignores_timeouts() {
        let path = temp_path("timeouts");
        let file = std::fs::File::create(&path).unwrap();
        let link = Link::from_file(file);

        assert!(link.set_read_timeout(Some(Duration::from_millis(5))).is_ok());
        assert!(link.set_write_timeout(None).is_ok());
        assert_eq!(link.kind(), "file");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    #[cfg(unix)]
    fn unix_pair_link_clone_shares_stream() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut left = Link::from_unix(left);
        let right = Link::from_unix(right);
        let mut right_clone = right.try_clone().unwrap();

        left.write_all(b"B2H").unwrap();
        let mut bytes = [0u8; 3];
        right_clone.read_exact(&mut bytes).unwrap();
        assert_eq!(&bytes, b"B2H");
        assert_eq!(format!("{right:?}"), "Link { type: \"unix\" }");
    }

    #[test]
    #[cfg(unix)]
    fn shutdown_wakes_blocked_reader_on_clone() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let link = Link::from_unix(left);
        let mut reader = link.try_clone().unwrap();

        let blocked = std::thread::spawn(move || {
            let mut byte = [0u8; 1];
            reader.read(&mut byte).unwrap()
        });
        std::thread::sleep(Duration::from_millis(50));
        link.shutdown().unwrap();

        assert_eq!(blocked.join().unwrap(), 0);
    }

    #[test]
    fn file_link_ignores_shutdown() {
        let path = temp_path("shutdown");
        let link = Link::from_file(std::fs::File::create(&path).unwrap());
        assert!(link.shutdown().is_ok());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn tcp_link_roundtrip() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::thread::spawn(move || {
            let mut link = Link::from_tcp(TcpStream::connect(addr).unwrap());
            link.write_all(b"H2B").unwrap();
        });

        let (stream, _) = listener.accept().unwrap();
        let mut link = Link::from_tcp(stream);
        link.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut bytes = [0u8; 3];
        link.read_exact(&mut bytes).unwrap();
        assert_eq!(&bytes, b"H2B");
        assert_eq!(link.kind(), "tcp");

        client.join().unwrap();
    }
}
