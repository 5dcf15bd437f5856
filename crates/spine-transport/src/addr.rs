use std::fmt;
use std::fs::OpenOptions;
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::link::Link;

/// How a file-backed link is opened.
///
/// Sockets and stdio are always bidirectional; the mode only matters for
/// `file:` links, where a capture is replayed (`Read`) or recorded (`Write`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
}

/// Where a board link lives.
///
/// Parsed from strings of the form:
///
/// ```text
/// unix:/run/body.sock         connect to a Unix domain socket
/// unix-listen:/run/body.sock  listen and accept a single connection
/// tcp:127.0.0.1:7000          connect over TCP
/// tcp-listen:0.0.0.0:7000     listen and accept a single connection
/// file:/tmp/capture.bin       replay or record a raw byte capture
/// -                           stdin / stdout
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAddr {
    Unix(PathBuf),
    UnixListen(PathBuf),
    Tcp(String),
    TcpListen(String),
    File(PathBuf),
    Stdio,
}

impl LinkAddr {
    /// Open the link, blocking until a peer connects for listening addresses.
    pub fn open(&self, mode: OpenMode) -> Result<Link> {
        match self {
            #[cfg(unix)]
            LinkAddr::Unix(path) => crate::uds::UnixDomainSocket::connect(path),
            #[cfg(unix)]
            LinkAddr::UnixListen(path) => {
                let socket = crate::uds::UnixDomainSocket::bind(path)?;
                socket.accept()
            }
            #[cfg(not(unix))]
            LinkAddr::Unix(path) | LinkAddr::UnixListen(path) => Err(TransportError::Connect {
                addr: path.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix domain sockets are not available on this platform",
                ),
            }),
            LinkAddr::Tcp(addr) => {
                let stream = TcpStream::connect(addr).map_err(|source| TransportError::Connect {
                    addr: addr.clone(),
                    source,
                })?;
                stream.set_nodelay(true)?;
                debug!(%addr, "connected to board link");
                Ok(Link::from_tcp(stream))
            }
            LinkAddr::TcpListen(addr) => {
                let listener = TcpListener::bind(addr).map_err(|source| TransportError::Bind {
                    addr: addr.clone(),
                    source,
                })?;
                info!(%addr, "listening for board link");
                let (stream, peer) = listener.accept().map_err(TransportError::Accept)?;
                stream.set_nodelay(true)?;
                debug!(%peer, "accepted board link");
                Ok(Link::from_tcp(stream))
            }
            LinkAddr::File(path) => {
                let mut options = OpenOptions::new();
                match mode {
                    OpenMode::Read => options.read(true),
                    OpenMode::Write => options.write(true).create(true).truncate(true),
                    OpenMode::ReadWrite => options.read(true).write(true).create(true),
                };
                let file = options.open(path).map_err(|source| TransportError::Open {
                    path: path.clone(),
                    source,
                })?;
                debug!(?path, ?mode, "opened capture file link");
                Ok(Link::from_file(file))
            }
            LinkAddr::Stdio => Ok(Link::stdio()),
        }
    }
}

impl FromStr for LinkAddr {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self> {
        let input = input.trim();
        if input == "-" {
            return Ok(LinkAddr::Stdio);
        }

        let Some((scheme, rest)) = input.split_once(':') else {
            return Err(TransportError::InvalidAddress(input.to_string()));
        };
        if rest.is_empty() {
            return Err(TransportError::InvalidAddress(input.to_string()));
        }

        match scheme {
            "unix" => Ok(LinkAddr::Unix(PathBuf::from(rest))),
            "unix-listen" => Ok(LinkAddr::UnixListen(PathBuf::from(rest))),
            "tcp" => Ok(LinkAddr::Tcp(rest.to_string())),
            "tcp-listen" => Ok(LinkAddr::TcpListen(rest.to_string())),
            "file" => Ok(LinkAddr::File(PathBuf::from(rest))),
            _ => Err(TransportError::InvalidAddress(input.to_string())),
        }
    }
}

impl fmt::Display for LinkAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkAddr::Unix(path) => write!(f, "unix:{}", path.display()),
            LinkAddr::UnixListen(path) => write!(f, "unix-listen:{}", path.display()),
            LinkAddr::Tcp(addr) => write!(f, "tcp:{addr}"),
            LinkAddr::TcpListen(addr) => write!(f, "tcp-listen:{addr}"),
            LinkAddr::File(path) => write!(f, "file:{}", path.display()),
            LinkAddr::Stdio => f.write_str("-"),
        }
    }
}
