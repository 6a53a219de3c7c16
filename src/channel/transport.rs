//! Byte stream to the relay: Unix-domain or TCP.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;

use super::endpoint::Endpoint;

/// Connected relay stream.
#[derive(Debug)]
pub enum Transport {
    /// Unix-domain stream socket.
    Unix(UnixStream),
    /// TCP socket.
    Tcp(TcpStream),
}

impl Transport {
    /// Connect to `endpoint`.
    pub fn connect(endpoint: &Endpoint) -> io::Result<Self> {
        match endpoint {
            Endpoint::Unix(path) => {
                let stream = UnixStream::connect(path)?;
                log::debug!("[channel] connected to Unix socket {}", path.display());
                Ok(Self::Unix(stream))
            }
            Endpoint::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port))?;
                // Frames are assembled whole before writing.
                stream.set_nodelay(true)?;
                log::debug!("[channel] connected to {host}:{port} at [{}]", stream.as_raw_fd());
                Ok(Self::Tcp(stream))
            }
        }
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Unix(s) => s.read(buf),
            Self::Tcp(s) => s.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Unix(s) => s.write(buf),
            Self::Tcp(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Unix(s) => s.flush(),
            Self::Tcp(s) => s.flush(),
        }
    }
}

impl AsRawFd for Transport {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            Self::Unix(s) => s.as_raw_fd(),
            Self::Tcp(s) => s.as_raw_fd(),
        }
    }
}
