//! Relay endpoint addressing.
//!
//! One configuration string selects the transport:
//!
//! ```text
//! unix:/run/hotline.sock    Unix-domain stream socket
//! /run/hotline.sock         Unix-domain stream socket (any string with '/')
//! relay.local:9192          TCP
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::constants::MAX_SOCKET_PATH;

/// Why an endpoint string was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    /// The string is neither a socket path nor `host:port`.
    #[error("unknown socket configuration: {0}")]
    Unrecognized(String),

    /// The Unix socket path does not fit `sun_path`.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        /// The offending path.
        path: String,
        /// Its length in bytes.
        len: usize,
        /// Maximum length in bytes.
        max: usize,
    },

    /// The host part is empty or longer than a socket path slot.
    #[error("invalid host in {0}")]
    InvalidHost(String),

    /// The port is not a number in `1..=65535`.
    #[error("invalid port in {0}")]
    InvalidPort(String),
}

/// Parsed relay address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Unix-domain stream socket at a filesystem path.
    Unix(PathBuf),
    /// TCP socket.
    Tcp {
        /// Host name or address literal.
        host: String,
        /// Port number.
        port: u16,
    },
}

fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn unix_endpoint(path: &str) -> Result<Endpoint, EndpointError> {
    if path.is_empty() {
        return Err(EndpointError::Unrecognized(path.to_owned()));
    }
    if path.len() > MAX_SOCKET_PATH {
        return Err(EndpointError::PathTooLong {
            path: path.to_owned(),
            len: path.len(),
            max: MAX_SOCKET_PATH,
        });
    }
    Ok(Endpoint::Unix(PathBuf::from(path)))
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(path) = s.strip_prefix("unix:") {
            return unix_endpoint(path);
        }
        if s.contains('/') {
            return unix_endpoint(s);
        }

        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| EndpointError::Unrecognized(s.to_owned()))?;
        if host.is_empty() || host.len() > MAX_SOCKET_PATH || !host.chars().all(is_host_char) {
            return Err(EndpointError::InvalidHost(s.to_owned()));
        }
        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return Err(EndpointError::InvalidPort(s.to_owned()));
        }
        let port: u16 = port
            .parse()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| EndpointError::InvalidPort(s.to_owned()))?;

        Ok(Self::Tcp { host: host.to_owned(), port })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp { host, port } => write!(f, "{host}:{port}"),
        }
    }
}
