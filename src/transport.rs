//! TCP stream adapter for the protocol layer.
//!
//! Resolves a host, picks an address matching the configured family,
//! connects and exposes the byte stream plus a receive-timeout setting.
//! Construction failures are fatal for the given inputs; reconnection
//! policy belongs to the recovery coordinator, not here. Entirely
//! orthogonal to tag translation.

use std::fmt;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::TransportConfig;
use crate::error::Transience;

/// Which address family to accept from resolution results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddrFamily {
    V4,
    V6,
}

impl AddrFamily {
    fn matches(self, addr: &SocketAddr) -> bool {
        match self {
            AddrFamily::V4 => addr.is_ipv4(),
            AddrFamily::V6 => addr.is_ipv6(),
        }
    }
}

impl fmt::Display for AddrFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddrFamily::V4 => write!(f, "ipv4"),
            AddrFamily::V6 => write!(f, "ipv6"),
        }
    }
}

/// A connected duplex stream to the broker.
pub struct TcpStreamAdapter {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpStreamAdapter {
    /// Resolve `host`, connect to the first address of the configured
    /// family, and apply the configured receive timeout.
    pub fn connect(
        host: &str,
        port: u16,
        config: &TransportConfig,
    ) -> Result<Self, TransportError> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                host: host.to_string(),
                source,
            })?;

        let addr = addrs
            .into_iter()
            .find(|addr| config.prefer.matches(addr))
            .ok_or_else(|| TransportError::NoMatchingAddress {
                host: host.to_string(),
                family: config.prefer,
            })?;

        let stream = match config.connect_timeout() {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        }
        .map_err(|source| TransportError::Connect { addr, source })?;

        stream.set_read_timeout(config.receive_timeout())?;

        debug!(%addr, "transport connected");
        Ok(Self { stream, peer: addr })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    pub fn receive_timeout(&self) -> Result<Option<Duration>, TransportError> {
        Ok(self.stream.read_timeout()?)
    }

    pub fn set_receive_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        Ok(self.stream.set_read_timeout(timeout)?)
    }

    pub fn close(self) -> Result<(), TransportError> {
        Ok(self.stream.shutdown(Shutdown::Both)?)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to resolve {host}")]
    Resolve { host: String, source: io::Error },
    #[error("no {family} address resolved for {host}")]
    NoMatchingAddress { host: String, family: AddrFamily },
    #[error("failed to connect to {addr}")]
    Connect { addr: SocketAddr, source: io::Error },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TransportError {
    pub fn transience(&self) -> Transience {
        match self {
            TransportError::Resolve { .. } => Transience::Unknown,
            TransportError::NoMatchingAddress { .. } => Transience::Permanent,
            TransportError::Connect { .. } => Transience::Retryable,
            TransportError::Io(_) => Transience::Unknown,
        }
    }
}
