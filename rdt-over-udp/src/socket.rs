//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket`, bound locally
//! and connected to exactly one peer.  All protocol logic lives elsewhere;
//! this module owns only byte I/O.  [`Transport`] is what an endpoint
//! actually talks through: the bare socket or the fault-injecting channel.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{ToSocketAddrs, UdpSocket};

use crate::simulator::UnreliableChannel;

/// Largest datagram the receive loop will read.
pub const MAX_DATAGRAM: usize = 65_535;

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// An async, connected UDP socket.
///
/// All methods are `&self` so the socket can be shared between the caller's
/// `send` and the worker's receive loop.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `host:port`.
    ///
    /// Passing port `0` lets the OS choose an ephemeral port.
    pub async fn bind(host: &str, port: u16) -> io::Result<Self> {
        let inner = UdpSocket::bind((host, port)).await?;
        let local_addr = inner.local_addr()?;
        log::trace!("[socket] bound {local_addr}");
        Ok(Self { local_addr, inner })
    }

    /// Restrict sends and receives to a single peer.
    pub async fn connect(&self, peer: impl ToSocketAddrs) -> io::Result<()> {
        self.inner.connect(peer).await?;
        log::trace!("[socket] {} connected to {:?}", self.local_addr, self.inner.peer_addr().ok());
        Ok(())
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.inner.peer_addr()
    }

    /// Send `datagram` to the connected peer.
    pub async fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        let n = self.inner.send(datagram).await?;
        log::trace!("[socket] → {:02x?}", datagram);
        Ok(n)
    }

    /// Wait up to `wait` for one datagram.
    ///
    /// Returns `Ok(None)` when nothing arrived in time; a timeout is not an
    /// error.
    pub async fn recv_timeout(&self, buf: &mut [u8], wait: Duration) -> io::Result<Option<usize>> {
        match tokio::time::timeout(wait, self.inner.recv(buf)).await {
            Ok(Ok(n)) => {
                log::trace!("[socket] ← {:02x?}", &buf[..n]);
                Ok(Some(n))
            }
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// The byte pipe an endpoint sends and receives through.
#[derive(Debug)]
pub enum Transport {
    /// The socket as-is.
    Direct(Socket),
    /// The socket behind a fault model.
    Unreliable(UnreliableChannel),
}

impl Transport {
    pub fn local_addr(&self) -> SocketAddr {
        match self {
            Self::Direct(socket) => socket.local_addr(),
            Self::Unreliable(channel) => channel.local_addr(),
        }
    }

    pub async fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        match self {
            Self::Direct(socket) => socket.send(datagram).await,
            Self::Unreliable(channel) => channel.send(datagram).await,
        }
    }

    pub async fn recv_timeout(&self, buf: &mut [u8], wait: Duration) -> io::Result<Option<usize>> {
        match self {
            Self::Direct(socket) => socket.recv_timeout(buf, wait).await,
            Self::Unreliable(channel) => channel.recv_timeout(buf, wait).await,
        }
    }
}

impl From<Socket> for Transport {
    fn from(socket: Socket) -> Self {
        Self::Direct(socket)
    }
}

impl From<UnreliableChannel> for Transport {
    fn from(channel: UnreliableChannel) -> Self {
        Self::Unreliable(channel)
    }
}
