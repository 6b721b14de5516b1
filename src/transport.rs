// src/transport.rs - UDP query/command link to the simulator host
//
// The link is a strict request/response alternation: one request out, block
// for the reply (or three replies for a vector), nothing pipelined. The
// session opens with the host pinging this process; the ping is echoed back
// and its source becomes the peer for the rest of the session.
use crate::config::LinkConfig;
use crate::geometry::{Vector3, NUM_AXES};
use crate::protocol::{self, ProtocolError, Request};
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Duration, Instant};

/// Max length of one datagram payload.
pub const MAX_DATAGRAM: usize = 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out after {0:?} waiting for the host")]
    Timeout(Duration),
    #[error("{0}")]
    Protocol(#[from] ProtocolError),
    #[error("no host connected; handshake has not completed")]
    NotConnected,
    #[error("invalid server address {0:?}")]
    BadAddress(String),
}

/// Synchronous-style exchange with the host: send one request, decode one
/// typed reply. The navigation core only ever talks through this trait, so
/// tests can substitute a scripted link for the socket.
#[async_trait]
pub trait QueryLink: Send {
    /// Request answered by a single scalar.
    async fn scalar(&mut self, request: Request) -> Result<f64, TransportError>;

    /// Request answered by three scalars in sequence (x, y, z).
    async fn vector(&mut self, request: Request) -> Result<Vector3, TransportError>;
}

/// Datagram link bound to a local port, talking to one host at a time.
pub struct UdpLink {
    socket: UdpSocket,
    server_ip: IpAddr,
    peer: Option<SocketAddr>,
    reply_timeout: Duration,
    buf: Vec<u8>,
}

impl UdpLink {
    /// Bind the configured port. The server address must be present in the
    /// effective configuration; starting without one is an error.
    pub async fn bind(config: &LinkConfig) -> Result<Self, TransportError> {
        let server = config
            .server
            .as_deref()
            .ok_or_else(|| TransportError::BadAddress("<missing>".to_string()))?;
        let server_ip: IpAddr = server
            .parse()
            .map_err(|_| TransportError::BadAddress(server.to_string()))?;
        let socket = UdpSocket::bind(("0.0.0.0", config.port)).await?;
        tracing::info!(local = %socket.local_addr()?, server = %server_ip, "link bound");
        Ok(Self {
            socket,
            server_ip,
            peer: None,
            reply_timeout: Duration::from_millis(config.reply_timeout_ms),
            buf: vec![0; MAX_DATAGRAM],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    /// Wait for the host to open the session with a ping and echo it back.
    /// Datagrams from other addresses are ignored. Completing the handshake
    /// locks the link onto the pinging peer.
    pub async fn await_handshake(&mut self, window: Duration) -> Result<(), TransportError> {
        let deadline = Instant::now() + window;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout(window));
            }
            let received = timeout(remaining, self.socket.recv_from(&mut self.buf)).await;
            let (len, addr) = match received {
                Ok(io_result) => io_result?,
                Err(_) => return Err(TransportError::Timeout(window)),
            };
            if addr.ip() != self.server_ip {
                tracing::debug!(from = %addr, "ignoring datagram from unknown address");
                continue;
            }
            self.socket.send_to(&self.buf[..len], addr).await?;
            self.peer = Some(addr);
            tracing::info!(host = %addr, "host connected, ping returned");
            return Ok(());
        }
    }

    /// Drop the current peer; the next session must handshake again.
    pub fn disconnect(&mut self) {
        self.peer = None;
    }

    async fn send_request(&self, request: &Request) -> Result<(), TransportError> {
        let peer = self.peer.ok_or(TransportError::NotConnected)?;
        let bytes = request.to_bytes()?;
        tracing::trace!(operation = %request.operation, detail = request.detail_value(), "query out");
        self.socket.send_to(&bytes, peer).await?;
        Ok(())
    }

    async fn recv_payload(&mut self) -> Result<String, TransportError> {
        let peer = self.peer.ok_or(TransportError::NotConnected)?;
        loop {
            let received = timeout(self.reply_timeout, self.socket.recv_from(&mut self.buf)).await;
            let (len, addr) = match received {
                Ok(io_result) => io_result?,
                Err(_) => return Err(TransportError::Timeout(self.reply_timeout)),
            };
            if addr != peer {
                tracing::debug!(from = %addr, "ignoring stray datagram");
                continue;
            }
            return Ok(String::from_utf8_lossy(&self.buf[..len]).into_owned());
        }
    }
}

#[async_trait]
impl QueryLink for UdpLink {
    async fn scalar(&mut self, request: Request) -> Result<f64, TransportError> {
        self.send_request(&request).await?;
        let payload = self.recv_payload().await?;
        Ok(protocol::decode_scalar(&payload)?)
    }

    async fn vector(&mut self, request: Request) -> Result<Vector3, TransportError> {
        self.send_request(&request).await?;
        let mut result = Vector3::zero();
        for axis in 0..NUM_AXES {
            let payload = self.recv_payload().await?;
            result[axis] = protocol::decode_scalar(&payload)?;
        }
        Ok(result)
    }
}
