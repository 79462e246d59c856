use crate::storage::types::NodeId;
use crate::wire::MAX_DATAGRAM;
use anyhow::{Result, bail};
use std::net::SocketAddr;
use tokio::net::{UdpSocket, lookup_host};

/// Connectionless datagram transport shared by membership and the file plane.
///
/// Every frame is a one-byte message kind followed by the body; a whole frame
/// must fit in a single datagram of at most [`MAX_DATAGRAM`] bytes. Sends are
/// best-effort with no per-message reliability; loss is observed only as
/// timeouts at the request layer.
pub struct UdpTransport {
    socket: UdpSocket,
    drop_rate: f32,
}

impl UdpTransport {
    /// Binds the shared socket. `drop_rate` is the ingress drop probability
    /// for fault-injection testing and defaults to zero in production.
    pub async fn bind(addr: &str, drop_rate: f32) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        if drop_rate > 0.0 {
            tracing::warn!("fault injection active: dropping {:.0}% of inbound datagrams", drop_rate * 100.0);
        }
        Ok(Self { socket, drop_rate })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Sends one framed message. Fails if the frame cannot fit one datagram.
    pub async fn send(&self, kind: u8, body: &[u8], dest: SocketAddr) -> Result<()> {
        if body.len() + 1 > MAX_DATAGRAM {
            bail!(
                "message kind {} is {} bytes, exceeding the {} byte datagram limit",
                kind,
                body.len() + 1,
                MAX_DATAGRAM
            );
        }
        let mut frame = Vec::with_capacity(body.len() + 1);
        frame.push(kind);
        frame.extend_from_slice(body);
        self.socket.send_to(&frame, dest).await?;
        Ok(())
    }

    pub async fn send_to_node(&self, kind: u8, body: &[u8], node: &NodeId) -> Result<()> {
        let dest = self.resolve(&node.host, node.port).await?;
        self.send(kind, body, dest).await
    }

    pub async fn resolve(&self, host: &str, port: u16) -> Result<SocketAddr> {
        lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| anyhow::anyhow!("no address for {}:{}", host, port))
    }

    /// Reads one whole datagram into `buf` and returns its kind byte, total
    /// length and sender. Returns `None` when the datagram was empty or was
    /// discarded by fault injection.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<Option<(u8, usize, SocketAddr)>> {
        let (len, src) = self.socket.recv_from(buf).await?;
        if len == 0 {
            return Ok(None);
        }
        if self.drop_rate > 0.0 && rand::random::<f32>() < self.drop_rate {
            tracing::debug!("dropped inbound datagram from {} (fault injection)", src);
            return Ok(None);
        }
        Ok(Some((buf[0], len, src)))
    }
}
