//! Plain UDP transport
//!
//! Sends unencrypted, uncompressed datagrams and matches replies to requests
//! by tag. Replies carrying a stale tag (answers to requests that already
//! timed out) are discarded.

use crate::protocol::MAX_PACKET_SIZE;
use crate::protocol::error::{ProtocolError, Result};
use crate::protocol::reply::Reply;
use crate::protocol::transport::{ApiTransport, ParamMap};
use async_trait::async_trait;
use log::{debug, trace};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use tokio::net::{UdpSocket, lookup_host};
use tokio::sync::Mutex;

/// UDP transport wrapper with protocol-specific functionality
pub struct UdpTransport {
    socket: UdpSocket,
    counter: AtomicU16,
    /// One exchange on the socket at a time
    exchange: Mutex<()>,
}

impl UdpTransport {
    /// Binds an ephemeral local port and connects it to `server:port`
    pub async fn connect(server: &str, port: u16) -> Result<Self> {
        let server_addr = lookup_host((server, port))
            .await?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| ProtocolError::invalid_reply(format!("cannot resolve {server}")))?;
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(server_addr).await?;
        debug!("UDP transport connected to {server_addr}");

        Ok(Self {
            socket,
            counter: AtomicU16::new(0),
            exchange: Mutex::new(()),
        })
    }

    fn next_tag(&self) -> String {
        format!("T{}", self.counter.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the local address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait]
impl ApiTransport for UdpTransport {
    async fn send(&self, command: &str, params: &ParamMap) -> Result<Reply> {
        let _exchange = self.exchange.lock().await;

        let tag = self.next_tag();
        let params = params.clone().with("tag", &tag);
        let packet = format!("{command} {}", params.encode());
        if packet.len() > MAX_PACKET_SIZE {
            return Err(ProtocolError::invalid_reply(format!(
                "request of {} bytes exceeds maximum {MAX_PACKET_SIZE}",
                packet.len()
            )));
        }
        self.socket.send(packet.as_bytes()).await?;

        let mut buffer = vec![0u8; MAX_PACKET_SIZE];
        loop {
            let size = self.socket.recv(&mut buffer).await?;
            if size == 0 {
                continue;
            }
            let raw = String::from_utf8_lossy(&buffer[..size]);
            let mut reply = match Reply::parse(&raw) {
                Ok(reply) => reply,
                Err(e) => {
                    trace!("Dropping unparseable datagram: {e}");
                    continue;
                }
            };
            if reply.tag != tag {
                trace!("Dropping reply for stale tag {}", reply.tag);
                continue;
            }
            reply.truncated = size == MAX_PACKET_SIZE;
            return Ok(reply);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_against_local_server() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();

        let transport = UdpTransport::connect("127.0.0.1", port).await.unwrap();

        let echo = tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_PACKET_SIZE];
            let (n, peer) = server.recv_from(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            assert!(request.starts_with("ANIME aid=1&tag=T0"));
            // A late reply for an older request comes first and must be skipped
            server.send_to(b"T99 330 NO SUCH ANIME", peer).await.unwrap();
            server
                .send_to(b"T0 230 ANIME\n1|12\n", peer)
                .await
                .unwrap();
        });

        let reply = transport
            .send("ANIME", &ParamMap::new().with("aid", 1))
            .await
            .unwrap();
        echo.await.unwrap();

        assert_eq!(reply.code, 230);
        assert_eq!(reply.fields().int(1), 12);
        assert!(!reply.truncated);
    }
}
