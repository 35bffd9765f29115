//! UDP broadcast responder.
//!
//! Unconfigured devices broadcast a probe on the discovery port; the hub
//! answers unicast with the address and TCP port of the onboarding
//! listener. Uses SO_REUSEPORT to allow concurrent operation with other
//! listeners.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::HubError;
use crate::protocol::DiscoveryReply;

/// Default UDP discovery port
pub const DISCOVERY_PORT: u16 = 15555;

/// Timeout for UDP receive - bounds how long a stop request goes unnoticed
const RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);

/// Create a UDP socket with SO_REUSEPORT and broadcast reception enabled.
pub fn create_discovery_socket(port: u16) -> Result<std::net::UdpSocket, std::io::Error> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_reuse_address(true)?;

    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    socket.set_broadcast(true)?;

    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse().unwrap();
    socket.bind(&addr.into())?;

    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

/// Resolve the host's routable address on the local network.
///
/// Dials a non-routable address to learn the outbound interface; no packet
/// leaves the host. Falls back to loopback when the dial fails.
pub fn local_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0")?;
        socket.connect("192.255.255.255:1")?;
        Ok(socket.local_addr()?.ip())
    };

    probe().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// UDP responder that points unconfigured devices at the onboarding
/// listener.
pub struct BroadcastResponder {
    socket: UdpSocket,
    tcp_port: u16,
}

impl BroadcastResponder {
    /// Bind the responder to the given UDP port. `tcp_port` is the
    /// onboarding listener's port named in every reply.
    pub async fn bind(port: u16, tcp_port: u16) -> Result<Self, HubError> {
        let std_socket = create_discovery_socket(port)?;
        let socket = UdpSocket::from_std(std_socket)?;
        info!("UDP discovery responder listening on port {}", port);

        Ok(Self { socket, tcp_port })
    }

    /// Port the responder is bound to.
    pub fn local_port(&self) -> std::io::Result<u16> {
        Ok(self.socket.local_addr()?.port())
    }

    /// Run until `stop` is cancelled.
    ///
    /// Any datagram, regardless of content, gets a unicast reply naming the
    /// onboarding endpoint. The stop token is re-checked after every receive
    /// timeout, so cancellation is observed within one interval.
    pub async fn run(&self, stop: CancellationToken) -> Result<(), HubError> {
        let mut buf = vec![0u8; 1024];

        loop {
            if stop.is_cancelled() {
                info!("discovery responder stopped");
                return Ok(());
            }

            match timeout(RECEIVE_TIMEOUT, self.socket.recv_from(&mut buf)).await {
                Ok(Ok((len, addr))) => {
                    info!("discovery probe from {} ({} bytes)", addr, len);
                    self.reply(addr).await;
                }
                Ok(Err(e)) => {
                    warn!("UDP receive error: {}", e);
                }
                Err(_) => {
                    // Timeout - loop back to the stop check
                }
            }
        }
    }

    async fn reply(&self, addr: SocketAddr) {
        let reply = DiscoveryReply {
            ip: local_ip().to_string(),
            port: self.tcp_port,
        };

        let payload = match serde_json::to_vec(&reply) {
            Ok(payload) => payload,
            Err(e) => {
                error!("could not serialize discovery reply: {}", e);
                return;
            }
        };

        if let Err(e) = self.socket.send_to(&payload, addr).await {
            warn!("discovery reply to {} failed: {}", addr, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_any_datagram_gets_the_onboarding_endpoint() {
        let responder = BroadcastResponder::bind(0, 12222).await.unwrap();
        let port = responder.local_port().unwrap();

        let stop = CancellationToken::new();
        let token = stop.clone();
        let handle = tokio::spawn(async move { responder.run(token).await });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(b"anything at all", ("127.0.0.1", port))
            .await
            .unwrap();

        let mut buf = vec![0u8; 1024];
        let (len, _) = timeout(Duration::from_secs(5), client.recv_from(&mut buf))
            .await
            .expect("no discovery reply")
            .unwrap();

        let reply: DiscoveryReply = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(reply.port, 12222);
        assert!(!reply.ip.is_empty());

        stop.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_stop_is_observed_within_one_interval() {
        let responder = BroadcastResponder::bind(0, 12222).await.unwrap();

        let stop = CancellationToken::new();
        let token = stop.clone();
        let handle = tokio::spawn(async move { responder.run(token).await });

        stop.cancel();

        timeout(RECEIVE_TIMEOUT + Duration::from_secs(1), handle)
            .await
            .expect("responder did not stop within one receive timeout")
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_local_ip_is_not_unspecified() {
        let ip = local_ip();
        assert!(!ip.is_unspecified());
    }
}
