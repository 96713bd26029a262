use bytes::BytesMut;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Instant;

/// Address family of a datagram endpoint
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// IPv4
    V4,
    /// IPv6
    V6,
}

impl From<&SocketAddr> for AddressFamily {
    fn from(addr: &SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(_) => AddressFamily::V4,
            SocketAddr::V6(_) => AddressFamily::V6,
        }
    }
}

/// Transport Context of a UDP datagram: the local socket it was received on
/// (or sent from) and the remote endpoint.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportContext {
    /// Local socket address, either IPv4 or IPv6
    pub local_addr: SocketAddr,
    /// Peer socket address, either IPv4 or IPv6. For outbound datagrams
    /// this is the destination.
    pub peer_addr: SocketAddr,
}

impl Default for TransportContext {
    fn default() -> Self {
        Self {
            local_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            peer_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        }
    }
}

impl TransportContext {
    /// Family of the peer (destination) address
    pub fn peer_family(&self) -> AddressFamily {
        AddressFamily::from(&self.peer_addr)
    }
}

/// A generic transmit with [TransportContext]
#[derive(Debug, Clone)]
pub struct TransportMessage<T> {
    /// Received/Sent time
    pub now: Instant,
    /// A transport context with [local_addr](TransportContext::local_addr) and [peer_addr](TransportContext::peer_addr)
    pub transport: TransportContext,
    /// Message body with generic type
    pub message: T,
}

/// BytesMut type transmit with [TransportContext]
pub type TaggedBytesMut = TransportMessage<BytesMut>;

impl TaggedBytesMut {
    /// Creates a datagram stamped with the current time.
    pub fn udp(local_addr: SocketAddr, peer_addr: SocketAddr, payload: &[u8]) -> Self {
        Self {
            now: Instant::now(),
            transport: TransportContext {
                local_addr,
                peer_addr,
            },
            message: BytesMut::from(payload),
        }
    }

    /// Creates an outbound datagram to `peer_addr` from an unspecified local address.
    pub fn to_peer(peer_addr: SocketAddr, payload: &[u8]) -> Self {
        let local_ip = match peer_addr {
            SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            SocketAddr::V6(_) => IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED),
        };
        Self::udp(SocketAddr::new(local_ip, 0), peer_addr, payload)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_udp_datagram() {
        let local: SocketAddr = "192.168.1.2:5353".parse().unwrap();
        let peer: SocketAddr = "224.0.0.251:5353".parse().unwrap();
        let msg = TaggedBytesMut::udp(local, peer, &[1, 2, 3]);
        assert_eq!(msg.transport.local_addr, local);
        assert_eq!(msg.transport.peer_addr, peer);
        assert_eq!(msg.transport.peer_family(), AddressFamily::V4);
        assert_eq!(&msg.message[..], &[1, 2, 3]);
    }

    #[test]
    fn test_to_peer_matches_destination_family() {
        let peer: SocketAddr = "[ff02::fb]:5353".parse().unwrap();
        let msg = TaggedBytesMut::to_peer(peer, &[0xAA]);
        assert!(msg.transport.local_addr.is_ipv6());
        assert!(msg.transport.local_addr.ip().is_unspecified());
        assert_eq!(msg.transport.peer_family(), AddressFamily::V6);
    }

    #[test]
    fn test_default_transport_context_is_unspecified() {
        let ctx = TransportContext::default();
        assert!(ctx.local_addr.ip().is_unspecified());
        assert!(ctx.peer_addr.ip().is_unspecified());
    }
}
