//! Per-interface mDNS sockets.
//!
//! An [`InterfaceSocket`] is owned by the socket provider and shared with
//! the client through a [`SocketHandle`]. The client only sends through it
//! and registers [`PacketHandler`]s on it; everything else (binding, group
//! membership, closing) is the provider's business.


pub(crate) mod multicast;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::ops::Deref;
use std::rc::Rc;

use shared::TaggedBytesMut;
use shared::error::Result;

pub use multicast::MulticastInterfaceSocket;

/// The well-known mDNS port.
pub const MDNS_PORT: u16 = 5353;

/// IPv4 mDNS multicast group.
pub const MDNS_MULTICAST_IPV4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// IPv6 link-local mDNS multicast group.
pub const MDNS_MULTICAST_IPV6: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb);

/// Destination for IPv4 mDNS multicast on the standard port.
pub const MDNS_DEST_ADDR_IPV4: SocketAddr = SocketAddr::new(IpAddr::V4(MDNS_MULTICAST_IPV4), MDNS_PORT);

/// Destination for IPv6 mDNS multicast on the standard port.
pub const MDNS_DEST_ADDR_IPV6: SocketAddr = SocketAddr::new(IpAddr::V6(MDNS_MULTICAST_IPV6), MDNS_PORT);

/// A local network interface a socket can be bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkInterface {
    /// OS interface name, e.g. `wlan0`.
    pub name: String,
    /// OS interface index.
    pub index: u32,
    /// Addresses configured on the interface.
    pub addresses: Vec<IpAddr>,
}

impl NetworkInterface {
    pub fn new(name: impl Into<String>, index: u32, addresses: Vec<IpAddr>) -> Self {
        NetworkInterface {
            name: name.into(),
            index,
            addresses,
        }
    }

    /// First IPv4 address of the interface, used to pick the multicast interface.
    pub fn ipv4_address(&self) -> Option<Ipv4Addr> {
        self.addresses.iter().find_map(|addr| match addr {
            IpAddr::V4(v4) => Some(*v4),
            IpAddr::V6(_) => None,
        })
    }

    pub fn has_ipv6_address(&self) -> bool {
        self.addresses.iter().any(IpAddr::is_ipv6)
    }
}

impl From<shared::ifaces::Interface> for NetworkInterface {
    fn from(iface: shared::ifaces::Interface) -> Self {
        NetworkInterface::new(iface.name, iface.index, iface.addresses)
    }
}

impl fmt::Display for NetworkInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(#{})", self.name, self.index)
    }
}

/// Receives every datagram read by a socket it is registered on.
pub trait PacketHandler {
    fn handle_packet(&self, msg: &TaggedBytesMut);
}

/// A socket bound to one interface, joined to the mDNS group(s) there.
pub trait InterfaceSocket {
    /// Sends `msg` to `msg.transport.peer_addr`.
    fn send(&self, msg: &TaggedBytesMut) -> Result<()>;

    fn has_joined_ipv4(&self) -> bool;

    fn has_joined_ipv6(&self) -> bool;

    fn interface(&self) -> &NetworkInterface;

    /// Registers `handler` for received packets. Registering the same
    /// handler (same allocation) twice has no further effect.
    fn add_packet_handler(&self, handler: Rc<dyn PacketHandler>);

    /// Reads all queued datagrams and hands each one to the registered
    /// handlers. Returns the number of datagrams read.
    fn poll_read(&self) -> Result<usize>;
}

/// A shared handle to an [`InterfaceSocket`].
///
/// Two handles are equal iff they point to the same socket object, which
/// lets sockets key hash maps without requiring `Eq` on the socket itself.
#[derive(Clone)]
pub struct SocketHandle(Rc<dyn InterfaceSocket>);

impl SocketHandle {
    pub fn new(socket: Rc<dyn InterfaceSocket>) -> Self {
        SocketHandle(socket)
    }

    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

impl<S: InterfaceSocket + 'static> From<Rc<S>> for SocketHandle {
    fn from(socket: Rc<S>) -> Self {
        SocketHandle(socket)
    }
}

impl Deref for SocketHandle {
    type Target = dyn InterfaceSocket;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl PartialEq for SocketHandle {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for SocketHandle {}

impl Hash for SocketHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketHandle")
            .field("interface", &self.0.interface().name)
            .field("ptr", &self.addr())
            .finish()
    }
}

/// Returns true if `handlers` already holds `handler` (same allocation).
pub(crate) fn contains_handler(
    handlers: &[Rc<dyn PacketHandler>],
    handler: &Rc<dyn PacketHandler>,
) -> bool {
    handlers
        .iter()
        .any(|h| Rc::as_ptr(h) as *const () == Rc::as_ptr(handler) as *const ())
}
