//! socket2-backed [`InterfaceSocket`] joined to the mDNS groups on one interface.

use std::cell::RefCell;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6, UdpSocket};
use std::rc::Rc;

use shared::TaggedBytesMut;
use shared::error::{Error, Result};
use socket2::{Domain, Protocol, Socket, Type};

use super::{
    InterfaceSocket, MDNS_MULTICAST_IPV4, MDNS_MULTICAST_IPV6, NetworkInterface, PacketHandler,
    contains_handler,
};
use crate::config::MdnsConfig;

struct BoundSocket {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

/// A pair of non-blocking UDP sockets (one per enabled family) bound to the
/// mDNS port and joined to the mDNS multicast group on a single interface.
///
/// The resulting sockets are:
///
/// - Configured with `SO_REUSEADDR` and, where supported, `SO_REUSEPORT`
/// - Set to non-blocking mode, so [`poll_read`](InterfaceSocket::poll_read)
///   never blocks the looper
/// - Sending with TTL / hop limit from [`MdnsConfig::multicast_ttl`] out of
///   this interface only
/// - Bound to the device on Linux when the process is allowed to
pub struct MulticastInterfaceSocket {
    interface: NetworkInterface,
    recv_buffer_size: usize,
    ipv4: Option<BoundSocket>,
    ipv6: Option<BoundSocket>,
    handlers: RefCell<Vec<Rc<dyn PacketHandler>>>,
}

impl MulticastInterfaceSocket {
    /// Opens the sockets for `interface`.
    ///
    /// IPv4 is joined when enabled and the interface has an IPv4 address;
    /// IPv6 when enabled and the interface has an IPv6 address. Fails with
    /// [`Error::ErrInterfaceHasNoAddress`] if neither family can be joined.
    pub fn bind(interface: NetworkInterface, config: &MdnsConfig) -> Result<Self> {
        let ipv4 = match interface.ipv4_address() {
            Some(addr) if config.enable_ipv4 => Some(open_ipv4(&interface, addr, config)?),
            _ => None,
        };
        let ipv6 = if config.enable_ipv6 && interface.has_ipv6_address() {
            Some(open_ipv6(&interface, config)?)
        } else {
            None
        };

        if ipv4.is_none() && ipv6.is_none() {
            return Err(Error::ErrInterfaceHasNoAddress(interface.name));
        }

        log::debug!(
            "bound mDNS socket on {} (ipv4: {}, ipv6: {})",
            interface,
            ipv4.is_some(),
            ipv6.is_some()
        );

        Ok(MulticastInterfaceSocket {
            interface,
            recv_buffer_size: config.recv_buffer_size,
            ipv4,
            ipv6,
            handlers: RefCell::new(Vec::new()),
        })
    }

    /// Hands `msg` to every registered handler, in registration order.
    pub fn handle_read(&self, msg: &TaggedBytesMut) {
        // Snapshot so a handler may register further handlers.
        let handlers = self.handlers.borrow().clone();
        for handler in handlers {
            handler.handle_packet(msg);
        }
    }

    pub fn packet_handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    fn read_from(&self, bound: &BoundSocket, buf: &mut [u8]) -> Result<usize> {
        let mut count = 0;
        loop {
            match bound.socket.recv_from(buf) {
                Ok((n, peer_addr)) => {
                    log::trace!(
                        "{} received {} bytes from {}",
                        self.interface,
                        n,
                        peer_addr
                    );
                    let msg = TaggedBytesMut::udp(bound.local_addr, peer_addr, &buf[..n]);
                    self.handle_read(&msg);
                    count += 1;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    let err = Error::from(err);
                    if err.is_would_block() {
                        return Ok(count);
                    }
                    return Err(err);
                }
            }
        }
    }
}

impl InterfaceSocket for MulticastInterfaceSocket {
    fn send(&self, msg: &TaggedBytesMut) -> Result<()> {
        let peer_addr = msg.transport.peer_addr;
        let bound = match peer_addr {
            SocketAddr::V4(_) => self.ipv4.as_ref(),
            SocketAddr::V6(_) => self.ipv6.as_ref(),
        }
        .ok_or(Error::ErrNoSocketForFamily)?;

        let n = bound.socket.send_to(&msg.message, peer_addr)?;
        if n != msg.message.len() {
            return Err(Error::ErrBufferShort);
        }
        Ok(())
    }

    fn has_joined_ipv4(&self) -> bool {
        self.ipv4.is_some()
    }

    fn has_joined_ipv6(&self) -> bool {
        self.ipv6.is_some()
    }

    fn interface(&self) -> &NetworkInterface {
        &self.interface
    }

    fn add_packet_handler(&self, handler: Rc<dyn PacketHandler>) {
        let mut handlers = self.handlers.borrow_mut();
        if !contains_handler(&handlers, &handler) {
            handlers.push(handler);
        }
    }

    fn poll_read(&self) -> Result<usize> {
        let mut buf = vec![0u8; self.recv_buffer_size];
        let mut count = 0;
        for bound in [self.ipv4.as_ref(), self.ipv6.as_ref()].into_iter().flatten() {
            count += self.read_from(bound, &mut buf)?;
        }
        Ok(count)
    }
}

fn new_socket(domain: Domain) -> io::Result<Socket> {
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    // Enable address reuse for multiple processes
    socket.set_reuse_address(true)?;

    // Enable port reuse on supported platforms
    #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
    socket.set_reuse_port(true)?;

    socket.set_nonblocking(true)?;
    Ok(socket)
}

#[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
fn bind_to_device(socket: &Socket, interface: &NetworkInterface) {
    // Requires CAP_NET_RAW before Linux 5.7.
    if let Err(err) = socket.bind_device(Some(interface.name.as_bytes())) {
        log::debug!("could not bind mDNS socket to {}: {}", interface, err);
    }
}

#[cfg(not(any(target_os = "android", target_os = "fuchsia", target_os = "linux")))]
fn bind_to_device(_socket: &Socket, _interface: &NetworkInterface) {}

fn open_ipv4(
    interface: &NetworkInterface,
    interface_addr: Ipv4Addr,
    config: &MdnsConfig,
) -> io::Result<BoundSocket> {
    let socket = new_socket(Domain::IPV4)?;
    bind_to_device(&socket, interface);

    let bind_ip = if cfg!(target_os = "linux") {
        IpAddr::V4(MDNS_MULTICAST_IPV4)
    } else {
        // Binding to the group address doesn't work on Mac/Win,
        // only 0.0.0.0 works fine
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    };
    socket.bind(&SocketAddr::new(bind_ip, config.port).into())?;

    socket.join_multicast_v4(&MDNS_MULTICAST_IPV4, &interface_addr)?;
    socket.set_multicast_if_v4(&interface_addr)?;
    socket.set_multicast_ttl_v4(config.multicast_ttl)?;
    socket.set_multicast_loop_v4(config.multicast_loop)?;

    let socket: UdpSocket = socket.into();
    let local_addr = SocketAddr::new(IpAddr::V4(interface_addr), socket.local_addr()?.port());
    Ok(BoundSocket { socket, local_addr })
}

fn open_ipv6(interface: &NetworkInterface, config: &MdnsConfig) -> io::Result<BoundSocket> {
    let socket = new_socket(Domain::IPV6)?;
    socket.set_only_v6(true)?;
    bind_to_device(&socket, interface);

    let bind_addr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, config.port, 0, 0);
    socket.bind(&bind_addr.into())?;

    socket.join_multicast_v6(&MDNS_MULTICAST_IPV6, interface.index)?;
    socket.set_multicast_if_v6(interface.index)?;
    socket.set_multicast_hops_v6(config.multicast_ttl)?;
    socket.set_multicast_loop_v6(config.multicast_loop)?;

    let socket: UdpSocket = socket.into();
    let local_addr = socket.local_addr()?;
    Ok(BoundSocket { socket, local_addr })
}
