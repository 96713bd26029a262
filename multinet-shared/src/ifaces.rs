//! Local network interface enumeration.

use std::net::IpAddr;

use crate::error::Result;

/// A local interface with every address the system reports for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub index: u32,
    pub addresses: Vec<IpAddr>,
    pub is_up: bool,
    pub is_loopback: bool,
    pub supports_multicast: bool,
}

impl Interface {
    /// Adds `addr` unless already listed.
    pub fn add_address(&mut self, addr: IpAddr) {
        if !self.addresses.contains(&addr) {
            self.addresses.push(addr);
        }
    }

    /// Up, not loopback, multicast capable and addressed.
    pub fn is_multicast_capable(&self) -> bool {
        self.is_up && !self.is_loopback && self.supports_multicast && !self.addresses.is_empty()
    }
}

/// Lists local interfaces in the order the system reports them, with
/// addresses grouped per interface. Interfaces that disappear while being
/// listed are skipped.
#[cfg(unix)]
pub fn ifaces() -> Result<Vec<Interface>> {
    use nix::ifaddrs::getifaddrs;
    use nix::net::if_::{InterfaceFlags, if_nametoindex};
    use std::io;
    use std::net::Ipv4Addr;

    let mut list: Vec<Interface> = Vec::new();
    for ifaddr in getifaddrs().map_err(io::Error::from)? {
        let address = ifaddr.address.as_ref().and_then(|addr| {
            if let Some(sin) = addr.as_sockaddr_in() {
                Some(IpAddr::V4(Ipv4Addr::from(sin.ip())))
            } else {
                addr.as_sockaddr_in6().map(|sin6| IpAddr::V6(sin6.ip()))
            }
        });

        if let Some(existing) = list.iter_mut().find(|i| i.name == ifaddr.interface_name) {
            if let Some(address) = address {
                existing.add_address(address);
            }
            continue;
        }

        let Ok(index) = if_nametoindex(ifaddr.interface_name.as_str()) else {
            continue;
        };
        list.push(Interface {
            name: ifaddr.interface_name,
            index,
            addresses: address.into_iter().collect(),
            is_up: ifaddr.flags.contains(InterfaceFlags::IFF_UP),
            is_loopback: ifaddr.flags.contains(InterfaceFlags::IFF_LOOPBACK),
            supports_multicast: ifaddr.flags.contains(InterfaceFlags::IFF_MULTICAST),
        });
    }
    Ok(list)
}

#[cfg(not(unix))]
pub fn ifaces() -> Result<Vec<Interface>> {
    Err(crate::error::Error::ErrNoInterface)
}
