//! Socket configuration for mDNS interface sockets.
//!
//! This module provides the [`MdnsConfig`] struct, consumed by the socket
//! factory when the provider opens a socket on a tracked interface.
//!
//! # Examples
//!
//! ```rust
//! use multinet_mdns::MdnsConfig;
//!
//! // IPv4 only, hearing our own packets (useful on a single test host).
//! let config = MdnsConfig::default()
//!     .with_enable_ipv6(false)
//!     .with_multicast_loop(true);
//! assert!(config.enable_ipv4);
//! ```

use crate::message::MAX_PACKET_SIZE;
use crate::socket::MDNS_PORT;

/// Default TTL (IPv4) and hop limit (IPv6) of outgoing multicast packets.
///
/// RFC 6762 section 11 requires 255 so receivers can reject off-link packets.
pub(crate) const DEFAULT_MULTICAST_TTL: u32 = 255;

/// Configuration of the sockets opened by the socket provider.
///
/// # Fields
///
/// - `port`: UDP port to bind and send to (default: 5353)
/// - `enable_ipv4` / `enable_ipv6`: which multicast groups to join (default: both)
/// - `multicast_loop`: whether our own multicast packets are looped back (default: false)
/// - `multicast_ttl`: TTL / hop limit of outgoing packets (default: 255)
/// - `recv_buffer_size`: size of the receive buffer per datagram (default: 9000)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MdnsConfig {
    /// UDP port used for both binding and multicast destinations.
    ///
    /// Default: 5353
    pub port: u16,

    /// Join 224.0.0.251 on interfaces that have an IPv4 address.
    ///
    /// Default: true
    pub enable_ipv4: bool,

    /// Join ff02::fb on interfaces that have an IPv6 address.
    ///
    /// Default: true
    pub enable_ipv6: bool,

    /// Loop outgoing multicast back to local sockets.
    ///
    /// Default: false
    pub multicast_loop: bool,

    /// TTL (IPv4) and hop limit (IPv6) of outgoing multicast packets.
    ///
    /// Default: 255
    pub multicast_ttl: u32,

    /// Receive buffer size in bytes. Datagrams larger than this are truncated
    /// and will then fail to decode.
    ///
    /// Default: 9000, the largest mDNS message
    pub recv_buffer_size: usize,
}

impl Default for MdnsConfig {
    fn default() -> Self {
        Self {
            port: MDNS_PORT,
            enable_ipv4: true,
            enable_ipv6: true,
            multicast_loop: false,
            multicast_ttl: DEFAULT_MULTICAST_TTL,
            recv_buffer_size: MAX_PACKET_SIZE,
        }
    }
}

impl MdnsConfig {
    /// Create a new configuration with default values.
    ///
    /// Equivalent to [`MdnsConfig::default()`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the UDP port.
    ///
    /// Only tests and private deployments should move off 5353.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_enable_ipv4(mut self, enable: bool) -> Self {
        self.enable_ipv4 = enable;
        self
    }

    pub fn with_enable_ipv6(mut self, enable: bool) -> Self {
        self.enable_ipv6 = enable;
        self
    }

    /// Set whether outgoing multicast is looped back.
    ///
    /// # Example
    ///
    /// ```rust
    /// use multinet_mdns::MdnsConfig;
    ///
    /// let config = MdnsConfig::default().with_multicast_loop(true);
    /// assert!(config.multicast_loop);
    /// ```
    pub fn with_multicast_loop(mut self, multicast_loop: bool) -> Self {
        self.multicast_loop = multicast_loop;
        self
    }

    pub fn with_multicast_ttl(mut self, ttl: u32) -> Self {
        self.multicast_ttl = ttl;
        self
    }

    /// Set the receive buffer size.
    ///
    /// A value of zero will use the default size (9000 bytes).
    pub fn with_recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = if size == 0 { MAX_PACKET_SIZE } else { size };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MdnsConfig::default();
        assert_eq!(config.port, 5353);
        assert!(config.enable_ipv4);
        assert!(config.enable_ipv6);
        assert!(!config.multicast_loop);
        assert_eq!(config.multicast_ttl, 255);
        assert_eq!(config.recv_buffer_size, 9000);
        assert_eq!(config, MdnsConfig::new());
    }

    #[test]
    fn test_builder() {
        let config = MdnsConfig::new()
            .with_port(15353)
            .with_enable_ipv6(false)
            .with_multicast_loop(true)
            .with_multicast_ttl(1)
            .with_recv_buffer_size(1500);
        assert_eq!(config.port, 15353);
        assert!(config.enable_ipv4);
        assert!(!config.enable_ipv6);
        assert!(config.multicast_loop);
        assert_eq!(config.multicast_ttl, 1);
        assert_eq!(config.recv_buffer_size, 1500);
    }

    #[test]
    fn test_zero_recv_buffer_uses_default() {
        let config = MdnsConfig::new().with_recv_buffer_size(0);
        assert_eq!(config.recv_buffer_size, MAX_PACKET_SIZE);
    }
}
