//! # multinet-mdns
//!
//! The socket layer of an mDNS discovery stack that spans several networks
//! at once (Wi-Fi, cellular, tethering downstreams, ...).
//!
//! Discovery listeners ask for sockets on a network, or on every network;
//! the crate keeps one socket per interface, shares it between listeners,
//! decodes every packet it receives exactly once and hands the result to a
//! single response callback together with the interface and network it
//! arrived on. Outbound packets are written only to sockets of the exact
//! target network that joined the destination's address family.
//!
//! ## Components
//!
//! - [`MdnsMultinetworkSocketClient`]: the coordinator listeners talk to
//! - [`SocketProvider`] / [`MdnsSocketProvider`]: owns the per-interface
//!   sockets and reports their lifecycle as [`SocketEvent`]s
//! - [`InterfaceSocket`] / [`MulticastInterfaceSocket`]: one socket2-backed
//!   socket pair per interface
//! - [`MdnsResponseDecoder`]: turns datagrams into [`MdnsPacket`]s, with
//!   classified errors
//! - [`Looper`]: the single thread all of the above runs on
//!
//! ## Threading
//!
//! The client, the provider and the sockets are single-threaded (`!Send`)
//! and bound to a [`Looper`]. Every entry point checks that it runs on the
//! looper's thread and panics otherwise. Other threads hand work over with
//! [`Looper::post`]; callbacks running on the looper queue follow-up client
//! work with [`Looper::post_local`].
//!
//! Both the client and the provider implement [`sansio::Protocol`]. The
//! provider takes [`NetworkEvent`]s and yields [`SocketEvent`]s; the client
//! takes those socket events plus outbound packets and yields the
//! per-socket writes.
//!
//! ## Quick Start
//!
//! ```rust
//! use multinet_mdns::{
//!     ListenerId, Looper, MdnsConfig, MdnsMultinetworkSocketClient, MdnsSocketProvider, Network,
//!     NetworkInterface, SocketCreationCallback,
//! };
//! use std::rc::Rc;
//!
//! struct Listener;
//!
//! impl SocketCreationCallback for Listener {
//!     fn on_socket_created(&self, network: Option<&Network>) {
//!         println!("socket ready on {network:?}");
//!     }
//!     fn on_all_sockets_destroyed(&self, network: Option<&Network>) {
//!         println!("no sockets left on {network:?}");
//!     }
//! }
//!
//! let looper = Looper::new("mdns");
//! let provider = MdnsSocketProvider::new(looper.clone(), MdnsConfig::default());
//! let mut client = MdnsMultinetworkSocketClient::new(looper, provider);
//!
//! // Discover on every network. Sockets are opened once the provider is
//! // told about interfaces via notify_network_available().
//! let listener = ListenerId::new();
//! client
//!     .notify_network_requested(listener, None, Rc::new(Listener))
//!     .unwrap();
//! assert!(client.is_listener_registered(listener));
//!
//! client.notify_network_unrequested(listener);
//! assert!(!client.is_listener_registered(listener));
//! ```
//!
//! ## Event Loop Pattern
//!
//! The owner of the looper thread drives everything:
//!
//! ```text
//! loop {
//!     // 1. Tell the provider about network changes
//!     client.socket_provider_mut().handle_event(NetworkEvent::NetworkAvailable(network, interface))?;
//!     client.process_socket_events();
//!
//!     // 2. Read datagrams; handlers decode and call the response callback
//!     client.socket_provider_mut().read_sockets();
//!
//!     // 3. Write queued packets
//!     client.send_multicast_packet(query, network);
//!     client.flush_pending_sends(); // or drain client.poll_write() yourself
//!
//!     // 4. Run work posted from other threads
//!     looper.run_pending();
//! }
//! ```
//!
//! ## Protocol Details
//!
//! - **Multicast Address**: 224.0.0.251:5353 (IPv4), \[ff02::fb\]:5353 (IPv6)
//! - **Responses**: anything that is not a response with opcode and rcode 0
//!   is dropped without error
//! - **Compression**: DNS name compression is supported when decoding

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub(crate) mod client;
pub(crate) mod config;
pub(crate) mod decoder;
pub(crate) mod looper;
pub(crate) mod message;
pub(crate) mod network;
pub(crate) mod provider;
pub(crate) mod socket;

pub use client::{
    MdnsMultinetworkSocketClient, MdnsResponseCallback, ReadPacketHandler, SocketCreationCallback,
};
pub use config::MdnsConfig;
pub use decoder::{MdnsResponseDecoder, MdnsResponseErrorCode, ParseError};
pub use looper::Looper;
pub use message::{
    DNSCLASS_ANY, DNSCLASS_INET, DnsClass, DnsType, FLAGS_AUTHORITATIVE, FLAGS_QUERY,
    FLAGS_RESPONSE, FLAGS_RESPONSE_MASK, FLAGS_TRUNCATED, MAX_PACKET_SIZE, MdnsPacket, Name,
    Question, Resource, ResourceBody, ResourceHeader,
};
pub use network::{ListenerId, Network, is_network_matched};
pub use provider::{
    MdnsSocketProvider, MulticastSocketFactory, NetworkEvent, SocketEvent, SocketFactory,
    SocketProvider,
};
pub use shared::ifaces;
pub use socket::{
    InterfaceSocket, MDNS_DEST_ADDR_IPV4, MDNS_DEST_ADDR_IPV6, MDNS_MULTICAST_IPV4,
    MDNS_MULTICAST_IPV6, MDNS_PORT, MulticastInterfaceSocket, NetworkInterface, PacketHandler,
    SocketHandle,
};
