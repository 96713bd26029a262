//! The multinetwork socket client.
//!
//! [`MdnsMultinetworkSocketClient`] sits between discovery listeners and a
//! [`SocketProvider`]:
//!
//! 1. A listener asks for a network with
//!    [`notify_network_requested`](MdnsMultinetworkSocketClient::notify_network_requested).
//! 2. The provider answers with [`SocketEvent`]s; for every socket the
//!    client attaches a [`ReadPacketHandler`], shared by all listeners using
//!    that socket, and tells the listener through its
//!    [`SocketCreationCallback`].
//! 3. Every packet read by a socket is decoded once and handed to the single
//!    [`MdnsResponseCallback`] installed with
//!    [`set_callback`](MdnsMultinetworkSocketClient::set_callback).
//! 4. An outbound packet given to
//!    [`send_multicast_packet`](MdnsMultinetworkSocketClient::send_multicast_packet)
//!    is queued once for every active socket of the target network that
//!    joined the destination's address family, and written by
//!    [`flush_pending_sends`](MdnsMultinetworkSocketClient::flush_pending_sends).
//!
//! The client is a [`sansio::Protocol`]: provider events go in through
//! [`handle_event`](sansio::Protocol::handle_event), and the routed
//! `(socket, packet)` pairs come out of
//! [`poll_write`](sansio::Protocol::poll_write) for callers that write the
//! sockets themselves.
//!
//! All methods must be called on the client's [`Looper`] thread and panic
//! otherwise. Callbacks run while the client is busy; work they want done
//! on the client goes through [`Looper::post_local`].


mod handler;
mod tracker;

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::rc::Rc;
use std::time::Instant;

use sansio::Protocol;
use shared::{AddressFamily, TaggedBytesMut};
use shared::error::{Error, Result};

use crate::decoder::MdnsResponseErrorCode;
use crate::looper::Looper;
use crate::message::MdnsPacket;
use crate::network::{DisplayNetwork, ListenerId, Network};
use crate::provider::{SocketEvent, SocketProvider};
use crate::socket::{PacketHandler, SocketHandle};

pub use handler::ReadPacketHandler;
use handler::ResponseDispatcher;
use tracker::InterfaceSocketCallback;

/// Socket lifecycle notifications for one discovery listener.
pub trait SocketCreationCallback {
    /// A socket on `network` is ready for this listener.
    fn on_socket_created(&self, network: Option<&Network>);

    /// No listener holds a socket on `network` any more.
    fn on_all_sockets_destroyed(&self, network: Option<&Network>);
}

/// Receives every decoded response, from every socket.
pub trait MdnsResponseCallback {
    fn on_response_received(
        &self,
        packet: &MdnsPacket,
        interface_index: u32,
        network: Option<&Network>,
    );

    fn on_failed_to_parse_mdns_response(
        &self,
        packet_number: u64,
        error_code: MdnsResponseErrorCode,
        network: Option<&Network>,
    );
}

/// Coordinates per-network sockets for discovery listeners.
pub struct MdnsMultinetworkSocketClient<P: SocketProvider> {
    looper: Looper,
    socket_provider: P,
    requested_networks: HashMap<ListenerId, InterfaceSocketCallback>,
    socket_packet_handlers: HashMap<SocketHandle, Rc<ReadPacketHandler>>,
    dispatcher: Rc<RefCell<ResponseDispatcher>>,
    write_outs: VecDeque<(SocketHandle, TaggedBytesMut)>,
}

impl<P: SocketProvider> MdnsMultinetworkSocketClient<P> {
    pub fn new(looper: Looper, socket_provider: P) -> Self {
        let dispatcher = Rc::new(RefCell::new(ResponseDispatcher::new(looper.clone())));
        MdnsMultinetworkSocketClient {
            looper,
            socket_provider,
            requested_networks: HashMap::new(),
            socket_packet_handlers: HashMap::new(),
            dispatcher,
            write_outs: VecDeque::new(),
        }
    }

    /// The execution context every call must run on.
    pub fn looper(&self) -> &Looper {
        &self.looper
    }

    pub fn socket_provider(&self) -> &P {
        &self.socket_provider
    }

    pub fn socket_provider_mut(&mut self) -> &mut P {
        &mut self.socket_provider
    }

    /// Installs the response callback, or clears it with `None`.
    pub fn set_callback(&mut self, callback: Option<Rc<dyn MdnsResponseCallback>>) {
        self.looper.ensure_running_on_looper();
        self.dispatcher.borrow_mut().set_callback(callback);
    }

    /// Registers `listener` for sockets on `network` (every network if `None`)
    /// and asks the provider for them.
    ///
    /// Fails with [`Error::ErrListenerAlreadyRegistered`] if `listener` is
    /// registered already; nothing changes in that case.
    pub fn notify_network_requested(
        &mut self,
        listener: ListenerId,
        network: Option<Network>,
        socket_creation_callback: Rc<dyn SocketCreationCallback>,
    ) -> Result<()> {
        self.looper.ensure_running_on_looper();

        if self.requested_networks.contains_key(&listener) {
            return Err(Error::ErrListenerAlreadyRegistered);
        }
        log::debug!(
            "{} requested network {}",
            listener,
            DisplayNetwork(network.as_ref())
        );
        self.requested_networks.insert(
            listener,
            InterfaceSocketCallback::new(socket_creation_callback),
        );
        self.socket_provider.request_socket(network, listener);
        self.process_socket_events();
        Ok(())
    }

    /// Unregisters `listener`, reporting every socket it still holds as
    /// destroyed first. Unknown listeners are logged and ignored.
    pub fn notify_network_unrequested(&mut self, listener: ListenerId) {
        self.looper.ensure_running_on_looper();

        let Some(tracker) = self.requested_networks.get(&listener) else {
            log::error!("{} was never registered", listener);
            return;
        };
        for socket in tracker.sockets_newest_first() {
            self.notify_socket_destroyed(listener, &socket);
            self.maybe_cleanup_packet_handler(&socket);
        }
        self.requested_networks.remove(&listener);
        log::debug!("{} unrequested its network", listener);

        self.socket_provider.unrequest_socket(listener);
        self.process_socket_events();
    }

    /// Queues `packet` for every active socket on `network` that joined the
    /// destination's address family.
    pub fn send_multicast_packet(&mut self, packet: TaggedBytesMut, network: Option<Network>) {
        self.send_packet(packet, network);
    }

    /// Queues `packet` like [`send_multicast_packet`](Self::send_multicast_packet);
    /// there is no separate unicast path at this layer.
    pub fn send_unicast_packet(&mut self, packet: TaggedBytesMut, network: Option<Network>) {
        self.send_packet(packet, network);
    }

    /// Number of queued socket writes.
    pub fn pending_sends(&self) -> usize {
        self.write_outs.len()
    }

    /// Performs every queued socket write. Send failures are logged per
    /// socket. Returns the number of successful writes.
    pub fn flush_pending_sends(&mut self) -> usize {
        self.looper.ensure_running_on_looper();

        let mut sent = 0;
        while let Some((socket, packet)) = self.poll_write() {
            match socket.send(&packet) {
                Ok(()) => sent += 1,
                Err(err) => log::error!(
                    "failed to send packet to {} on {}: {}",
                    packet.transport.peer_addr,
                    socket.interface(),
                    err
                ),
            }
        }
        sent
    }

    /// Drains the provider's [`poll_event`](sansio::Protocol::poll_event)
    /// into [`handle_socket_event`](Self::handle_socket_event).
    pub fn process_socket_events(&mut self) {
        while let Some(event) = self.socket_provider.poll_event() {
            self.handle_socket_event(event);
        }
    }

    /// Applies one socket lifecycle event from the provider.
    pub fn handle_socket_event(&mut self, event: SocketEvent) {
        self.looper.ensure_running_on_looper();

        match event {
            SocketEvent::SocketCreated {
                requester,
                network,
                socket,
                addresses,
            } => self.on_socket_created(requester, network, socket, addresses),
            SocketEvent::InterfaceDestroyed {
                requester,
                network,
                socket,
            } => self.on_interface_destroyed(requester, network, socket),
        }
    }

    pub fn is_listener_registered(&self, listener: ListenerId) -> bool {
        self.requested_networks.contains_key(&listener)
    }

    /// Sockets active for `listener`, oldest first. Empty if unregistered.
    pub fn active_sockets(&self, listener: ListenerId) -> Vec<(SocketHandle, Option<Network>)> {
        self.requested_networks
            .get(&listener)
            .map(|tracker| tracker.active_network_sockets().to_vec())
            .unwrap_or_default()
    }

    pub fn packet_handler_count(&self) -> usize {
        self.socket_packet_handlers.len()
    }

    pub fn has_packet_handler(&self, socket: &SocketHandle) -> bool {
        self.socket_packet_handlers.contains_key(socket)
    }

    /// Number of packets handed to the decoder so far.
    pub fn received_packet_number(&self) -> u64 {
        self.dispatcher.borrow().received_packet_number()
    }

    fn send_packet(&mut self, packet: TaggedBytesMut, network: Option<Network>) {
        self.looper.ensure_running_on_looper();

        let family = packet.transport.peer_family();
        let sockets: Vec<SocketHandle> = self
            .sockets_on_network(network.as_ref())
            .into_iter()
            .filter(|socket| match family {
                AddressFamily::V4 => socket.has_joined_ipv4(),
                AddressFamily::V6 => socket.has_joined_ipv6(),
            })
            .collect();
        if sockets.is_empty() {
            log::debug!(
                "no socket on network {} for {}",
                DisplayNetwork(network.as_ref()),
                packet.transport.peer_addr
            );
            return;
        }
        for socket in sockets {
            self.write_outs.push_back((socket, packet.clone()));
        }
    }

    fn on_socket_created(
        &mut self,
        requester: ListenerId,
        network: Option<Network>,
        socket: SocketHandle,
        addresses: Vec<IpAddr>,
    ) {
        let Some(tracker) = self.requested_networks.get_mut(&requester) else {
            log::debug!("ignoring socket created for unregistered {}", requester);
            return;
        };
        log::debug!(
            "socket on {} created for {} on network {} (addresses {:?})",
            socket.interface(),
            requester,
            DisplayNetwork(network.as_ref()),
            addresses
        );

        let dispatcher = &self.dispatcher;
        let handler = self
            .socket_packet_handlers
            .entry(socket.clone())
            .or_insert_with(|| {
                Rc::new(ReadPacketHandler::new(
                    network,
                    socket.interface().index,
                    Rc::clone(dispatcher),
                ))
            });
        socket.add_packet_handler(Rc::clone(handler) as Rc<dyn PacketHandler>);

        tracker.on_socket_created(socket, network);
        tracker
            .socket_creation_callback()
            .on_socket_created(network.as_ref());
    }

    fn on_interface_destroyed(
        &mut self,
        requester: ListenerId,
        network: Option<Network>,
        socket: SocketHandle,
    ) {
        if !self.requested_networks.contains_key(&requester) {
            log::debug!("ignoring interface destroyed for unregistered {}", requester);
            return;
        }
        log::debug!(
            "interface {} destroyed for {} on network {}",
            socket.interface(),
            requester,
            DisplayNetwork(network.as_ref())
        );
        self.notify_socket_destroyed(requester, &socket);
        self.maybe_cleanup_packet_handler(&socket);
    }

    fn notify_socket_destroyed(&mut self, listener: ListenerId, socket: &SocketHandle) {
        let Some(tracker) = self.requested_networks.get_mut(&listener) else {
            return;
        };
        let Some(network) = tracker.remove_socket(socket) else {
            return;
        };
        let callback = tracker.socket_creation_callback();

        if !self.is_any_socket_active_on(network.as_ref()) {
            callback.on_all_sockets_destroyed(network.as_ref());
        }
    }

    fn maybe_cleanup_packet_handler(&mut self, socket: &SocketHandle) {
        if self.is_socket_active(socket) {
            return;
        }
        if self.socket_packet_handlers.remove(socket).is_some() {
            log::debug!("removed packet handler for {}", socket.interface());
        }
        self.write_outs.retain(|(queued, _)| queued != socket);
    }

    fn is_socket_active(&self, socket: &SocketHandle) -> bool {
        self.requested_networks
            .values()
            .any(|tracker| tracker.contains_socket(socket))
    }

    fn is_any_socket_active_on(&self, network: Option<&Network>) -> bool {
        self.requested_networks
            .values()
            .any(|tracker| tracker.contains_network(network))
    }

    /// Distinct active sockets whose network is exactly `network`.
    fn sockets_on_network(&self, network: Option<&Network>) -> Vec<SocketHandle> {
        let mut sockets: Vec<SocketHandle> = Vec::new();
        for tracker in self.requested_networks.values() {
            for (socket, n) in tracker.active_network_sockets() {
                if n.as_ref() == network && !sockets.contains(socket) {
                    sockets.push(socket.clone());
                }
            }
        }
        sockets
    }
}

impl<P: SocketProvider> sansio::Protocol<(), (TaggedBytesMut, Option<Network>), SocketEvent>
    for MdnsMultinetworkSocketClient<P>
{
    type Rout = ();
    type Wout = (SocketHandle, TaggedBytesMut);
    type Eout = ();
    type Error = Error;
    type Time = Instant;

    /// Inbound datagrams reach the client through the packet handlers it
    /// attaches to each socket.
    fn handle_read(&mut self, _msg: ()) -> Result<()> {
        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        None
    }

    /// Same as [`send_multicast_packet`](MdnsMultinetworkSocketClient::send_multicast_packet).
    fn handle_write(
        &mut self,
        (packet, network): (TaggedBytesMut, Option<Network>),
    ) -> Result<()> {
        self.send_packet(packet, network);
        Ok(())
    }

    /// Returns the next socket write, in the order packets were sent.
    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.write_outs.pop_front()
    }

    /// Same as [`handle_socket_event`](MdnsMultinetworkSocketClient::handle_socket_event).
    fn handle_event(&mut self, evt: SocketEvent) -> Result<()> {
        self.handle_socket_event(evt);
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        None
    }

    fn handle_timeout(&mut self, _now: Self::Time) -> Result<()> {
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Self::Time> {
        None
    }

    /// Unrequests every registered listener, drops queued writes and closes
    /// the provider.
    fn close(&mut self) -> Result<()> {
        self.looper.ensure_running_on_looper();

        let listeners: Vec<ListenerId> = self.requested_networks.keys().copied().collect();
        for listener in listeners {
            self.notify_network_unrequested(listener);
        }
        self.write_outs.clear();
        self.socket_provider.close()
    }
}
