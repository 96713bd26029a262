//! Socket provisioning.
//!
//! A [`SocketProvider`] owns the interface sockets. It is a
//! [`sansio::Protocol`]: network changes go in through
//! [`handle_event`](sansio::Protocol::handle_event) as [`NetworkEvent`]s,
//! and socket lifecycle comes out of
//! [`poll_event`](sansio::Protocol::poll_event) as [`SocketEvent`]s.
//! Listeners ask for a network through [`SocketProvider::request_socket`].
//! Nothing is called back directly, so the provider can live inside the
//! client that consumes its events.
//!
//! [`MdnsSocketProvider`] opens one socket per tracked interface, lazily,
//! the first time a request covers it.

use std::collections::VecDeque;
use std::net::IpAddr;
use std::rc::Rc;
use std::time::Instant;

use shared::error::{Error, Result, flatten_errs};

use crate::config::MdnsConfig;
use crate::looper::Looper;
use crate::network::{DisplayNetwork, ListenerId, Network, is_network_matched};
use crate::socket::{MulticastInterfaceSocket, NetworkInterface, SocketHandle};

/// Socket lifecycle notifications, addressed to one requester.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// A socket matching the requester's network is ready.
    SocketCreated {
        requester: ListenerId,
        network: Option<Network>,
        socket: SocketHandle,
        addresses: Vec<IpAddr>,
    },
    /// The interface behind `socket` went away; the socket is being closed.
    InterfaceDestroyed {
        requester: ListenerId,
        network: Option<Network>,
        socket: SocketHandle,
    },
}

/// Network changes reported to a provider by its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// The network is up on the interface.
    NetworkAvailable(Network, NetworkInterface),
    NetworkLost(Network),
    /// A tethering downstream came up; it belongs to the null network.
    TetheringInterfaceAdded(NetworkInterface),
    /// A tethering downstream went away, by interface name.
    TetheringInterfaceRemoved(String),
}

/// Source of per-network sockets.
pub trait SocketProvider:
    sansio::Protocol<(), (), NetworkEvent, Eout = SocketEvent, Error = Error>
{
    /// Asks for sockets on `network`, or on every interface if `None`.
    fn request_socket(&mut self, network: Option<Network>, requester: ListenerId);

    /// Withdraws every request made by `requester`.
    fn unrequest_socket(&mut self, requester: ListenerId);
}

/// Opens the socket for one interface.
pub trait SocketFactory {
    fn create_socket(
        &mut self,
        interface: &NetworkInterface,
        config: &MdnsConfig,
    ) -> Result<SocketHandle>;
}

/// Opens a [`MulticastInterfaceSocket`] per interface.
#[derive(Debug, Default, Clone, Copy)]
pub struct MulticastSocketFactory;

impl SocketFactory for MulticastSocketFactory {
    fn create_socket(
        &mut self,
        interface: &NetworkInterface,
        config: &MdnsConfig,
    ) -> Result<SocketHandle> {
        let socket = MulticastInterfaceSocket::bind(interface.clone(), config)?;
        Ok(SocketHandle::from(Rc::new(socket)))
    }
}

struct TrackedInterface {
    network: Option<Network>,
    interface: NetworkInterface,
    socket: Option<SocketHandle>,
}

impl TrackedInterface {
    fn is_tethering(&self) -> bool {
        self.network.is_none()
    }
}

/// The default [`SocketProvider`].
pub struct MdnsSocketProvider<F: SocketFactory = MulticastSocketFactory> {
    looper: Looper,
    config: MdnsConfig,
    factory: F,
    interfaces: Vec<TrackedInterface>,
    requests: Vec<(ListenerId, Option<Network>)>,
    event_outs: VecDeque<SocketEvent>,
    closed: bool,
}

impl MdnsSocketProvider<MulticastSocketFactory> {
    pub fn new(looper: Looper, config: MdnsConfig) -> Self {
        Self::with_factory(looper, config, MulticastSocketFactory)
    }
}

impl<F: SocketFactory> MdnsSocketProvider<F> {
    pub fn with_factory(looper: Looper, config: MdnsConfig, factory: F) -> Self {
        MdnsSocketProvider {
            looper,
            config,
            factory,
            interfaces: Vec::new(),
            requests: Vec::new(),
            event_outs: VecDeque::new(),
            closed: false,
        }
    }

    pub fn looper(&self) -> &Looper {
        &self.looper
    }

    pub fn config(&self) -> &MdnsConfig {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Every open socket, in interface tracking order.
    pub fn sockets(&self) -> Vec<SocketHandle> {
        self.interfaces
            .iter()
            .filter_map(|tracked| tracked.socket.clone())
            .collect()
    }

    pub fn tracked_interface_count(&self) -> usize {
        self.interfaces.len()
    }

    /// `network` is up on `interface`. Replaces the interface previously
    /// tracked for `network`, if it differs.
    pub fn notify_network_available(&mut self, network: Network, interface: NetworkInterface) {
        self.looper.ensure_running_on_looper();

        let network = Some(network);
        if let Some(pos) = self.interfaces.iter().position(|t| t.network == network) {
            if self.interfaces[pos].interface == interface {
                return;
            }
            log::debug!(
                "network {} moved from {} to {}",
                DisplayNetwork(network.as_ref()),
                self.interfaces[pos].interface,
                interface
            );
            self.remove_interface(pos);
        }
        self.track_interface(network, interface);
    }

    pub fn notify_network_lost(&mut self, network: Network) {
        self.looper.ensure_running_on_looper();

        let network = Some(network);
        match self.interfaces.iter().position(|t| t.network == network) {
            Some(pos) => self.remove_interface(pos),
            None => log::debug!(
                "lost network {} was not tracked",
                DisplayNetwork(network.as_ref())
            ),
        }
    }

    /// A tethering downstream interface came up. Its sockets belong to the
    /// null network and are only handed to requests for `None`.
    pub fn notify_tethering_interface_added(&mut self, interface: NetworkInterface) {
        self.looper.ensure_running_on_looper();

        if self
            .interfaces
            .iter()
            .any(|t| t.is_tethering() && t.interface.name == interface.name)
        {
            log::debug!("tethering interface {} already tracked", interface);
            return;
        }
        self.track_interface(None, interface);
    }

    pub fn notify_tethering_interface_removed(&mut self, name: &str) {
        self.looper.ensure_running_on_looper();

        if let Some(pos) = self
            .interfaces
            .iter()
            .position(|t| t.is_tethering() && t.interface.name == name)
        {
            self.remove_interface(pos);
        }
    }

    /// Reads pending datagrams on every open socket. Each datagram goes to
    /// the socket's packet handlers; the count of datagrams is returned.
    ///
    /// A failing socket does not stop the others from being read; the
    /// failures are logged and returned together.
    pub fn read_sockets(&mut self) -> Result<usize> {
        self.looper.ensure_running_on_looper();

        let mut count = 0;
        let mut errs = vec![];
        for socket in self.sockets() {
            match socket.poll_read() {
                Ok(n) => count += n,
                Err(err) => {
                    log::error!("failed to read from {}: {}", socket.interface(), err);
                    errs.push(err);
                }
            }
        }
        flatten_errs(errs)?;
        Ok(count)
    }

    fn track_interface(&mut self, network: Option<Network>, interface: NetworkInterface) {
        log::debug!(
            "tracking {} on network {}",
            interface,
            DisplayNetwork(network.as_ref())
        );
        self.interfaces.push(TrackedInterface {
            network,
            interface,
            socket: None,
        });

        let pos = self.interfaces.len() - 1;
        let requesters: Vec<ListenerId> = self
            .requests
            .iter()
            .filter(|(_, requested)| is_network_matched(requested.as_ref(), network.as_ref()))
            .map(|(requester, _)| *requester)
            .collect();
        for requester in requesters {
            self.notify_socket_created(pos, requester);
        }
    }

    fn remove_interface(&mut self, pos: usize) {
        let tracked = self.interfaces.remove(pos);
        let Some(socket) = tracked.socket else {
            return;
        };

        for (requester, requested) in &self.requests {
            if is_network_matched(requested.as_ref(), tracked.network.as_ref()) {
                self.event_outs.push_back(SocketEvent::InterfaceDestroyed {
                    requester: *requester,
                    network: tracked.network,
                    socket: socket.clone(),
                });
            }
        }
        log::debug!("closing mDNS socket on {}", tracked.interface);
    }

    fn notify_socket_created(&mut self, pos: usize, requester: ListenerId) {
        let tracked = &mut self.interfaces[pos];
        let socket = match tracked.socket.clone() {
            Some(socket) => socket,
            None => match self.factory.create_socket(&tracked.interface, &self.config) {
                Ok(socket) => {
                    log::debug!("created mDNS socket on {}", tracked.interface);
                    tracked.socket = Some(socket.clone());
                    socket
                }
                Err(err) => {
                    log::error!(
                        "failed to create mDNS socket on {}: {}",
                        tracked.interface,
                        err
                    );
                    return;
                }
            },
        };

        self.event_outs.push_back(SocketEvent::SocketCreated {
            requester,
            network: tracked.network,
            socket,
            addresses: tracked.interface.addresses.clone(),
        });
    }
}

impl<F: SocketFactory> SocketProvider for MdnsSocketProvider<F> {
    fn request_socket(&mut self, network: Option<Network>, requester: ListenerId) {
        self.looper.ensure_running_on_looper();

        if self.closed {
            log::warn!("ignoring socket request from {} after close", requester);
            return;
        }
        if self.requests.iter().any(|(r, _)| *r == requester) {
            log::warn!("{} already requested a socket", requester);
            return;
        }
        self.requests.push((requester, network));

        for pos in 0..self.interfaces.len() {
            if is_network_matched(network.as_ref(), self.interfaces[pos].network.as_ref()) {
                self.notify_socket_created(pos, requester);
            }
        }
    }

    fn unrequest_socket(&mut self, requester: ListenerId) {
        self.looper.ensure_running_on_looper();

        let Some(pos) = self.requests.iter().position(|(r, _)| *r == requester) else {
            log::debug!("{} has no socket request", requester);
            return;
        };
        self.requests.remove(pos);
        self.event_outs
            .retain(|event| event_requester(event) != requester);

        for tracked in &mut self.interfaces {
            let still_requested = self.requests.iter().any(|(_, requested)| {
                is_network_matched(requested.as_ref(), tracked.network.as_ref())
            });
            if !still_requested && tracked.socket.take().is_some() {
                log::debug!("released mDNS socket on {}", tracked.interface);
            }
        }
    }

}

impl<F: SocketFactory> sansio::Protocol<(), (), NetworkEvent> for MdnsSocketProvider<F> {
    type Rout = ();
    type Wout = ();
    type Eout = SocketEvent;
    type Error = Error;
    type Time = Instant;

    /// Datagrams go straight from the sockets to their packet handlers, see
    /// [`read_sockets`](MdnsSocketProvider::read_sockets).
    fn handle_read(&mut self, _msg: ()) -> Result<()> {
        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        None
    }

    fn handle_write(&mut self, _msg: ()) -> Result<()> {
        Ok(())
    }

    /// Sockets are written by their users, never by the provider.
    fn poll_write(&mut self) -> Option<Self::Wout> {
        None
    }

    /// Applies a network change.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ErrConnectionClosed`] once the provider is closed.
    fn handle_event(&mut self, evt: NetworkEvent) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }
        match evt {
            NetworkEvent::NetworkAvailable(network, interface) => {
                self.notify_network_available(network, interface)
            }
            NetworkEvent::NetworkLost(network) => self.notify_network_lost(network),
            NetworkEvent::TetheringInterfaceAdded(interface) => {
                self.notify_tethering_interface_added(interface)
            }
            NetworkEvent::TetheringInterfaceRemoved(name) => {
                self.notify_tethering_interface_removed(&name)
            }
        }
        Ok(())
    }

    /// Returns the next socket lifecycle event, in the order they happened.
    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.event_outs.pop_front()
    }

    fn handle_timeout(&mut self, _now: Self::Time) -> Result<()> {
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Self::Time> {
        None
    }

    /// Closes every socket and forgets all interfaces, requests and
    /// undelivered events. No destruction events are emitted.
    fn close(&mut self) -> Result<()> {
        self.looper.ensure_running_on_looper();

        self.closed = true;
        self.requests.clear();
        self.interfaces.clear();
        self.event_outs.clear();
        log::debug!("mDNS socket provider closed");
        Ok(())
    }
}

fn event_requester(event: &SocketEvent) -> ListenerId {
    match event {
        SocketEvent::SocketCreated { requester, .. }
        | SocketEvent::InterfaceDestroyed { requester, .. } => *requester,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::socket::{InterfaceSocket, PacketHandler};
    use sansio::Protocol;
    use shared::TaggedBytesMut;
    use std::cell::Cell;

    struct StubSocket {
        interface: NetworkInterface,
        fail_read: bool,
        reads: Cell<usize>,
    }

    impl InterfaceSocket for StubSocket {
        fn send(&self, _msg: &TaggedBytesMut) -> Result<()> {
            Ok(())
        }
        fn has_joined_ipv4(&self) -> bool {
            true
        }
        fn has_joined_ipv6(&self) -> bool {
            false
        }
        fn interface(&self) -> &NetworkInterface {
            &self.interface
        }
        fn add_packet_handler(&self, _handler: Rc<dyn PacketHandler>) {}
        fn poll_read(&self) -> Result<usize> {
            self.reads.set(self.reads.get() + 1);
            if self.fail_read {
                Err(Error::Other(format!("{} is down", self.interface.name)))
            } else {
                Ok(1)
            }
        }
    }

    #[derive(Default)]
    struct StubFactory {
        created: Vec<String>,
        fail_on: Option<String>,
    }

    impl SocketFactory for StubFactory {
        fn create_socket(
            &mut self,
            interface: &NetworkInterface,
            _config: &MdnsConfig,
        ) -> Result<SocketHandle> {
            if self.fail_on.as_deref() == Some(interface.name.as_str()) {
                return Err(Error::ErrInterfaceHasNoAddress(interface.name.clone()));
            }
            self.created.push(interface.name.clone());
            Ok(SocketHandle::from(Rc::new(StubSocket {
                interface: interface.clone(),
                fail_read: interface.name.starts_with("bad"),
                reads: Cell::new(0),
            })))
        }
    }

    fn iface(name: &str, index: u32) -> NetworkInterface {
        NetworkInterface::new(name, index, vec!["192.168.1.2".parse().unwrap()])
    }

    fn provider() -> MdnsSocketProvider<StubFactory> {
        MdnsSocketProvider::with_factory(
            Looper::new("provider-test"),
            MdnsConfig::default(),
            StubFactory::default(),
        )
    }

    fn drain(p: &mut MdnsSocketProvider<StubFactory>) -> Vec<SocketEvent> {
        std::iter::from_fn(|| p.poll_event()).collect()
    }

    #[test]
    fn test_sockets_created_lazily() {
        let mut p = provider();
        let wifi = Network::new(100);
        p.notify_network_available(wifi, iface("wlan0", 3));
        assert!(p.factory().created.is_empty());
        assert!(drain(&mut p).is_empty());

        let listener = ListenerId::new();
        p.request_socket(Some(wifi), listener);
        assert_eq!(p.factory().created, vec!["wlan0"]);

        let events = drain(&mut p);
        assert_eq!(events.len(), 1);
        match &events[0] {
            SocketEvent::SocketCreated {
                requester,
                network,
                socket,
                addresses,
            } => {
                assert_eq!(*requester, listener);
                assert_eq!(*network, Some(wifi));
                assert_eq!(socket.interface().name, "wlan0");
                assert_eq!(addresses.len(), 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_null_request_matches_every_interface() {
        let mut p = provider();
        let wifi = Network::new(100);
        let cell = Network::new(101);
        p.notify_network_available(wifi, iface("wlan0", 3));
        p.notify_network_available(cell, iface("rmnet0", 4));
        p.notify_tethering_interface_added(iface("rndis0", 9));

        let any = ListenerId::new();
        p.request_socket(None, any);
        let networks: Vec<Option<Network>> = drain(&mut p)
            .into_iter()
            .map(|event| match event {
                SocketEvent::SocketCreated { network, .. } => network,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(networks, vec![Some(wifi), Some(cell), None]);

        let only_cell = ListenerId::new();
        p.request_socket(Some(cell), only_cell);
        let events = drain(&mut p);
        assert_eq!(events.len(), 1);
        // Shared with the first request, not reopened.
        assert_eq!(p.factory().created.len(), 3);
    }

    #[test]
    fn test_interface_added_after_request() {
        let mut p = provider();
        let listener = ListenerId::new();
        p.request_socket(None, listener);
        assert!(drain(&mut p).is_empty());

        p.notify_tethering_interface_added(iface("rndis0", 9));
        let events = drain(&mut p);
        assert!(matches!(
            &events[..],
            [SocketEvent::SocketCreated { network: None, .. }]
        ));
    }

    #[test]
    fn test_release_on_last_unrequest() {
        let mut p = provider();
        let wifi = Network::new(100);
        p.notify_network_available(wifi, iface("wlan0", 3));

        let a = ListenerId::new();
        let b = ListenerId::new();
        p.request_socket(Some(wifi), a);
        p.request_socket(None, b);
        drain(&mut p);
        assert_eq!(p.sockets().len(), 1);

        p.unrequest_socket(a);
        assert_eq!(p.sockets().len(), 1);
        p.unrequest_socket(b);
        assert!(p.sockets().is_empty());
        assert!(drain(&mut p).is_empty());

        // A new request opens a fresh socket.
        p.request_socket(Some(wifi), a);
        assert_eq!(p.factory().created, vec!["wlan0", "wlan0"]);
    }

    #[test]
    fn test_network_lost_notifies_matching_requesters() {
        let mut p = provider();
        let wifi = Network::new(100);
        let cell = Network::new(101);
        p.notify_network_available(wifi, iface("wlan0", 3));
        p.notify_network_available(cell, iface("rmnet0", 4));

        let on_wifi = ListenerId::new();
        let on_cell = ListenerId::new();
        let on_any = ListenerId::new();
        p.request_socket(Some(wifi), on_wifi);
        p.request_socket(Some(cell), on_cell);
        p.request_socket(None, on_any);
        drain(&mut p);

        p.notify_network_lost(wifi);
        let requesters: Vec<ListenerId> = drain(&mut p)
            .into_iter()
            .map(|event| match event {
                SocketEvent::InterfaceDestroyed {
                    requester, network, ..
                } => {
                    assert_eq!(network, Some(wifi));
                    requester
                }
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(requesters, vec![on_wifi, on_any]);
        assert_eq!(p.tracked_interface_count(), 1);
        assert_eq!(p.sockets().len(), 1);
    }

    #[test]
    fn test_network_moves_to_new_interface() {
        let mut p = provider();
        let wifi = Network::new(100);
        p.notify_network_available(wifi, iface("wlan0", 3));
        let listener = ListenerId::new();
        p.request_socket(Some(wifi), listener);
        drain(&mut p);

        // Same interface again: nothing happens.
        p.notify_network_available(wifi, iface("wlan0", 3));
        assert!(drain(&mut p).is_empty());

        p.notify_network_available(wifi, iface("wlan1", 5));
        let events = drain(&mut p);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], SocketEvent::InterfaceDestroyed { .. }));
        assert!(matches!(events[1], SocketEvent::SocketCreated { .. }));
        assert_eq!(p.factory().created, vec!["wlan0", "wlan1"]);
    }

    #[test]
    fn test_tethering_interface_removed() {
        let mut p = provider();
        p.notify_tethering_interface_added(iface("rndis0", 9));
        p.notify_tethering_interface_added(iface("rndis0", 9));
        assert_eq!(p.tracked_interface_count(), 1);

        let listener = ListenerId::new();
        p.request_socket(None, listener);
        drain(&mut p);

        p.notify_tethering_interface_removed("rndis0");
        let events = drain(&mut p);
        assert!(matches!(
            &events[..],
            [SocketEvent::InterfaceDestroyed { network: None, .. }]
        ));
        assert_eq!(p.tracked_interface_count(), 0);
    }

    #[test]
    fn test_socket_creation_failure_is_skipped() {
        let mut p = provider();
        p.factory.fail_on = Some("wlan0".to_owned());
        p.notify_network_available(Network::new(100), iface("wlan0", 3));
        p.notify_network_available(Network::new(101), iface("rmnet0", 4));

        p.request_socket(None, ListenerId::new());
        let events = drain(&mut p);
        assert_eq!(events.len(), 1);
        assert_eq!(p.sockets().len(), 1);
    }

    #[test]
    fn test_unrequest_drops_pending_events() {
        let mut p = provider();
        p.notify_network_available(Network::new(100), iface("wlan0", 3));
        let listener = ListenerId::new();
        p.request_socket(None, listener);
        p.unrequest_socket(listener);
        assert!(p.poll_event().is_none());
    }

    #[test]
    fn test_poll_read_continues_past_failing_socket() {
        let mut p = provider();
        p.notify_network_available(Network::new(100), iface("bad0", 3));
        p.notify_network_available(Network::new(101), iface("wlan0", 4));
        p.request_socket(None, ListenerId::new());

        let err = p.read_sockets().unwrap_err();
        assert_eq!(err, Error::Other("bad0 is down".to_owned()));

        p.notify_network_lost(Network::new(100));
        assert_eq!(p.read_sockets(), Ok(1));
    }

    #[test]
    fn test_network_events() {
        let mut p = provider();
        let wifi = Network::new(100);
        let listener = ListenerId::new();
        p.request_socket(None, listener);

        p.handle_event(NetworkEvent::NetworkAvailable(wifi, iface("wlan0", 3)))
            .unwrap();
        p.handle_event(NetworkEvent::TetheringInterfaceAdded(iface("rndis0", 9)))
            .unwrap();
        let events = drain(&mut p);
        assert!(matches!(
            &events[..],
            [
                SocketEvent::SocketCreated { network: Some(_), .. },
                SocketEvent::SocketCreated { network: None, .. },
            ]
        ));

        p.handle_event(NetworkEvent::TetheringInterfaceRemoved("rndis0".to_owned()))
            .unwrap();
        p.handle_event(NetworkEvent::NetworkLost(wifi)).unwrap();
        let events = drain(&mut p);
        assert!(matches!(
            &events[..],
            [
                SocketEvent::InterfaceDestroyed { network: None, .. },
                SocketEvent::InterfaceDestroyed { network: Some(_), .. },
            ]
        ));
        assert_eq!(p.tracked_interface_count(), 0);
        assert!(p.poll_write().is_none());
        assert!(p.poll_timeout().is_none());
    }

    #[test]
    fn test_close_releases_everything() {
        let mut p = provider();
        let wifi = Network::new(100);
        p.notify_network_available(wifi, iface("wlan0", 3));
        let listener = ListenerId::new();
        p.request_socket(None, listener);
        assert_eq!(p.sockets().len(), 1);

        p.close().unwrap();
        assert!(p.sockets().is_empty());
        assert_eq!(p.tracked_interface_count(), 0);
        assert!(p.poll_event().is_none());

        assert_eq!(
            p.handle_event(NetworkEvent::NetworkAvailable(wifi, iface("wlan0", 3))),
            Err(Error::ErrConnectionClosed)
        );
        p.request_socket(None, ListenerId::new());
        assert!(p.poll_event().is_none());
        assert_eq!(p.factory().created, vec!["wlan0"]);
    }
}
