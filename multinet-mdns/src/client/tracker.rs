use std::rc::Rc;

use super::SocketCreationCallback;
use crate::network::Network;
use crate::socket::SocketHandle;

/// Per-listener record of the sockets the provider has handed out.
///
/// Sockets are kept in insertion order; a socket reported again keeps its
/// position and takes the newly reported network.
pub(crate) struct InterfaceSocketCallback {
    socket_creation_callback: Rc<dyn SocketCreationCallback>,
    active_network_sockets: Vec<(SocketHandle, Option<Network>)>,
}

impl InterfaceSocketCallback {
    pub(crate) fn new(socket_creation_callback: Rc<dyn SocketCreationCallback>) -> Self {
        InterfaceSocketCallback {
            socket_creation_callback,
            active_network_sockets: Vec::new(),
        }
    }

    pub(crate) fn socket_creation_callback(&self) -> Rc<dyn SocketCreationCallback> {
        Rc::clone(&self.socket_creation_callback)
    }

    pub(crate) fn active_network_sockets(&self) -> &[(SocketHandle, Option<Network>)] {
        &self.active_network_sockets
    }

    pub(crate) fn on_socket_created(&mut self, socket: SocketHandle, network: Option<Network>) {
        match self
            .active_network_sockets
            .iter_mut()
            .find(|(s, _)| *s == socket)
        {
            Some(entry) => entry.1 = network,
            None => self.active_network_sockets.push((socket, network)),
        }
    }

    /// Forgets `socket`, returning the network it was active on.
    pub(crate) fn remove_socket(&mut self, socket: &SocketHandle) -> Option<Option<Network>> {
        let pos = self
            .active_network_sockets
            .iter()
            .position(|(s, _)| s == socket)?;
        Some(self.active_network_sockets.remove(pos).1)
    }

    pub(crate) fn contains_socket(&self, socket: &SocketHandle) -> bool {
        self.active_network_sockets.iter().any(|(s, _)| s == socket)
    }

    /// Exact match: the null network only matches the null network.
    pub(crate) fn contains_network(&self, network: Option<&Network>) -> bool {
        self.active_network_sockets
            .iter()
            .any(|(_, n)| n.as_ref() == network)
    }

    /// Active sockets, most recently added first.
    pub(crate) fn sockets_newest_first(&self) -> Vec<SocketHandle> {
        self.active_network_sockets
            .iter()
            .rev()
            .map(|(s, _)| s.clone())
            .collect()
    }
}
