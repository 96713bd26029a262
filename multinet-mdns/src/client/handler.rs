use std::cell::RefCell;
use std::rc::Rc;

use shared::TaggedBytesMut;

use super::MdnsResponseCallback;
use crate::decoder::{MdnsResponseDecoder, MdnsResponseErrorCode};
use crate::looper::Looper;
use crate::network::{DisplayNetwork, Network};
use crate::socket::PacketHandler;

/// State shared by every [`ReadPacketHandler`] of one client: the installed
/// response callback and the packet counter.
pub(crate) struct ResponseDispatcher {
    looper: Looper,
    callback: Option<Rc<dyn MdnsResponseCallback>>,
    received_packet_number: u64,
}

impl ResponseDispatcher {
    pub(crate) fn new(looper: Looper) -> Self {
        ResponseDispatcher {
            looper,
            callback: None,
            received_packet_number: 0,
        }
    }

    pub(crate) fn set_callback(&mut self, callback: Option<Rc<dyn MdnsResponseCallback>>) {
        self.callback = callback;
    }

    pub(crate) fn received_packet_number(&self) -> u64 {
        self.received_packet_number
    }

    /// Decodes one datagram and reports the outcome to the installed callback.
    ///
    /// The dispatcher is not borrowed while the callback runs.
    pub(crate) fn process_response(
        this: &RefCell<ResponseDispatcher>,
        buf: &[u8],
        interface_index: u32,
        network: Option<&Network>,
    ) {
        let (packet_number, callback) = {
            let mut dispatcher = this.borrow_mut();
            dispatcher.looper.ensure_running_on_looper();
            dispatcher.received_packet_number += 1;
            (
                dispatcher.received_packet_number,
                dispatcher.callback.clone(),
            )
        };

        match MdnsResponseDecoder::parse_response(buf) {
            Ok(packet) => {
                log::trace!(
                    "packet #{} on interface {} network {}: {}",
                    packet_number,
                    interface_index,
                    DisplayNetwork(network),
                    packet
                );
                if let Some(callback) = callback {
                    callback.on_response_received(&packet, interface_index, network);
                }
            }
            Err(err) if err.code == MdnsResponseErrorCode::NotResponseMessage => {
                log::trace!("dropping packet #{}: {}", packet_number, err);
            }
            Err(err) => {
                log::error!(
                    "failed to parse packet #{} on interface {} network {}: {}",
                    packet_number,
                    interface_index,
                    DisplayNetwork(network),
                    err
                );
                if let Some(callback) = callback {
                    callback.on_failed_to_parse_mdns_response(packet_number, err.code, network);
                }
            }
        }
    }
}

/// Packet handler attached to one socket, remembering which network and
/// interface the socket's packets come from.
pub struct ReadPacketHandler {
    network: Option<Network>,
    interface_index: u32,
    dispatcher: Rc<RefCell<ResponseDispatcher>>,
}

impl ReadPacketHandler {
    pub(crate) fn new(
        network: Option<Network>,
        interface_index: u32,
        dispatcher: Rc<RefCell<ResponseDispatcher>>,
    ) -> Self {
        ReadPacketHandler {
            network,
            interface_index,
            dispatcher,
        }
    }

    pub fn network(&self) -> Option<&Network> {
        self.network.as_ref()
    }

    pub fn interface_index(&self) -> u32 {
        self.interface_index
    }
}

impl PacketHandler for ReadPacketHandler {
    fn handle_packet(&self, msg: &TaggedBytesMut) {
        ResponseDispatcher::process_response(
            &self.dispatcher,
            &msg.message,
            self.interface_index,
            self.network.as_ref(),
        );
    }
}
