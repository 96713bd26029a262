//! mDNS Browse Example
//!
//! Opens mDNS sockets on one interface through the multinetwork socket
//! client, sends a PTR query for a service type and prints every response
//! received until the timeout expires.
//!
//! # Usage
//!
//! ```
//! cargo run --package multinet-mdns --example mdns_browse -- \
//!     --interface wlan0 --service _http._tcp.local
//! ```
//!
//! Without `--interface` the first interface that is up, not loopback and
//! multicast capable is used. Without `--network` the interface is tracked
//! as a tethering interface on the null network.

use std::io::Write;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use multinet_mdns::{
    DnsType, ListenerId, Looper, MDNS_DEST_ADDR_IPV4, MDNS_DEST_ADDR_IPV6, MdnsConfig,
    MdnsMultinetworkSocketClient, MdnsPacket, MdnsResponseCallback, MdnsResponseErrorCode,
    MdnsSocketProvider, Name, Network, NetworkInterface, Question, SocketCreationCallback, ifaces,
};
use shared::TaggedBytesMut;

#[derive(Parser, Debug)]
#[command(name = "mDNS Browse")]
#[command(version = "0.1.0")]
#[command(about = "An example of mDNS browsing with the multinetwork socket client")]
struct Args {
    /// Interface name, defaults to the first multicast capable interface
    #[arg(long)]
    interface: Option<String>,

    /// Also join IPv6 on the interface (needs an IPv6 address on it)
    #[arg(long)]
    ipv6: bool,

    /// Network handle the interface belongs to
    #[arg(long)]
    network: Option<u64>,

    /// Service type to browse for
    #[arg(long, default_value = "_services._dns-sd._udp.local")]
    service: String,

    /// Browse duration in seconds
    #[arg(long, default_value = "10")]
    timeout: u64,

    #[arg(long, default_value_t = format!("INFO"))]
    log_level: String,
}

struct PrintingListener;

impl SocketCreationCallback for PrintingListener {
    fn on_socket_created(&self, network: Option<&Network>) {
        log::info!("socket created on network {:?}", network);
    }

    fn on_all_sockets_destroyed(&self, network: Option<&Network>) {
        log::info!("all sockets destroyed on network {:?}", network);
    }
}

struct PrintingResponses;

impl MdnsResponseCallback for PrintingResponses {
    fn on_response_received(
        &self,
        packet: &MdnsPacket,
        interface_index: u32,
        network: Option<&Network>,
    ) {
        println!(
            "[{}] response on interface {} network {:?}",
            chrono::Local::now().format("%H:%M:%S.%6f"),
            interface_index,
            network
        );
        for record in packet.records() {
            println!("    {}", record);
        }
    }

    fn on_failed_to_parse_mdns_response(
        &self,
        packet_number: u64,
        error_code: MdnsResponseErrorCode,
        network: Option<&Network>,
    ) {
        log::warn!(
            "packet #{} on network {:?} failed to parse: {}",
            packet_number,
            network,
            error_code
        );
    }
}

fn pick_interface(name: Option<&str>) -> Result<ifaces::Interface, Box<dyn std::error::Error>> {
    let found = ifaces::ifaces()?.into_iter().find(|iface| match name {
        Some(name) => iface.name == name,
        None => iface.is_multicast_capable(),
    });
    match found {
        Some(iface) => Ok(iface),
        None => Err(format!("no usable interface {}", name.unwrap_or("found")).into()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let log_level = log::LevelFilter::from_str(&args.log_level)?;
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} [{}] {} - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                chrono::Local::now().format("%H:%M:%S.%6f"),
                record.args()
            )
        })
        .filter(None, log_level)
        .init();

    let interface = NetworkInterface::from(pick_interface(args.interface.as_deref())?);
    log::info!("using interface {} {:?}", interface, interface.addresses);
    let network = args.network.map(Network::new);

    let looper = Looper::new("mdns-browse");
    let config = MdnsConfig::default().with_enable_ipv6(args.ipv6);
    let provider = MdnsSocketProvider::new(looper.clone(), config);
    let mut client = MdnsMultinetworkSocketClient::new(looper.clone(), provider);
    client.set_callback(Some(Rc::new(PrintingResponses)));

    let listener = ListenerId::new();
    client.notify_network_requested(listener, network, Rc::new(PrintingListener))?;

    match network {
        Some(network) => client
            .socket_provider_mut()
            .notify_network_available(network, interface),
        None => client
            .socket_provider_mut()
            .notify_tethering_interface_added(interface),
    }
    client.process_socket_events();

    let query = MdnsPacket::query(vec![Question::new(Name::new(&args.service)?, DnsType::Ptr)])
        .pack()?;
    client.send_multicast_packet(TaggedBytesMut::to_peer(MDNS_DEST_ADDR_IPV4, &query), network);
    if args.ipv6 {
        client.send_multicast_packet(TaggedBytesMut::to_peer(MDNS_DEST_ADDR_IPV6, &query), network);
    }
    let sent = client.flush_pending_sends();
    log::info!("browsing for {} ({} queries sent)", args.service, sent);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(args.timeout);
    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = client.socket_provider_mut().read_sockets() {
                    log::warn!("read failed: {}", err);
                }
                client.process_socket_events();
                client.flush_pending_sends();
                looper.run_pending();
            }
            _ = tokio::time::sleep_until(deadline) => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.notify_network_unrequested(listener);
    log::info!(
        "done after {} packets",
        client.received_packet_number()
    );
    Ok(())
}
