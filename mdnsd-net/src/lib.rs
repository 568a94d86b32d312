//! Real multicast transport for `mdnsd-engine`: per-interface sockets joined
//! to the mDNS multicast group, plus IPv4 interface enumeration.
//!
//! This crate owns no protocol knowledge — it only knows how to move bytes
//! in and out of the network and which local addresses exist. Everything
//! else (wire format, reactor, responder, browser) lives in `mdnsd-engine`.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use mdnsd_engine::Transport;

/// The RFC 6762 canonical mDNS multicast group.
pub const MDNS_ADDR: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
pub const MDNS_PORT: u16 = 5353;

/// Which local IPv4 interfaces to bind and join the multicast group on.
#[derive(Debug, Clone)]
pub enum InterfaceSelector {
    /// Every non-loopback IPv4 interface found.
    All,
    /// Only the dotted-quad addresses named here.
    Named(Vec<String>),
}

impl InterfaceSelector {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("all") {
            InterfaceSelector::All
        } else {
            InterfaceSelector::Named(value.split(',').map(|s| s.trim().to_string()).collect())
        }
    }
}

fn select_addrs<I: IntoIterator<Item = Ipv4Addr>>(
    all: I,
    selector: &InterfaceSelector,
) -> Vec<Ipv4Addr> {
    match selector {
        InterfaceSelector::All => all.into_iter().collect(),
        InterfaceSelector::Named(names) => all
            .into_iter()
            .filter(|addr| names.iter().any(|n| n == &addr.to_string()))
            .collect(),
    }
}

/// Enumerates local, non-loopback IPv4 addresses matching `selector`.
pub fn resolve_local_addrs(selector: &InterfaceSelector) -> io::Result<Vec<Ipv4Addr>> {
    let all = if_addrs::get_if_addrs()?.into_iter().filter_map(|iface| {
        if iface.is_loopback() {
            return None;
        }
        match iface.ip() {
            std::net::IpAddr::V4(addr) => Some(addr),
            std::net::IpAddr::V6(_) => None,
        }
    });
    Ok(select_addrs(all, selector))
}

fn create_socket(bind_addr: Ipv4Addr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, MDNS_PORT).into())?;
    socket.join_multicast_v4(&MDNS_ADDR, &bind_addr)?;
    socket.set_multicast_ttl_v4(255)?;
    socket.set_multicast_loop_v4(true)?;
    Ok(socket.into())
}

/// Real multicast transport: one joined socket per local interface, with a
/// background reader thread per socket funneling datagrams into a single
/// channel so `recv` presents the reactor with one blocking call regardless
/// of how many interfaces are in play.
pub struct MulticastTransport {
    send_sockets: Vec<UdpSocket>,
    inbound_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    wake_tx: mpsc::Sender<Vec<u8>>,
    timeout: Mutex<Duration>,
    local_addrs: Vec<Ipv4Addr>,
    _readers: Vec<std::thread::JoinHandle<()>>,
}

impl MulticastTransport {
    #[tracing::instrument(skip(selector))]
    pub fn new(selector: &InterfaceSelector) -> io::Result<Self> {
        let local_addrs = resolve_local_addrs(selector)?;
        if local_addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "no matching local IPv4 interfaces to bind",
            ));
        }

        let (tx, rx) = mpsc::channel();
        let mut send_sockets = Vec::with_capacity(local_addrs.len());
        let mut readers = Vec::with_capacity(local_addrs.len());

        for addr in &local_addrs {
            let socket = create_socket(*addr)?;
            let reader_socket = socket.try_clone()?;
            let reader_tx = tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("mdnsd-net-{addr}"))
                .spawn(move || read_loop(reader_socket, reader_tx))
                .expect("failed to spawn mdns reader thread");
            send_sockets.push(socket);
            readers.push(handle);
        }

        Ok(Self {
            send_sockets,
            inbound_rx: Mutex::new(rx),
            wake_tx: tx,
            timeout: Mutex::new(Duration::from_millis(50)),
            local_addrs,
            _readers: readers,
        })
    }
}

fn read_loop(socket: UdpSocket, tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = vec![0u8; mdnsd_proto::buffer::MAX_MESSAGE_SIZE];
    loop {
        match socket.recv_from(&mut buf) {
            Ok((len, _from)) => {
                if tx.send(buf[..len].to_vec()).is_err() {
                    return;
                }
            }
            Err(error) => {
                tracing::debug!(%error, "mdns read loop error, stopping");
                return;
            }
        }
    }
}

impl Transport for MulticastTransport {
    fn send(&self, bytes: &[u8]) -> io::Result<()> {
        let dest = SocketAddr::V4(SocketAddrV4::new(MDNS_ADDR, MDNS_PORT));
        for socket in &self.send_sockets {
            socket.send_to(bytes, dest)?;
        }
        Ok(())
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let timeout = *self.timeout.lock().expect("timeout mutex poisoned");
        let rx = self.inbound_rx.lock().expect("inbound mutex poisoned");
        match rx.recv_timeout(timeout) {
            Ok(bytes) => {
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok(len)
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Err(io::Error::from(io::ErrorKind::TimedOut)),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            }
        }
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        *self.timeout.lock().expect("timeout mutex poisoned") =
            timeout.unwrap_or(Duration::from_millis(50));
        Ok(())
    }

    fn local_addrs(&self) -> Vec<Ipv4Addr> {
        self.local_addrs.clone()
    }

    fn wake(&self) -> io::Result<()> {
        let _ = self.wake_tx.send(Vec::new());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_keep_only_named_addrs() {
        let all = vec![
            Ipv4Addr::new(192, 168, 1, 5),
            Ipv4Addr::new(10, 0, 0, 2),
        ];
        let selector = InterfaceSelector::Named(vec!["10.0.0.2".to_string()]);
        assert_eq!(select_addrs(all, &selector), vec![Ipv4Addr::new(10, 0, 0, 2)]);
    }

    #[test]
    fn should_keep_every_addr_for_all() {
        let all = vec![Ipv4Addr::new(192, 168, 1, 5), Ipv4Addr::new(10, 0, 0, 2)];
        let selector = InterfaceSelector::All;
        assert_eq!(select_addrs(all.clone(), &selector), all);
    }

    #[test]
    fn should_parse_all_case_insensitively() {
        assert!(matches!(InterfaceSelector::parse("ALL"), InterfaceSelector::All));
        assert!(matches!(InterfaceSelector::parse("all"), InterfaceSelector::All));
    }

    #[test]
    fn should_parse_a_comma_separated_list() {
        match InterfaceSelector::parse("10.0.0.2, 10.0.0.3") {
            InterfaceSelector::Named(names) => {
                assert_eq!(names, vec!["10.0.0.2".to_string(), "10.0.0.3".to_string()]);
            }
            InterfaceSelector::All => panic!("expected Named"),
        }
    }
}
