//! TCP connect and UDP liveness primitives

use crate::MonitorError;
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio::time::timeout;

/// Resolve `address` to a socket address, preferring IPv4
pub async fn resolve(address: &str, port: u16) -> crate::Result<SocketAddr> {
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    let addrs: Vec<SocketAddr> = lookup_host((address, port))
        .await
        .map_err(|e| MonitorError::Resolve(format!("{}: {}", address, e)))?
        .collect();

    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| MonitorError::Resolve(format!("{}: no addresses", address)))
}

fn classify_io_error(e: io::Error) -> MonitorError {
    match e.kind() {
        io::ErrorKind::PermissionDenied => MonitorError::Permission(e.to_string()),
        io::ErrorKind::ConnectionRefused => MonitorError::Network("Connection refused".to_string()),
        _ => MonitorError::Network(e.to_string()),
    }
}

/// TCP connect checker. A completed handshake means the service is up.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Connect to `address:port`, returning the handshake latency
    pub async fn connect(&self, address: &str, port: u16) -> crate::Result<Duration> {
        let start = Instant::now();
        let socket_addr = timeout(self.timeout, resolve(address, port))
            .await
            .map_err(|_| MonitorError::Timeout(self.timeout))??;

        let remaining = self.timeout.saturating_sub(start.elapsed());
        match timeout(remaining, TcpStream::connect(socket_addr)).await {
            Ok(Ok(stream)) => {
                let latency = start.elapsed();
                drop(stream);
                Ok(latency)
            }
            Ok(Err(e)) => Err(classify_io_error(e)),
            Err(_) => Err(MonitorError::Timeout(self.timeout)),
        }
    }
}

/// Outcome of a UDP liveness check that did not fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdpOutcome {
    /// The service answered
    Reply(Duration),
    /// Nothing came back before the deadline; the port is open or filtered
    Silent,
}

/// UDP checker. Uses a connected socket so that an ICMP port-unreachable
/// surfaces as `ConnectionRefused` on receive.
#[derive(Debug, Clone)]
pub struct UdpProber {
    timeout: Duration,
    payloads: UdpPayloads,
}

impl UdpProber {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            payloads: UdpPayloads::new(),
        }
    }

    pub async fn probe(&self, address: &str, port: u16) -> crate::Result<UdpOutcome> {
        let start = Instant::now();
        let socket_addr = timeout(self.timeout, resolve(address, port))
            .await
            .map_err(|_| MonitorError::Timeout(self.timeout))??;

        let bind_addr = match socket_addr {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(bind_addr).await.map_err(classify_io_error)?;
        socket.connect(socket_addr).await.map_err(classify_io_error)?;
        socket
            .send(self.payloads.get_payload(port))
            .await
            .map_err(classify_io_error)?;

        let mut buffer = [0u8; 1024];
        let remaining = self.timeout.saturating_sub(start.elapsed());
        match timeout(remaining, socket.recv(&mut buffer)).await {
            Ok(Ok(_)) => Ok(UdpOutcome::Reply(start.elapsed())),
            Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => Err(
                MonitorError::Network("Port unreachable".to_string()),
            ),
            Ok(Err(e)) => Err(classify_io_error(e)),
            Err(_) => Ok(UdpOutcome::Silent),
        }
    }
}

/// Protocol-specific datagrams that coax a reply out of well-known UDP services
#[derive(Debug, Clone)]
struct UdpPayloads {
    payloads: HashMap<u16, Vec<u8>>,
}

impl UdpPayloads {
    fn new() -> Self {
        let mut payloads = HashMap::new();

        // DNS query for example.com A
        payloads.insert(53, vec![
            0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x07, 0x65, 0x78, 0x61, 0x6d, 0x70, 0x6c, 0x65, 0x03, 0x63, 0x6f, 0x6d,
            0x00, 0x00, 0x01, 0x00, 0x01
        ]);

        // NTP client request
        let mut ntp = vec![0u8; 48];
        ntp[0] = 0x23;
        payloads.insert(123, ntp);

        // SNMP v1 get-request, community "public"
        payloads.insert(161, vec![
            0x30, 0x26, 0x02, 0x01, 0x00, 0x04, 0x06, 0x70, 0x75, 0x62, 0x6c, 0x69, 0x63,
            0xa0, 0x19, 0x02, 0x04, 0x12, 0x34, 0x56, 0x78, 0x02, 0x01, 0x00, 0x02, 0x01,
            0x00, 0x30, 0x0b, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x06, 0x01, 0x02, 0x01, 0x05, 0x00
        ]);

        payloads.insert(5060, b"OPTIONS sip:probe@localhost SIP/2.0\r\n\r\n".to_vec());

        Self { payloads }
    }

    fn get_payload(&self, port: u16) -> &[u8] {
        self.payloads
            .get(&port)
            .map(|p| p.as_slice())
            .unwrap_or(b"\r\n")
    }
}
