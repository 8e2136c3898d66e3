//! ICMP echo reachability: native raw-socket ping with a system `ping` fallback

use crate::network::socket::resolve;
use crate::MonitorError;
use once_cell::sync::Lazy;
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{self, IcmpCode, IcmpPacket, IcmpTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;

const ECHO_PACKET_SIZE: usize = 64;
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(5);

static PING_TIME_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"time[=<]\s*(\d+(?:\.\d+)?)\s*ms").ok());

/// How host reachability is tested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IcmpMode {
    /// Native echo, falling back to the system `ping` when raw sockets are refused
    #[default]
    Auto,
    /// Raw-socket echo only (needs CAP_NET_RAW or root)
    Native,
    /// Always shell out to the system `ping`
    System,
}

/// Native ICMP echo over a raw socket
#[derive(Debug)]
pub struct NativePinger {
    identifier: u16,
    sequence: AtomicU16,
}

impl Default for NativePinger {
    fn default() -> Self {
        Self::new()
    }
}

impl NativePinger {
    pub fn new() -> Self {
        Self {
            identifier: rand::thread_rng().gen::<u16>(),
            sequence: AtomicU16::new(0),
        }
    }

    /// Send one echo request and wait for the matching reply
    pub async fn ping(&self, target: Ipv4Addr, timeout_duration: Duration) -> crate::Result<Duration> {
        let socket = Self::open_socket(target)?;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        let request = build_echo_request(self.identifier, sequence);
        let dest = SockAddr::from(SocketAddr::new(IpAddr::V4(target), 0));
        socket
            .send_to(&request, &dest)
            .map_err(|e| MonitorError::Network(e.to_string()))?;

        match timeout(timeout_duration, self.wait_for_reply(&socket, sequence, start)).await {
            Ok(result) => result,
            Err(_) => Err(MonitorError::Timeout(timeout_duration)),
        }
    }

    fn open_socket(target: Ipv4Addr) -> crate::Result<Socket> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)).map_err(|e| {
            if e.kind() == io::ErrorKind::PermissionDenied {
                MonitorError::Permission("raw ICMP socket".to_string())
            } else {
                MonitorError::Network(e.to_string())
            }
        })?;

        socket
            .set_nonblocking(true)
            .map_err(|e| MonitorError::Network(e.to_string()))?;
        // Kernel drops datagrams from other sources
        socket
            .connect(&SockAddr::from(SocketAddr::new(IpAddr::V4(target), 0)))
            .map_err(|e| MonitorError::Network(e.to_string()))?;

        Ok(socket)
    }

    async fn wait_for_reply(&self, socket: &Socket, sequence: u16, start: Instant) -> crate::Result<Duration> {
        let mut buffer = [0u8; 1024];

        loop {
            let mut reader = socket;
            match reader.read(&mut buffer) {
                Ok(len) => {
                    if is_matching_reply(&buffer[..len], self.identifier, sequence) {
                        return Ok(start.elapsed());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    tokio::time::sleep(RECV_POLL_INTERVAL).await;
                }
                Err(e) => return Err(MonitorError::Network(e.to_string())),
            }
        }
    }
}

fn build_echo_request(identifier: u16, sequence: u16) -> [u8; ECHO_PACKET_SIZE] {
    let mut buffer = [0u8; ECHO_PACKET_SIZE];
    if let Some(mut packet) = MutableEchoRequestPacket::new(&mut buffer) {
        packet.set_icmp_type(IcmpTypes::EchoRequest);
        packet.set_icmp_code(IcmpCode(0));
        packet.set_identifier(identifier);
        packet.set_sequence_number(sequence);
        packet.set_checksum(0);
    }

    let checksum = IcmpPacket::new(&buffer).map(|p| icmp::checksum(&p)).unwrap_or(0);
    if let Some(mut packet) = MutableEchoRequestPacket::new(&mut buffer) {
        packet.set_checksum(checksum);
    }
    buffer
}

/// Raw IPv4 sockets deliver the IP header in front of the ICMP message
fn is_matching_reply(datagram: &[u8], identifier: u16, sequence: u16) -> bool {
    let Some(ip_packet) = Ipv4Packet::new(datagram) else {
        return false;
    };
    if ip_packet.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return false;
    }

    let offset = (ip_packet.get_header_length() as usize) * 4;
    if datagram.len() <= offset {
        return false;
    }
    match EchoReplyPacket::new(&datagram[offset..]) {
        Some(reply) => {
            reply.get_icmp_type() == IcmpTypes::EchoReply
                && reply.get_identifier() == identifier
                && reply.get_sequence_number() == sequence
        }
        None => false,
    }
}

/// Reachability via the platform `ping` command
#[derive(Debug, Clone, Default)]
pub struct SystemPinger;

impl SystemPinger {
    pub async fn ping(&self, address: &str, timeout_duration: Duration) -> crate::Result<Duration> {
        let mut cmd = Command::new("ping");
        if cfg!(windows) {
            cmd.args(["-n", "1", "-w", &timeout_duration.as_millis().to_string(), address]);
        } else {
            let secs = timeout_duration.as_secs_f64().ceil().max(1.0) as u64;
            cmd.args(["-c", "1", "-W", &secs.to_string(), address]);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let start = Instant::now();
        let child = cmd.spawn()?;
        let output = match timeout(timeout_duration, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => return Err(MonitorError::Timeout(timeout_duration)),
        };
        let elapsed = start.elapsed();

        if !output.status.success() {
            return Err(MonitorError::Network(format!("{} did not answer ping", address)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_ping_time(&stdout).unwrap_or(elapsed))
    }
}

/// Extract the round-trip time from `ping` output (`time=12.3 ms`, `time<1ms`)
pub fn parse_ping_time(output: &str) -> Option<Duration> {
    let captures = PING_TIME_RE.as_ref()?.captures(output)?;
    let millis: f64 = captures.get(1)?.as_str().parse().ok()?;
    Some(Duration::from_secs_f64(millis / 1000.0))
}

/// Host reachability tester honoring the configured [`IcmpMode`]
#[derive(Debug)]
pub struct Pinger {
    mode: IcmpMode,
    native: NativePinger,
    system: SystemPinger,
    native_denied: AtomicBool,
}

impl Pinger {
    pub fn new(mode: IcmpMode) -> Self {
        Self {
            mode,
            native: NativePinger::new(),
            system: SystemPinger,
            native_denied: AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> IcmpMode {
        self.mode
    }

    /// Returns the round-trip time of a successful echo
    pub async fn ping(&self, address: &str, timeout_duration: Duration) -> crate::Result<Duration> {
        if self.mode == IcmpMode::System || self.native_denied.load(Ordering::Relaxed) {
            return self.system.ping(address, timeout_duration).await;
        }

        let start = Instant::now();
        let target = match self.route(address, timeout_duration).await? {
            EchoRoute::Native(target) => target,
            EchoRoute::System => {
                let remaining = timeout_duration.saturating_sub(start.elapsed());
                return self.system.ping(address, remaining).await;
            }
        };

        match self.native.ping(target, timeout_duration).await {
            Err(MonitorError::Permission(reason)) if self.mode == IcmpMode::Auto => {
                if !self.native_denied.swap(true, Ordering::Relaxed) {
                    log::warn!(
                        "Native ICMP unavailable ({}); falling back to system ping",
                        reason
                    );
                }
                let remaining = timeout_duration.saturating_sub(start.elapsed());
                self.system.ping(address, remaining).await
            }
            other => other,
        }
    }

    /// Decide how `address` is pinged. Resolution prefers IPv4, so a v6
    /// result means the name has no IPv4 address at all.
    async fn route(&self, address: &str, timeout_duration: Duration) -> crate::Result<EchoRoute> {
        let addr = timeout(timeout_duration, resolve(address, 0))
            .await
            .map_err(|_| MonitorError::Timeout(timeout_duration))??;
        match (addr.ip(), self.mode) {
            (IpAddr::V4(v4), _) => Ok(EchoRoute::Native(v4)),
            (IpAddr::V6(_), IcmpMode::Native) => {
                Err(MonitorError::Resolve(format!("{}: no IPv4 address", address)))
            }
            (IpAddr::V6(_), _) => Ok(EchoRoute::System),
        }
    }
}

/// Which echo implementation handles a resolved address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EchoRoute {
    Native(Ipv4Addr),
    /// IPv6-only targets; the raw socket speaks ICMPv4 only
    System,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unix_ping_output() {
        let output = "64 bytes from 1.1.1.1: icmp_seq=1 ttl=57 time=12.4 ms";
        let rtt = parse_ping_time(output).unwrap();
        assert!((rtt.as_secs_f64() - 0.0124).abs() < 1e-6);
    }

    #[test]
    fn test_parse_windows_ping_output() {
        let output = "Reply from 10.0.0.1: bytes=32 time<1ms TTL=64";
        assert_eq!(parse_ping_time(output), Some(Duration::from_millis(1)));
    }

    #[test]
    fn test_parse_without_time() {
        assert_eq!(parse_ping_time("Request timed out."), None);
    }

    #[test]
    fn test_echo_request_checksum_verifies() {
        let request = build_echo_request(0xbeef, 7);
        let packet = IcmpPacket::new(&request).unwrap();
        assert_eq!(packet.get_icmp_type(), IcmpTypes::EchoRequest);
        assert_eq!(icmp::checksum(&packet), packet.get_checksum());
    }

    #[test]
    fn test_reply_matching_requires_identifier() {
        assert!(!is_matching_reply(&[0u8; 8], 1, 1));
    }

    #[tokio::test]
    async fn test_auto_routes_ipv6_only_address_to_system_ping() {
        let pinger = Pinger::new(IcmpMode::Auto);
        let route = pinger.route("::1", Duration::from_secs(1)).await.unwrap();
        assert_eq!(route, EchoRoute::System);
    }

    #[tokio::test]
    async fn test_auto_routes_ipv4_address_natively() {
        let pinger = Pinger::new(IcmpMode::Auto);
        let route = pinger.route("127.0.0.1", Duration::from_secs(1)).await.unwrap();
        assert_eq!(route, EchoRoute::Native(Ipv4Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn test_native_mode_rejects_ipv6_only_address() {
        let pinger = Pinger::new(IcmpMode::Native);
        let err = pinger.route("::1", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, MonitorError::Resolve(ref msg) if msg.contains("no IPv4")));
    }
}
