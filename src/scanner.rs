//! mDNS discovery of gateways on the local network.
//! Sends a single `_coap._udp.local` query and collects the SRV and A answers.

use crate::error::{Result, TradfriError};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use futures_core::stream::Stream;
use futures_util::StreamExt;
use log::{debug, info, warn};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, SocketAddrV4};
use tokio::net::UdpSocket;
use tokio::time::{Duration, Instant};

pub const MDNS_ADDR: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
pub const MDNS_PORT: u16 = 5353;
pub const SERVICE: &str = "_coap._udp.local";
pub const GATEWAY_HOST_PREFIX: &str = "TRADFRI-Gateway-";
pub const SCAN_TIMEOUT: Duration = Duration::from_secs(1);

const HEADER_LEN: usize = 12;
const FLAG_RESPONSE: u16 = 0x8000;
const TYPE_A: u16 = 1;
const TYPE_PTR: u16 = 12;
const TYPE_SRV: u16 = 33;
const CLASS_IN: u16 = 1;
/// QU bit: ask responders to answer our ephemeral port directly.
const UNICAST_RESPONSE: u16 = 0x8000;
const MAX_LABEL_LEN: usize = 63;
const MAX_POINTER_JUMPS: usize = 16;
const RECV_BUFFER: usize = 9000;

/// A gateway answering the discovery query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredGateway {
    /// Service instance name
    pub name: String,
    /// Host name from the SRV record
    pub host: String,
    /// `ip:port`, ready for [`ClientBuilder`](crate::ClientBuilder)
    pub address: String,
}

/// Resource records relevant to service discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Ptr { name: String, target: String },
    Srv { name: String, port: u16, target: String },
    A { name: String, addr: Ipv4Addr },
}

fn truncated() -> TradfriError {
    TradfriError::InvalidMessage("truncated DNS message".to_string())
}

fn u16_at(data: &[u8], pos: usize) -> Result<u16> {
    data.get(pos..pos + 2)
        .map(BigEndian::read_u16)
        .ok_or_else(truncated)
}

fn write_name(buf: &mut Vec<u8>, name: &str) -> Result<()> {
    for label in name.trim_end_matches('.').split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(TradfriError::InvalidMessage(format!(
                "Invalid DNS label in '{}'",
                name
            )));
        }
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    buf.push(0);
    Ok(())
}

/// Reads a possibly compressed name starting at `start`.
///
/// Returns the dotted name and the offset just past its first encoding, not
/// past any pointer target.
fn read_name(data: &[u8], start: usize) -> Result<(String, usize)> {
    let mut labels = Vec::new();
    let mut pos = start;
    let mut end = None;
    let mut jumps = 0;

    loop {
        let len = *data.get(pos).ok_or_else(truncated)? as usize;
        match len & 0xc0 {
            0x00 if len == 0 => {
                pos += 1;
                break;
            }
            0x00 => {
                let label = data.get(pos + 1..pos + 1 + len).ok_or_else(truncated)?;
                labels.push(String::from_utf8_lossy(label).into_owned());
                pos += 1 + len;
            }
            0xc0 => {
                let low = *data.get(pos + 1).ok_or_else(truncated)? as usize;
                end.get_or_insert(pos + 2);
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return Err(TradfriError::InvalidMessage(
                        "DNS name compression loop".to_string(),
                    ));
                }
                pos = ((len & 0x3f) << 8) | low;
            }
            _ => {
                return Err(TradfriError::InvalidMessage(format!(
                    "Unsupported DNS label type {:#04x}",
                    len
                )));
            }
        }
    }

    Ok((labels.join("."), end.unwrap_or(pos)))
}

/// Builds a one-shot PTR query for `service`.
pub fn build_query(service: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(HEADER_LEN + service.len() + 6);
    buf.write_u16::<BigEndian>(0)?; // id
    buf.write_u16::<BigEndian>(0)?; // flags
    buf.write_u16::<BigEndian>(1)?; // questions
    buf.write_u16::<BigEndian>(0)?;
    buf.write_u16::<BigEndian>(0)?;
    buf.write_u16::<BigEndian>(0)?;
    write_name(&mut buf, service)?;
    buf.write_u16::<BigEndian>(TYPE_PTR)?;
    buf.write_u16::<BigEndian>(CLASS_IN | UNICAST_RESPONSE)?;
    Ok(buf)
}

/// Extracts PTR, SRV and A records from every section of a response.
///
/// Queries seen on the wire yield no records.
pub fn parse_response(data: &[u8]) -> Result<Vec<Record>> {
    if data.len() < HEADER_LEN {
        return Err(truncated());
    }
    let flags = u16_at(data, 2)?;
    if flags & FLAG_RESPONSE == 0 {
        return Ok(Vec::new());
    }
    let questions = u16_at(data, 4)?;
    let records =
        u16_at(data, 6)? as usize + u16_at(data, 8)? as usize + u16_at(data, 10)? as usize;

    let mut pos = HEADER_LEN;
    for _ in 0..questions {
        let (_, next) = read_name(data, pos)?;
        pos = next + 4;
    }

    let mut out = Vec::new();
    for _ in 0..records {
        let (name, next) = read_name(data, pos)?;
        let rtype = u16_at(data, next)?;
        let rdlen = u16_at(data, next + 8)? as usize;
        let rdata = next + 10;
        let rdata_end = rdata + rdlen;
        if rdata_end > data.len() {
            return Err(truncated());
        }

        match rtype {
            TYPE_PTR => {
                let (target, _) = read_name(data, rdata)?;
                out.push(Record::Ptr { name, target });
            }
            TYPE_SRV if rdlen >= 7 => {
                let port = u16_at(data, rdata + 4)?;
                let (target, _) = read_name(data, rdata + 6)?;
                out.push(Record::Srv { name, port, target });
            }
            TYPE_A if rdlen == 4 => {
                let addr = Ipv4Addr::new(
                    data[rdata],
                    data[rdata + 1],
                    data[rdata + 2],
                    data[rdata + 3],
                );
                out.push(Record::A { name, addr });
            }
            _ => {}
        }
        pos = rdata_end;
    }
    Ok(out)
}

/// Records gathered over the scan window; answers may span packets.
#[derive(Default)]
struct Answers {
    /// instance → (port, host)
    services: HashMap<String, (u16, String)>,
    /// lowercased host → address
    hosts: HashMap<String, Ipv4Addr>,
}

impl Answers {
    fn add(&mut self, records: Vec<Record>) {
        for record in records {
            match record {
                Record::Srv { name, port, target } => {
                    if name.to_ascii_lowercase().ends_with(SERVICE) {
                        self.services.insert(name, (port, target));
                    }
                }
                Record::A { name, addr } => {
                    self.hosts.insert(name.to_ascii_lowercase(), addr);
                }
                Record::Ptr { .. } => {}
            }
        }
    }

    fn gateways(&self) -> Vec<DiscoveredGateway> {
        let mut found: Vec<_> = self
            .services
            .iter()
            .filter(|(_, (_, host))| host.starts_with(GATEWAY_HOST_PREFIX))
            .filter_map(|(name, (port, host))| {
                let ip = self.hosts.get(&host.to_ascii_lowercase())?;
                Some(DiscoveredGateway {
                    name: name.clone(),
                    host: host.clone(),
                    address: format!("{}:{}", ip, port),
                })
            })
            .collect();
        found.sort_by(|a, b| a.address.cmp(&b.address));
        found
    }
}

/// Finds gateways by querying mDNS for CoAP services.
pub struct Scanner {
    /// How long answers are collected
    pub timeout: Duration,
    /// Local interface address to send from
    pub bind_addr: Ipv4Addr,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            timeout: SCAN_TIMEOUT,
            bind_addr: Ipv4Addr::UNSPECIFIED,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_bind_addr(mut self, addr: Ipv4Addr) -> Self {
        self.bind_addr = addr;
        self
    }

    fn create_socket(&self) -> Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        if let Err(e) = socket.set_reuse_address(true) {
            warn!("Failed to set reuse_address: {}", e);
        }
        if !self.bind_addr.is_unspecified() {
            socket.set_multicast_if_v4(&self.bind_addr)?;
        }
        socket.set_multicast_ttl_v4(255)?;
        socket.bind(&SockAddr::from(SocketAddrV4::new(self.bind_addr, 0)))?;
        socket.set_nonblocking(true)?;

        let std_socket: std::net::UdpSocket = socket.into();
        Ok(UdpSocket::from_std(std_socket)?)
    }

    /// Yields each gateway as soon as both its SRV and A records are known.
    ///
    /// The stream ends when the scan window closes.
    pub fn stream(&self) -> impl Stream<Item = Result<DiscoveredGateway>> + Send + 'static {
        let socket = self.create_socket();
        let window = self.timeout;

        async_stream::stream! {
            let socket = match socket {
                Ok(s) => s,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let query = match build_query(SERVICE) {
                Ok(q) => q,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let target = SocketAddrV4::new(MDNS_ADDR, MDNS_PORT);
            if let Err(e) = socket.send_to(&query, target).await {
                yield Err(TradfriError::from(e));
                return;
            }
            debug!("Sent mDNS query for {} to {}", SERVICE, target);

            let deadline = Instant::now() + window;
            let mut answers = Answers::default();
            let mut seen = HashSet::new();
            let mut buf = vec![0u8; RECV_BUFFER];

            loop {
                let received = tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => break,
                    res = socket.recv_from(&mut buf) => res,
                };
                let (len, from) = match received {
                    Ok(r) => r,
                    Err(e) => {
                        warn!("mDNS receive failed: {}", e);
                        break;
                    }
                };
                debug!("mDNS packet from {} (hex): {}", from, hex::encode(&buf[..len]));

                match parse_response(&buf[..len]) {
                    Ok(records) => answers.add(records),
                    Err(e) => {
                        debug!("Ignoring mDNS packet from {}: {}", from, e);
                        continue;
                    }
                }
                for gateway in answers.gateways() {
                    if seen.insert(gateway.address.clone()) {
                        info!("Found gateway {} at {}", gateway.host, gateway.address);
                        yield Ok(gateway);
                    }
                }
            }
        }
    }

    /// Collects the addresses of every gateway answering within the window.
    pub async fn scan(&self) -> Result<Vec<String>> {
        info!("Scanning for gateways ({:?})...", self.timeout);
        let stream = self.stream();
        tokio::pin!(stream);

        let mut addresses = Vec::new();
        while let Some(gateway) = stream.next().await {
            addresses.push(gateway?.address);
        }
        info!("Scan finished. Found {} gateways.", addresses.len());
        Ok(addresses)
    }
}

/// Scans with default settings.
pub async fn discover() -> Result<Vec<String>> {
    Scanner::new().scan().await
}
