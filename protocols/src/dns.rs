//! # DNS Probes
//!
//! Two probes are run against a host listening on port 53:
//! * UDP: an `SOA` query for the configured domain, using the scanned host as
//!   the nameserver. The answer is flattened into string fields.
//! * TCP: a full zone transfer (`AXFR`). Each zone node maps to its records.
//!
//! Queries are encoded with `pnet`; replies are decoded with `dns_parser`.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use dns_parser::{Class, Packet, RData, ResourceRecord, ResponseCode};
use netrecon_common::config::ScanConfig;
use netrecon_common::error::ProbeInputError;
use netrecon_common::network::address::Address;
use netrecon_common::probe::{ErrorKind, Fields, PortProbeResult};
use pnet::packet::dns::{MutableDnsPacket, Opcode, Retcode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::debug;

use crate::errors::{REFUSED_DETAIL, RESET_DETAIL, classify_io_error};

pub const DNS_HDR_LEN: usize = 12;
const QTYPE_SOA: u16 = 6;
const QTYPE_AXFR: u16 = 252;
const QCLASS_IN: u16 = 1;
const MAX_UDP_MESSAGE: usize = 4096;

/// A syntactically valid domain name, stored without the trailing dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainName(String);

impl DomainName {
    pub fn parse(input: &str) -> Result<Self, ProbeInputError> {
        let name: &str = input.trim().trim_end_matches('.');
        let reject = |reason: &'static str| ProbeInputError::InvalidDomain {
            domain: input.to_string(),
            reason,
        };

        if name.is_empty() {
            return Err(reject("the name is empty"));
        }
        if name.len() > 253 {
            return Err(reject("the name is longer than 253 characters"));
        }
        for label in name.split('.') {
            if label.is_empty() {
                return Err(reject("the name contains an empty label"));
            }
            if label.len() > 63 {
                return Err(reject("a label is longer than 63 characters"));
            }
            if !label
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
            {
                return Err(reject("a label contains characters outside of [A-Za-z0-9-_]"));
            }
        }

        Ok(Self(name.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn fqdn(&self) -> String {
        format!("{}.", self.0)
    }
}

/// Resolves the `SOA` record of `domain` with `address` acting as the nameserver.
pub async fn probe_soa(
    address: Address,
    port: u16,
    domain: &DomainName,
    config: &ScanConfig,
) -> PortProbeResult {
    let id: u16 = rand::random();
    let query: Vec<u8> = match create_query_packet(domain.as_str(), QTYPE_SOA, id, true) {
        Ok(query) => query,
        Err(e) => return PortProbeResult::closed(ErrorKind::Form, e.to_string()),
    };

    let socket: UdpSocket = match UdpSocket::bind(("0.0.0.0", 0)).await {
        Ok(socket) => socket,
        Err(e) => return classify_io_error(&e),
    };
    if let Err(e) = socket.connect(address.socket(port)).await {
        return classify_io_error(&e);
    }
    if let Err(e) = socket.send(&query).await {
        return classify_io_error(&e);
    }

    let mut buffer: Vec<u8> = vec![0u8; MAX_UDP_MESSAGE];
    let read: usize = match timeout(config.dns_timeout, socket.recv(&mut buffer)).await {
        Ok(Ok(read)) => read,
        Ok(Err(e)) => return classify_io_error(&e),
        Err(_elapsed) => {
            return PortProbeResult::closed(
                ErrorKind::DnsTimeout,
                "The DNS operation timed out. Port is more than likely blocked or not open",
            );
        }
    };

    soa_from_response(&buffer[..read], id, address, port, domain)
}

/// Interprets a reply to an `SOA` query.
pub fn soa_from_response(
    data: &[u8],
    id: u16,
    server: Address,
    port: u16,
    domain: &DomainName,
) -> PortProbeResult {
    let packet: Packet = match Packet::parse(data) {
        Ok(packet) => packet,
        Err(e) => return malformed(&e.to_string()),
    };

    if packet.header.id != id {
        return malformed("the response id does not match the query id");
    }

    match packet.header.response_code {
        ResponseCode::NoError => {}
        ResponseCode::NameError => {
            return PortProbeResult::closed(
                ErrorKind::Nxdomain,
                format!("The DNS query name does not exist: {}", domain.as_str()),
            );
        }
        other => {
            debug!("{server} answered {} with {other:?}", domain.as_str());
            return PortProbeResult::closed(
                ErrorKind::NoNameservers,
                format!("{server} failed to answer the query for {}", domain.as_str()),
            );
        }
    }

    let Some(record) = packet
        .answers
        .iter()
        .find(|record| matches!(record.data, RData::SOA(_)))
    else {
        return PortProbeResult::closed(
            ErrorKind::NoAnswer,
            format!(
                "The DNS response does not contain an answer to the question: {} IN SOA",
                domain.fqdn()
            ),
        );
    };

    let record_text: String = record_to_text(&fqdn(&record.name.to_string()), record);
    let rdata: String = rdata_to_text(&record.data).1;
    let expiration: f64 = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
        + f64::from(record.ttl);

    let mut fields: Fields = Fields::new();
    fields.insert("Canonical Name".to_string(), domain.fqdn());
    fields.insert("Name".to_string(), domain.fqdn());
    fields.insert("Record Type".to_string(), "SOA".to_string());
    fields.insert("Record Class".to_string(), class_name(&record.cls).to_string());
    fields.insert("nameserver".to_string(), server.to_string());
    fields.insert("port".to_string(), port.to_string());
    fields.insert(
        "Answer".to_string(),
        sanitize_brackets(&format!(
            "[<DNS {} IN SOA RRset: [<{rdata}>]>]",
            fqdn(&record.name.to_string())
        )),
    );
    fields.insert("Minimum TTL".to_string(), record.ttl.to_string());
    fields.insert("expiration".to_string(), expiration.to_string());
    fields.insert("DNS Record Set".to_string(), sanitize_brackets(&record_text));

    PortProbeResult::Open(fields)
}

/// Requests a full zone transfer of `domain` from `address`.
pub async fn probe_zone_transfer(
    address: Address,
    port: u16,
    domain: &DomainName,
    config: &ScanConfig,
) -> PortProbeResult {
    let id: u16 = rand::random();
    let query: Vec<u8> = match create_query_packet(domain.as_str(), QTYPE_AXFR, id, false) {
        Ok(query) => query,
        Err(e) => return PortProbeResult::closed(ErrorKind::Form, e.to_string()),
    };

    let mut stream: TcpStream =
        match timeout(config.dns_timeout, TcpStream::connect(address.socket(port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return transfer_io_error(&e),
            Err(_elapsed) => return transfer_timed_out(address),
        };

    let mut framed: Vec<u8> = Vec::with_capacity(query.len() + 2);
    framed.extend_from_slice(&(query.len() as u16).to_be_bytes());
    framed.extend_from_slice(&query);
    if let Err(e) = stream.write_all(&framed).await {
        return transfer_io_error(&e);
    }

    let mut transfer: ZoneTransfer = ZoneTransfer::new(domain.clone(), address, id);
    while !transfer.is_complete() {
        let message: Vec<u8> = match timeout(config.dns_timeout, read_framed(&mut stream)).await {
            Ok(Ok(message)) => message,
            Ok(Err(e)) => return transfer_io_error(&e),
            Err(_elapsed) => return transfer_timed_out(address),
        };
        if let Err(result) = transfer.absorb(&message) {
            return result;
        }
    }

    transfer.into_result()
}

async fn read_framed(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let length: usize = stream.read_u16().await? as usize;
    let mut message: Vec<u8> = vec![0u8; length];
    stream.read_exact(&mut message).await?;
    Ok(message)
}

/// Accumulates the messages of one `AXFR` response stream.
///
/// The stream starts with the zone `SOA` and ends when it is repeated.
pub struct ZoneTransfer {
    domain: DomainName,
    server: Address,
    id: u16,
    soa_seen: usize,
    nodes: BTreeMap<String, Vec<String>>,
}

impl ZoneTransfer {
    pub fn new(domain: DomainName, server: Address, id: u16) -> Self {
        Self {
            domain,
            server,
            id,
            soa_seen: 0,
            nodes: BTreeMap::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.soa_seen >= 2
    }

    /// Folds one message in. `Err` carries the final closed result.
    pub fn absorb(&mut self, message: &[u8]) -> Result<(), PortProbeResult> {
        let packet: Packet = Packet::parse(message).map_err(|e| malformed(&e.to_string()))?;

        if packet.header.id != self.id {
            return Err(malformed("the response id does not match the query id"));
        }
        if packet.header.response_code != ResponseCode::NoError {
            return Err(PortProbeResult::closed(
                ErrorKind::Transfer,
                format!(
                    "Zone Transfer Error for {} on server {}",
                    self.domain.as_str(),
                    self.server
                ),
            ));
        }
        if packet.answers.is_empty() {
            return Err(malformed("No answer or RRset not for name"));
        }

        for record in &packet.answers {
            let is_soa: bool = matches!(record.data, RData::SOA(_));
            if self.soa_seen == 0 && !is_soa {
                return Err(malformed("No answer or RRset not for name"));
            }
            if is_soa {
                self.soa_seen += 1;
                if self.soa_seen == 2 {
                    break;
                }
            }

            let node: String = relative_node(&record.name.to_string(), &self.domain);
            let line: String = sanitize_brackets(&record_to_text(&node, record));
            self.nodes.entry(node).or_default().push(line);
        }

        Ok(())
    }

    pub fn into_result(self) -> PortProbeResult {
        let fields: Fields = self
            .nodes
            .into_iter()
            .map(|(node, lines)| (node, lines.join("\n")))
            .collect();
        PortProbeResult::Open(fields)
    }
}

/// Builds a single-question query, header first, then the encoded question.
pub fn create_query_packet(
    name: &str,
    qtype: u16,
    id: u16,
    recursion_desired: bool,
) -> anyhow::Result<Vec<u8>> {
    let qname: Vec<u8> = encode_dns_name(name);
    let total: usize = DNS_HDR_LEN + qname.len() + 4;
    let mut buffer: Vec<u8> = vec![0u8; total];

    {
        let mut dns: MutableDnsPacket =
            MutableDnsPacket::new(&mut buffer).context("creating dns header")?;
        dns.set_id(id);
        dns.set_is_response(0);
        dns.set_opcode(Opcode::StandardQuery);
        dns.set_is_authoriative(0);
        dns.set_is_truncated(0);
        dns.set_is_recursion_desirable(u8::from(recursion_desired));
        dns.set_is_recursion_available(0);
        dns.set_zero_reserved(0);
        dns.set_is_non_authenticated_data(0);
        dns.set_rcode(Retcode::NoError);
        dns.set_query_count(1);
        dns.set_response_count(0);
        dns.set_authority_rr_count(0);
        dns.set_additional_rr_count(0);
    }

    let mut cursor: usize = DNS_HDR_LEN;
    buffer[cursor..cursor + qname.len()].copy_from_slice(&qname);
    cursor += qname.len();
    buffer[cursor..cursor + 2].copy_from_slice(&qtype.to_be_bytes());
    cursor += 2;
    buffer[cursor..cursor + 2].copy_from_slice(&QCLASS_IN.to_be_bytes());

    Ok(buffer)
}

fn encode_dns_name(name: &str) -> Vec<u8> {
    let mut encoded: Vec<u8> = Vec::new();
    for label in name.split('.') {
        if label.is_empty() {
            continue;
        }
        encoded.push(label.len() as u8);
        encoded.extend_from_slice(label.as_bytes());
    }
    encoded.push(0);
    encoded
}

/// Makes record text safe for consumers that treat `<...>` as markup.
pub fn sanitize_brackets(text: &str) -> String {
    text.replace('<', "[").replace('>', "]")
}

fn record_to_text(owner: &str, record: &ResourceRecord) -> String {
    let (record_type, rdata): (&str, String) = rdata_to_text(&record.data);
    format!(
        "{owner} {} {} {record_type} {rdata}",
        record.ttl,
        class_name(&record.cls)
    )
}

fn rdata_to_text(data: &RData) -> (&'static str, String) {
    match data {
        RData::A(a) => ("A", a.0.to_string()),
        RData::AAAA(aaaa) => ("AAAA", aaaa.0.to_string()),
        RData::CNAME(cname) => ("CNAME", fqdn(&cname.0.to_string())),
        RData::NS(ns) => ("NS", fqdn(&ns.0.to_string())),
        RData::PTR(ptr) => ("PTR", fqdn(&ptr.0.to_string())),
        RData::MX(mx) => (
            "MX",
            format!("{} {}", mx.preference, fqdn(&mx.exchange.to_string())),
        ),
        RData::SRV(srv) => (
            "SRV",
            format!(
                "{} {} {} {}",
                srv.priority,
                srv.weight,
                srv.port,
                fqdn(&srv.target.to_string())
            ),
        ),
        RData::SOA(soa) => (
            "SOA",
            format!(
                "{} {} {} {} {} {} {}",
                fqdn(&soa.primary_ns.to_string()),
                fqdn(&soa.mailbox.to_string()),
                soa.serial,
                soa.refresh,
                soa.retry,
                soa.expire,
                soa.minimum_ttl
            ),
        ),
        RData::TXT(txt) => (
            "TXT",
            txt.iter()
                .map(|chunk| format!("\"{}\"", String::from_utf8_lossy(chunk)))
                .collect::<Vec<String>>()
                .join(" "),
        ),
        _ => ("UNKNOWN", String::new()),
    }
}

fn class_name(class: &Class) -> &'static str {
    match class {
        Class::IN => "IN",
        Class::CH => "CH",
        Class::HS => "HS",
        _ => "CS",
    }
}

fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

/// `@` for the apex, the leading labels for names inside the zone.
fn relative_node(owner: &str, domain: &DomainName) -> String {
    let owner: String = owner.trim_end_matches('.').to_ascii_lowercase();
    if owner == domain.as_str() {
        return "@".to_string();
    }
    match owner.strip_suffix(&format!(".{}", domain.as_str())) {
        Some(relative) => relative.to_string(),
        None => fqdn(&owner),
    }
}

fn malformed(detail: &str) -> PortProbeResult {
    PortProbeResult::closed(ErrorKind::Form, detail)
}

fn transfer_io_error(error: &std::io::Error) -> PortProbeResult {
    match error.kind() {
        std::io::ErrorKind::ConnectionRefused => {
            PortProbeResult::closed(ErrorKind::ConnectionRefused, REFUSED_DETAIL)
        }
        std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
            PortProbeResult::closed(ErrorKind::ConnectionReset, RESET_DETAIL)
        }
        std::io::ErrorKind::UnexpectedEof => malformed("No answer or RRset not for name"),
        _ => classify_io_error(error),
    }
}

fn transfer_timed_out(server: Address) -> PortProbeResult {
    PortProbeResult::closed(
        ErrorKind::Timeout,
        format!("The zone transfer from {server} timed out"),
    )
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
