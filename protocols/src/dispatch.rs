use netrecon_common::config::ScanConfig;
use netrecon_common::network::address::Address;
use netrecon_common::probe::{PortProbeResult, Protocol};

use crate::dns::{self, DomainName};
use crate::http::{self, Scheme};
use crate::{tcp, udp};

/// Which probe handles a given `(protocol, port)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    GenericTcp,
    GenericUdp,
    Http,
    Https,
    DnsSoa,
    DnsZoneTransfer,
}

pub fn select_probe(protocol: Protocol, port: u16) -> ProbeKind {
    match (protocol, port) {
        (Protocol::Tcp, 53) => ProbeKind::DnsZoneTransfer,
        (Protocol::Tcp, 80 | 8080) => ProbeKind::Http,
        (Protocol::Tcp, 443 | 8443) => ProbeKind::Https,
        (Protocol::Tcp, _) => ProbeKind::GenericTcp,
        (Protocol::Udp, 53) => ProbeKind::DnsSoa,
        (Protocol::Udp, _) => ProbeKind::GenericUdp,
    }
}

/// Runs the probe matching `(protocol, port)` against `address`.
pub async fn probe_port(
    address: Address,
    protocol: Protocol,
    port: u16,
    domain: &DomainName,
    config: &ScanConfig,
) -> PortProbeResult {
    match select_probe(protocol, port) {
        ProbeKind::GenericTcp => tcp::probe(address, port, config).await,
        ProbeKind::GenericUdp => udp::probe(address, port, config).await,
        ProbeKind::Http => http::probe(address, port, Scheme::Http, config).await,
        ProbeKind::Https => http::probe(address, port, Scheme::Https, config).await,
        ProbeKind::DnsSoa => dns::probe_soa(address, port, domain, config).await,
        ProbeKind::DnsZoneTransfer => {
            dns::probe_zone_transfer(address, port, domain, config).await
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
