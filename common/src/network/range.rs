use std::net::Ipv4Addr;

use pnet::ipnetwork::Ipv4Network;

use crate::error::TargetError;
use crate::network::address::Address;

/// An inclusive span of IPv4 hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Self {
        Self {
            start_addr,
            end_addr,
        }
    }

    /// Yields every address in the range. A reversed range yields nothing.
    pub fn addresses(&self) -> impl Iterator<Item = Address> + use<> {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        (start..=end).map(|ip| Address::new(Ipv4Addr::from(ip)))
    }

    pub fn len(&self) -> usize {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        if end < start {
            0
        } else {
            (end - start) as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Expands a CIDR block into its usable hosts.
///
/// Network and broadcast addresses are excluded, except for `/31` and `/32`
/// where every address is a host.
pub fn cidr_range(ip: Ipv4Addr, prefix: u8) -> Result<Ipv4Range, TargetError> {
    let network: Ipv4Network =
        Ipv4Network::new(ip, prefix).map_err(|e| TargetError::Invalid {
            input: format!("{ip}/{prefix}"),
            reason: e.to_string(),
        })?;

    let start: u32 = network.network().into();
    let end: u32 = network.broadcast().into();

    if prefix >= 31 {
        return Ok(Ipv4Range::new(start.into(), end.into()));
    }

    Ok(Ipv4Range::new((start + 1).into(), (end - 1).into()))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cidr_excludes_network_and_broadcast() {
        let range: Ipv4Range = cidr_range(Ipv4Addr::new(10, 0, 0, 0), 30).unwrap();
        let hosts: Vec<String> = range.addresses().map(|a| a.to_string()).collect();
        assert_eq!(hosts, vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn cidr_small_prefixes_keep_every_address() {
        assert_eq!(cidr_range(Ipv4Addr::new(10, 0, 0, 7), 32).unwrap().len(), 1);
        assert_eq!(cidr_range(Ipv4Addr::new(10, 0, 0, 6), 31).unwrap().len(), 2);
    }

    #[test]
    fn cidr_rejects_bad_prefix() {
        assert!(cidr_range(Ipv4Addr::new(10, 0, 0, 0), 33).is_err());
    }

    #[test]
    fn reversed_range_is_empty() {
        let range: Ipv4Range = Ipv4Range::new(Ipv4Addr::new(10, 0, 0, 9), Ipv4Addr::new(10, 0, 0, 1));
        assert!(range.is_empty());
        assert_eq!(range.addresses().count(), 0);
    }
}
