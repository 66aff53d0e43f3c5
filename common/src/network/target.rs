//! # Scan Target Model
//!
//! Parses the user-supplied target expression and expands it into concrete
//! [`Address`] values.
//!
//! Supported forms:
//! * A single IPv4 address (`192.168.1.5`).
//! * A range (`192.168.1.1-192.168.1.50` or the abbreviated `192.168.1.1-50`).
//! * A CIDR block (`192.168.1.0/24`), expanded to its usable hosts.
//! * A comma separated list of any of the above.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{AddressError, TargetError};
use crate::network::address::Address;
use crate::network::range::{self, Ipv4Range};
use crate::success;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Host { address: Address },
    Range { ipv4_range: Ipv4Range },
    Multi { targets: Vec<Target> },
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s: &str = s.trim();
        if s.is_empty() {
            return Err(TargetError::Empty);
        }

        if s.contains(',') {
            return parse_commas(s);
        }

        if let Some(target) = parse_host(s)? {
            return Ok(target);
        }

        if let Some(target) = parse_ip_range(s)? {
            return Ok(target);
        }

        if let Some(target) = parse_cidr_range(s)? {
            return Ok(target);
        }

        Err(invalid(s, "expected an address, a range or a CIDR block"))
    }
}

impl Target {
    /// The distinct addresses of the target in first-seen order.
    ///
    /// A target that covers no host at all is an error.
    pub fn addresses(&self) -> Result<Vec<Address>, TargetError> {
        let addresses: Vec<Address> = self.expand();
        if addresses.is_empty() {
            return Err(TargetError::NoHosts);
        }

        let len: usize = addresses.len();
        let unit: &str = if len == 1 { "IP address has been" } else { "IP addresses have been" };
        success!("{len} {unit} parsed successfully");

        Ok(addresses)
    }

    fn expand(&self) -> Vec<Address> {
        let mut seen: HashSet<Address> = HashSet::new();
        let mut addresses: Vec<Address> = Vec::new();
        self.collect_into(&mut seen, &mut addresses);
        addresses
    }

    fn collect_into(&self, seen: &mut HashSet<Address>, out: &mut Vec<Address>) {
        match self {
            Target::Host { address } => {
                if seen.insert(*address) {
                    out.push(*address);
                }
            }
            Target::Range { ipv4_range } => {
                for address in ipv4_range.addresses() {
                    if seen.insert(address) {
                        out.push(address);
                    }
                }
            }
            Target::Multi { targets } => {
                for target in targets {
                    target.collect_into(seen, out);
                }
            }
        }
    }
}

fn parse_commas(s: &str) -> Result<Target, TargetError> {
    let targets: Vec<Target> = s
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(Target::from_str)
        .collect::<Result<Vec<Target>, TargetError>>()?;

    if targets.is_empty() {
        return Err(TargetError::Empty);
    }

    Ok(Target::Multi { targets })
}

fn parse_host(s: &str) -> Result<Option<Target>, TargetError> {
    if s.contains('-') || s.contains('/') {
        return Ok(None);
    }

    match s.parse::<Address>() {
        Ok(address) => Ok(Some(Target::Host { address })),
        Err(AddressError::Ipv6 { input }) => Err(AddressError::Ipv6 { input }.into()),
        Err(_) => Ok(None),
    }
}

fn parse_ip_range(s: &str) -> Result<Option<Target>, TargetError> {
    let Some((start_str, end_str)) = s.split_once('-') else {
        return Ok(None);
    };

    let start_addr: Ipv4Addr = start_str
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|e| invalid(s, &format!("invalid start address '{start_str}': {e}")))?;

    let end_addr: Ipv4Addr = parse_range_end_addr(end_str.trim(), &start_addr, s)?;

    let ipv4_range: Ipv4Range = Ipv4Range::new(start_addr, end_addr);
    if ipv4_range.is_empty() {
        return Err(invalid(s, "range end is lower than range start"));
    }

    Ok(Some(Target::Range { ipv4_range }))
}

/// Handles abbreviated ends like `192.168.1.1-50` (meaning `192.168.1.50`)
/// as well as complete addresses.
fn parse_range_end_addr(
    end_str: &str,
    start_addr: &Ipv4Addr,
    original_s: &str,
) -> Result<Ipv4Addr, TargetError> {
    if let Ok(full_addr) = end_str.parse::<Ipv4Addr>() {
        return Ok(full_addr);
    }

    if end_str.is_empty() {
        return Err(invalid(original_s, "range end cannot be empty"));
    }

    let partial_octets: Vec<u8> = end_str
        .split('.')
        .map(|octet_str| octet_str.parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|e| invalid(original_s, &format!("invalid range end '{end_str}': {e}")))?;

    if partial_octets.len() > 4 {
        return Err(invalid(original_s, "range end has too many octets"));
    }

    let mut end_octets: [u8; 4] = start_addr.octets();
    let start_index: usize = 4 - partial_octets.len();
    end_octets[start_index..].copy_from_slice(&partial_octets);

    Ok(Ipv4Addr::from(end_octets))
}

fn parse_cidr_range(s: &str) -> Result<Option<Target>, TargetError> {
    let Some((ip_str, prefix_str)) = s.split_once('/') else {
        return Ok(None);
    };

    let ipv4_addr: Ipv4Addr = ip_str
        .parse::<Ipv4Addr>()
        .map_err(|e| invalid(s, &format!("invalid network address '{ip_str}': {e}")))?;

    let prefix: u8 = prefix_str
        .parse::<u8>()
        .map_err(|e| invalid(s, &format!("invalid prefix '{prefix_str}': {e}")))?;

    let ipv4_range: Ipv4Range = range::cidr_range(ipv4_addr, prefix)?;
    Ok(Some(Target::Range { ipv4_range }))
}

fn invalid(input: &str, reason: &str) -> TargetError {
    TargetError::Invalid {
        input: input.to_string(),
        reason: reason.to_string(),
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
