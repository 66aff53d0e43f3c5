use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AddressError;

/// A validated IPv4 host. Never carries a prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(Ipv4Addr);

impl Address {
    pub const fn new(ip: Ipv4Addr) -> Self {
        Self(ip)
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.0
    }

    pub fn socket(&self, port: u16) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.0, port))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input: &str = s.trim();
        match input.parse::<IpAddr>() {
            Ok(ip) => Self::try_from(ip),
            Err(_) => Err(AddressError::Invalid {
                input: input.to_string(),
            }),
        }
    }
}

impl TryFrom<IpAddr> for Address {
    type Error = AddressError;

    fn try_from(ip: IpAddr) -> Result<Self, Self::Error> {
        match ip {
            IpAddr::V4(v4) => Ok(Self(v4)),
            IpAddr::V6(v6) => Err(AddressError::Ipv6 {
                input: v6.to_string(),
            }),
        }
    }
}

impl From<Ipv4Addr> for Address {
    fn from(ip: Ipv4Addr) -> Self {
        Self(ip)
    }
}

impl From<Address> for IpAddr {
    fn from(address: Address) -> Self {
        IpAddr::V4(address.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_quad() {
        let address: Address = "192.168.1.20".parse().unwrap();
        assert_eq!(address.ip(), Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(address.to_string(), "192.168.1.20");
    }

    #[test]
    fn rejects_prefix_and_garbage() {
        assert!(matches!(
            "10.0.0.0/24".parse::<Address>(),
            Err(AddressError::Invalid { .. })
        ));
        assert!(matches!(
            "not-an-ip".parse::<Address>(),
            Err(AddressError::Invalid { .. })
        ));
        assert!(matches!(
            "10.0.0.256".parse::<Address>(),
            Err(AddressError::Invalid { .. })
        ));
    }

    #[test]
    fn rejects_ipv6() {
        assert!(matches!(
            "::1".parse::<Address>(),
            Err(AddressError::Ipv6 { .. })
        ));
    }

    #[test]
    fn socket_keeps_port() {
        let address: Address = Address::new(Ipv4Addr::LOCALHOST);
        assert_eq!(address.socket(8080).to_string(), "127.0.0.1:8080");
    }
}
