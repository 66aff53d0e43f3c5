//! # Probe Result Model
//!
//! Every protocol probe produces a [`PortProbeResult`] for one
//! `(address, protocol, port)` triple. A result is either an open payload of
//! string fields or a typed [`ProbeError`].
//!
//! Downstream consumers see both through the same payload view: an error is
//! rendered as a map with the single key `"ERROR"` holding
//! `"<Kind> -- <detail>"`. A port is closed iff its payload has that shape.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::ProbeInputError;

pub const ERROR_KEY: &str = "ERROR";
pub const RETURN_INFORMATION_KEY: &str = "Return Information";
pub const NOTHING_KEY: &str = "Nothing";
pub const NOTHING_RETURNED: &str = "Nothing returned from the server";

pub type Fields = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Protocol {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "UDP")]
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("TCP"),
            Protocol::Udp => f.write_str("UDP"),
        }
    }
}

/// The failure classes a probe can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConnectionRefused,
    ConnectionReset,
    Timeout,
    SocketTimedOut,
    UnicodeDecode,
    Os,
    Http,
    Connection,
    Other,
    NoNameservers,
    DnsTimeout,
    NoAnswer,
    Nxdomain,
    Transfer,
    Form,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionRefused => "ConnectionRefusedError",
            ErrorKind::ConnectionReset => "ConnectionResetError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::SocketTimedOut => "Socket Timed Out",
            ErrorKind::UnicodeDecode => "UnicodeDecodeError",
            ErrorKind::Os => "OSError",
            ErrorKind::Http => "HTTPError",
            ErrorKind::Connection => "ConnectionError",
            ErrorKind::Other => "OtherError",
            ErrorKind::NoNameservers => "NoNameservers",
            ErrorKind::DnsTimeout => "Timeout",
            ErrorKind::NoAnswer => "NoAnswer",
            ErrorKind::Nxdomain => "NXDOMAIN",
            ErrorKind::Transfer => "TransferError",
            ErrorKind::Form => "FormError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl ProbeError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{} -- {}", self.kind, self.detail)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortProbeResult {
    Open(Fields),
    Closed(ProbeError),
}

impl PortProbeResult {
    pub fn closed(kind: ErrorKind, detail: impl Into<String>) -> Self {
        PortProbeResult::Closed(ProbeError::new(kind, detail))
    }

    /// An open result holding one field.
    pub fn field(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut fields: Fields = Fields::new();
        fields.insert(key.into(), value.into());
        PortProbeResult::Open(fields)
    }

    pub fn is_closed(&self) -> bool {
        match self {
            PortProbeResult::Closed(_) => true,
            PortProbeResult::Open(fields) => is_error_shaped(fields),
        }
    }

    pub fn is_open(&self) -> bool {
        !self.is_closed()
    }

    /// True for an open result that carries no fields at all.
    pub fn is_empty_success(&self) -> bool {
        matches!(self, PortProbeResult::Open(fields) if fields.is_empty())
    }

    /// Replaces an empty open payload with the synthetic "Nothing" entry.
    pub fn or_nothing(self) -> Self {
        if self.is_empty_success() {
            PortProbeResult::field(NOTHING_KEY, NOTHING_RETURNED)
        } else {
            self
        }
    }

    pub fn payload(&self) -> Fields {
        match self {
            PortProbeResult::Open(fields) => fields.clone(),
            PortProbeResult::Closed(error) => {
                let mut fields: Fields = Fields::new();
                fields.insert(ERROR_KEY.to_string(), error.to_string());
                fields
            }
        }
    }

    /// Every payload value joined by newlines, used for banner matching.
    pub fn text(&self) -> String {
        self.payload().into_values().collect::<Vec<String>>().join("\n")
    }
}

impl Serialize for PortProbeResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.payload().serialize(serializer)
    }
}

/// The closed rule applied to a raw payload map: exactly one key, and it is `"ERROR"`.
pub fn is_error_shaped(fields: &Fields) -> bool {
    fields.len() == 1 && fields.contains_key(ERROR_KEY)
}

/// Validates a port number arriving from an untyped boundary.
pub fn parse_port(port: i64) -> Result<u16, ProbeInputError> {
    u16::try_from(port).map_err(|_| ProbeInputError::PortOutOfRange { port })
}

/// Per-host probe results, one independent map per transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostPortMap {
    #[serde(rename = "TCP")]
    pub tcp: BTreeMap<u16, PortProbeResult>,
    #[serde(rename = "UDP")]
    pub udp: BTreeMap<u16, PortProbeResult>,
}

impl HostPortMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ports(&self, protocol: Protocol) -> &BTreeMap<u16, PortProbeResult> {
        match protocol {
            Protocol::Tcp => &self.tcp,
            Protocol::Udp => &self.udp,
        }
    }

    /// Returns the previous result when the port was already present.
    pub fn insert(
        &mut self,
        protocol: Protocol,
        port: u16,
        result: PortProbeResult,
    ) -> Option<PortProbeResult> {
        match protocol {
            Protocol::Tcp => self.tcp.insert(port, result),
            Protocol::Udp => self.udp.insert(port, result),
        }
    }

    pub fn len(&self) -> usize {
        self.tcp.len() + self.udp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tcp.is_empty() && self.udp.is_empty()
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
