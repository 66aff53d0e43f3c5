//! Input validation errors raised at the boundary of public functions.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("'{input}' does not appear to be an IPv4 address")]
    Invalid { input: String },
    #[error("'{input}' is an IPv6 address; only IPv4 targets are supported")]
    Ipv6 { input: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("no target was given")]
    Empty,
    #[error("the target does not contain any host")]
    NoHosts,
    #[error("invalid target '{input}': {reason}")]
    Invalid { input: String, reason: String },
    #[error(transparent)]
    Address(#[from] AddressError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
    #[error("{field} must be shorter than {limit} characters")]
    TooLong { field: &'static str, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeInputError {
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("port {port} is outside of 0..=65535")]
    PortOutOfRange { port: i64 },
    #[error("invalid domain name '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: &'static str },
}
