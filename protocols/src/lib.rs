//! Per-port protocol probes.
//!
//! Every probe takes an already validated address and port and returns a
//! [`PortProbeResult`](netrecon_common::probe::PortProbeResult). Network
//! failures are encoded in the result and never surface as `Err`.

pub mod dispatch;
pub mod dns;
pub mod errors;
pub mod http;
pub mod tcp;
pub mod udp;

/// Literal sent by the generic connect probes.
pub const PROBE_PAYLOAD: &[u8] = b"Hello, World!";

/// Largest first response chunk kept by the generic connect probes.
pub const READ_LIMIT: usize = 1024;
