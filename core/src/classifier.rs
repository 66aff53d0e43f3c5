use std::collections::BTreeMap;

use netrecon_common::probe::{HostPortMap, PortProbeResult, Protocol};
use serde::Serialize;

use crate::error::ClassifyError;

pub type PortResults = BTreeMap<u16, PortProbeResult>;

/// A host's ports split into open and closed, per transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassifiedPorts {
    pub open_tcp: PortResults,
    pub closed_tcp: PortResults,
    pub open_udp: PortResults,
    pub closed_udp: PortResults,
}

impl ClassifiedPorts {
    pub fn open(&self, protocol: Protocol) -> &PortResults {
        match protocol {
            Protocol::Tcp => &self.open_tcp,
            Protocol::Udp => &self.open_udp,
        }
    }

    pub fn closed(&self, protocol: Protocol) -> &PortResults {
        match protocol {
            Protocol::Tcp => &self.closed_tcp,
            Protocol::Udp => &self.closed_udp,
        }
    }
}

/// Splits every port of `map` into open or closed.
///
/// A port is closed iff its result is an error. The split must account for
/// every scanned port exactly once; anything else is an internal fault.
pub fn classify(map: &HostPortMap) -> Result<ClassifiedPorts, ClassifyError> {
    let (open_tcp, closed_tcp) = partition(&map.tcp);
    ensure_exhaustive(Protocol::Tcp, &map.tcp, &open_tcp, &closed_tcp)?;

    let (open_udp, closed_udp) = partition(&map.udp);
    ensure_exhaustive(Protocol::Udp, &map.udp, &open_udp, &closed_udp)?;

    Ok(ClassifiedPorts {
        open_tcp,
        closed_tcp,
        open_udp,
        closed_udp,
    })
}

fn partition(ports: &PortResults) -> (PortResults, PortResults) {
    ports
        .iter()
        .map(|(port, result)| (*port, result.clone()))
        .partition(|(_, result)| result.is_open())
}

fn ensure_exhaustive(
    protocol: Protocol,
    all: &PortResults,
    open: &PortResults,
    closed: &PortResults,
) -> Result<(), ClassifyError> {
    if let Some(port) = open.keys().find(|port| closed.contains_key(port)) {
        return Err(ClassifyError::Overlap {
            protocol,
            port: *port,
        });
    }

    if open.len() + closed.len() != all.len() {
        return Err(ClassifyError::CountMismatch {
            protocol,
            open: open.len(),
            closed: closed.len(),
            total: all.len(),
        });
    }

    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
