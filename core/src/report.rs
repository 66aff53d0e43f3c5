//! Per-host JSON reports in a terse and a verbose flavour.

use std::collections::BTreeMap;

use netrecon_common::credentials::SessionCredentials;
use netrecon_common::network::address::Address;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::classifier::{ClassifiedPorts, PortResults};
use crate::device::grab::DeviceReport;
use crate::liveness::{LivenessResult, RoundTrip};

/// Field holding the round-trip triple in the ping sweep output.
pub const PING_KEY: &str = "ping";

/// The ping sweep result as `{"<ip>": {"ping": [min, avg, max]}}`.
pub fn liveness_json(alive: &LivenessResult) -> Value {
    let hosts: Map<String, Value> = alive
        .iter()
        .map(|(address, round_trip)| (address.to_string(), json!({ PING_KEY: round_trip })))
        .collect();
    Value::Object(hosts)
}

/// Which login fields were present for a host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CredentialFlags {
    #[serde(rename = "Username_Supplied")]
    pub username: bool,
    #[serde(rename = "Password_Supplied")]
    pub password: bool,
    #[serde(rename = "Enable_Password_Supplied")]
    pub enable_password: bool,
}

impl CredentialFlags {
    pub fn from_credentials(credentials: Option<&SessionCredentials>) -> Self {
        match credentials {
            Some(credentials) => Self {
                username: true,
                password: true,
                enable_password: credentials.enable_required(),
            },
            None => Self::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostRecord {
    pub address: Address,
    pub round_trip: RoundTrip,
    pub credentials: CredentialFlags,
    pub ports: ClassifiedPorts,
    pub device: Option<DeviceReport>,
}

impl HostRecord {
    /// Port numbers only.
    pub fn to_json_short(&self) -> Value {
        let mut body: Map<String, Value> = self.common_fields();
        body.extend(ports_json(&self.ports, false));
        self.wrap(body)
    }

    /// Full payloads for every port, plus whatever SSH turned up.
    pub fn to_json_long(&self) -> Value {
        let mut body: Map<String, Value> = self.common_fields();
        body.extend(ports_json(&self.ports, true));
        if let Some(device) = &self.device {
            body.insert("Device_Information".into(), json!(device));
        }
        self.wrap(body)
    }

    pub fn to_json(&self, long: bool) -> Value {
        if long {
            self.to_json_long()
        } else {
            self.to_json_short()
        }
    }

    fn common_fields(&self) -> Map<String, Value> {
        let mut body: Map<String, Value> = Map::new();
        body.insert("ping_response_times".into(), json!(self.round_trip));
        if let Value::Object(flags) = json!(self.credentials) {
            body.extend(flags);
        }
        body
    }

    fn wrap(&self, body: Map<String, Value>) -> Value {
        let mut outer: Map<String, Value> = Map::new();
        outer.insert(self.address.to_string(), Value::Object(body));
        Value::Object(outer)
    }
}

/// The four `*_Ports_List` entries, as port numbers or as full payloads.
pub fn ports_json(ports: &ClassifiedPorts, long: bool) -> Map<String, Value> {
    let render: fn(&PortResults) -> Value = if long { payloads } else { port_list };
    let mut lists: Map<String, Value> = Map::new();
    lists.insert("Open_TCP_Ports_List".into(), render(&ports.open_tcp));
    lists.insert("Open_UDP_Ports_List".into(), render(&ports.open_udp));
    lists.insert("Closed_TCP_Ports_List".into(), render(&ports.closed_tcp));
    lists.insert("Closed_UDP_Ports_List".into(), render(&ports.closed_udp));
    lists
}

fn port_list(ports: &PortResults) -> Value {
    json!(ports.keys().collect::<Vec<&u16>>())
}

fn payloads(ports: &PortResults) -> Value {
    let rendered: BTreeMap<String, Value> = ports
        .iter()
        .map(|(port, result)| (port.to_string(), json!(result)))
        .collect();
    json!(rendered)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
