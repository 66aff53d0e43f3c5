use netrecon_common::credentials::SessionCredentials;
use netrecon_common::network::address::Address;
use netrecon_core::classifier::ClassifiedPorts;
use netrecon_core::device::grab::DeviceReport;
use netrecon_core::recon::ReconService;
use netrecon_core::report::ports_json;
use serde_json::{Map, Value, json};

use crate::commands::OutputArgs;
use crate::commands::scan::{print_port_tree, scan_one};

pub async fn fingerprint(
    address: Address,
    output: &OutputArgs,
    credentials: &SessionCredentials,
    service: &ReconService,
    quiet: u8,
) -> anyhow::Result<()> {
    let ports: ClassifiedPorts = scan_one(address, output, service).await?;
    if quiet == 0 {
        print_port_tree(0, address, &ports);
    }

    let device: DeviceReport = service
        .grabber()
        .grab(address, &ports.open_tcp, credentials)
        .await?;

    let mut body: Map<String, Value> = ports_json(&ports, output.long);
    body.insert("Device_Information".to_string(), json!(device));
    let mut report: Map<String, Value> = Map::new();
    report.insert(address.to_string(), Value::Object(body));
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
