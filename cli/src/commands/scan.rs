use colored::*;
use netrecon_common::network::address::Address;
use netrecon_common::network::target::Target;
use netrecon_common::probe::{HostPortMap, PortProbeResult};
use netrecon_core::classifier::{ClassifiedPorts, PortResults, classify};
use netrecon_core::recon::ReconService;
use netrecon_core::report::ports_json;
use serde_json::{Map, Value};
use tracing::error;

use crate::commands::OutputArgs;
use crate::rprint;
use crate::terminal::{colors, print};

type Detail = (String, ColoredString);

pub async fn scan(
    target: Target,
    output: &OutputArgs,
    service: &ReconService,
    quiet: u8,
) -> anyhow::Result<()> {
    let mut report: Map<String, Value> = Map::new();

    for (idx, address) in target.addresses()?.into_iter().enumerate() {
        match scan_one(address, output, service).await {
            Ok(ports) => {
                if quiet == 0 {
                    print_port_tree(idx, address, &ports);
                    rprint!();
                }
                report.insert(
                    address.to_string(),
                    Value::Object(ports_json(&ports, output.long)),
                );
            }
            Err(e) => error!("Scan of {address} failed: {e:#}"),
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub async fn scan_one(
    address: Address,
    output: &OutputArgs,
    service: &ReconService,
) -> anyhow::Result<ClassifiedPorts> {
    let map: HostPortMap = service
        .scanner()
        .scan_host(address, output.domain.as_deref())
        .await?;
    Ok(classify(&map)?)
}

pub fn print_port_tree(idx: usize, address: Address, ports: &ClassifiedPorts) {
    print::tree_head(idx, &address.to_string());
    let mut details: Vec<Detail> = Vec::new();
    details.extend(open_details("TCP", &ports.open_tcp));
    details.extend(open_details("UDP", &ports.open_udp));
    details.push((
        "closed".to_string(),
        format!("{} TCP, {} UDP", ports.closed_tcp.len(), ports.closed_udp.len())
            .color(colors::CLOSED),
    ));
    print::as_tree_one_level(details);
}

fn open_details<'a>(protocol: &'a str, open: &'a PortResults) -> impl Iterator<Item = Detail> + 'a {
    open.iter().map(move |(port, result)| {
        (format!("{protocol}/{port}"), summary(result).color(colors::OPEN))
    })
}

fn summary(result: &PortProbeResult) -> String {
    let text: String = result.text().replace(['\r', '\n'], " ");
    match text.char_indices().nth(48) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}
