use std::time::Instant;

use colored::*;
use netrecon_common::credentials::SessionCredentials;
use netrecon_common::network::address::Address;
use netrecon_common::network::target::Target;
use netrecon_core::recon::{ReconRequest, ReconService};
use netrecon_core::report::HostRecord;
use serde_json::Value;

use crate::commands::OutputArgs;
use crate::commands::scan::print_port_tree;
use crate::rprint;
use crate::terminal::{colors, print};

pub async fn recon(
    target: Target,
    output: &OutputArgs,
    credentials: Option<SessionCredentials>,
    service: &ReconService,
    quiet: u8,
) -> anyhow::Result<()> {
    let addresses: Vec<Address> = target.addresses()?;
    let request: ReconRequest = ReconRequest {
        domain: output.domain.clone(),
        credentials,
    };

    let start: Instant = Instant::now();
    let records: Vec<HostRecord> = service.perform_recon(&addresses, &request).await?;

    if records.is_empty() {
        print::no_results("hosts that could be scanned");
        return Ok(());
    }

    if quiet == 0 {
        for (idx, record) in records.iter().enumerate() {
            print_port_tree(idx, record.address, &record.ports);
            rprint!();
        }
        print::fat_separator();
        let summary: ColoredString = format!(
            "Recon complete: {} hosts reported in {:.2}s",
            records.len(),
            start.elapsed().as_secs_f64()
        )
        .color(colors::TEXT_DEFAULT);
        rprint!(&summary.to_string());
    }

    let reports: Vec<Value> = records
        .iter()
        .map(|record| record.to_json(output.long))
        .collect();
    for report in reports {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
