use std::time::Instant;

use colored::*;
use netrecon_common::network::address::Address;
use netrecon_common::network::target::Target;
use netrecon_common::success;
use netrecon_core::liveness::LivenessResult;
use netrecon_core::recon::ReconService;
use netrecon_core::report::liveness_json;

use crate::terminal::{colors, print};

/// Prints the live hosts as `{"<ip>": {"ping": [min, avg, max]}}`.
pub async fn ping(target: Target, service: &ReconService, quiet: u8) -> anyhow::Result<()> {
    let addresses: Vec<Address> = target.addresses()?;
    let start: Instant = Instant::now();

    let alive: LivenessResult = service.ping(&addresses).await?;

    if quiet == 0 {
        for (idx, (address, round_trip)) in alive.iter().enumerate() {
            print::tree_head(idx, &address.to_string());
            print::as_tree_one_level(vec![
                ("min".to_string(), format!("{:.2} ms", round_trip.min_ms).color(colors::ACCENT)),
                ("avg".to_string(), format!("{:.2} ms", round_trip.avg_ms).color(colors::ACCENT)),
                ("max".to_string(), format!("{:.2} ms", round_trip.max_ms).color(colors::ACCENT)),
            ]);
        }
    }

    success!(
        "{} of {} hosts alive in {:.2}s",
        alive.len(),
        addresses.len(),
        start.elapsed().as_secs_f64()
    );
    println!("{}", serde_json::to_string_pretty(&liveness_json(&alive))?);
    Ok(())
}
