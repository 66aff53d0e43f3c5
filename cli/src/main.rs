mod commands;
mod terminal;

use std::sync::Arc;

use commands::{CommandLine, Commands, fingerprint, ping, recon, scan};
use netrecon_common::config::ScanConfig;
use netrecon_core::recon::ReconService;
use terminal::{logging, print};
use tracing::{debug, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli: CommandLine = CommandLine::parse_args();

    logging::init_logging(cli.verbose, cli.quiet);

    let config: Arc<ScanConfig> = Arc::new(cli.scan_config());
    debug!("Running with {} workers", config.workers);
    let service: ReconService = ReconService::from_config(Arc::clone(&config));
    let quiet: u8 = cli.quiet;

    match cli.command {
        Commands::Ping { target } => {
            warn_if_unprivileged();
            print::header("ping sweep", quiet);
            ping::ping(target, &service, quiet).await
        }
        Commands::Scan { target, output } => {
            print::header("port scan", quiet);
            scan::scan(target, &output, &service, quiet).await
        }
        Commands::Fingerprint {
            address,
            output,
            credentials,
        } => {
            let credentials = credentials
                .resolve(true)?
                .ok_or_else(|| anyhow::anyhow!("credentials are required to fingerprint"))?;
            print::header("fingerprint", quiet);
            fingerprint::fingerprint(address, &output, &credentials, &service, quiet).await
        }
        Commands::Recon {
            target,
            output,
            credentials,
        } => {
            warn_if_unprivileged();
            let credentials = credentials.resolve(false)?;
            print::header("recon", quiet);
            recon::recon(target, &output, credentials, &service, quiet).await
        }
    }
}

fn warn_if_unprivileged() {
    if !is_root::is_root() {
        warn!("Not running as root. ICMP echo may be refused without raw socket rights");
    }
}
