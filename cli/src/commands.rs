pub mod fingerprint;
pub mod ping;
pub mod recon;
pub mod scan;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use netrecon_common::config::ScanConfig;
use netrecon_common::credentials::{SessionCredentials, validate_secret, validate_username};
use netrecon_common::error::CredentialError;
use netrecon_common::network::address::Address;
use netrecon_common::network::target::Target;
use tracing::warn;

use crate::terminal::prompt;

#[derive(Parser)]
#[command(name = "netrecon")]
#[command(about = "IPv4 reconnaissance: ping sweep, port scan and SSH fingerprinting.")]
#[command(version)]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease log verbosity (-q warnings only, -qq errors only)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Number of concurrent probes (defaults to the number of cores)
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    /// TCP ports to scan instead of the built-in catalog
    #[arg(long, value_delimiter = ',', global = true)]
    pub tcp_ports: Option<Vec<u16>>,

    /// UDP ports to scan instead of the built-in catalog
    #[arg(long, value_delimiter = ',', global = true)]
    pub udp_ports: Option<Vec<u16>>,

    /// Directory of `{platform}_{command}.textfsm` templates used to pick device commands
    #[arg(long, env = "NETRECON_TEMPLATES_DIR", global = true)]
    pub templates_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find out which hosts answer ICMP echo
    #[command(alias = "p")]
    Ping { target: Target },
    /// Probe the port catalog of one or more hosts
    #[command(alias = "s")]
    Scan {
        target: Target,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Scan a host and identify it over SSH
    #[command(alias = "f")]
    Fingerprint {
        address: Address,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        credentials: CredentialArgs,
    },
    /// Ping, scan and fingerprint every live host
    #[command(alias = "r")]
    Recon {
        target: Target,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        credentials: CredentialArgs,
    },
}

#[derive(Args, Clone, Debug, Default)]
pub struct OutputArgs {
    /// Domain used by the DNS probes
    #[arg(long)]
    pub domain: Option<String>,

    /// Print full port payloads instead of port numbers
    #[arg(short, long)]
    pub long: bool,
}

#[derive(Args, Clone, Default)]
pub struct CredentialArgs {
    /// SSH username
    #[arg(short = 'u', long, env = "NETRECON_USERNAME")]
    pub username: Option<String>,

    /// SSH password
    #[arg(short = 'P', long, env = "NETRECON_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Secret for the privileged `enable` mode
    #[arg(short = 'e', long, env = "NETRECON_ENABLE_PASSWORD", hide_env_values = true)]
    pub enable_password: Option<String>,
}

impl CredentialArgs {
    /// Builds validated credentials, prompting on stdin until every field is valid.
    ///
    /// Returns `None` when credentials are optional and no username was given.
    pub fn resolve(self, required: bool) -> anyhow::Result<Option<SessionCredentials>> {
        if !required && self.username.is_none() {
            return Ok(None);
        }

        let username: String =
            until_valid(self.username, "Username", prompt::ask, validate_username)?;
        let password: String = until_valid(self.password, "Password", prompt::ask_secret, |s| {
            validate_secret("password", s)
        })?;
        let enable_password: Option<String> = match self.enable_password {
            Some(secret) => Some(until_valid(
                Some(secret),
                "Enable password",
                prompt::ask_secret,
                |s| validate_secret("enable password", s),
            )?),
            None => None,
        };

        Ok(Some(SessionCredentials::new(
            username,
            password,
            enable_password,
        )?))
    }
}

fn until_valid<F>(
    initial: Option<String>,
    label: &str,
    ask: fn(&str) -> anyhow::Result<String>,
    check: F,
) -> anyhow::Result<String>
where
    F: Fn(&str) -> Result<(), CredentialError>,
{
    let mut candidate: Option<String> = initial;
    loop {
        let value: String = match candidate.take() {
            Some(value) => value,
            None => ask(label)?,
        };
        match check(&value) {
            Ok(()) => return Ok(value),
            Err(e) => warn!("{e}. Please re-enter it"),
        }
    }
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Defaults overlaid with whatever was given on the command line.
    pub fn scan_config(&self) -> ScanConfig {
        let mut config: ScanConfig = ScanConfig::default();
        if let Some(workers) = self.workers {
            config.workers = workers.max(1);
        }
        if let Some(ports) = &self.tcp_ports {
            config.tcp_ports = ports.clone();
        }
        if let Some(ports) = &self.udp_ports {
            config.udp_ports = ports.clone();
        }
        config.templates_dir = self.templates_dir.clone();
        config
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
