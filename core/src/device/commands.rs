//! # Command Catalog
//!
//! Device-specific commands are discovered from a directory of parsing
//! templates named `{platform}_{command_with_underscores}.textfsm`, so
//! `cisco_ios_show_ip_route.textfsm` yields `show ip route` for the
//! `cisco_ios` platform. The directory comes from
//! [`ScanConfig::templates_dir`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use netrecon_common::config::ScanConfig;
use netrecon_common::credentials::SessionCredentials;
use netrecon_common::network::address::Address;
use netrecon_common::probe::ERROR_KEY;
use tracing::{debug, info, warn};

use super::escalation::EscalationStrategy;
use super::session::{DeviceSession, InteractiveShell, SshConnector};
use super::{DeviceIdentity, OsFamily, PlatformTag};
use crate::error::{CatalogError, GrabError, SessionError};

pub const TEMPLATE_EXTENSION: &str = ".textfsm";

/// Output markers of a command the device did not accept.
const REJECTED_OUTPUT_MARKERS: [&str; 2] = ["% Invalid input detected ", "% Incomplete command"];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CatalogCommand {
    /// Template stem, e.g. `show_ip_route`.
    pub name: String,
    /// The command line sent to the device, e.g. `show ip route`.
    pub command: String,
}

pub trait CommandCatalog: Send + Sync {
    fn commands_for(&self, template_prefix: &str) -> Result<Vec<CatalogCommand>, CatalogError>;
}

pub struct TemplateDirCatalog {
    templates_dir: PathBuf,
}

impl TemplateDirCatalog {
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
        }
    }

    pub fn from_config(config: &ScanConfig) -> Option<Self> {
        config.templates_dir.as_ref().map(Self::new)
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }
}

impl CommandCatalog for TemplateDirCatalog {
    fn commands_for(&self, template_prefix: &str) -> Result<Vec<CatalogCommand>, CatalogError> {
        let io_error = |source: std::io::Error| CatalogError::Io {
            path: self.templates_dir.display().to_string(),
            source,
        };

        let prefix: String = format!("{template_prefix}_");
        let mut commands: Vec<CatalogCommand> = Vec::new();

        for entry in fs::read_dir(&self.templates_dir).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            let file_name: String = entry.file_name().to_string_lossy().into_owned();

            let Some(name) = file_name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(TEMPLATE_EXTENSION))
            else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            commands.push(CatalogCommand {
                name: name.to_string(),
                command: name.split('_').collect::<Vec<&str>>().join(" "),
            });
        }

        commands.sort();
        debug!(
            "Found {} catalog commands for {template_prefix}",
            commands.len()
        );
        Ok(commands)
    }
}

/// Connection driver and template prefix of a supported platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformProfile {
    pub driver: &'static str,
    pub template_prefix: &'static str,
}

pub fn platform_profile(tag: PlatformTag) -> Option<PlatformProfile> {
    let (driver, template_prefix) = match tag {
        PlatformTag::Ios => ("cisco_ios", "cisco_ios"),
        PlatformTag::NxosSsh => ("cisco_nxos_ssh", "cisco_nxos"),
        PlatformTag::IosXr => ("cisco_xr", "cisco_xr"),
        PlatformTag::Linux => ("linux_ssh", "linux"),
        PlatformTag::Unknown => return None,
    };
    Some(PlatformProfile {
        driver,
        template_prefix,
    })
}

pub fn is_rejected(output: &str) -> bool {
    REJECTED_OUTPUT_MARKERS
        .iter()
        .any(|marker| output.contains(marker))
}

/// Runs every catalog command over one session and keeps the accepted output,
/// keyed by command name.
///
/// With `secret` set the commands go through an escalated shell.
pub async fn collect_command_output(
    connector: &dyn SshConnector,
    escalation: &dyn EscalationStrategy,
    address: Address,
    port: u16,
    credentials: &SessionCredentials,
    secret: Option<&str>,
    commands: &[CatalogCommand],
) -> Result<BTreeMap<String, String>, SessionError> {
    let mut session: Box<dyn DeviceSession> = connector.connect(address, port, credentials).await?;

    let collected = run_commands(session.as_mut(), escalation, secret, commands).await;

    if let Err(e) = session.close().await {
        debug!("{address} did not close cleanly: {e}");
    }
    collected
}

async fn run_commands(
    session: &mut dyn DeviceSession,
    escalation: &dyn EscalationStrategy,
    secret: Option<&str>,
    commands: &[CatalogCommand],
) -> Result<BTreeMap<String, String>, SessionError> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();

    match secret {
        Some(secret) => {
            let mut shell: Box<dyn InteractiveShell> = session.open_shell().await?;
            escalation.escalate(shell.as_mut(), secret).await?;
            for entry in commands {
                let output: String = escalation.issue(shell.as_mut(), &entry.command).await?;
                keep_accepted(&mut collected, entry, output);
            }
        }
        None => {
            for entry in commands {
                let output = session.exec(&entry.command).await?;
                if output.has_stderr() {
                    debug!("'{}' rejected: {}", entry.command, output.stderr.trim());
                    continue;
                }
                keep_accepted(&mut collected, entry, output.stdout);
            }
        }
    }

    Ok(collected)
}

fn keep_accepted(collected: &mut BTreeMap<String, String>, entry: &CatalogCommand, output: String) {
    if is_rejected(&output) {
        debug!("'{}' is not supported by the device", entry.command);
        return;
    }
    collected.insert(entry.name.clone(), output);
}

/// Gathers catalog command output for identified devices.
pub struct CommandCollector {
    catalog: Arc<dyn CommandCatalog>,
    connector: Arc<dyn SshConnector>,
    escalation: Arc<dyn EscalationStrategy>,
}

impl CommandCollector {
    pub fn new(
        catalog: Arc<dyn CommandCatalog>,
        connector: Arc<dyn SshConnector>,
        escalation: Arc<dyn EscalationStrategy>,
    ) -> Self {
        Self {
            catalog,
            connector,
            escalation,
        }
    }

    /// `None` when the platform has no catalog. Login failures are reported
    /// inside the map under `"ERROR"`.
    pub async fn collect(
        &self,
        address: Address,
        identity: &DeviceIdentity,
        credentials: &SessionCredentials,
    ) -> Result<Option<BTreeMap<String, String>>, GrabError> {
        let Some(profile) = platform_profile(identity.platform) else {
            return Ok(None);
        };

        let commands: Vec<CatalogCommand> = self.catalog.commands_for(profile.template_prefix)?;
        info!(
            "Sending {} {} commands to {address}",
            commands.len(),
            profile.driver
        );

        let secret: Option<&str> = match identity.os_family {
            OsFamily::Cisco => credentials.enable_password(),
            OsFamily::Linux | OsFamily::Other => None,
        };

        let collected = collect_command_output(
            self.connector.as_ref(),
            self.escalation.as_ref(),
            address,
            identity.ssh_port,
            credentials,
            secret,
            &commands,
        )
        .await;

        match collected {
            Ok(output) => Ok(Some(output)),
            Err(e) if e.is_recoverable() => {
                warn!("{e}");
                Ok(Some(BTreeMap::from([(ERROR_KEY.to_string(), e.to_string())])))
            }
            Err(e) => Err(e.into()),
        }
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
