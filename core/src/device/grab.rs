//! # Device Grab
//!
//! Ties the SSH steps together for one host: find SSH in the open ports,
//! fingerprint the device, then pull each configuration section through a
//! [`ConfigRetriever`] when the platform has an approved driver.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use netrecon_common::credentials::SessionCredentials;
use netrecon_common::network::address::Address;
use netrecon_common::probe::PortProbeResult;
use serde::Serialize;
use tracing::{debug, info};

use super::commands::{CommandCollector, is_rejected};
use super::escalation::EscalationStrategy;
use super::fingerprint::{DeviceFingerprinter, FingerprintOutcome};
use super::session::{DeviceSession, InteractiveShell, SshConnector};
use super::{DeviceIdentity, check_ports};
use crate::error::{GrabError, RetrievalError, SessionError};

pub const APPROVED_DRIVERS: [&str; 6] = ["eos", "junos", "iosxr", "nxos", "nxos_ssh", "ios"];
pub const NOT_IMPLEMENTED: &str = "Not_Implemented";
pub const NO_VERSION_INFORMATION: &str = "No Version information was available";
pub const SSH_NOT_OPEN_MSG: &str = "SSH is not open on the device for ports scanned";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigSection {
    Facts,
    StartupConfig,
    RunningConfig,
    CandidateConfig,
    Optics,
    NetworkInstances,
    LldpDetail,
    Lldp,
    Environment,
    Interfaces,
    InterfacesIp,
    SnmpInformation,
    Users,
}

impl ConfigSection {
    pub const ALL: [ConfigSection; 13] = [
        ConfigSection::Facts,
        ConfigSection::StartupConfig,
        ConfigSection::RunningConfig,
        ConfigSection::CandidateConfig,
        ConfigSection::Optics,
        ConfigSection::NetworkInstances,
        ConfigSection::LldpDetail,
        ConfigSection::Lldp,
        ConfigSection::Environment,
        ConfigSection::Interfaces,
        ConfigSection::InterfacesIp,
        ConfigSection::SnmpInformation,
        ConfigSection::Users,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ConfigSection::Facts => "Device_Facts",
            ConfigSection::StartupConfig => "Device_Startup_Config",
            ConfigSection::RunningConfig => "Device_Running_Config",
            ConfigSection::CandidateConfig => "Device_Candidate_Config",
            ConfigSection::Optics => "Device_Optics",
            ConfigSection::NetworkInstances => "Device_Network_Instances",
            ConfigSection::LldpDetail => "Device_LLDP_Detail",
            ConfigSection::Lldp => "Device_LLDP",
            ConfigSection::Environment => "Device_Environment",
            ConfigSection::Interfaces => "Device_Interfaces",
            ConfigSection::InterfacesIp => "Device_Interfaces_IP",
            ConfigSection::SnmpInformation => "Device_SNMP_Information",
            ConfigSection::Users => "Device_Users",
        }
    }
}

impl fmt::Display for ConfigSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Everything a retriever needs to reach one device.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub driver: &'static str,
    pub address: Address,
    pub port: u16,
    pub credentials: SessionCredentials,
}

#[async_trait]
pub trait ConfigRetriever: Send + Sync {
    async fn retrieve(
        &self,
        section: ConfigSection,
        request: &RetrievalRequest,
    ) -> Result<String, RetrievalError>;
}

/// Checks `driver` against the approved list, returning the canonical name.
pub fn approved_driver(driver: &str) -> Result<&'static str, GrabError> {
    APPROVED_DRIVERS
        .iter()
        .find(|approved| **approved == driver)
        .copied()
        .ok_or_else(|| GrabError::UnsupportedDriver {
            driver: driver.to_string(),
        })
}

/// Retrieves sections by running the matching show command over SSH.
///
/// When the credentials carry an enable secret the command is issued on an
/// escalated shell, except for junos which has no `enable` mode.
pub struct SshCommandRetriever {
    connector: Arc<dyn SshConnector>,
    escalation: Arc<dyn EscalationStrategy>,
}

impl SshCommandRetriever {
    pub fn new(connector: Arc<dyn SshConnector>, escalation: Arc<dyn EscalationStrategy>) -> Self {
        Self {
            connector,
            escalation,
        }
    }

    async fn run(
        &self,
        session: &mut dyn DeviceSession,
        request: &RetrievalRequest,
        command: &str,
    ) -> Result<String, RetrievalError> {
        let secret: Option<&str> = match request.driver {
            "junos" => None,
            _ => request.credentials.enable_password(),
        };

        match secret {
            Some(secret) => {
                let output: String = self
                    .escalated(session, secret, command)
                    .await
                    .map_err(|e| RetrievalError::Driver(e.to_string()))?;
                if is_rejected(&output) {
                    return Err(RetrievalError::NotImplemented);
                }
                Ok(output)
            }
            None => {
                let output = session
                    .exec(command)
                    .await
                    .map_err(|e| RetrievalError::Driver(e.to_string()))?;
                if output.has_stderr() || is_rejected(&output.stdout) {
                    return Err(RetrievalError::NotImplemented);
                }
                Ok(output.stdout)
            }
        }
    }

    async fn escalated(
        &self,
        session: &mut dyn DeviceSession,
        secret: &str,
        command: &str,
    ) -> Result<String, SessionError> {
        let mut shell: Box<dyn InteractiveShell> = session.open_shell().await?;
        self.escalation.escalate(shell.as_mut(), secret).await?;
        self.escalation.issue(shell.as_mut(), command).await
    }
}

#[async_trait]
impl ConfigRetriever for SshCommandRetriever {
    async fn retrieve(
        &self,
        section: ConfigSection,
        request: &RetrievalRequest,
    ) -> Result<String, RetrievalError> {
        let command: &str =
            section_command(request.driver, section).ok_or(RetrievalError::NotImplemented)?;

        let mut session: Box<dyn DeviceSession> = self
            .connector
            .connect(request.address, request.port, &request.credentials)
            .await
            .map_err(|e| RetrievalError::Driver(e.to_string()))?;
        let output: Result<String, RetrievalError> =
            self.run(session.as_mut(), request, command).await;
        if let Err(e) = session.close().await {
            debug!("{} did not close cleanly: {e}", request.address);
        }
        output
    }
}

fn section_command(driver: &str, section: ConfigSection) -> Option<&'static str> {
    use ConfigSection as S;

    let command: &'static str = match (driver, section) {
        ("junos", S::Facts) => "show version",
        ("junos", S::RunningConfig) => "show configuration",
        ("junos", S::CandidateConfig) => "show configuration | compare rollback 0",
        ("junos", S::Lldp) => "show lldp neighbors",
        ("junos", S::Interfaces) => "show interfaces terse",
        ("junos", S::Users) => "show system users",
        ("junos", _) => return None,

        (_, S::Facts) => "show version",
        (_, S::StartupConfig) => "show startup-config",
        (_, S::RunningConfig) => "show running-config",
        ("iosxr", S::CandidateConfig) => "show configuration",
        (_, S::CandidateConfig) => return None,
        ("iosxr", S::Optics) => "show controllers optics",
        (_, S::Optics) => "show interfaces transceiver",
        ("ios", S::NetworkInstances) => "show vrf detail",
        (_, S::NetworkInstances) => "show vrf",
        (_, S::LldpDetail) => "show lldp neighbors detail",
        (_, S::Lldp) => "show lldp neighbors",
        ("nxos" | "nxos_ssh", S::Environment) => "show environment",
        (_, S::Environment) => "show environment all",
        (_, S::Interfaces) => "show interfaces",
        ("nxos" | "nxos_ssh", S::InterfacesIp) => "show ip interface brief vrf all",
        (_, S::InterfacesIp) => "show ip interface",
        (_, S::SnmpInformation) => "show snmp",
        (_, S::Users) => "show users",
    };
    Some(command)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VersionInfo {
    Lines(Vec<String>),
    Message(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigBlock {
    #[serde(rename = "Open_Close")]
    pub open_close: bool,
    #[serde(rename = "Open_Close_Msg")]
    pub open_close_msg: String,
    #[serde(rename = "Device_Information")]
    pub device_information: BTreeMap<String, String>,
}

/// What was learned about one device over SSH.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceReport {
    #[serde(rename = "Version_Info")]
    pub version_info: VersionInfo,
    #[serde(rename = "CONFIG", skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigBlock>,
    #[serde(
        rename = "Device_Specific_Information",
        skip_serializing_if = "Option::is_none"
    )]
    pub device_specific: Option<BTreeMap<String, String>>,
}

impl DeviceReport {
    pub fn ssh_not_open() -> Self {
        Self {
            version_info: VersionInfo::Lines(vec![NO_VERSION_INFORMATION.to_string()]),
            config: Some(ConfigBlock {
                open_close: false,
                open_close_msg: SSH_NOT_OPEN_MSG.to_string(),
                device_information: BTreeMap::new(),
            }),
            device_specific: None,
        }
    }

    fn failed(version_info: String) -> Self {
        Self {
            version_info: VersionInfo::Message(version_info),
            config: None,
            device_specific: None,
        }
    }
}

pub struct DeviceGrabber {
    fingerprinter: DeviceFingerprinter,
    retriever: Arc<dyn ConfigRetriever>,
    collector: Option<CommandCollector>,
}

impl DeviceGrabber {
    pub fn new(fingerprinter: DeviceFingerprinter, retriever: Arc<dyn ConfigRetriever>) -> Self {
        Self {
            fingerprinter,
            retriever,
            collector: None,
        }
    }

    /// Also gathers catalog command output for platforms that have one.
    pub fn with_collector(mut self, collector: CommandCollector) -> Self {
        self.collector = Some(collector);
        self
    }

    pub async fn grab(
        &self,
        address: Address,
        open_tcp: &BTreeMap<u16, PortProbeResult>,
        credentials: &SessionCredentials,
    ) -> Result<DeviceReport, GrabError> {
        let Some((ssh_port, os_family)) = check_ports(open_tcp) else {
            debug!("{address} has no SSH port open");
            return Ok(DeviceReport::ssh_not_open());
        };

        info!("Fingerprinting {address} on port {ssh_port} ({os_family})");
        let identity: DeviceIdentity = match self
            .fingerprinter
            .fingerprint(address, ssh_port, os_family, credentials)
            .await?
        {
            FingerprintOutcome::Identified(identity) => identity,
            FingerprintOutcome::Failed { version_info } => {
                return Ok(DeviceReport::failed(version_info));
            }
        };

        let device_specific: Option<BTreeMap<String, String>> = match &self.collector {
            Some(collector) => collector.collect(address, &identity, credentials).await?,
            None => None,
        };

        let config: ConfigBlock = match approved_driver(identity.platform.as_str()) {
            Ok(driver) => {
                let request: RetrievalRequest = RetrievalRequest {
                    driver,
                    address,
                    port: ssh_port,
                    credentials: credentials.clone(),
                };
                ConfigBlock {
                    open_close: true,
                    open_close_msg: format!("SSH is open and Device Type is known ({driver})."),
                    device_information: self.retrieve_sections(&request).await?,
                }
            }
            Err(e) => {
                info!("{address}: {e}");
                ConfigBlock {
                    open_close: false,
                    open_close_msg: format!(
                        "Config for type device not yet supported ({}).",
                        identity.platform
                    ),
                    device_information: BTreeMap::new(),
                }
            }
        };

        Ok(DeviceReport {
            version_info: VersionInfo::Lines(identity.banner_lines),
            config: Some(config),
            device_specific,
        })
    }

    async fn retrieve_sections(
        &self,
        request: &RetrievalRequest,
    ) -> Result<BTreeMap<String, String>, GrabError> {
        let mut sections: BTreeMap<String, String> = BTreeMap::new();

        for section in ConfigSection::ALL {
            let value: String = match self.retriever.retrieve(section, request).await {
                Ok(value) => value,
                Err(RetrievalError::NotImplemented) => {
                    debug!("{section} is not implemented for {}", request.driver);
                    NOT_IMPLEMENTED.to_string()
                }
                Err(e) => return Err(e.into()),
            };
            sections.insert(section.key().to_string(), value);
        }

        Ok(sections)
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
