//! # Recon Service
//!
//! Implements the end-to-end "recon" use case: ping sweep, port scan and
//! classification per live host, then SSH fingerprinting when credentials
//! were supplied.
//!
//! A failure on one host is logged and that host is left out; the other
//! hosts still get their report.

use std::sync::Arc;

use netrecon_common::config::ScanConfig;
use netrecon_common::credentials::SessionCredentials;
use netrecon_common::network::address::Address;
use netrecon_common::probe::HostPortMap;
use tracing::{error, info};

use crate::classifier::{ClassifiedPorts, classify};
use crate::device::commands::{CommandCollector, TemplateDirCatalog};
use crate::device::escalation::{EscalationStrategy, TimedEscalation};
use crate::device::fingerprint::DeviceFingerprinter;
use crate::device::grab::{DeviceGrabber, DeviceReport, SshCommandRetriever};
use crate::device::session::SshConnector;
use crate::device::ssh::RusshConnector;
use crate::liveness::{EchoProber, IcmpEchoProber, LivenessResult, RoundTrip, ping_sweep};
use crate::report::{CredentialFlags, HostRecord};
use crate::scanner::PortScanner;

/// Per-run options coming from the user.
#[derive(Debug, Clone, Default)]
pub struct ReconRequest {
    pub domain: Option<String>,
    pub credentials: Option<SessionCredentials>,
}

pub struct ReconService {
    config: Arc<ScanConfig>,
    echo: Arc<dyn EchoProber>,
    scanner: PortScanner,
    grabber: DeviceGrabber,
}

impl ReconService {
    pub fn new(
        config: Arc<ScanConfig>,
        echo: Arc<dyn EchoProber>,
        scanner: PortScanner,
        grabber: DeviceGrabber,
    ) -> Self {
        Self {
            config,
            echo,
            scanner,
            grabber,
        }
    }

    /// Wires the real network implementations.
    pub fn from_config(config: Arc<ScanConfig>) -> Self {
        let connector: Arc<dyn SshConnector> =
            Arc::new(RusshConnector::new(config.ssh_connect_timeout));
        let escalation: Arc<dyn EscalationStrategy> =
            Arc::new(TimedEscalation::new(config.enable_settle_delay));

        let fingerprinter: DeviceFingerprinter =
            DeviceFingerprinter::new(Arc::clone(&connector), Arc::clone(&escalation));
        let retriever = Arc::new(SshCommandRetriever::new(
            Arc::clone(&connector),
            Arc::clone(&escalation),
        ));
        let mut grabber: DeviceGrabber = DeviceGrabber::new(fingerprinter, retriever);

        if let Some(catalog) = TemplateDirCatalog::from_config(&config) {
            grabber = grabber.with_collector(CommandCollector::new(
                Arc::new(catalog),
                connector,
                escalation,
            ));
        }

        Self::new(
            Arc::clone(&config),
            Arc::new(IcmpEchoProber),
            PortScanner::new(config),
            grabber,
        )
    }

    pub fn scanner(&self) -> &PortScanner {
        &self.scanner
    }

    pub fn grabber(&self) -> &DeviceGrabber {
        &self.grabber
    }

    pub async fn ping(&self, addresses: &[Address]) -> anyhow::Result<LivenessResult> {
        Ok(ping_sweep(addresses, &self.config, Arc::clone(&self.echo)).await?)
    }

    /// Runs the full pipeline against `addresses`.
    ///
    /// Fails only when nothing answered the ping sweep.
    pub async fn perform_recon(
        &self,
        addresses: &[Address],
        request: &ReconRequest,
    ) -> anyhow::Result<Vec<HostRecord>> {
        let alive: LivenessResult = self.ping(addresses).await?;
        info!("{} of {} hosts are alive", alive.len(), addresses.len());

        let mut records: Vec<HostRecord> = Vec::with_capacity(alive.len());
        for (address, round_trip) in alive {
            match self.inspect_host(address, round_trip, request).await {
                Ok(record) => records.push(record),
                Err(e) => error!("Skipping {address}: {e:#}"),
            }
        }

        Ok(records)
    }

    async fn inspect_host(
        &self,
        address: Address,
        round_trip: RoundTrip,
        request: &ReconRequest,
    ) -> anyhow::Result<HostRecord> {
        let map: HostPortMap = self
            .scanner
            .scan_host(address, request.domain.as_deref())
            .await?;
        let ports: ClassifiedPorts = classify(&map)?;

        let device: Option<DeviceReport> = match &request.credentials {
            Some(credentials) => Some(
                self.grabber
                    .grab(address, &ports.open_tcp, credentials)
                    .await?,
            ),
            None => None,
        };

        Ok(HostRecord {
            address,
            round_trip,
            credentials: CredentialFlags::from_credentials(request.credentials.as_ref()),
            ports,
            device,
        })
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
