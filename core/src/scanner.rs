//! # Port Scanner
//!
//! Fans the configured TCP and UDP port catalogs out to a bounded set of
//! tasks, one task per `(protocol, port)`, and folds the results into a
//! [`HostPortMap`] once every task has been joined.
//!
//! Probing itself sits behind [`PortProber`] so the fan-out can be exercised
//! without touching the network.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use netrecon_common::config::ScanConfig;
use netrecon_common::network::address::Address;
use netrecon_common::probe::{HostPortMap, PortProbeResult, Protocol};
use netrecon_common::success;
use netrecon_protocols::dispatch;
use netrecon_protocols::dns::DomainName;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::error::ScanError;

/// Produces the result for one `(address, protocol, port)`.
#[async_trait]
pub trait PortProber: Send + Sync {
    async fn probe(
        &self,
        address: Address,
        protocol: Protocol,
        port: u16,
        domain: &DomainName,
    ) -> PortProbeResult;
}

/// Routes each port to the matching protocol probe.
pub struct NetworkProber {
    config: Arc<ScanConfig>,
}

impl NetworkProber {
    pub fn new(config: Arc<ScanConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PortProber for NetworkProber {
    async fn probe(
        &self,
        address: Address,
        protocol: Protocol,
        port: u16,
        domain: &DomainName,
    ) -> PortProbeResult {
        dispatch::probe_port(address, protocol, port, domain, &self.config).await
    }
}

pub struct PortScanner {
    config: Arc<ScanConfig>,
    prober: Arc<dyn PortProber>,
}

impl PortScanner {
    pub fn new(config: Arc<ScanConfig>) -> Self {
        let prober: Arc<dyn PortProber> = Arc::new(NetworkProber::new(Arc::clone(&config)));
        Self { config, prober }
    }

    pub fn with_prober(config: Arc<ScanConfig>, prober: Arc<dyn PortProber>) -> Self {
        Self { config, prober }
    }

    /// Probes every catalog port of `address`.
    ///
    /// `domain` is used by the DNS probes and defaults to the configured domain.
    pub async fn scan_host(
        &self,
        address: Address,
        domain: Option<&str>,
    ) -> Result<HostPortMap, ScanError> {
        let domain: Arc<DomainName> =
            Arc::new(DomainName::parse(self.config.domain_or_default(domain))?);

        let jobs: BTreeSet<(Protocol, u16)> = self
            .config
            .tcp_ports
            .iter()
            .map(|&port| (Protocol::Tcp, port))
            .chain(self.config.udp_ports.iter().map(|&port| (Protocol::Udp, port)))
            .collect();

        info!(
            "Scanning {} ports on {address} with {} workers",
            jobs.len(),
            self.config.workers.max(1)
        );

        let semaphore: Arc<Semaphore> = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut tasks: JoinSet<(Protocol, u16, PortProbeResult)> = JoinSet::new();

        for &(protocol, port) in &jobs {
            let semaphore: Arc<Semaphore> = Arc::clone(&semaphore);
            let prober: Arc<dyn PortProber> = Arc::clone(&self.prober);
            let domain: Arc<DomainName> = Arc::clone(&domain);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result: PortProbeResult = prober.probe(address, protocol, port, &domain).await;
                (protocol, port, result)
            });
        }

        let mut pending: BTreeSet<(Protocol, u16)> = jobs;
        let mut map: HostPortMap = HostPortMap::new();

        while let Some(joined) = tasks.join_next().await {
            let (protocol, port, result) =
                joined.map_err(|e| ScanError::MalformedWorkerResult {
                    reason: e.to_string(),
                })?;

            if !pending.remove(&(protocol, port)) {
                return Err(ScanError::MalformedWorkerResult {
                    reason: format!("unexpected or repeated result for {protocol}/{port}"),
                });
            }

            let result: PortProbeResult = result.or_nothing();
            if result.is_open() {
                success!("{address} {protocol}/{port} is open");
            } else {
                debug!("{address} {protocol}/{port} is closed");
            }
            map.insert(protocol, port, result);
        }

        if let Some((protocol, port)) = pending.first() {
            return Err(ScanError::MalformedWorkerResult {
                reason: format!("no result came back for {protocol}/{port}"),
            });
        }

        Ok(map)
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

#[cfg(test)]
mod tests {
    use super::*;
    use netrecon_common::config::{DEFAULT_TCP_PORTS, DEFAULT_UDP_PORTS};
    use netrecon_common::error::ProbeInputError;
    use netrecon_common::probe::{ErrorKind, Fields, NOTHING_KEY, RETURN_INFORMATION_KEY};
    use std::net::Ipv4Addr;
    use std::time::Duration;

    /// TCP 22 answers with a banner, TCP 25 accepts but is silent, the rest refuse.
    struct ScriptedProber;

    #[async_trait]
    impl PortProber for ScriptedProber {
        async fn probe(
            &self,
            _address: Address,
            protocol: Protocol,
            port: u16,
            _domain: &DomainName,
        ) -> PortProbeResult {
            // finish out of order on purpose
            tokio::time::sleep(Duration::from_millis(u64::from(port % 7))).await;
            match (protocol, port) {
                (Protocol::Tcp, 22) => {
                    PortProbeResult::field(RETURN_INFORMATION_KEY, "SSH-2.0-OpenSSH_8.9p1 Ubuntu")
                }
                (Protocol::Tcp, 25) => PortProbeResult::Open(Fields::new()),
                (Protocol::Udp, _) => PortProbeResult::closed(ErrorKind::SocketTimedOut, ""),
                _ => PortProbeResult::closed(ErrorKind::ConnectionRefused, "refused"),
            }
        }
    }

    struct PanickingProber;

    #[async_trait]
    impl PortProber for PanickingProber {
        async fn probe(
            &self,
            _address: Address,
            _protocol: Protocol,
            port: u16,
            _domain: &DomainName,
        ) -> PortProbeResult {
            if port == 443 {
                panic!("worker blew up");
            }
            PortProbeResult::closed(ErrorKind::ConnectionRefused, "refused")
        }
    }

    fn target() -> Address {
        Address::new(Ipv4Addr::new(10, 0, 0, 1))
    }

    #[tokio::test]
    async fn every_catalog_port_gets_a_result() {
        let scanner: PortScanner =
            PortScanner::with_prober(Arc::new(ScanConfig::default()), Arc::new(ScriptedProber));
        let map: HostPortMap = scanner.scan_host(target(), None).await.unwrap();

        assert_eq!(map.tcp.len(), DEFAULT_TCP_PORTS.len());
        assert_eq!(map.udp.len(), DEFAULT_UDP_PORTS.len());
        assert!(map.tcp.values().chain(map.udp.values()).all(|r| !r.payload().is_empty()));
    }

    #[tokio::test]
    async fn empty_payload_is_substituted() {
        let scanner: PortScanner =
            PortScanner::with_prober(Arc::new(ScanConfig::default()), Arc::new(ScriptedProber));
        let map: HostPortMap = scanner.scan_host(target(), None).await.unwrap();

        assert_eq!(
            map.tcp[&25].payload()[NOTHING_KEY],
            "Nothing returned from the server"
        );
        assert!(map.tcp[&22].is_open());
    }

    #[tokio::test]
    async fn tcp_and_udp_maps_are_independent() {
        let config: ScanConfig = ScanConfig {
            tcp_ports: vec![53, 8080],
            udp_ports: vec![53, 8080],
            ..ScanConfig::default()
        };
        let scanner: PortScanner =
            PortScanner::with_prober(Arc::new(config), Arc::new(ScriptedProber));
        let map: HostPortMap = scanner.scan_host(target(), None).await.unwrap();

        assert!(map.tcp[&53].payload()["ERROR"].starts_with("ConnectionRefusedError"));
        assert_eq!(map.udp[&53].payload()["ERROR"], "Socket Timed Out");
    }

    #[tokio::test]
    async fn worker_panic_is_fatal() {
        let scanner: PortScanner =
            PortScanner::with_prober(Arc::new(ScanConfig::default()), Arc::new(PanickingProber));
        let result = scanner.scan_host(target(), None).await;
        assert!(matches!(result, Err(ScanError::MalformedWorkerResult { .. })));
    }

    #[tokio::test]
    async fn invalid_domain_is_rejected_up_front() {
        let scanner: PortScanner =
            PortScanner::with_prober(Arc::new(ScanConfig::default()), Arc::new(ScriptedProber));
        let result = scanner.scan_host(target(), Some("bad..domain")).await;
        assert!(matches!(
            result,
            Err(ScanError::Input(ProbeInputError::InvalidDomain { .. }))
        ));
    }
}
