use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

/// Well-known TCP ports probed for every live host.
pub const DEFAULT_TCP_PORTS: [u16; 39] = [
    20, 21, 22, 23, 25, 37, 43, 53, 79, 80, 88, 109, 110, 115, 118, 143, 162, 179, 194, 389, 443,
    464, 465, 515, 530, 543, 544, 547, 993, 995, 1080, 3128, 3306, 3389, 5432, 5900, 5938, 8080,
    8443,
];

/// Well-known UDP ports probed for every live host.
pub const DEFAULT_UDP_PORTS: [u16; 20] = [
    43, 53, 67, 69, 88, 118, 123, 161, 162, 194, 464, 514, 530, 547, 995, 1080, 3389, 5938, 8080,
    8443,
];

pub const DEFAULT_DNS_DOMAIN: &str = "test.local";

/// Tunables shared by every component of a scan run.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Upper bound of probes running at the same time.
    pub workers: usize,
    /// Echo requests sent to each address.
    pub ping_count: u16,
    pub ping_timeout: Duration,
    pub tcp_connect_timeout: Duration,
    /// How long a connected TCP probe waits for the first response chunk.
    pub tcp_read_timeout: Duration,
    pub udp_timeout: Duration,
    pub http_timeout: Duration,
    /// Retries of failed HTTP connects, on top of the first attempt.
    pub http_retries: u32,
    /// Base of the exponential backoff between HTTP retries.
    pub http_backoff: Duration,
    pub dns_timeout: Duration,
    /// Domain queried when the caller supplies none.
    pub dns_domain: String,
    pub tcp_ports: Vec<u16>,
    pub udp_ports: Vec<u16>,
    pub ssh_connect_timeout: Duration,
    /// Pause between the lines of the enable-mode escalation sequence.
    pub enable_settle_delay: Duration,
    /// Directory holding `{platform}_{command}.textfsm` templates.
    ///
    /// Command collection is skipped when unset.
    pub templates_dir: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            ping_count: 3,
            ping_timeout: Duration::from_secs(1),
            tcp_connect_timeout: Duration::from_secs(10),
            tcp_read_timeout: Duration::from_secs(5),
            udp_timeout: Duration::from_secs(2),
            http_timeout: Duration::from_secs(10),
            http_retries: 3,
            http_backoff: Duration::from_millis(500),
            dns_timeout: Duration::from_secs(5),
            dns_domain: DEFAULT_DNS_DOMAIN.to_string(),
            tcp_ports: DEFAULT_TCP_PORTS.to_vec(),
            udp_ports: DEFAULT_UDP_PORTS.to_vec(),
            ssh_connect_timeout: Duration::from_secs(10),
            enable_settle_delay: Duration::from_millis(500),
            templates_dir: None,
        }
    }
}

impl ScanConfig {
    /// The domain to query, falling back to [`ScanConfig::dns_domain`].
    pub fn domain_or_default<'a>(&'a self, domain: Option<&'a str>) -> &'a str {
        domain.unwrap_or(&self.dns_domain)
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4)
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
    use std::collections::HashSet;

    #[test]
    fn catalogs_have_no_duplicates() {
        let tcp: HashSet<u16> = DEFAULT_TCP_PORTS.iter().copied().collect();
        let udp: HashSet<u16> = DEFAULT_UDP_PORTS.iter().copied().collect();
        assert_eq!(tcp.len(), DEFAULT_TCP_PORTS.len());
        assert_eq!(udp.len(), DEFAULT_UDP_PORTS.len());
    }

    #[test]
    fn defaults_match_probe_timeouts() {
        let config: ScanConfig = ScanConfig::default();
        assert!(config.workers >= 1);
        assert_eq!(config.ping_count, 3);
        assert_eq!(config.ping_timeout, Duration::from_secs(1));
        assert_eq!(config.udp_timeout, Duration::from_secs(2));
        assert_eq!(config.http_retries, 3);
        assert_eq!(config.domain_or_default(None), "test.local");
        assert_eq!(config.domain_or_default(Some("corp.example")), "corp.example");
    }
}
