#![cfg(test)]

use std::sync::Arc;
use std::time::Duration;

use netrecon_common::config::ScanConfig;
use netrecon_common::probe::{HostPortMap, Protocol, RETURN_INFORMATION_KEY};
use netrecon_core::classifier::{ClassifiedPorts, classify};
use netrecon_core::device::{OsFamily, check_ports};
use netrecon_core::scanner::PortScanner;

use crate::util::{banner_server, loopback, refused_port, udp_echo_server};

fn config(tcp_ports: Vec<u16>, udp_ports: Vec<u16>) -> Arc<ScanConfig> {
    Arc::new(ScanConfig {
        workers: 4,
        tcp_connect_timeout: Duration::from_secs(2),
        tcp_read_timeout: Duration::from_secs(2),
        udp_timeout: Duration::from_millis(500),
        tcp_ports,
        udp_ports,
        ..ScanConfig::default()
    })
}

#[tokio::test]
async fn loopback_scan_is_classified_and_fingerprintable() {
    let ssh: u16 = banner_server("SSH-2.0-OpenSSH_9.6 Ubuntu\r\n").await;
    let refused: u16 = refused_port().await;
    let echo: u16 = udp_echo_server().await;

    let scanner: PortScanner = PortScanner::new(config(vec![ssh, refused], vec![echo]));
    let map: HostPortMap = scanner.scan_host(loopback(), None).await.unwrap();

    assert_eq!(map.len(), 3);
    assert_eq!(
        map.ports(Protocol::Tcp)[&ssh].payload()[RETURN_INFORMATION_KEY],
        "SSH-2.0-OpenSSH_9.6 Ubuntu"
    );
    assert!(map.ports(Protocol::Tcp)[&refused].is_closed());

    let ports: ClassifiedPorts = classify(&map).unwrap();
    assert_eq!(ports.open_tcp.keys().copied().collect::<Vec<u16>>(), vec![ssh]);
    assert_eq!(ports.closed_tcp.keys().copied().collect::<Vec<u16>>(), vec![refused]);
    assert_eq!(ports.open_udp.keys().copied().collect::<Vec<u16>>(), vec![echo]);
    assert!(ports.closed_udp.is_empty());

    assert_eq!(check_ports(&ports.open_tcp), Some((ssh, OsFamily::Other)));
}

#[tokio::test]
async fn silent_udp_port_ends_up_closed() {
    let refused: u16 = refused_port().await;
    let scanner: PortScanner = PortScanner::new(config(vec![], vec![refused]));

    let map: HostPortMap = scanner.scan_host(loopback(), None).await.unwrap();
    let ports: ClassifiedPorts = classify(&map).unwrap();

    assert!(ports.open_udp.is_empty());
    assert_eq!(ports.closed_udp.keys().copied().collect::<Vec<u16>>(), vec![refused]);
}

#[tokio::test]
#[ignore = "requires access to the public internet"]
async fn public_resolver_answers_on_udp_53() {
    let scanner: PortScanner = PortScanner::new(config(vec![], vec![53]));
    let address = "1.1.1.1".parse().unwrap();

    let map: HostPortMap = scanner.scan_host(address, Some("example.com")).await.unwrap();
    assert!(map.ports(Protocol::Udp)[&53].is_open());
}
