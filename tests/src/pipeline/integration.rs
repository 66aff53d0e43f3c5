#![cfg(test)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use netrecon_common::config::ScanConfig;
use netrecon_common::credentials::SessionCredentials;
use netrecon_common::network::address::Address;
use netrecon_core::device::escalation::{EscalationStrategy, TimedEscalation};
use netrecon_core::device::fingerprint::DeviceFingerprinter;
use netrecon_core::device::grab::{DeviceGrabber, SshCommandRetriever};
use netrecon_core::device::session::{
    CommandOutput, DeviceSession, InteractiveShell, SshConnector,
};
use netrecon_core::error::SessionError;
use netrecon_core::liveness::EchoProber;
use netrecon_core::recon::{ReconRequest, ReconService};
use netrecon_core::report::HostRecord;
use netrecon_core::scanner::PortScanner;
use serde_json::{Value, json};

use crate::util::{banner_server, loopback, refused_port};

/// Loopback always answers in 3 ms.
struct LoopbackEcho;

#[async_trait]
impl EchoProber for LoopbackEcho {
    async fn echo(&self, address: Address, _wait: Duration) -> Option<Duration> {
        (address == loopback()).then_some(Duration::from_millis(3))
    }
}

#[derive(Default)]
struct RecordingConnector {
    ports: Mutex<Vec<u16>>,
    commands: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl SshConnector for RecordingConnector {
    async fn connect(
        &self,
        _address: Address,
        port: u16,
        _credentials: &SessionCredentials,
    ) -> Result<Box<dyn DeviceSession>, SessionError> {
        self.ports.lock().unwrap().push(port);
        Ok(Box::new(RecordingSession {
            commands: Arc::clone(&self.commands),
        }))
    }
}

struct RecordingSession {
    commands: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl DeviceSession for RecordingSession {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput, SessionError> {
        self.commands.lock().unwrap().push(command.to_string());
        Ok(CommandOutput {
            stdout: "OpenSSH appliance\n\nfirmware 4.2\n".to_string(),
            stderr: String::new(),
            exit_status: Some(0),
        })
    }

    async fn open_shell(&mut self) -> Result<Box<dyn InteractiveShell>, SessionError> {
        Err(SessionError::Transport {
            address: loopback(),
            reason: "no shell".to_string(),
        })
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        Ok(())
    }
}

fn service(tcp_ports: Vec<u16>, connector: Arc<RecordingConnector>) -> ReconService {
    let config: Arc<ScanConfig> = Arc::new(ScanConfig {
        workers: 2,
        tcp_connect_timeout: Duration::from_secs(2),
        tcp_read_timeout: Duration::from_secs(2),
        tcp_ports,
        udp_ports: vec![],
        ..ScanConfig::default()
    });
    let connector: Arc<dyn SshConnector> = connector;
    let escalation: Arc<dyn EscalationStrategy> =
        Arc::new(TimedEscalation::new(Duration::from_millis(1)));
    let grabber: DeviceGrabber = DeviceGrabber::new(
        DeviceFingerprinter::new(Arc::clone(&connector), Arc::clone(&escalation)),
        Arc::new(SshCommandRetriever::new(connector, escalation)),
    );
    ReconService::new(
        Arc::clone(&config),
        Arc::new(LoopbackEcho),
        PortScanner::new(config),
        grabber,
    )
}

#[tokio::test]
async fn recon_without_credentials_reports_ports_only() {
    let http_like: u16 = banner_server("220 loopback ESMTP ready").await;
    let refused: u16 = refused_port().await;
    let connector: Arc<RecordingConnector> = Arc::new(RecordingConnector::default());

    let records: Vec<HostRecord> = service(vec![http_like, refused], Arc::clone(&connector))
        .perform_recon(&[loopback()], &ReconRequest::default())
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert!(records[0].device.is_none());
    assert!(connector.ports.lock().unwrap().is_empty());

    let short: Value = records[0].to_json_short();
    assert_eq!(
        short,
        json!({
            "127.0.0.1": {
                "ping_response_times": [3.0, 3.0, 3.0],
                "Username_Supplied": false,
                "Password_Supplied": false,
                "Enable_Password_Supplied": false,
                "Open_TCP_Ports_List": [http_like],
                "Open_UDP_Ports_List": [],
                "Closed_TCP_Ports_List": [refused],
                "Closed_UDP_Ports_List": []
            }
        })
    );
}

#[tokio::test]
async fn recon_with_credentials_fingerprints_the_ssh_port() {
    let ssh: u16 = banner_server("SSH-2.0-dropbear_2022.83").await;
    let connector: Arc<RecordingConnector> = Arc::new(RecordingConnector::default());
    let request: ReconRequest = ReconRequest {
        domain: None,
        credentials: Some(SessionCredentials::new("admin", "hunter2", None).unwrap()),
    };

    let records: Vec<HostRecord> = service(vec![ssh], Arc::clone(&connector))
        .perform_recon(&[loopback()], &request)
        .await
        .unwrap();

    assert_eq!(*connector.ports.lock().unwrap(), vec![ssh]);
    assert_eq!(*connector.commands.lock().unwrap(), vec!["show version".to_string()]);

    let long: Value = records[0].to_json_long();
    let host: &Value = &long["127.0.0.1"];
    assert_eq!(host["Username_Supplied"], true);
    assert_eq!(
        host["Open_TCP_Ports_List"][ssh.to_string()]["Return Information"],
        "SSH-2.0-dropbear_2022.83"
    );
    assert_eq!(
        host["Device_Information"]["Version_Info"],
        json!(["OpenSSH appliance", "firmware 4.2"])
    );
    assert_eq!(host["Device_Information"]["CONFIG"]["Open_Close"], false);
    assert_eq!(
        host["Device_Information"]["CONFIG"]["Open_Close_Msg"],
        "Config for type device not yet supported (unknown)."
    );
}
