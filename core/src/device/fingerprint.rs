//! # Session State Machine
//!
//! ```text
//! Disconnected -> Connected -> Fingerprinted -> Escalated | Skipped -> CommandsIssued -> Closed
//!                     \______________\_______________\___________________\____> Failed(reason)
//! ```
//!
//! Authentication failures and timeouts end in [`FingerprintOutcome::Failed`];
//! they are ordinary results for a scanner. Every other session error is
//! returned to the caller. Once connected, the session is closed no matter
//! how the commands went.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use netrecon_common::credentials::SessionCredentials;
use netrecon_common::network::address::Address;
use tracing::{debug, error, warn};

use super::escalation::EscalationStrategy;
use super::session::{CommandOutput, DeviceSession, InteractiveShell, SshConnector, non_empty_lines};
use super::{DeviceIdentity, OsFamily, PlatformTag, infer_platform};
use crate::error::SessionError;

pub const VERSION_INFO_KEY: &str = "Version Info";
pub const CISCO_DISCOVERY_COMMAND: &str = "show version";
pub const LINUX_DISCOVERY_COMMAND: &str = "uname -a";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Fingerprinted,
    Escalated,
    Skipped,
    CommandsIssued,
    Closed,
    Failed(String),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => f.write_str("Disconnected"),
            SessionState::Connected => f.write_str("Connected"),
            SessionState::Fingerprinted => f.write_str("Fingerprinted"),
            SessionState::Escalated => f.write_str("Escalated"),
            SessionState::Skipped => f.write_str("Skipped"),
            SessionState::CommandsIssued => f.write_str("CommandsIssued"),
            SessionState::Closed => f.write_str("Closed"),
            SessionState::Failed(reason) => write!(f, "Failed({reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FingerprintOutcome {
    Identified(DeviceIdentity),
    /// `version_info` reads `[ERROR] <Kind>: <detail>`.
    Failed { version_info: String },
}

impl FingerprintOutcome {
    pub fn to_payload(&self) -> BTreeMap<String, serde_json::Value> {
        let value: serde_json::Value = match self {
            FingerprintOutcome::Identified(identity) => {
                serde_json::Value::from(identity.banner_lines.clone())
            }
            FingerprintOutcome::Failed { version_info } => {
                serde_json::Value::from(version_info.as_str())
            }
        };
        BTreeMap::from([(VERSION_INFO_KEY.to_string(), value)])
    }
}

/// The states a single fingerprint run went through.
#[derive(Debug)]
struct Trail {
    address: Address,
    states: Vec<SessionState>,
}

impl Trail {
    fn start(address: Address) -> Self {
        Self {
            address,
            states: vec![SessionState::Disconnected],
        }
    }

    fn enter(&mut self, state: SessionState) {
        debug!("{} session -> {state}", self.address);
        self.states.push(state);
    }
}

pub struct DeviceFingerprinter {
    connector: Arc<dyn SshConnector>,
    escalation: Arc<dyn EscalationStrategy>,
}

impl DeviceFingerprinter {
    pub fn new(connector: Arc<dyn SshConnector>, escalation: Arc<dyn EscalationStrategy>) -> Self {
        Self {
            connector,
            escalation,
        }
    }

    pub async fn fingerprint(
        &self,
        address: Address,
        ssh_port: u16,
        os_family: OsFamily,
        credentials: &SessionCredentials,
    ) -> Result<FingerprintOutcome, SessionError> {
        let (outcome, _states) = self
            .fingerprint_traced(address, ssh_port, os_family, credentials)
            .await;
        outcome
    }

    /// Same as [`Self::fingerprint`], also returning every state entered.
    pub async fn fingerprint_traced(
        &self,
        address: Address,
        ssh_port: u16,
        os_family: OsFamily,
        credentials: &SessionCredentials,
    ) -> (Result<FingerprintOutcome, SessionError>, Vec<SessionState>) {
        let mut trail: Trail = Trail::start(address);
        let outcome = self
            .run(&mut trail, address, ssh_port, os_family, credentials)
            .await;

        let outcome = match outcome {
            Ok(identity) => Ok(FingerprintOutcome::Identified(identity)),
            Err(e) => {
                trail.enter(SessionState::Failed(e.to_string()));
                if e.is_recoverable() {
                    warn!("{e}");
                    Ok(FingerprintOutcome::Failed {
                        version_info: format!("[ERROR] {e}"),
                    })
                } else {
                    error!("{e}");
                    Err(e)
                }
            }
        };

        (outcome, trail.states)
    }

    async fn run(
        &self,
        trail: &mut Trail,
        address: Address,
        ssh_port: u16,
        os_family: OsFamily,
        credentials: &SessionCredentials,
    ) -> Result<DeviceIdentity, SessionError> {
        let mut session: Box<dyn DeviceSession> =
            self.connector.connect(address, ssh_port, credentials).await?;
        trail.enter(SessionState::Connected);

        let discovered = self
            .discover(trail, session.as_mut(), address, os_family, credentials)
            .await;

        let closed = session.close().await;

        let banner_lines: Vec<String> = discovered?;
        trail.enter(SessionState::CommandsIssued);

        if let Err(e) = closed {
            debug!("{address} did not close cleanly: {e}");
        }
        trail.enter(SessionState::Closed);

        let platform: PlatformTag = match os_family {
            OsFamily::Cisco => infer_platform(&banner_lines),
            OsFamily::Linux => match infer_platform(&banner_lines) {
                PlatformTag::Unknown => PlatformTag::Linux,
                tag => tag,
            },
            OsFamily::Other => PlatformTag::Unknown,
        };

        Ok(DeviceIdentity {
            ssh_port,
            os_family,
            banner_lines,
            platform,
        })
    }

    async fn discover(
        &self,
        trail: &mut Trail,
        session: &mut dyn DeviceSession,
        address: Address,
        os_family: OsFamily,
        credentials: &SessionCredentials,
    ) -> Result<Vec<String>, SessionError> {
        trail.enter(SessionState::Fingerprinted);

        match (os_family, credentials.enable_password()) {
            (OsFamily::Cisco, Some(secret)) => {
                let mut shell: Box<dyn InteractiveShell> = session.open_shell().await?;
                self.escalation.escalate(shell.as_mut(), secret).await?;
                trail.enter(SessionState::Escalated);

                let output: String = self
                    .escalation
                    .issue(shell.as_mut(), CISCO_DISCOVERY_COMMAND)
                    .await?;
                Ok(non_empty_lines(&output))
            }
            (OsFamily::Cisco, None) => {
                trail.enter(SessionState::Skipped);
                run_checked(session, address, CISCO_DISCOVERY_COMMAND).await
            }
            (OsFamily::Linux, _) => {
                trail.enter(SessionState::Skipped);
                run_checked(session, address, LINUX_DISCOVERY_COMMAND).await
            }
            (OsFamily::Other, _) => {
                trail.enter(SessionState::Skipped);
                let output: CommandOutput = session.exec(CISCO_DISCOVERY_COMMAND).await?;
                Ok(output.lines())
            }
        }
    }
}

async fn run_checked(
    session: &mut dyn DeviceSession,
    address: Address,
    command: &str,
) -> Result<Vec<String>, SessionError> {
    let output: CommandOutput = session.exec(command).await?;
    if output.has_stderr() {
        return Err(SessionError::CommandFailed {
            address,
            command: command.to_string(),
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output.lines())
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
    use crate::device::escalation::TimedEscalation;
    use async_trait::async_trait;
    use std::net::Ipv4Addr;
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;

    const IOS_VERSION: &str = "Cisco IOS Software, IOSv Software (VIOS-ADVENTERPRISEK9-M), Version 15.6(2)T\r\n\r\nROM: Bootstrap program is IOSv\r\n";

    #[derive(Clone, Copy)]
    enum Script {
        Refuse,
        Time,
        Reset,
        Answer,
        Stderr,
    }

    /// A connector whose sessions answer from fixed text and log every call.
    struct MockConnector {
        script: Script,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl MockConnector {
        fn new(script: Script) -> (Arc<Self>, Arc<Mutex<Vec<String>>>) {
            let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
            let connector: Arc<Self> = Arc::new(Self {
                script,
                log: Arc::clone(&log),
            });
            (connector, log)
        }
    }

    #[async_trait]
    impl SshConnector for MockConnector {
        async fn connect(
            &self,
            address: Address,
            _port: u16,
            _credentials: &SessionCredentials,
        ) -> Result<Box<dyn DeviceSession>, SessionError> {
            match self.script {
                Script::Refuse => Err(SessionError::AuthenticationFailed { address }),
                Script::Time => Err(SessionError::Timeout { address }),
                Script::Reset => Err(SessionError::Transport {
                    address,
                    reason: "connection reset".to_string(),
                }),
                Script::Answer | Script::Stderr => Ok(Box::new(MockSession {
                    script: self.script,
                    log: Arc::clone(&self.log),
                })),
            }
        }
    }

    struct MockSession {
        script: Script,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl DeviceSession for MockSession {
        async fn exec(&mut self, command: &str) -> Result<CommandOutput, SessionError> {
            self.log.lock().unwrap().push(format!("exec {command}"));
            let stdout: String = match command {
                "uname -a" => "Linux box 5.4.0-58-generic #64-Ubuntu SMP x86_64 GNU/Linux\n".to_string(),
                _ => IOS_VERSION.to_string(),
            };
            let stderr: String = match self.script {
                Script::Stderr => "permission denied".to_string(),
                _ => String::new(),
            };
            Ok(CommandOutput {
                stdout,
                stderr,
                exit_status: Some(0),
            })
        }

        async fn open_shell(&mut self) -> Result<Box<dyn InteractiveShell>, SessionError> {
            self.log.lock().unwrap().push("shell".to_string());
            Ok(Box::new(MockShell {
                log: Arc::clone(&self.log),
                last: String::new(),
            }))
        }

        async fn close(&mut self) -> Result<(), SessionError> {
            self.log.lock().unwrap().push("close".to_string());
            Ok(())
        }
    }

    struct MockShell {
        log: Arc<Mutex<Vec<String>>>,
        last: String,
    }

    #[async_trait]
    impl InteractiveShell for MockShell {
        async fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
            self.log.lock().unwrap().push(format!("send {line}"));
            self.last = line.to_string();
            Ok(())
        }

        async fn read_available(&mut self) -> Result<String, SessionError> {
            self.log.lock().unwrap().push("read".to_string());
            if self.last == "show version" {
                Ok(format!("router#show version\r\n{IOS_VERSION}router#"))
            } else {
                Ok("router>\r\nPassword:\r\nrouter#".to_string())
            }
        }
    }

    fn address() -> Address {
        Address::new(Ipv4Addr::new(192, 168, 89, 22))
    }

    fn fingerprinter(connector: Arc<MockConnector>) -> DeviceFingerprinter {
        DeviceFingerprinter::new(
            connector,
            Arc::new(TimedEscalation::new(Duration::from_millis(1))),
        )
    }

    fn plain() -> SessionCredentials {
        SessionCredentials::new("jdoe", "secret", None).unwrap()
    }

    fn with_enable() -> SessionCredentials {
        SessionCredentials::new("jdoe", "secret", Some("ciscocisco".to_string())).unwrap()
    }

    #[tokio::test]
    async fn authentication_failure_becomes_version_info() {
        let (connector, _log) = MockConnector::new(Script::Refuse);
        let outcome: FingerprintOutcome = fingerprinter(connector)
            .fingerprint(address(), 22, OsFamily::Cisco, &plain())
            .await
            .unwrap();

        let payload = outcome.to_payload();
        assert_eq!(
            payload[VERSION_INFO_KEY],
            "[ERROR] AuthenticationException: Authentication failed for device 192.168.89.22"
        );
    }

    #[tokio::test]
    async fn timeout_becomes_version_info() {
        let (connector, _log) = MockConnector::new(Script::Time);
        let (outcome, states) = fingerprinter(connector)
            .fingerprint_traced(address(), 22, OsFamily::Linux, &plain())
            .await;

        assert_eq!(
            outcome.unwrap(),
            FingerprintOutcome::Failed {
                version_info: "[ERROR] TimeoutError: Connection timed out for device 192.168.89.22"
                    .to_string()
            }
        );
        assert_eq!(states.len(), 2);
        assert!(matches!(states[1], SessionState::Failed(_)));
    }

    /// Collects formatted log lines for the current thread.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn other_transport_errors_propagate_and_are_logged() {
        let logs: CapturedLogs = CapturedLogs::default();
        let writer: CapturedLogs = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (connector, _log) = MockConnector::new(Script::Reset);
        let result = fingerprinter(connector)
            .fingerprint(address(), 22, OsFamily::Cisco, &plain())
            .await;

        assert!(matches!(result, Err(SessionError::Transport { .. })));
        let text: String = logs.text();
        assert!(text.contains("ERROR"));
        assert!(text.contains("ssh transport error with 192.168.89.22"));
    }

    #[tokio::test]
    async fn cisco_without_enable_uses_exec() {
        let (connector, log) = MockConnector::new(Script::Answer);
        let (outcome, states) = fingerprinter(connector)
            .fingerprint_traced(address(), 22, OsFamily::Cisco, &plain())
            .await;

        let FingerprintOutcome::Identified(identity) = outcome.unwrap() else {
            panic!("expected an identity");
        };
        assert_eq!(identity.platform, PlatformTag::Ios);
        assert_eq!(
            identity.banner_lines,
            vec![
                "Cisco IOS Software, IOSv Software (VIOS-ADVENTERPRISEK9-M), Version 15.6(2)T",
                "ROM: Bootstrap program is IOSv"
            ]
        );
        assert_eq!(*log.lock().unwrap(), vec!["exec show version", "close"]);
        assert_eq!(
            states,
            vec![
                SessionState::Disconnected,
                SessionState::Connected,
                SessionState::Fingerprinted,
                SessionState::Skipped,
                SessionState::CommandsIssued,
                SessionState::Closed,
            ]
        );
    }

    #[tokio::test]
    async fn cisco_with_enable_escalates_in_order() {
        let (connector, log) = MockConnector::new(Script::Answer);
        let (outcome, states) = fingerprinter(connector)
            .fingerprint_traced(address(), 22, OsFamily::Cisco, &with_enable())
            .await;

        let FingerprintOutcome::Identified(identity) = outcome.unwrap() else {
            panic!("expected an identity");
        };
        assert_eq!(identity.platform, PlatformTag::Ios);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "shell",
                "send enable",
                "send ciscocisco",
                "send terminal length 0",
                "read",
                "send show version",
                "read",
                "close",
            ]
        );
        assert!(states.contains(&SessionState::Escalated));
        assert!(!states.contains(&SessionState::Skipped));
    }

    #[tokio::test]
    async fn linux_runs_uname() {
        let (connector, log) = MockConnector::new(Script::Answer);
        let outcome: FingerprintOutcome = fingerprinter(connector)
            .fingerprint(address(), 22, OsFamily::Linux, &with_enable())
            .await
            .unwrap();

        let FingerprintOutcome::Identified(identity) = outcome else {
            panic!("expected an identity");
        };
        assert_eq!(identity.platform, PlatformTag::Linux);
        assert_eq!(*log.lock().unwrap(), vec!["exec uname -a", "close"]);
    }

    #[tokio::test]
    async fn other_family_is_not_parsed() {
        let (connector, _log) = MockConnector::new(Script::Stderr);
        let outcome: FingerprintOutcome = fingerprinter(connector)
            .fingerprint(address(), 2222, OsFamily::Other, &plain())
            .await
            .unwrap();

        let FingerprintOutcome::Identified(identity) = outcome else {
            panic!("expected an identity");
        };
        assert_eq!(identity.platform, PlatformTag::Unknown);
        assert_eq!(identity.ssh_port, 2222);
    }

    #[tokio::test]
    async fn stderr_fails_but_still_closes() {
        let (connector, log) = MockConnector::new(Script::Stderr);
        let (outcome, states) = fingerprinter(connector)
            .fingerprint_traced(address(), 22, OsFamily::Cisco, &plain())
            .await;

        assert!(matches!(outcome, Err(SessionError::CommandFailed { .. })));
        assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("close"));
        assert!(matches!(states.last(), Some(SessionState::Failed(_))));
    }
}
