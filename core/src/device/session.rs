use async_trait::async_trait;
use netrecon_common::credentials::SessionCredentials;
use netrecon_common::network::address::Address;

use crate::error::SessionError;

/// Output of one non-interactive command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: Option<u32>,
}

impl CommandOutput {
    /// Stdout split into trimmed lines, blank lines dropped.
    pub fn lines(&self) -> Vec<String> {
        non_empty_lines(&self.stdout)
    }

    pub fn has_stderr(&self) -> bool {
        !self.stderr.trim().is_empty()
    }
}

/// Opens authenticated SSH sessions.
#[async_trait]
pub trait SshConnector: Send + Sync {
    async fn connect(
        &self,
        address: Address,
        port: u16,
        credentials: &SessionCredentials,
    ) -> Result<Box<dyn DeviceSession>, SessionError>;
}

/// An authenticated session. Commands run strictly one after another.
#[async_trait]
pub trait DeviceSession: Send {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput, SessionError>;

    async fn open_shell(&mut self) -> Result<Box<dyn InteractiveShell>, SessionError>;

    async fn close(&mut self) -> Result<(), SessionError>;
}

/// A pty-backed shell driven line by line.
#[async_trait]
pub trait InteractiveShell: Send {
    async fn send_line(&mut self, line: &str) -> Result<(), SessionError>;

    /// Everything the remote side printed since the last read.
    async fn read_available(&mut self) -> Result<String, SessionError>;
}

pub fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
