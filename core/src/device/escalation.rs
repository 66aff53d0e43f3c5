//! # Privilege Escalation
//!
//! Network CLIs such as Cisco IOS only show the full picture in the
//! privileged `enable` mode. Entering it means talking to an interactive
//! shell, which is what [`EscalationStrategy`] abstracts.
//!
//! [`TimedEscalation`] drives the shell purely by timing: every line sent is
//! followed by a fixed settle delay instead of waiting for a prompt. Slow
//! device CLIs depend on those delays, so an alternative strategy (say, one
//! that matches prompts) has to plug in here rather than change the session
//! state machine.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::debug;

use super::session::InteractiveShell;
use crate::error::SessionError;

pub const ENABLE_COMMAND: &str = "enable";
pub const DISABLE_PAGING_COMMAND: &str = "terminal length 0";

#[async_trait]
pub trait EscalationStrategy: Send + Sync {
    /// Enters privileged mode using `secret` and disables paging.
    async fn escalate(
        &self,
        shell: &mut dyn InteractiveShell,
        secret: &str,
    ) -> Result<(), SessionError>;

    /// Issues `command` on an escalated shell and returns what it printed.
    async fn issue(
        &self,
        shell: &mut dyn InteractiveShell,
        command: &str,
    ) -> Result<String, SessionError>;
}

pub struct TimedEscalation {
    settle: Duration,
}

impl TimedEscalation {
    pub fn new(settle: Duration) -> Self {
        Self { settle }
    }

    async fn send_and_settle(
        &self,
        shell: &mut dyn InteractiveShell,
        line: &str,
    ) -> Result<(), SessionError> {
        shell.send_line(line).await?;
        sleep(self.settle).await;
        Ok(())
    }
}

impl Default for TimedEscalation {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

#[async_trait]
impl EscalationStrategy for TimedEscalation {
    async fn escalate(
        &self,
        shell: &mut dyn InteractiveShell,
        secret: &str,
    ) -> Result<(), SessionError> {
        self.send_and_settle(shell, ENABLE_COMMAND).await?;
        self.send_and_settle(shell, secret).await?;
        self.send_and_settle(shell, DISABLE_PAGING_COMMAND).await?;

        // Login banner, prompts and the echoed lines above.
        let drained: String = shell.read_available().await?;
        debug!("Drained {} bytes after escalation", drained.len());
        Ok(())
    }

    async fn issue(
        &self,
        shell: &mut dyn InteractiveShell,
        command: &str,
    ) -> Result<String, SessionError> {
        self.send_and_settle(shell, command).await?;
        shell.read_available().await
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
