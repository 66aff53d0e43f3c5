//! `russh`-backed implementation of the session seams.

use std::fmt::Display;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use netrecon_common::credentials::SessionCredentials;
use netrecon_common::network::address::Address;
use russh::client::{self, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::session::{CommandOutput, DeviceSession, InteractiveShell, SshConnector};
use crate::error::SessionError;

const STDERR_STREAM: u32 = 1;
const SHELL_QUIET_PERIOD: Duration = Duration::from_millis(300);
const TERMINAL_TYPE: &str = "vt100";
const TERMINAL_COLUMNS: u32 = 200;
const TERMINAL_ROWS: u32 = 24;

/// Host keys are not pinned; the scanner talks to devices it has never seen.
pub struct AcceptAnyHostKey;

#[async_trait]
impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

pub struct RusshConnector {
    connect_timeout: Duration,
    config: Arc<client::Config>,
}

impl RusshConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        let config: client::Config = client::Config {
            inactivity_timeout: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        Self {
            connect_timeout,
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl SshConnector for RusshConnector {
    async fn connect(
        &self,
        address: Address,
        port: u16,
        credentials: &SessionCredentials,
    ) -> Result<Box<dyn DeviceSession>, SessionError> {
        debug!("Opening SSH transport to {address}:{port}");

        let stream: TcpStream =
            match timeout(self.connect_timeout, TcpStream::connect(address.socket(port))).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => {
                    return Err(SessionError::Timeout { address });
                }
                Ok(Err(e)) => return Err(transport(address, e)),
                Err(_elapsed) => return Err(SessionError::Timeout { address }),
            };

        let handshake = client::connect_stream(Arc::clone(&self.config), stream, AcceptAnyHostKey);
        let mut handle: Handle<AcceptAnyHostKey> = timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| SessionError::Timeout { address })?
            .map_err(|e| transport(address, e))?;

        let authenticated: bool = handle
            .authenticate_password(credentials.username(), credentials.password())
            .await
            .map_err(|e| transport(address, e))?;

        if !authenticated {
            return Err(SessionError::AuthenticationFailed { address });
        }

        Ok(Box::new(RusshSession { address, handle }))
    }
}

pub struct RusshSession {
    address: Address,
    handle: Handle<AcceptAnyHostKey>,
}

impl RusshSession {
    async fn open_channel(&self) -> Result<Channel<Msg>, SessionError> {
        self.handle
            .channel_open_session()
            .await
            .map_err(|e| transport(self.address, e))
    }
}

#[async_trait]
impl DeviceSession for RusshSession {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput, SessionError> {
        let mut channel: Channel<Msg> = self.open_channel().await?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| transport(self.address, e))?;

        let mut stdout: Vec<u8> = Vec::new();
        let mut stderr: Vec<u8> = Vec::new();
        let mut exit_status: Option<u32> = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext } if ext == STDERR_STREAM => {
                    stderr.extend_from_slice(data)
                }
                ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
                _ => {}
            }
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_status,
        })
    }

    async fn open_shell(&mut self) -> Result<Box<dyn InteractiveShell>, SessionError> {
        let channel: Channel<Msg> = self.open_channel().await?;
        channel
            .request_pty(false, TERMINAL_TYPE, TERMINAL_COLUMNS, TERMINAL_ROWS, 0, 0, &[])
            .await
            .map_err(|e| transport(self.address, e))?;
        channel
            .request_shell(false)
            .await
            .map_err(|e| transport(self.address, e))?;

        Ok(Box::new(RusshShell {
            address: self.address,
            channel,
        }))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
            .map_err(|e| transport(self.address, e))
    }
}

pub struct RusshShell {
    address: Address,
    channel: Channel<Msg>,
}

#[async_trait]
impl InteractiveShell for RusshShell {
    async fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        let line: String = format!("{line}\n");
        self.channel
            .data(line.as_bytes())
            .await
            .map_err(|e| transport(self.address, e))
    }

    async fn read_available(&mut self) -> Result<String, SessionError> {
        let mut received: Vec<u8> = Vec::new();

        // Keep reading until the device has been quiet for a moment.
        loop {
            match timeout(SHELL_QUIET_PERIOD, self.channel.wait()).await {
                Ok(Some(ChannelMsg::Data { ref data })) => received.extend_from_slice(data),
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            }
        }

        Ok(String::from_utf8_lossy(&received).into_owned())
    }
}

fn transport(address: Address, error: impl Display) -> SessionError {
    SessionError::Transport {
        address,
        reason: error.to_string(),
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
