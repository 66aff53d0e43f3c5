use netrecon_common::config::ScanConfig;
use netrecon_common::network::address::Address;
use netrecon_common::probe::{ErrorKind, Fields, PortProbeResult, RETURN_INFORMATION_KEY};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::errors::classify_io_error;
use crate::{PROBE_PAYLOAD, READ_LIMIT};

/// Sends [`PROBE_PAYLOAD`] in one datagram and waits for a single reply.
///
/// The socket is connected so ICMP port-unreachable comes back as a refusal
/// instead of a silent timeout.
pub async fn probe(address: Address, port: u16, config: &ScanConfig) -> PortProbeResult {
    let socket: UdpSocket = match UdpSocket::bind(("0.0.0.0", 0)).await {
        Ok(socket) => socket,
        Err(e) => return classify_io_error(&e),
    };

    if let Err(e) = socket.connect(address.socket(port)).await {
        return classify_io_error(&e);
    }

    if let Err(e) = socket.send(PROBE_PAYLOAD).await {
        return classify_io_error(&e);
    }

    let mut buffer: [u8; READ_LIMIT] = [0u8; READ_LIMIT];
    match timeout(config.udp_timeout, socket.recv(&mut buffer)).await {
        Ok(Ok(0)) => PortProbeResult::Open(Fields::new()),
        Ok(Ok(read)) => {
            let text: String = String::from_utf8_lossy(&buffer[..read]).into_owned();
            PortProbeResult::field(RETURN_INFORMATION_KEY, text.trim())
        }
        Ok(Err(e)) => classify_io_error(&e),
        Err(_elapsed) => PortProbeResult::closed(ErrorKind::SocketTimedOut, ""),
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
