use std::net::SocketAddr;
use std::str::Utf8Error;

use netrecon_common::config::ScanConfig;
use netrecon_common::network::address::Address;
use netrecon_common::probe::{ErrorKind, Fields, PortProbeResult, RETURN_INFORMATION_KEY};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::errors::{classify_io_error, timed_out};
use crate::{PROBE_PAYLOAD, READ_LIMIT};

/// Connects, sends [`PROBE_PAYLOAD`] and keeps the first response chunk.
///
/// A peer that accepts the connection but stays silent (or closes without
/// sending anything) yields an empty open payload.
pub async fn probe(address: Address, port: u16, config: &ScanConfig) -> PortProbeResult {
    let socket_addr: SocketAddr = address.socket(port);

    let mut stream: TcpStream =
        match timeout(config.tcp_connect_timeout, TcpStream::connect(socket_addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return classify_io_error(&e),
            Err(_elapsed) => return timed_out(),
        };

    if let Err(e) = stream.write_all(PROBE_PAYLOAD).await {
        return classify_io_error(&e);
    }

    let mut buffer: [u8; READ_LIMIT] = [0u8; READ_LIMIT];
    let read: usize = match timeout(config.tcp_read_timeout, stream.read(&mut buffer)).await {
        Ok(Ok(read)) => read,
        Ok(Err(e)) => return classify_io_error(&e),
        Err(_elapsed) => {
            debug!("{socket_addr} accepted the connection but sent nothing back");
            0
        }
    };

    decode_banner(&buffer[..read])
}

/// Turns a raw response chunk into an open or closed result.
///
/// A multi-byte character cut off by the read limit is not an error; the
/// complete prefix is kept.
pub fn decode_banner(bytes: &[u8]) -> PortProbeResult {
    if bytes.is_empty() {
        return PortProbeResult::Open(Fields::new());
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => PortProbeResult::field(RETURN_INFORMATION_KEY, text.trim()),
        Err(e) if e.error_len().is_none() => {
            let text: &str = std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default();
            PortProbeResult::field(RETURN_INFORMATION_KEY, text.trim())
        }
        Err(e) => PortProbeResult::closed(ErrorKind::UnicodeDecode, describe_utf8_error(bytes, &e)),
    }
}

fn describe_utf8_error(bytes: &[u8], error: &Utf8Error) -> String {
    let position: usize = error.valid_up_to();
    let byte: u8 = bytes[position];
    let reason: &str = if is_valid_lead_byte(byte) {
        "invalid continuation byte"
    } else {
        "invalid start byte"
    };
    format!("'utf-8' codec can't decode byte 0x{byte:02x} in position {position}: {reason}")
}

fn is_valid_lead_byte(byte: u8) -> bool {
    matches!(byte, 0xC2..=0xF4)
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
    use netrecon_common::probe::ERROR_KEY;
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn loopback() -> Address {
        Address::new(Ipv4Addr::LOCALHOST)
    }

    #[test]
    fn banner_is_trimmed() {
        let result: PortProbeResult = decode_banner(b"SSH-2.0-OpenSSH_8.9p1 Ubuntu-3\r\n");
        assert_eq!(
            result.payload()[RETURN_INFORMATION_KEY],
            "SSH-2.0-OpenSSH_8.9p1 Ubuntu-3"
        );
    }

    #[test]
    fn invalid_utf8_is_closed() {
        let result: PortProbeResult = decode_banner(&[0x41, 0xff, 0x42]);
        assert!(result.is_closed());
        assert_eq!(
            result.payload()[ERROR_KEY],
            "UnicodeDecodeError -- 'utf-8' codec can't decode byte 0xff in position 1: invalid start byte"
        );
    }

    #[test]
    fn truncated_character_is_kept_as_prefix() {
        let result: PortProbeResult = decode_banner(&[b'o', b'k', 0xe2, 0x82]);
        assert_eq!(result.payload()[RETURN_INFORMATION_KEY], "ok");
    }

    #[tokio::test]
    async fn refused_port_is_closed() {
        let listener: TcpListener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port: u16 = listener.local_addr().unwrap().port();
        drop(listener);

        let result: PortProbeResult = probe(loopback(), port, &ScanConfig::default()).await;
        assert!(result.is_closed());
        assert!(result.payload()[ERROR_KEY].starts_with("ConnectionRefusedError -- "));
    }

    #[tokio::test]
    async fn greeting_is_captured() {
        let listener: TcpListener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port: u16 = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut hello: [u8; 13] = [0u8; 13];
            socket.read_exact(&mut hello).await.unwrap();
            socket.write_all(b"220 mail.test.local ESMTP\r\n").await.unwrap();
        });

        let result: PortProbeResult = probe(loopback(), port, &ScanConfig::default()).await;
        assert_eq!(
            result.payload()[RETURN_INFORMATION_KEY],
            "220 mail.test.local ESMTP"
        );
    }

    #[tokio::test]
    async fn silent_service_yields_empty_payload() {
        let listener: TcpListener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port: u16 = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        let config: ScanConfig = ScanConfig {
            tcp_read_timeout: Duration::from_millis(200),
            ..ScanConfig::default()
        };
        let result: PortProbeResult = probe(loopback(), port, &config).await;
        assert!(result.is_empty_success());
    }

    #[tokio::test]
    #[ignore]
    async fn unroutable_address_times_out() {
        let config: ScanConfig = ScanConfig {
            tcp_connect_timeout: Duration::from_millis(300),
            ..ScanConfig::default()
        };
        let address: Address = Address::new(Ipv4Addr::new(203, 0, 113, 1));
        let result: PortProbeResult = probe(address, 80, &config).await;
        assert!(result.payload()[ERROR_KEY].starts_with("TimeoutError -- "));
    }
}
