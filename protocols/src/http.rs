use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use netrecon_common::config::ScanConfig;
use netrecon_common::network::address::Address;
use netrecon_common::probe::{ErrorKind, Fields, PortProbeResult};
use reqwest::header::HeaderMap;
use reqwest::{Client, Response};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => f.write_str("http"),
            Scheme::Https => f.write_str("https"),
        }
    }
}

/// Issues `GET {scheme}://{address}:{port}/` and maps the response headers.
///
/// Connection failures are retried `config.http_retries` times with an
/// exponential backoff starting at `config.http_backoff`.
pub async fn probe(
    address: Address,
    port: u16,
    scheme: Scheme,
    config: &ScanConfig,
) -> PortProbeResult {
    let client: Client = match build_client(config) {
        Ok(client) => client,
        Err(e) => return classify_error(&e),
    };

    let url: String = format!("{scheme}://{address}:{port}/");
    let mut attempt: u32 = 0;

    loop {
        let outcome: reqwest::Result<Response> = client
            .get(&url)
            .send()
            .await
            .and_then(Response::error_for_status);

        match outcome {
            Ok(response) => return headers_to_result(response.headers()),
            Err(e) if e.is_connect() && attempt < config.http_retries => {
                let delay: Duration = backoff(config.http_backoff, attempt);
                debug!("{url} connect failed, retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return classify_error(&e),
        }
    }
}

fn build_client(config: &ScanConfig) -> reqwest::Result<Client> {
    Client::builder()
        .danger_accept_invalid_certs(true)
        .connect_timeout(config.tcp_connect_timeout)
        .timeout(config.http_timeout)
        .build()
}

pub fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Every header becomes one field. Repeated headers are joined with `", "`.
///
/// Header values are kept byte for byte. Names are not: the client hands them
/// over lowercased, so they are rebuilt with [`title_case`].
pub fn headers_to_result(headers: &HeaderMap) -> PortProbeResult {
    let mut fields: Fields = Fields::new();

    for (name, value) in headers {
        let key: String = title_case(name.as_str());
        let value: String = String::from_utf8_lossy(value.as_bytes()).into_owned();
        fields
            .entry(key)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    PortProbeResult::Open(fields)
}

/// `content-type` -> `Content-Type`
///
/// The server's own spelling is lost by then, so names with inner capitals
/// come out normalised (`ETag` is reported as `Etag`, `WWW-Authenticate` as
/// `Www-Authenticate`).
pub fn title_case(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}

fn classify_error(error: &reqwest::Error) -> PortProbeResult {
    let kind: ErrorKind = if error.is_status() {
        ErrorKind::Http
    } else if error.is_connect() {
        ErrorKind::Connection
    } else {
        ErrorKind::Other
    };
    PortProbeResult::closed(kind, error_chain(error))
}

fn error_chain(error: &reqwest::Error) -> String {
    let mut text: String = error.to_string();
    let mut source: Option<&dyn StdError> = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
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
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(response: &'static [u8]) -> u16 {
        let listener: TcpListener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port: u16 = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request: [u8; 2048] = [0u8; 2048];
            let _ = socket.read(&mut request).await.unwrap();
            socket.write_all(response).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        port
    }

    fn fast_config() -> ScanConfig {
        ScanConfig {
            http_backoff: Duration::from_millis(10),
            ..ScanConfig::default()
        }
    }

    #[test]
    fn header_names_are_title_cased() {
        assert_eq!(title_case("server"), "Server");
        assert_eq!(title_case("content-type"), "Content-Type");
        assert_eq!(title_case("x-frame-options"), "X-Frame-Options");
    }

    #[tokio::test]
    async fn mixed_case_header_names_are_normalised() {
        let port: u16 = serve_once(
            b"HTTP/1.1 200 OK\r\nETag: \"5e-1a\"\r\nWWW-Authenticate: Basic realm=\"lab\"\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let payload: Fields = probe(
            Address::new(Ipv4Addr::LOCALHOST),
            port,
            Scheme::Http,
            &fast_config(),
        )
        .await
        .payload();

        assert_eq!(payload["Etag"], "\"5e-1a\"");
        assert_eq!(payload["Www-Authenticate"], "Basic realm=\"lab\"");
        assert!(!payload.contains_key("ETag"));
    }

    #[test]
    fn backoff_doubles() {
        let base: Duration = Duration::from_millis(500);
        assert_eq!(backoff(base, 0), Duration::from_millis(500));
        assert_eq!(backoff(base, 1), Duration::from_secs(1));
        assert_eq!(backoff(base, 2), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn headers_are_returned_verbatim() {
        let port: u16 = serve_once(
            b"HTTP/1.1 200 OK\r\nServer: Apache/2.4.41 (Ubuntu)\r\nContent-Type: text/html\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let result: PortProbeResult = probe(
            Address::new(Ipv4Addr::LOCALHOST),
            port,
            Scheme::Http,
            &fast_config(),
        )
        .await;
        let payload: Fields = result.payload();

        assert!(result.is_open());
        assert_eq!(payload["Server"], "Apache/2.4.41 (Ubuntu)");
        assert_eq!(payload["Content-Type"], "text/html");
    }

    #[tokio::test]
    async fn error_status_is_closed() {
        let port: u16 = serve_once(
            b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let result: PortProbeResult = probe(
            Address::new(Ipv4Addr::LOCALHOST),
            port,
            Scheme::Http,
            &fast_config(),
        )
        .await;

        assert!(result.is_closed());
        assert!(result.payload()[ERROR_KEY].starts_with("HTTPError -- "));
    }

    #[tokio::test]
    async fn refused_connection_is_closed_after_retries() {
        let listener: TcpListener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port: u16 = listener.local_addr().unwrap().port();
        drop(listener);

        let result: PortProbeResult = probe(
            Address::new(Ipv4Addr::LOCALHOST),
            port,
            Scheme::Http,
            &fast_config(),
        )
        .await;

        assert!(result.is_closed());
        assert!(result.payload()[ERROR_KEY].starts_with("ConnectionError -- "));
    }
}
