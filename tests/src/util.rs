#![cfg(test)]
//! Loopback services the integration tests scan.

use netrecon_common::network::address::Address;
use std::net::Ipv4Addr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

pub fn loopback() -> Address {
    Address::new(Ipv4Addr::LOCALHOST)
}

/// Accepts connections forever, answering the probe payload with `banner`.
pub async fn banner_server(banner: &'static str) -> u16 {
    let listener: TcpListener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port: u16 = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut hello: [u8; 13] = [0u8; 13];
                if socket.read_exact(&mut hello).await.is_ok() {
                    let _ = socket.write_all(banner.as_bytes()).await;
                }
            });
        }
    });
    port
}

/// A port nothing listens on.
pub async fn refused_port() -> u16 {
    let listener: TcpListener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port: u16 = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Echoes every datagram back to its sender.
pub async fn udp_echo_server() -> u16 {
    let socket: UdpSocket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port: u16 = socket.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut buf: [u8; 1024] = [0u8; 1024];
        while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(&buf[..len], peer).await;
        }
    });
    port
}
