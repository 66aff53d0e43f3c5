//! # Liveness Prober
//!
//! Sends a fixed number of ICMP echo requests to every candidate address and
//! keeps the ones that answered at least once, together with their
//! round-trip statistics.
//!
//! A lost request counts as the full timeout in the statistics. An address
//! whose requests were all lost is left out of the result.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use netrecon_common::config::ScanConfig;
use netrecon_common::network::address::Address;
use netrecon_common::success;
use pnet::packet::Packet;
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{IcmpCode, IcmpPacket, IcmpTypes, checksum};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::transport::{self, TransportChannelType, TransportProtocol};
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::LivenessError;

const TRANSPORT_BUFFER_SIZE: usize = 4096;
const CHANNEL_TYPE_ICMP: TransportChannelType =
    TransportChannelType::Layer4(TransportProtocol::Ipv4(IpNextHeaderProtocols::Icmp));
/// 8 byte header followed by 56 zero bytes, the classic `ping` size.
const ECHO_REQUEST_LEN: usize = 64;

/// Sends a single echo request.
#[async_trait]
pub trait EchoProber: Send + Sync {
    /// The round-trip time, or `None` when nothing came back in time.
    async fn echo(&self, address: Address, wait: Duration) -> Option<Duration>;
}

/// [`EchoProber`] on a raw ICMP transport channel. Needs raw socket rights.
///
/// Every request opens its own channel on the blocking pool and waits for the
/// reply carrying its identifier.
pub struct IcmpEchoProber;

#[async_trait]
impl EchoProber for IcmpEchoProber {
    async fn echo(&self, address: Address, wait: Duration) -> Option<Duration> {
        match tokio::task::spawn_blocking(move || blocking_echo(address, wait)).await {
            Ok(Ok(rtt)) => rtt,
            Ok(Err(e)) => {
                debug!("echo to {address} failed: {e:#}");
                None
            }
            Err(e) => {
                debug!("echo worker for {address} did not finish: {e}");
                None
            }
        }
    }
}

fn blocking_echo(address: Address, wait: Duration) -> anyhow::Result<Option<Duration>> {
    let (mut tx, mut rx) = transport::transport_channel(TRANSPORT_BUFFER_SIZE, CHANNEL_TYPE_ICMP)
        .context("failed to open ICMP channel")?;

    let identifier: u16 = rand::random();
    let mut buffer: [u8; ECHO_REQUEST_LEN] = [0u8; ECHO_REQUEST_LEN];
    let request: MutableEchoRequestPacket = create_echo_request(&mut buffer, identifier)?;

    let target: IpAddr = address.into();
    let started: Instant = Instant::now();
    tx.send_to(request, target)
        .context("failed to send echo request")?;

    let mut replies = transport::icmp_packet_iter(&mut rx);
    loop {
        let remaining: Duration = wait.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Ok(None);
        }
        let Some((packet, source)) = replies.next_with_timeout(remaining)? else {
            return Ok(None);
        };
        if source == target && is_reply_to(&packet, identifier) {
            return Ok(Some(started.elapsed()));
        }
    }
}

fn create_echo_request(
    buffer: &mut [u8],
    identifier: u16,
) -> anyhow::Result<MutableEchoRequestPacket<'_>> {
    let mut echo: MutableEchoRequestPacket = MutableEchoRequestPacket::new(buffer)
        .context("failed to create echo request packet")?;

    echo.set_icmp_type(IcmpTypes::EchoRequest);
    echo.set_icmp_code(IcmpCode::new(0));
    echo.set_identifier(identifier);
    echo.set_sequence_number(0);

    echo.set_checksum(0);
    let icmp: IcmpPacket = IcmpPacket::new(echo.packet()).context("failed to create ICMP packet")?;
    let csm: u16 = checksum(&icmp);
    echo.set_checksum(csm);
    Ok(echo)
}

/// Raw ICMP sockets see every ICMP packet of the host, our own requests included.
fn is_reply_to(packet: &IcmpPacket, identifier: u16) -> bool {
    packet.get_icmp_type() == IcmpTypes::EchoReply
        && EchoReplyPacket::new(packet.packet())
            .is_some_and(|reply| reply.get_identifier() == identifier)
}

/// Minimum, average and maximum round trip in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundTrip {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
}

impl RoundTrip {
    /// Aggregates the samples of one address, lost requests counting as `ceiling`.
    ///
    /// Returns `None` when every request was lost.
    pub fn from_samples(samples: &[Option<Duration>], ceiling: Duration) -> Option<Self> {
        if samples.iter().all(Option::is_none) {
            return None;
        }

        let values: Vec<f64> = samples
            .iter()
            .map(|sample| as_millis(sample.unwrap_or(ceiling)))
            .collect();

        let min_ms: f64 = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max_ms: f64 = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg_ms: f64 = values.iter().sum::<f64>() / values.len() as f64;

        Some(Self {
            min_ms,
            avg_ms,
            max_ms,
        })
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.min_ms, self.avg_ms, self.max_ms]
    }
}

impl Serialize for RoundTrip {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        for value in self.as_array() {
            seq.serialize_element(&value)?;
        }
        seq.end()
    }
}

pub type LivenessResult = BTreeMap<Address, RoundTrip>;

/// Probes every address concurrently and returns the reachable ones.
pub async fn ping_sweep(
    addresses: &[Address],
    config: &ScanConfig,
    prober: Arc<dyn EchoProber>,
) -> Result<LivenessResult, LivenessError> {
    if addresses.is_empty() {
        return Err(LivenessError::NoTargets);
    }

    let semaphore: Arc<Semaphore> = Arc::new(Semaphore::new(config.workers.max(1)));
    let mut tasks: JoinSet<(Address, Option<RoundTrip>)> = JoinSet::new();

    for &address in addresses {
        let semaphore: Arc<Semaphore> = Arc::clone(&semaphore);
        let prober: Arc<dyn EchoProber> = Arc::clone(&prober);
        let count: u16 = config.ping_count;
        let wait: Duration = config.ping_timeout;

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let mut samples: Vec<Option<Duration>> = Vec::with_capacity(count as usize);
            for _ in 0..count {
                samples.push(prober.echo(address, wait).await);
            }
            (address, RoundTrip::from_samples(&samples, wait))
        });
    }

    let mut alive: LivenessResult = LivenessResult::new();
    while let Some(joined) = tasks.join_next().await {
        let (address, round_trip) = joined.map_err(|e| LivenessError::Worker {
            reason: e.to_string(),
        })?;

        match round_trip {
            Some(round_trip) => {
                success!("{address} is alive ({:.2} ms average)", round_trip.avg_ms);
                alive.insert(address, round_trip);
            }
            None => debug!("{address} did not answer"),
        }
    }

    if alive.is_empty() {
        return Err(LivenessError::NothingAlive);
    }

    Ok(alive)
}

fn as_millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
