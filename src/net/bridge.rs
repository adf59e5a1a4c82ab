//! JSON-lines bridge between a realtime link and a byte stream
//!
//! The headless host wires this to stdin/stdout so an external relay can
//! carry the match channel.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{
    clock::DefaultClock,
    state::{keyed::DefaultKeyedStateStore, InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::link::LinkEndpoint;
use super::protocol::{InboundEvent, OutboundEvent};

/// Pose updates accepted per second from one peer
pub const PEER_POSE_RATE: u32 = 40;
/// Pose updates accepted per second across all peers
pub const TOTAL_POSE_RATE: u32 = 240;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;
type PeerLimiter = RateLimiter<Uuid, DefaultKeyedStateStore<Uuid>, DefaultClock>;

fn quota(per_second: u32) -> Quota {
    Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN))
}

/// Flood protection for the inbound side of a realtime link.
///
/// Only pose updates are throttled: they are superseded by the next one, so
/// dropping a few is harmless. Authoritative events (kills, flags, scores,
/// match end) are never resent and always pass.
#[derive(Clone)]
pub struct InboundRateLimiter {
    per_peer: Arc<PeerLimiter>,
    total: Arc<DirectLimiter>,
}

impl InboundRateLimiter {
    pub fn new(per_peer: u32, total: u32) -> Self {
        Self {
            per_peer: Arc::new(RateLimiter::keyed(quota(per_peer))),
            total: Arc::new(RateLimiter::direct(quota(total))),
        }
    }

    /// Whether `event` should be forwarded to the simulation
    pub fn admit(&self, event: &InboundEvent) -> bool {
        match event {
            InboundEvent::PlayerUpdate { player_id, .. } => {
                self.per_peer.check_key(player_id).is_ok() && self.total.check().is_ok()
            }
            _ => true,
        }
    }
}

impl Default for InboundRateLimiter {
    fn default() -> Self {
        Self::new(PEER_POSE_RATE, TOTAL_POSE_RATE)
    }
}

/// Counters reported when the inbound side closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboundStats {
    pub accepted: u64,
    pub malformed: u64,
    pub rate_limited: u64,
}

/// Read one message per line and forward it to the simulation.
/// Returns when the reader hits EOF or the simulation side is gone.
pub async fn pump_inbound<R>(
    reader: R,
    tx: mpsc::Sender<InboundEvent>,
    limiter: InboundRateLimiter,
) -> std::io::Result<InboundStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = InboundStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event = match InboundEvent::from_json(line) {
            Ok(event) => event,
            Err(e) => {
                stats.malformed += 1;
                warn!(error = %e, "Dropping malformed realtime message");
                continue;
            }
        };
        if !limiter.admit(&event) {
            stats.rate_limited += 1;
            debug!(peer = ?event.subject(), "Pose update rate limited");
            continue;
        }
        if tx.send(event).await.is_err() {
            debug!("Simulation side closed, stopping inbound pump");
            break;
        }
        stats.accepted += 1;
    }

    info!(
        accepted = stats.accepted,
        malformed = stats.malformed,
        rate_limited = stats.rate_limited,
        "Inbound stream closed"
    );
    Ok(stats)
}

/// Write each outbound message as one JSON line until the link closes
pub async fn pump_outbound<W>(
    mut rx: mpsc::UnboundedReceiver<OutboundEvent>,
    mut writer: W,
) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut sent = 0;
    while let Some(event) = rx.recv().await {
        let line = match event.to_json() {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, event = event.name(), "Failed to encode outbound message");
                continue;
            }
        };
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        sent += 1;
    }
    Ok(sent)
}

/// Spawn both pumps over the process's stdin and stdout
pub fn spawn_stdio_bridge(endpoint: LinkEndpoint, limiter: InboundRateLimiter) {
    let LinkEndpoint {
        outbound_rx,
        inbound_tx,
    } = endpoint;

    tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        if let Err(e) = pump_inbound(stdin, inbound_tx, limiter).await {
            warn!(error = %e, "Realtime inbound stream failed");
        }
    });

    tokio::spawn(async move {
        if let Err(e) = pump_outbound(outbound_rx, tokio::io::stdout()).await {
            warn!(error = %e, "Realtime outbound stream failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::link::RealtimeLink;
    use crate::game::Team;
    use tokio::io::BufReader;
    use uuid::Uuid;

    #[test]
    fn inbound_skips_malformed_lines() {
        let id = Uuid::new_v4();
        let input = format!(
            "{{\"event\":\"player_left\",\"data\":{{\"playerId\":\"{id}\"}}}}\nnot json\n\n"
        );
        let reader = tokio_test::io::Builder::new().read(input.as_bytes()).build();
        let (mut link, endpoint) = RealtimeLink::pair();

        let stats = tokio_test::block_on(pump_inbound(
            BufReader::new(reader),
            endpoint.inbound_tx,
            InboundRateLimiter::default(),
        ))
        .unwrap();

        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.malformed, 1);
        let drained = link.drain();
        assert_eq!(drained, vec![InboundEvent::PlayerLeft { player_id: id }]);
    }

    #[test]
    fn outbound_writes_one_line_per_message() {
        let expected = format!("{}\n", OutboundEvent::PlayerRespawn.to_json().unwrap());
        let writer = tokio_test::io::Builder::new()
            .write(expected.as_bytes())
            .build();
        let (link, endpoint) = RealtimeLink::pair();
        link.send(OutboundEvent::PlayerRespawn);
        drop(link);

        let sent = tokio_test::block_on(pump_outbound(endpoint.outbound_rx, writer)).unwrap();
        assert_eq!(sent, 1);
    }

    fn pose_line(id: Uuid) -> String {
        format!(
            "{{\"event\":\"player_update\",\"data\":{{\"playerId\":\"{id}\",\"position\":[0.0,0.0,0.0],\"rotation\":{{\"yaw\":0.0,\"pitch\":0.0}},\"velocity\":[0.0,0.0,0.0],\"isSprinting\":false,\"isGrounded\":true}}}}\n"
        )
    }

    #[test]
    fn pose_flood_is_rate_limited() {
        let input = pose_line(Uuid::new_v4()).repeat(50);
        let reader = tokio_test::io::Builder::new().read(input.as_bytes()).build();
        let (_link, endpoint) = RealtimeLink::pair();

        let stats = tokio_test::block_on(pump_inbound(
            BufReader::new(reader),
            endpoint.inbound_tx,
            InboundRateLimiter::new(5, 100),
        ))
        .unwrap();

        assert_eq!(stats.malformed, 0);
        assert!(stats.rate_limited > 0);
        assert_eq!(stats.accepted + stats.rate_limited, 50);
    }

    #[test]
    fn authoritative_events_pass_an_exhausted_quota() {
        let peer = Uuid::new_v4();
        let mut input = pose_line(peer).repeat(20);
        input.push_str("{\"event\":\"match_ended\",\"data\":{\"winner\":\"red\"}}\n");
        input.push_str(&format!(
            "{{\"event\":\"player_left\",\"data\":{{\"playerId\":\"{peer}\"}}}}\n"
        ));
        let reader = tokio_test::io::Builder::new().read(input.as_bytes()).build();
        let (mut link, endpoint) = RealtimeLink::pair();

        let stats = tokio_test::block_on(pump_inbound(
            BufReader::new(reader),
            endpoint.inbound_tx,
            InboundRateLimiter::new(5, 5),
        ))
        .unwrap();

        assert!(stats.rate_limited >= 10);
        let drained = link.drain();
        assert!(drained.contains(&InboundEvent::MatchEnded {
            winner: Some(Team::Red)
        }));
        assert!(drained.contains(&InboundEvent::PlayerLeft { player_id: peer }));
    }

    #[test]
    fn pose_quota_is_per_peer() {
        let limiter = InboundRateLimiter::new(3, 100);
        let pose = |id| InboundEvent::from_json(pose_line(id).trim()).unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let admitted_a = (0..10).filter(|_| limiter.admit(&pose(a))).count();
        assert!(admitted_a < 10);
        assert!(limiter.admit(&pose(b)));
    }
}
