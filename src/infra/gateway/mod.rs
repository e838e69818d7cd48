//! Gateway event sources
//!
//! Both integrations share one websocket session and differ only in how they
//! turn dispatch packets into [`RawEvent`]s.

pub mod packet_source;
pub mod session;
pub mod typed_source;

pub use packet_source::PacketSource;
pub use session::GatewaySession;
pub use typed_source::{GuildCache, TypedSource};

use crate::error::{RelayError, Result};
use crate::events::{GatewayPacket, RawEvent};
use tokio::sync::mpsc;
use tracing::info;

const PACKET_BUFFER: usize = 256;

/// Run `session`, converting each dispatch packet and forwarding it to `events`.
async fn drive<F>(session: GatewaySession, events: mpsc::Sender<RawEvent>, mut convert: F) -> Result<()>
where
    F: FnMut(GatewayPacket) -> Option<RawEvent> + Send,
{
    let (tx, rx) = mpsc::channel(PACKET_BUFFER);
    let session_task = tokio::spawn(session.run(tx));

    if !forward(rx, &events, &mut convert).await {
        info!(target: "gateway", "Event consumer closed, stopping gateway session");
        session_task.abort();
        return Ok(());
    }

    match session_task.await {
        Ok(result) => result,
        Err(e) => Err(RelayError::Gateway(format!("session task failed: {}", e))),
    }
}

/// Returns `false` when the consumer hung up before the packet stream ended.
async fn forward<F>(
    mut packets: mpsc::Receiver<GatewayPacket>,
    events: &mpsc::Sender<RawEvent>,
    convert: &mut F,
) -> bool
where
    F: FnMut(GatewayPacket) -> Option<RawEvent>,
{
    while let Some(packet) = packets.recv().await {
        if let Some(event) = convert(packet) {
            if events.send(event).await.is_err() {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_forward_converts_in_order_and_skips_none() {
        let (packet_tx, packet_rx) = mpsc::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(8);

        for t in ["A", "SKIP", "B"] {
            packet_tx
                .send(GatewayPacket::dispatch(t, json!({})))
                .await
                .unwrap();
        }
        drop(packet_tx);

        let mut convert = |p: GatewayPacket| {
            if p.t.as_deref() == Some("SKIP") {
                None
            } else {
                Some(RawEvent::Packet(p))
            }
        };
        assert!(forward(packet_rx, &event_tx, &mut convert).await);
        drop(event_tx);

        let mut names = Vec::new();
        while let Some(RawEvent::Packet(p)) = event_rx.recv().await {
            names.push(p.t.unwrap());
        }
        assert_eq!(names, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_forward_stops_when_consumer_is_gone() {
        let (packet_tx, packet_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::channel(8);
        drop(event_rx);

        packet_tx
            .send(GatewayPacket::dispatch("A", json!({})))
            .await
            .unwrap();

        let mut convert = |p: GatewayPacket| Some(RawEvent::Packet(p));
        assert!(!forward(packet_rx, &event_tx, &mut convert).await);
    }
}
