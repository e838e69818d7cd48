use crate::app::translate_use_case::TranslateUseCase;
use crate::app::write_use_case::WriteUseCase;
use crate::error::RelayError;
use crate::events::{RawEvent, TypedEvent};
use crate::observability::metrics::relay as relay_metrics;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Use case wiring the event source to the writer: translate in arrival
/// order, then hand each point off without waiting on the backend.
pub struct RelayUseCase {
    translator: TranslateUseCase,
    writer: WriteUseCase,
}

impl RelayUseCase {
    pub fn new(writer: WriteUseCase) -> Self {
        Self {
            translator: TranslateUseCase::new(),
            writer,
        }
    }

    /// Translate one event and queue its points. Returns how many were queued.
    pub fn handle(&self, event: &RawEvent) -> usize {
        relay_metrics::event_received(source_name(event));

        if let RawEvent::Typed(TypedEvent::Debug(message)) = event {
            debug!(target: "gateway", "{}", message);
        }

        let points = match self.translator.translate(event) {
            Ok(points) => points,
            Err(RelayError::MalformedPayload { event_type, missing }) => {
                relay_metrics::event_malformed(&event_type);
                warn!(
                    event_type = %event_type,
                    "Skipping event without {}",
                    missing
                );
                return 0;
            }
            Err(e) => {
                warn!("Skipping event: {}", e);
                return 0;
            }
        };

        if points.is_empty() {
            relay_metrics::event_ignored();
            return 0;
        }

        let count = points.len();
        for point in points {
            self.writer.write(point);
        }
        count
    }

    /// Consume events until the source hangs up.
    pub async fn run(&self, mut events: mpsc::Receiver<RawEvent>) {
        info!(database = %self.writer.database(), "Relay started");
        while let Some(event) = events.recv().await {
            self.handle(&event);
        }
        info!("Event source closed, relay stopping");
    }
}

fn source_name(event: &RawEvent) -> &'static str {
    match event {
        RawEvent::Typed(_) => "typed",
        RawEvent::Packet(_) => "packet",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{GatewayPacket, Guild, Member};
    use crate::schema::SchemaRegistry;
    use serde_json::json;

    fn relay_with_queue(capacity: usize) -> (RelayUseCase, mpsc::Receiver<crate::domain::WriteAttempt>) {
        let (tx, rx) = mpsc::channel(capacity);
        let writer = WriteUseCase::with_queue(SchemaRegistry::bot(), "bot", tx);
        (RelayUseCase::new(writer), rx)
    }

    #[tokio::test]
    async fn test_member_event_points_are_queued_in_order() {
        let (relay, mut rx) = relay_with_queue(8);
        let queued = relay.handle(&RawEvent::Typed(TypedEvent::GuildMemberRemove {
            guild: Guild {
                id: "G".to_string(),
                member_count: Some(9),
            },
            member: Member { id: "U".to_string() },
        }));
        drop(relay);

        assert_eq!(queued, 2);
        assert_eq!(rx.recv().await.unwrap().point.measurement, "events");
        assert_eq!(rx.recv().await.unwrap().point.measurement, "members");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_events_queue_nothing() {
        let (relay, mut rx) = relay_with_queue(8);
        let malformed = GatewayPacket::dispatch("GUILD_MEMBER_ADD", json!({ "guild_id": "G" }));
        let unknown = GatewayPacket::dispatch("PRESENCE_UPDATE", json!({}));

        assert_eq!(relay.handle(&RawEvent::Packet(malformed)), 0);
        assert_eq!(relay.handle(&RawEvent::Packet(unknown)), 0);
        assert_eq!(relay.handle(&RawEvent::Typed(TypedEvent::Debug("hi".to_string()))), 0);
        drop(relay);

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_run_drains_source_until_closed() {
        let (relay, mut rx) = relay_with_queue(8);
        let (tx, events) = mpsc::channel(4);

        tx.send(RawEvent::Packet(GatewayPacket::dispatch(
            "MESSAGE_CREATE",
            json!({ "guild_id": "G", "channel_id": "C", "author": { "id": "U" } }),
        )))
        .await
        .unwrap();
        drop(tx);

        relay.run(events).await;
        drop(relay);

        let attempt = rx.recv().await.unwrap();
        assert_eq!(attempt.database, "bot");
        assert_eq!(attempt.point.tags["event_type"], "MESSAGE_CREATE");
        assert!(rx.recv().await.is_none());
    }
}
