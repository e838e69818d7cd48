use super::{drive, GatewaySession};
use crate::app::ports::EventSourcePort;
use crate::error::Result;
use crate::events::RawEvent;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Raw packet integration. Forwards every dispatch packet as-is; member
/// counts are never available from this source.
pub struct PacketSource {
    session: GatewaySession,
}

impl PacketSource {
    pub fn new(session: GatewaySession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl EventSourcePort for PacketSource {
    async fn run(self: Box<Self>, events: mpsc::Sender<RawEvent>) -> Result<()> {
        drive(self.session, events, |packet| Some(RawEvent::Packet(packet))).await
    }
}
