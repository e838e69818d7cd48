//! Gateway websocket session
//!
//! Handles the connection lifecycle only: HELLO, heartbeating, IDENTIFY and
//! reconnects. Every dispatch packet is forwarded untouched.

use crate::config::GatewayConfig;
use crate::error::{RelayError, Result};
use crate::events::{opcode, GatewayPacket};
use crate::observability::metrics::gateway as gateway_metrics;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Close codes after which reconnecting cannot help
const FATAL_CLOSE_CODES: &[u16] = &[4004, 4010, 4011, 4012, 4013, 4014];

enum SessionEnd {
    Reconnect,
    ConsumerGone,
    Fatal(String),
}

pub struct GatewaySession {
    url: String,
    token: String,
    intents: u64,
}

impl GatewaySession {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            url: config.url.clone(),
            token: config.token.clone(),
            intents: config.intents,
        }
    }

    /// Keep a session alive, forwarding dispatch packets until `packets` closes.
    pub async fn run(self, packets: mpsc::Sender<GatewayPacket>) -> Result<()> {
        let mut delay = INITIAL_RECONNECT_DELAY;

        loop {
            match self.connect_once(&packets).await {
                Ok(SessionEnd::ConsumerGone) => return Ok(()),
                Ok(SessionEnd::Fatal(reason)) => return Err(RelayError::Gateway(reason)),
                Ok(SessionEnd::Reconnect) => {
                    delay = INITIAL_RECONNECT_DELAY;
                    info!(target: "gateway", "Reconnecting to gateway");
                }
                Err(e) => {
                    warn!(
                        target: "gateway",
                        retry_in_secs = delay.as_secs(),
                        "Gateway connection failed: {}",
                        e
                    );
                }
            }
            gateway_metrics::reconnect();
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(MAX_RECONNECT_DELAY);
        }
    }

    async fn connect_once(&self, packets: &mpsc::Sender<GatewayPacket>) -> Result<SessionEnd> {
        let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        let (mut sink, mut stream) = ws.split();
        debug!(target: "gateway", url = %self.url, "Websocket connected");

        let hello = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let packet: GatewayPacket = serde_json::from_str(&text)?;
                    if packet.op == opcode::HELLO {
                        break packet;
                    }
                    debug!(target: "gateway", op = packet.op, "Ignoring packet before HELLO");
                }
                Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Reconnect),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        };
        let interval_ms = hello
            .d
            .get("heartbeat_interval")
            .and_then(Value::as_u64)
            .ok_or_else(|| RelayError::Gateway("HELLO without heartbeat_interval".to_string()))?;
        let period = Duration::from_millis(interval_ms);
        let jitter = period.mul_f64(rand::random::<f64>());
        let mut heartbeat = interval_at(Instant::now() + jitter, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(target: "gateway", heartbeat_interval_ms = interval_ms, "Received HELLO");

        sink.send(Message::Text(encode(&self.identify_payload())?))
            .await?;
        debug!(target: "gateway", intents = self.intents, "Sent IDENTIFY");

        let mut last_seq: Option<u64> = None;
        let mut acked = true;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if !acked {
                        warn!(target: "gateway", "Heartbeat not acknowledged, reconnecting");
                        return Ok(SessionEnd::Reconnect);
                    }
                    sink.send(heartbeat_message(last_seq)?).await?;
                    acked = false;
                    debug!(target: "gateway", seq = ?last_seq, "Sent heartbeat");
                }
                frame = stream.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(frame))) => {
                            let code = frame.as_ref().map(|f| u16::from(f.code));
                            let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                            if let Some(code) = code.filter(|c| FATAL_CLOSE_CODES.contains(c)) {
                                return Ok(SessionEnd::Fatal(format!(
                                    "gateway closed with {}: {}",
                                    code, reason
                                )));
                            }
                            warn!(target: "gateway", code = ?code, reason = %reason, "Gateway closed connection");
                            return Ok(SessionEnd::Reconnect);
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(SessionEnd::Reconnect),
                    };

                    let packet: GatewayPacket = match serde_json::from_str(&text) {
                        Ok(packet) => packet,
                        Err(e) => {
                            warn!(target: "gateway", "Discarding unparseable packet: {}", e);
                            continue;
                        }
                    };
                    if packet.s.is_some() {
                        last_seq = packet.s;
                    }

                    match packet.op {
                        opcode::DISPATCH => {
                            if packets.send(packet).await.is_err() {
                                return Ok(SessionEnd::ConsumerGone);
                            }
                        }
                        opcode::HEARTBEAT => {
                            sink.send(heartbeat_message(last_seq)?).await?;
                        }
                        opcode::HEARTBEAT_ACK => {
                            acked = true;
                            debug!(target: "gateway", "Heartbeat acknowledged");
                        }
                        opcode::RECONNECT => {
                            info!(target: "gateway", "Gateway requested reconnect");
                            return Ok(SessionEnd::Reconnect);
                        }
                        opcode::INVALID_SESSION => {
                            warn!(target: "gateway", "Session invalidated");
                            return Ok(SessionEnd::Reconnect);
                        }
                        op => debug!(target: "gateway", op, "Unhandled opcode"),
                    }
                }
            }
        }
    }

    fn identify_payload(&self) -> GatewayPacket {
        GatewayPacket::new(
            opcode::IDENTIFY,
            json!({
                "token": self.token,
                "intents": self.intents,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": env!("CARGO_PKG_NAME"),
                    "device": env!("CARGO_PKG_NAME"),
                }
            }),
        )
    }
}

fn encode(packet: &GatewayPacket) -> Result<String> {
    Ok(serde_json::to_string(packet)?)
}

fn heartbeat_message(last_seq: Option<u64>) -> Result<Message> {
    Ok(Message::Text(encode(&GatewayPacket::new(
        opcode::HEARTBEAT,
        json!(last_seq),
    ))?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayMode;

    #[test]
    fn test_identify_carries_token_and_intents() {
        let session = GatewaySession::new(&GatewayConfig {
            token: "abc".to_string(),
            mode: GatewayMode::Packet,
            url: "wss://example.invalid".to_string(),
            intents: 513,
        });
        let payload = session.identify_payload();

        assert_eq!(payload.op, opcode::IDENTIFY);
        assert_eq!(payload.d["token"], "abc");
        assert_eq!(payload.d["intents"], 513);
    }

    #[test]
    fn test_heartbeat_carries_last_sequence() {
        let Message::Text(text) = heartbeat_message(Some(7)).unwrap() else {
            panic!("heartbeat should be a text frame");
        };
        let packet: GatewayPacket = serde_json::from_str(&text).unwrap();
        assert_eq!(packet.op, opcode::HEARTBEAT);
        assert_eq!(packet.d, json!(7));

        let Message::Text(text) = heartbeat_message(None).unwrap() else {
            panic!("heartbeat should be a text frame");
        };
        assert!(text.contains("\"d\":null"));
    }
}
