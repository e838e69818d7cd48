//! Gateway event input model
//!
//! Events reach the translator either from the typed client, which resolves
//! guild state and knows live member counts, or as raw gateway packets.

use crate::constants::{GUILD_MEMBER_ADD, GUILD_MEMBER_REMOVE, MESSAGE_CREATE};
use serde::{Deserialize, Serialize};

/// Gateway opcodes used by the session
pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

#[derive(Debug, Clone)]
pub enum RawEvent {
    Typed(TypedEvent),
    Packet(GatewayPacket),
}

/// `{ op, s, t, d }` frame as sent over the gateway websocket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPacket {
    pub op: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    #[serde(default)]
    pub d: serde_json::Value,
}

impl GatewayPacket {
    pub fn new(op: u8, d: serde_json::Value) -> Self {
        Self { op, s: None, t: None, d }
    }

    pub fn dispatch(t: impl Into<String>, d: serde_json::Value) -> Self {
        Self {
            op: opcode::DISPATCH,
            s: None,
            t: Some(t.into()),
            d,
        }
    }

    pub fn is_dispatch(&self) -> bool {
        self.op == opcode::DISPATCH
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedEvent {
    MessageCreate(Message),
    GuildMemberAdd { guild: Guild, member: Member },
    GuildMemberRemove { guild: Guild, member: Member },
    Debug(String),
    Other(String),
}

impl TypedEvent {
    pub fn name(&self) -> &str {
        match self {
            TypedEvent::MessageCreate(_) => MESSAGE_CREATE,
            TypedEvent::GuildMemberAdd { .. } => GUILD_MEMBER_ADD,
            TypedEvent::GuildMemberRemove { .. } => GUILD_MEMBER_REMOVE,
            TypedEvent::Debug(_) => "debug",
            TypedEvent::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Guild {
    pub id: String,
    /// Known only when the client has the guild cached
    pub member_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: String,
    /// `None` for direct messages
    pub guild: Option<Guild>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub channel: Channel,
    pub author: User,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_packet_parses_dispatch_frame() {
        let packet: GatewayPacket = serde_json::from_value(json!({
            "op": 0,
            "s": 42,
            "t": "MESSAGE_CREATE",
            "d": { "channel_id": "10" }
        }))
        .unwrap();

        assert!(packet.is_dispatch());
        assert_eq!(packet.s, Some(42));
        assert_eq!(packet.t.as_deref(), Some("MESSAGE_CREATE"));
    }

    #[test]
    fn test_packet_tolerates_null_fields() {
        let packet: GatewayPacket =
            serde_json::from_str(r#"{"op":11,"s":null,"t":null,"d":null}"#).unwrap();
        assert_eq!(packet.op, opcode::HEARTBEAT_ACK);
        assert!(packet.t.is_none());
    }
}
