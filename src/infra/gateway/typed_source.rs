//! Typed integration
//!
//! Keeps a per-guild member count seeded by `GUILD_CREATE` and adjusted on
//! every join and leave, so membership events carry a live count once their
//! guild has been seen.

use super::{drive, GatewaySession};
use crate::app::ports::EventSourcePort;
use crate::constants::{
    DISPATCH_GUILD_CREATE, DISPATCH_GUILD_DELETE, DISPATCH_GUILD_MEMBER_ADD,
    DISPATCH_GUILD_MEMBER_REMOVE, DISPATCH_MESSAGE_CREATE, DISPATCH_READY,
};
use crate::error::Result;
use crate::events::{Channel, GatewayPacket, Guild, Member, Message, RawEvent, TypedEvent, User};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;

#[derive(Debug, Default)]
pub struct GuildCache {
    member_counts: HashMap<String, u64>,
}

impl GuildCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member_count(&self, guild_id: &str) -> Option<u64> {
        self.member_counts.get(guild_id).copied()
    }

    /// Update the cache from a dispatch packet and describe it as a typed event.
    pub fn apply(&mut self, packet: &GatewayPacket) -> Option<TypedEvent> {
        if !packet.is_dispatch() {
            return None;
        }
        let name = packet.t.as_deref()?;
        let d = &packet.d;

        let event = match name {
            DISPATCH_READY => TypedEvent::Debug(format!(
                "Gateway ready as {} with {} guilds",
                text(d, &["user", "id"]),
                d.get("guilds").and_then(Value::as_array).map_or(0, Vec::len)
            )),
            DISPATCH_GUILD_CREATE => {
                let id = text(d, &["id"]);
                if let Some(count) = d.get("member_count").and_then(Value::as_u64) {
                    self.member_counts.insert(id.clone(), count);
                }
                TypedEvent::Debug(format!("Guild {} available", id))
            }
            DISPATCH_GUILD_DELETE => {
                let id = text(d, &["id"]);
                self.member_counts.remove(&id);
                TypedEvent::Debug(format!("Guild {} unavailable", id))
            }
            DISPATCH_MESSAGE_CREATE => {
                // An empty guild_id is a direct message, same as a missing one
                let guild = d
                    .get("guild_id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .map(|id| Guild {
                        id: id.to_string(),
                        member_count: self.member_count(id),
                    });
                TypedEvent::MessageCreate(Message {
                    id: text(d, &["id"]),
                    channel: Channel {
                        id: text(d, &["channel_id"]),
                        guild,
                    },
                    author: User {
                        id: text(d, &["author", "id"]),
                    },
                })
            }
            DISPATCH_GUILD_MEMBER_ADD => {
                let (guild_id, member) = membership(d);
                let member_count = self.member_counts.get_mut(&guild_id).map(|count| {
                    *count += 1;
                    *count
                });
                TypedEvent::GuildMemberAdd {
                    guild: Guild {
                        id: guild_id,
                        member_count,
                    },
                    member,
                }
            }
            DISPATCH_GUILD_MEMBER_REMOVE => {
                let (guild_id, member) = membership(d);
                let member_count = self.member_counts.get_mut(&guild_id).map(|count| {
                    *count = count.saturating_sub(1);
                    *count
                });
                TypedEvent::GuildMemberRemove {
                    guild: Guild {
                        id: guild_id,
                        member_count,
                    },
                    member,
                }
            }
            other => TypedEvent::Other(other.to_string()),
        };
        Some(event)
    }
}

// Missing identifiers become empty strings; the translator refuses them.
fn text(value: &Value, path: &[&str]) -> String {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn membership(d: &Value) -> (String, Member) {
    (
        text(d, &["guild_id"]),
        Member {
            id: text(d, &["user", "id"]),
        },
    )
}

/// Guild-aware integration emitting [`TypedEvent`]s
pub struct TypedSource {
    session: GatewaySession,
    cache: GuildCache,
}

impl TypedSource {
    pub fn new(session: GatewaySession) -> Self {
        Self {
            session,
            cache: GuildCache::new(),
        }
    }
}

#[async_trait]
impl EventSourcePort for TypedSource {
    async fn run(self: Box<Self>, events: mpsc::Sender<RawEvent>) -> Result<()> {
        let TypedSource { session, mut cache } = *self;
        drive(session, events, move |packet| {
            cache.apply(&packet).map(RawEvent::Typed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dispatch(t: &str, d: Value) -> GatewayPacket {
        GatewayPacket::dispatch(t, d)
    }

    #[test]
    fn test_member_counts_follow_joins_and_leaves() {
        let mut cache = GuildCache::new();
        cache.apply(&dispatch("GUILD_CREATE", json!({ "id": "G", "member_count": 41 })));

        let joined = cache
            .apply(&dispatch(
                "GUILD_MEMBER_ADD",
                json!({ "guild_id": "G", "user": { "id": "U" } }),
            ))
            .unwrap();
        assert_eq!(
            joined,
            TypedEvent::GuildMemberAdd {
                guild: Guild {
                    id: "G".to_string(),
                    member_count: Some(42),
                },
                member: Member { id: "U".to_string() },
            }
        );

        let left = cache
            .apply(&dispatch(
                "GUILD_MEMBER_REMOVE",
                json!({ "guild_id": "G", "user": { "id": "U" } }),
            ))
            .unwrap();
        assert!(matches!(
            left,
            TypedEvent::GuildMemberRemove { guild: Guild { member_count: Some(41), .. }, .. }
        ));
    }

    #[test]
    fn test_unknown_guild_has_no_count() {
        let mut cache = GuildCache::new();
        let event = cache
            .apply(&dispatch(
                "GUILD_MEMBER_ADD",
                json!({ "guild_id": "X", "user": { "id": "U" } }),
            ))
            .unwrap();
        assert!(matches!(
            event,
            TypedEvent::GuildMemberAdd { guild: Guild { member_count: None, .. }, .. }
        ));
    }

    #[test]
    fn test_guild_delete_evicts() {
        let mut cache = GuildCache::new();
        cache.apply(&dispatch("GUILD_CREATE", json!({ "id": "G", "member_count": 3 })));
        cache.apply(&dispatch("GUILD_DELETE", json!({ "id": "G", "unavailable": true })));
        assert_eq!(cache.member_count("G"), None);
    }

    #[test]
    fn test_message_without_guild_is_direct_message() {
        let mut cache = GuildCache::new();
        let event = cache
            .apply(&dispatch(
                "MESSAGE_CREATE",
                json!({ "id": "M", "channel_id": "C", "author": { "id": "U" } }),
            ))
            .unwrap();
        let TypedEvent::MessageCreate(message) = event else {
            panic!("expected messageCreate");
        };
        assert!(message.channel.guild.is_none());
        assert_eq!(message.channel.id, "C");
        assert_eq!(message.author.id, "U");
    }

    #[test]
    fn test_empty_guild_id_is_direct_message() {
        let mut cache = GuildCache::new();
        let event = cache
            .apply(&dispatch(
                "MESSAGE_CREATE",
                json!({ "id": "M", "guild_id": "", "channel_id": "C", "author": { "id": "U" } }),
            ))
            .unwrap();
        let TypedEvent::MessageCreate(message) = event else {
            panic!("expected messageCreate");
        };
        assert!(message.channel.guild.is_none());
    }

    #[test]
    fn test_other_dispatches_are_named_and_non_dispatch_ignored() {
        let mut cache = GuildCache::new();
        assert_eq!(
            cache.apply(&dispatch("TYPING_START", json!({}))),
            Some(TypedEvent::Other("TYPING_START".to_string()))
        );
        assert_eq!(cache.apply(&GatewayPacket::new(11, Value::Null)), None);
    }
}
