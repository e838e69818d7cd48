//! Event translation
//!
//! Maps gateway events onto `events` and `members` points. Only message
//! creation and member join/leave are recognized; everything else yields no
//! points. Identifiers are copied verbatim from the payload.

use crate::constants::{
    DISPATCH_GUILD_MEMBER_ADD, DISPATCH_GUILD_MEMBER_REMOVE, DISPATCH_MESSAGE_CREATE,
    EVENTS_MEASUREMENT, FIELD_COUNT, FIELD_MEMBER_COUNT, MEMBERS_MEASUREMENT, TAG_CHANNEL_ID,
    TAG_EVENT_TYPE, TAG_GUILD_ID, TAG_USER_ID,
};
use crate::domain::MetricPoint;
use crate::error::{RelayError, Result};
use crate::events::{GatewayPacket, Guild, Member, Message, RawEvent, TypedEvent};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Use case for turning gateway events into metric points
#[derive(Debug, Default, Clone, Copy)]
pub struct TranslateUseCase;

impl TranslateUseCase {
    pub fn new() -> Self {
        Self
    }

    /// Translate one event, stamping points with the current time.
    ///
    /// `Ok(vec![])` means the event is not one we count. `Err(MalformedPayload)`
    /// means it was recognized but lacked an identifier; no partial point is
    /// ever produced.
    pub fn translate(&self, event: &RawEvent) -> Result<Vec<MetricPoint>> {
        self.translate_at(event, Utc::now())
    }

    pub fn translate_at(&self, event: &RawEvent, now: DateTime<Utc>) -> Result<Vec<MetricPoint>> {
        let points = match event {
            RawEvent::Typed(typed) => translate_typed(typed)?,
            RawEvent::Packet(packet) => translate_packet(packet)?,
        };
        Ok(points.into_iter().map(|p| p.at(now)).collect())
    }
}

fn translate_typed(event: &TypedEvent) -> Result<Vec<MetricPoint>> {
    match event {
        TypedEvent::MessageCreate(message) => message_points(event.name(), message),
        TypedEvent::GuildMemberAdd { guild, member }
        | TypedEvent::GuildMemberRemove { guild, member } => {
            membership_points(event.name(), guild, member)
        }
        TypedEvent::Debug(_) | TypedEvent::Other(_) => Ok(Vec::new()),
    }
}

fn message_points(event_type: &str, message: &Message) -> Result<Vec<MetricPoint>> {
    // Direct messages have no guild and are not counted
    let Some(guild) = &message.channel.guild else {
        return Ok(Vec::new());
    };
    let guild_id = non_empty(event_type, &guild.id, "guild.id")?;
    let channel_id = non_empty(event_type, &message.channel.id, "channel.id")?;
    let user_id = non_empty(event_type, &message.author.id, "author.id")?;
    Ok(vec![event_point(event_type)
        .tag(TAG_GUILD_ID, guild_id)
        .tag(TAG_CHANNEL_ID, channel_id)
        .tag(TAG_USER_ID, user_id)])
}

fn membership_points(event_type: &str, guild: &Guild, member: &Member) -> Result<Vec<MetricPoint>> {
    let guild_id = non_empty(event_type, &guild.id, "guild.id")?;
    let user_id = non_empty(event_type, &member.id, "member.id")?;
    let mut points = vec![event_point(event_type)
        .tag(TAG_GUILD_ID, guild_id)
        .tag(TAG_USER_ID, user_id)];
    if let Some(count) = guild.member_count {
        points.push(members_point(guild_id, count));
    }
    Ok(points)
}

fn translate_packet(packet: &GatewayPacket) -> Result<Vec<MetricPoint>> {
    if !packet.is_dispatch() {
        return Ok(Vec::new());
    }
    let Some(name) = packet.t.as_deref() else {
        return Ok(Vec::new());
    };
    let d = &packet.d;

    match name {
        DISPATCH_MESSAGE_CREATE => {
            // Direct messages have no guild_id
            let Some(guild_id) = str_at(d, &["guild_id"]) else {
                return Ok(Vec::new());
            };
            let channel_id = require(name, d, &["channel_id"], "channel_id")?;
            let user_id = require(name, d, &["author", "id"], "author.id")?;
            Ok(vec![event_point(name)
                .tag(TAG_GUILD_ID, guild_id)
                .tag(TAG_CHANNEL_ID, channel_id)
                .tag(TAG_USER_ID, user_id)])
        }
        DISPATCH_GUILD_MEMBER_ADD | DISPATCH_GUILD_MEMBER_REMOVE => {
            let guild_id = require(name, d, &["guild_id"], "guild_id")?;
            let user_id = require(name, d, &["user", "id"], "user.id")?;
            // Raw packets carry no member count, so no `members` point here
            Ok(vec![event_point(name)
                .tag(TAG_GUILD_ID, guild_id)
                .tag(TAG_USER_ID, user_id)])
        }
        _ => Ok(Vec::new()),
    }
}

fn event_point(event_type: &str) -> MetricPoint {
    MetricPoint::new(EVENTS_MEASUREMENT)
        .tag(TAG_EVENT_TYPE, event_type)
        .field(FIELD_COUNT, 1i64)
}

fn members_point(guild_id: &str, count: u64) -> MetricPoint {
    MetricPoint::new(MEMBERS_MEASUREMENT)
        .tag(TAG_GUILD_ID, guild_id)
        .field(FIELD_MEMBER_COUNT, i64::try_from(count).unwrap_or(i64::MAX))
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn non_empty<'a>(event_type: &str, id: &'a str, missing: &'static str) -> Result<&'a str> {
    if id.is_empty() {
        return Err(RelayError::MalformedPayload {
            event_type: event_type.to_string(),
            missing,
        });
    }
    Ok(id)
}

fn require<'a>(
    event_type: &str,
    value: &'a Value,
    path: &[&str],
    missing: &'static str,
) -> Result<&'a str> {
    str_at(value, path).ok_or_else(|| RelayError::MalformedPayload {
        event_type: event_type.to_string(),
        missing,
    })
}
