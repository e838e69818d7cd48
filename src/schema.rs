//! Metric schema registry
//!
//! Declares the fixed set of measurements the relay writes, their field types
//! and their tag dimensions. Every point is checked against it before dispatch.

use crate::constants::{
    EVENTS_MEASUREMENT, FIELD_COUNT, FIELD_MEMBER_COUNT, MEMBERS_MEASUREMENT, TAG_CHANNEL_ID,
    TAG_EVENT_TYPE, TAG_GUILD_ID, TAG_USER_ID,
};
use crate::domain::{FieldValue, MetricPoint};
use crate::error::{RelayError, Result};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Float,
}

impl FieldType {
    fn accepts(self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (FieldType::Integer, FieldValue::Integer(_)) | (FieldType::Float, FieldValue::Float(_))
        )
    }
}

#[derive(Debug, Clone)]
pub struct SchemaEntry {
    pub measurement: &'static str,
    pub fields: BTreeMap<&'static str, FieldType>,
    pub tag_keys: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    entries: Vec<SchemaEntry>,
}

static BOT_SCHEMA: Lazy<SchemaRegistry> = Lazy::new(|| {
    SchemaRegistry::new(vec![
        SchemaEntry {
            measurement: MEMBERS_MEASUREMENT,
            fields: BTreeMap::from([(FIELD_MEMBER_COUNT, FieldType::Integer)]),
            tag_keys: vec![TAG_GUILD_ID],
        },
        SchemaEntry {
            measurement: EVENTS_MEASUREMENT,
            fields: BTreeMap::from([(FIELD_COUNT, FieldType::Integer)]),
            tag_keys: vec![TAG_EVENT_TYPE, TAG_CHANNEL_ID, TAG_GUILD_ID, TAG_USER_ID],
        },
    ])
});

impl SchemaRegistry {
    pub fn new(entries: Vec<SchemaEntry>) -> Self {
        Self { entries }
    }

    /// The `members` and `events` measurements written by the relay
    pub fn bot() -> &'static SchemaRegistry {
        &BOT_SCHEMA
    }

    pub fn lookup(&self, measurement: &str) -> Result<&SchemaEntry> {
        self.entries
            .iter()
            .find(|e| e.measurement == measurement)
            .ok_or_else(|| RelayError::UnknownMeasurement(measurement.to_string()))
    }

    /// Check a point against its schema entry.
    ///
    /// Fields must match the declared set exactly, by name and type. Tags may
    /// only use declared keys; undeclared dimensions are simply absent.
    pub fn validate(&self, point: &MetricPoint) -> Result<()> {
        let entry = self.lookup(&point.measurement)?;
        let violation = |reason: String| RelayError::SchemaViolation {
            measurement: point.measurement.clone(),
            reason,
        };

        for (name, value) in &point.fields {
            match entry.fields.get(name.as_str()) {
                None => return Err(violation(format!("unknown field '{}'", name))),
                Some(ty) if !ty.accepts(value) => {
                    return Err(violation(format!(
                        "field '{}' expects {:?}, got {:?}",
                        name, ty, value
                    )))
                }
                Some(_) => {}
            }
        }
        if let Some(missing) = entry
            .fields
            .keys()
            .find(|name| !point.fields.contains_key(**name))
        {
            return Err(violation(format!("missing field '{}'", missing)));
        }

        if let Some(tag) = point
            .tags
            .keys()
            .find(|key| !entry.tag_keys.iter().any(|k| *k == key.as_str()))
        {
            return Err(violation(format!("undeclared tag '{}'", tag)));
        }

        Ok(())
    }
}
