//! Wire types for the realtime channel

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChannelResult;
use crate::utils::iso_timestamp;

/// A JSON frame pushed by the realtime hub
///
/// `type` selects the dispatch action, `data` carries the affected record and
/// `timestamp` is the ISO-8601 time the hub stamped on the event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RealtimeMessage {
    #[serde(rename = "type")]
    pub msg_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl RealtimeMessage {
    /// Build a message stamped with the current time
    pub fn new(msg_type: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            msg_type: msg_type.into(),
            data,
            timestamp: Some(iso_timestamp()),
        }
    }

    /// Greeting sent by the hub right after the upgrade
    pub fn connection() -> Self {
        Self::new(
            "connection",
            Some(serde_json::json!({ "message": "connected" })),
        )
    }

    /// Keep-alive acknowledgment
    pub fn pong() -> Self {
        Self::new("pong", None)
    }

    /// Parse a text frame. Fails on non-JSON input or a missing `type`.
    pub fn parse(text: &str) -> ChannelResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn kind(&self) -> MessageKind {
        MessageKind::parse(&self.msg_type)
    }

    /// Read a field of `data` as text. Numbers are rendered, empty strings skipped.
    pub fn data_field(&self, field: &str) -> Option<String> {
        match self.data.as_ref()?.get(field)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Frames a client sends to the hub
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keep-alive, answered with `pong`
    Ping,
}

/// Business entities the dashboard manages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Client,
    Sale,
    SaleItem,
    Service,
    PaymentMethod,
    ExpenseCategory,
    Expense,
    Ticket,
    QuickLink,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Client,
        EntityKind::Sale,
        EntityKind::SaleItem,
        EntityKind::Service,
        EntityKind::PaymentMethod,
        EntityKind::ExpenseCategory,
        EntityKind::Expense,
        EntityKind::Ticket,
        EntityKind::QuickLink,
    ];

    /// Prefix used in the message `type`
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Client => "client",
            EntityKind::Sale => "sale",
            EntityKind::SaleItem => "sale_item",
            EntityKind::Service => "service",
            EntityKind::PaymentMethod => "payment_method",
            EntityKind::ExpenseCategory => "expense_category",
            EntityKind::Expense => "expense",
            EntityKind::Ticket => "ticket",
            EntityKind::QuickLink => "quick_link",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

/// What happened to the record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MutationAction {
    Created,
    Updated,
    Deleted,
}

impl MutationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationAction::Created => "created",
            MutationAction::Updated => "updated",
            MutationAction::Deleted => "deleted",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "created" => Some(MutationAction::Created),
            "updated" => Some(MutationAction::Updated),
            "deleted" => Some(MutationAction::Deleted),
            _ => None,
        }
    }
}

/// Split `<entity>_<action>` into its parts without checking the entity.
pub fn split_mutation_type(msg_type: &str) -> Option<(&str, MutationAction)> {
    let (entity, action) = msg_type.rsplit_once('_')?;
    if entity.is_empty() {
        return None;
    }
    Some((entity, MutationAction::from_name(action)?))
}

/// Parsed form of a message `type`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Connection,
    Ping,
    Pong,
    Mutation {
        entity: EntityKind,
        action: MutationAction,
    },
    Unknown(String),
}

impl MessageKind {
    pub fn parse(msg_type: &str) -> Self {
        match msg_type {
            "connection" => return MessageKind::Connection,
            "ping" => return MessageKind::Ping,
            "pong" => return MessageKind::Pong,
            _ => {}
        }

        split_mutation_type(msg_type)
            .and_then(|(entity, action)| {
                EntityKind::from_name(entity).map(|entity| MessageKind::Mutation { entity, action })
            })
            .unwrap_or_else(|| MessageKind::Unknown(msg_type.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mutation_event() {
        let msg = RealtimeMessage::parse(
            r#"{"type":"client_created","data":{"name":"Acme"},"timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(
            msg.kind(),
            MessageKind::Mutation {
                entity: EntityKind::Client,
                action: MutationAction::Created
            }
        );
        assert_eq!(msg.data_field("name").as_deref(), Some("Acme"));
        assert_eq!(msg.timestamp.as_deref(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_multi_word_entities() {
        assert_eq!(
            MessageKind::parse("sale_item_deleted"),
            MessageKind::Mutation {
                entity: EntityKind::SaleItem,
                action: MutationAction::Deleted
            }
        );
        assert_eq!(
            MessageKind::parse("expense_category_updated"),
            MessageKind::Mutation {
                entity: EntityKind::ExpenseCategory,
                action: MutationAction::Updated
            }
        );
    }

    #[test]
    fn test_unknown_types() {
        assert_eq!(
            MessageKind::parse("invoice_created"),
            MessageKind::Unknown("invoice_created".to_string())
        );
        assert_eq!(
            MessageKind::parse("client_archived"),
            MessageKind::Unknown("client_archived".to_string())
        );
        assert!(split_mutation_type("_created").is_none());
        assert!(split_mutation_type("created").is_none());
    }

    #[test]
    fn test_malformed_payloads_are_errors() {
        assert!(RealtimeMessage::parse("not json").is_err());
        assert!(RealtimeMessage::parse(r#"{"data":{}}"#).is_err());
        assert!(RealtimeMessage::parse(r#"{"type":42}"#).is_err());
        assert!(RealtimeMessage::parse("[]").is_err());
    }

    #[test]
    fn test_ping_serialization() {
        let json = serde_json::to_string(&ClientMessage::Ping).unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);
    }

    #[test]
    fn test_pong_has_no_data() {
        let json = serde_json::to_string(&RealtimeMessage::pong()).unwrap();
        assert!(json.contains(r#""type":"pong""#));
        assert!(!json.contains("data"));
    }

    #[test]
    fn test_data_field_renders_numbers() {
        let msg = RealtimeMessage::new("sale_item_created", Some(serde_json::json!({"sale_id": 17, "name": " "})));
        assert_eq!(msg.data_field("sale_id").as_deref(), Some("17"));
        assert_eq!(msg.data_field("name"), None);
        assert_eq!(msg.data_field("missing"), None);
    }
}
