//! Domain event types and serialization

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Kind of a state-change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TicketOpen,
    TicketClaim,
    TicketClose,
    TicketReopen,
    NotesUpdate,
    Escalation,
    Heartbeat,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TicketOpen => "ticket_open",
            Self::TicketClaim => "ticket_claim",
            Self::TicketClose => "ticket_close",
            Self::TicketReopen => "ticket_reopen",
            Self::NotesUpdate => "notes_update",
            Self::Escalation => "escalation",
            Self::Heartbeat => "heartbeat",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of a state change, used for live notification and replay
///
/// `seq` increases monotonically per published event; clients use it to
/// detect gaps after a reconnect and to de-duplicate replayed history
/// against the live stream.
#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    pub seq: u64,
    pub id: Uuid,
    pub event_type: EventKind,
    pub payload: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&EventKind::TicketClaim).unwrap(),
            r#""ticket_claim""#
        );
        assert_eq!(EventKind::Heartbeat.as_str(), "heartbeat");
    }

    #[test]
    fn test_domain_event_serialization() {
        let event = DomainEvent {
            seq: 7,
            id: Uuid::new_v4(),
            event_type: EventKind::TicketOpen,
            payload: serde_json::json!({ "subject": "Bot not responding" }),
            timestamp: OffsetDateTime::now_utc(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""seq":7"#));
        assert!(json.contains("ticket_open"));
        assert!(json.contains("Bot not responding"));
    }
}
