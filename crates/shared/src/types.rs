//! Common types used across Deskhub

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// ID Wrappers
// =============================================================================

/// Ticket ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct TicketId(pub Uuid);

impl TicketId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TicketId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Ticket lifecycle status
///
/// Transitions: open -> claimed -> closed, claimed -> escalated,
/// open -> escalated, closed -> open (reopen). Closure is a status, not
/// removal, so there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Claimed,
    Escalated,
    Closed,
}

impl Default for TicketStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl TicketStatus {
    /// Whether the ticket still counts as live work (anything but closed)
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Closed)
    }

    /// Whether a claim attempt is legal from this status
    ///
    /// Claimed and escalated tickets already have an owner.
    pub fn accepts_claim(&self) -> bool {
        !matches!(self, Self::Claimed | Self::Escalated)
    }

    /// Parse a status from string, falling back to `Open` for unrecognized
    /// values (boundary normalization, not an error)
    pub fn from_str_lossy(s: &str) -> Self {
        s.parse().unwrap_or(Self::Open)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Claimed => write!(f, "claimed"),
            Self::Escalated => write!(f, "escalated"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "claimed" => Ok(Self::Claimed),
            "escalated" => Ok(Self::Escalated),
            "closed" => Ok(Self::Closed),
            _ => Err(format!("Invalid ticket status: {}", s)),
        }
    }
}

/// Ticket priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for TicketPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl TicketPriority {
    /// Parse a priority from string, normalizing unrecognized values to
    /// `Medium` instead of failing
    pub fn from_str_lossy(s: &str) -> Self {
        s.parse().unwrap_or(Self::Medium)
    }
}

impl std::fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for TicketPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Invalid ticket priority: {}", s)),
        }
    }
}

/// Ticket kind as reported by the producing channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    General,
    Technical,
    Billing,
    BugReport,
    FeatureRequest,
}

impl Default for TicketKind {
    fn default() -> Self {
        Self::General
    }
}

impl TicketKind {
    /// Parse a kind from string, normalizing unrecognized values to `General`
    pub fn from_str_lossy(s: &str) -> Self {
        s.parse().unwrap_or(Self::General)
    }
}

impl std::fmt::Display for TicketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::General => write!(f, "general"),
            Self::Technical => write!(f, "technical"),
            Self::Billing => write!(f, "billing"),
            Self::BugReport => write!(f, "bug_report"),
            Self::FeatureRequest => write!(f, "feature_request"),
        }
    }
}

impl std::str::FromStr for TicketKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "general" => Ok(Self::General),
            "technical" => Ok(Self::Technical),
            "billing" => Ok(Self::Billing),
            "bug_report" => Ok(Self::BugReport),
            "feature_request" => Ok(Self::FeatureRequest),
            _ => Err(format!("Invalid ticket kind: {}", s)),
        }
    }
}

// =============================================================================
// Database Models
// =============================================================================

/// Support ticket model
///
/// Mutated only through the lifecycle operations; never physically deleted.
/// Timestamps are monotonic: `created_at <= claimed_at <= first_response_at`,
/// and `closed_at` is only set while the status is closed.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Ticket {
    pub id: TicketId,
    /// Channel the ticket was opened from (producing collaborator's scope)
    pub channel_id: String,
    /// Origin community/server identifier
    pub origin_id: String,
    pub requester_id: String,
    pub requester_name: String,
    pub subject: String,
    pub kind: TicketKind,
    pub lang: String,
    pub priority: TicketPriority,
    pub description: String,
    pub status: TicketStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub claimed_by: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub claimed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub first_response_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub closed_at: Option<OffsetDateTime>,
    pub closed_by: Option<String>,
    pub notes: String,
    pub escalation_flag: bool,
    /// Derived and cached by the SLA monitor; never asserted by callers
    pub sla_breached: bool,
}

/// Audit ledger entry: who performed what mutating action and when
///
/// Append-only; entries are never updated or deleted.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditEntry {
    pub id: Uuid,
    pub action: String,
    pub actor: String,
    pub target_ticket: Option<TicketId>,
    pub details: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// =============================================================================
// API Response Types
// =============================================================================

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = (total + per_page - 1) / per_page;
        Self {
            data,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // =========================================================================
    // TicketStatus Tests
    // =========================================================================

    #[test]
    fn test_status_default() {
        assert_eq!(TicketStatus::default(), TicketStatus::Open);
    }

    #[test]
    fn test_status_is_active() {
        assert!(TicketStatus::Open.is_active());
        assert!(TicketStatus::Claimed.is_active());
        assert!(TicketStatus::Escalated.is_active());
        assert!(!TicketStatus::Closed.is_active());
    }

    #[test]
    fn test_status_accepts_claim() {
        assert!(TicketStatus::Open.accepts_claim());
        assert!(TicketStatus::Closed.accepts_claim());
        assert!(!TicketStatus::Claimed.accepts_claim());
        assert!(!TicketStatus::Escalated.accepts_claim());
    }

    #[test]
    fn test_status_display_and_parse() {
        assert_eq!(format!("{}", TicketStatus::Escalated), "escalated");
        assert_eq!(
            "CLOSED".parse::<TicketStatus>().unwrap(),
            TicketStatus::Closed
        );
        assert!("resolved".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn test_status_from_str_lossy() {
        assert_eq!(
            TicketStatus::from_str_lossy("claimed"),
            TicketStatus::Claimed
        );
        assert_eq!(TicketStatus::from_str_lossy("garbage"), TicketStatus::Open);
    }

    // =========================================================================
    // TicketPriority Tests
    // =========================================================================

    #[test]
    fn test_priority_default() {
        assert_eq!(TicketPriority::default(), TicketPriority::Medium);
    }

    #[test]
    fn test_priority_display_and_parse() {
        assert_eq!(format!("{}", TicketPriority::Critical), "critical");
        assert_eq!(
            "HIGH".parse::<TicketPriority>().unwrap(),
            TicketPriority::High
        );
        assert!("urgent".parse::<TicketPriority>().is_err());
    }

    #[test]
    fn test_priority_from_str_lossy_normalizes() {
        assert_eq!(TicketPriority::from_str_lossy("low"), TicketPriority::Low);
        // Unrecognized values normalize to the safe default instead of failing
        assert_eq!(
            TicketPriority::from_str_lossy("urgent"),
            TicketPriority::Medium
        );
        assert_eq!(TicketPriority::from_str_lossy(""), TicketPriority::Medium);
    }

    // =========================================================================
    // TicketKind Tests
    // =========================================================================

    #[test]
    fn test_kind_display_and_parse() {
        assert_eq!(format!("{}", TicketKind::BugReport), "bug_report");
        assert_eq!(
            "feature_request".parse::<TicketKind>().unwrap(),
            TicketKind::FeatureRequest
        );
        assert_eq!(TicketKind::from_str_lossy("spam"), TicketKind::General);
    }

    // =========================================================================
    // PaginatedResponse Tests
    // =========================================================================

    #[test]
    fn test_paginated_response() {
        let data = vec![1, 2, 3, 4, 5];
        let response = PaginatedResponse::new(data, 100, 1, 10);

        assert_eq!(response.total, 100);
        assert_eq!(response.page, 1);
        assert_eq!(response.per_page, 10);
        assert_eq!(response.total_pages, 10);
    }

    #[test]
    fn test_paginated_response_partial_page() {
        let data = vec![1, 2, 3];
        let response = PaginatedResponse::new(data, 23, 3, 10);

        // 23 items / 10 per page = 3 pages (2 full + 1 partial)
        assert_eq!(response.total_pages, 3);
    }

    // =========================================================================
    // ID Wrapper Tests
    // =========================================================================

    #[test]
    fn test_ticket_id_new() {
        let id1 = TicketId::new();
        let id2 = TicketId::new();
        assert_ne!(id1, id2); // Each new ID should be unique
    }

    #[test]
    fn test_ticket_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let ticket_id: TicketId = uuid.into();
        assert_eq!(ticket_id.0, uuid);
    }
}
