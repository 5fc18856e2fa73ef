//! Ticket lifecycle operations
//!
//! Every mutation here is a single conditional UPDATE against the repository
//! (not read-then-write), so concurrent callers racing on the same ticket are
//! serialized by the database: exactly one wins, the rest observe the
//! precondition failure. On success each operation appends one audit entry
//! and publishes one domain event; failed operations write neither.

use deskhub_shared::{CoreError, Ticket, TicketId, TicketKind, TicketPriority, TicketStatus};
use serde::Deserialize;
use serde_json::json;

use crate::audit::action;
use crate::events::EventKind;
use crate::state::AppState;

const MAX_SUBJECT_LENGTH: usize = 500;
const MAX_DESCRIPTION_LENGTH: usize = 50_000;

// =============================================================================
// Request Types
// =============================================================================

/// Producer payload for ticket ingestion
#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub channel_id: String,
    pub origin_id: String,
    pub requester_id: String,
    pub requester_name: String,
    pub subject: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub description: String,
}

fn default_lang() -> String {
    "de".to_string()
}

/// Manual field patch for administrative overrides
#[derive(Debug, Deserialize)]
pub struct TicketPatch {
    pub notes: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
}

impl TicketPatch {
    pub fn is_empty(&self) -> bool {
        self.notes.is_none() && self.priority.is_none() && self.status.is_none()
    }
}

// =============================================================================
// Reads
// =============================================================================

/// Fetch a single ticket
pub async fn get(state: &AppState, ticket_id: TicketId) -> Result<Ticket, CoreError> {
    let ticket: Option<Ticket> = sqlx::query_as("SELECT * FROM tickets WHERE id = $1")
        .bind(ticket_id)
        .fetch_optional(&state.pool)
        .await?;

    ticket.ok_or(CoreError::NotFound)
}

async fn exists(state: &AppState, ticket_id: TicketId) -> Result<bool, CoreError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tickets WHERE id = $1)")
        .bind(ticket_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(exists)
}

// =============================================================================
// Lifecycle Operations
// =============================================================================

/// Ingest a new ticket in `open` status
pub async fn create(
    state: &AppState,
    actor: &str,
    req: CreateTicketRequest,
) -> Result<Ticket, CoreError> {
    if req.subject.trim().is_empty() {
        return Err(CoreError::Validation("Subject cannot be empty".into()));
    }
    if req.subject.len() > MAX_SUBJECT_LENGTH {
        return Err(CoreError::Validation(format!(
            "Subject too long (max {} characters)",
            MAX_SUBJECT_LENGTH
        )));
    }
    if req.description.len() > MAX_DESCRIPTION_LENGTH {
        return Err(CoreError::Validation(format!(
            "Description too long (max {} characters)",
            MAX_DESCRIPTION_LENGTH
        )));
    }

    // Unrecognized priority/kind values normalize to their defaults at the
    // boundary instead of rejecting the ticket.
    let priority = req
        .priority
        .as_deref()
        .map(TicketPriority::from_str_lossy)
        .unwrap_or_default();
    let kind = req
        .kind
        .as_deref()
        .map(TicketKind::from_str_lossy)
        .unwrap_or_default();

    let ticket: Ticket = sqlx::query_as(
        r#"
        INSERT INTO tickets (id, channel_id, origin_id, requester_id, requester_name,
                             subject, kind, lang, priority, description)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(TicketId::new())
    .bind(&req.channel_id)
    .bind(&req.origin_id)
    .bind(&req.requester_id)
    .bind(&req.requester_name)
    .bind(req.subject.trim())
    .bind(kind)
    .bind(&req.lang)
    .bind(priority)
    .bind(&req.description)
    .fetch_one(&state.pool)
    .await?;

    state
        .audit
        .record(
            action::TICKET_CREATE,
            actor,
            Some(ticket.id),
            &format!("Subject: {}", ticket.subject),
        )
        .await;

    state
        .events
        .publish(
            EventKind::TicketOpen,
            json!({
                "ticket_id": ticket.id,
                "requester": ticket.requester_name,
                "subject": ticket.subject,
                "priority": ticket.priority,
            }),
        )
        .await;

    tracing::info!(ticket_id = %ticket.id, subject = %ticket.subject, "Ticket created");

    Ok(ticket)
}

/// Claim a ticket for exclusive handling
///
/// The WHERE clause is the whole concurrency story: under concurrent callers
/// exactly one UPDATE matches, the losers get zero rows back and observe
/// `AlreadyClaimed`. `first_response_at` is stamped only on the first claim.
pub async fn claim(state: &AppState, ticket_id: TicketId, actor: &str) -> Result<Ticket, CoreError> {
    let updated: Option<Ticket> = sqlx::query_as(
        r#"
        UPDATE tickets
        SET claimed_by = $2,
            claimed_at = NOW(),
            status = 'claimed',
            first_response_at = COALESCE(first_response_at, NOW())
        WHERE id = $1
          AND claimed_by IS NULL
          AND status NOT IN ('claimed', 'escalated')
        RETURNING *
        "#,
    )
    .bind(ticket_id)
    .bind(actor)
    .fetch_optional(&state.pool)
    .await?;

    let ticket = match updated {
        Some(ticket) => ticket,
        None => {
            if exists(state, ticket_id).await? {
                return Err(CoreError::AlreadyClaimed);
            }
            return Err(CoreError::NotFound);
        }
    };

    state
        .audit
        .record(action::TICKET_CLAIM, actor, Some(ticket_id), "")
        .await;

    state
        .events
        .publish(
            EventKind::TicketClaim,
            json!({
                "ticket_id": ticket.id,
                "claimed_by": actor,
                "subject": ticket.subject,
            }),
        )
        .await;

    tracing::info!(ticket_id = %ticket_id, claimed_by = %actor, "Ticket claimed");

    Ok(ticket)
}

/// Close a ticket from any non-closed status
///
/// Re-closing an already-closed ticket is a no-op success: the stored ticket
/// is returned unchanged and nothing is audited or published.
pub async fn close(state: &AppState, ticket_id: TicketId, actor: &str) -> Result<Ticket, CoreError> {
    let updated: Option<Ticket> = sqlx::query_as(
        r#"
        UPDATE tickets
        SET status = 'closed', closed_at = NOW(), closed_by = $2
        WHERE id = $1 AND status <> 'closed'
        RETURNING *
        "#,
    )
    .bind(ticket_id)
    .bind(actor)
    .fetch_optional(&state.pool)
    .await?;

    let ticket = match updated {
        Some(ticket) => ticket,
        // Zero rows + existing ticket means it was already closed
        None => return get(state, ticket_id).await,
    };

    state
        .audit
        .record(action::TICKET_CLOSE, actor, Some(ticket_id), "")
        .await;

    state
        .events
        .publish(
            EventKind::TicketClose,
            json!({
                "ticket_id": ticket.id,
                "closed_by": actor,
                "subject": ticket.subject,
            }),
        )
        .await;

    tracing::info!(ticket_id = %ticket_id, closed_by = %actor, "Ticket closed");

    Ok(ticket)
}

/// Reopen a closed ticket
///
/// Clears the closure fields and the claim so the reopened ticket is plain
/// `open` again; `first_response_at` is a response-latency fact and stays.
pub async fn reopen(
    state: &AppState,
    ticket_id: TicketId,
    actor: &str,
) -> Result<Ticket, CoreError> {
    let updated: Option<Ticket> = sqlx::query_as(
        r#"
        UPDATE tickets
        SET status = 'open',
            closed_at = NULL,
            closed_by = NULL,
            claimed_by = NULL,
            claimed_at = NULL
        WHERE id = $1 AND status = 'closed'
        RETURNING *
        "#,
    )
    .bind(ticket_id)
    .fetch_optional(&state.pool)
    .await?;

    let ticket = match updated {
        Some(ticket) => ticket,
        None => {
            if exists(state, ticket_id).await? {
                return Err(CoreError::InvalidTransition(
                    "Only closed tickets can be reopened".into(),
                ));
            }
            return Err(CoreError::NotFound);
        }
    };

    state
        .audit
        .record(action::TICKET_REOPEN, actor, Some(ticket_id), "")
        .await;

    state
        .events
        .publish(
            EventKind::TicketReopen,
            json!({
                "ticket_id": ticket.id,
                "reopened_by": actor,
                "subject": ticket.subject,
            }),
        )
        .await;

    tracing::info!(ticket_id = %ticket_id, reopened_by = %actor, "Ticket reopened");

    Ok(ticket)
}

/// Escalate a ticket: priority forced to critical, escalation flag set
pub async fn escalate(
    state: &AppState,
    ticket_id: TicketId,
    actor: &str,
) -> Result<Ticket, CoreError> {
    let updated: Option<Ticket> = sqlx::query_as(
        r#"
        UPDATE tickets
        SET status = 'escalated', escalation_flag = TRUE, priority = 'critical'
        WHERE id = $1 AND status <> 'closed'
        RETURNING *
        "#,
    )
    .bind(ticket_id)
    .fetch_optional(&state.pool)
    .await?;

    let ticket = match updated {
        Some(ticket) => ticket,
        None => {
            if exists(state, ticket_id).await? {
                return Err(CoreError::InvalidTransition(
                    "Closed tickets cannot be escalated".into(),
                ));
            }
            return Err(CoreError::NotFound);
        }
    };

    state
        .audit
        .record(action::TICKET_ESCALATE, actor, Some(ticket_id), "")
        .await;

    state
        .events
        .publish(
            EventKind::Escalation,
            json!({
                "ticket_id": ticket.id,
                "escalated_by": actor,
                "subject": ticket.subject,
            }),
        )
        .await;

    tracing::warn!(ticket_id = %ticket_id, escalated_by = %actor, "Ticket escalated");

    Ok(ticket)
}

/// Monitor-driven escalation, fired at most once per ticket
///
/// The `escalation_flag = FALSE` guard makes repeated sweep ticks a no-op
/// (`Ok(None)`): only the tick that flips the flag audits and publishes.
pub async fn auto_escalate(
    state: &AppState,
    ticket_id: TicketId,
    actor: &str,
) -> Result<Option<Ticket>, CoreError> {
    let updated: Option<Ticket> = sqlx::query_as(
        r#"
        UPDATE tickets
        SET status = 'escalated', escalation_flag = TRUE, priority = 'critical'
        WHERE id = $1 AND status <> 'closed' AND escalation_flag = FALSE
        RETURNING *
        "#,
    )
    .bind(ticket_id)
    .fetch_optional(&state.pool)
    .await?;

    let ticket = match updated {
        Some(ticket) => ticket,
        None => return Ok(None),
    };

    state
        .audit
        .record(
            action::TICKET_AUTO_ESCALATE,
            actor,
            Some(ticket_id),
            "Unclaimed past twice the first-response threshold",
        )
        .await;

    state
        .events
        .publish(
            EventKind::Escalation,
            json!({
                "ticket_id": ticket.id,
                "escalated_by": actor,
                "subject": ticket.subject,
            }),
        )
        .await;

    tracing::warn!(ticket_id = %ticket_id, "Ticket auto-escalated");

    Ok(Some(ticket))
}

/// Patch individual fields for manual overrides
///
/// Deliberate bypass: supplied fields land directly and are NOT routed
/// through the transition guards above. Unrecognized priority/status values
/// normalize to their defaults. Always audited; published only when the
/// notes changed (the only field dashboards are notified about).
pub async fn update_fields(
    state: &AppState,
    ticket_id: TicketId,
    actor: &str,
    patch: TicketPatch,
) -> Result<Ticket, CoreError> {
    if patch.is_empty() {
        return get(state, ticket_id).await;
    }

    let priority = patch.priority.as_deref().map(TicketPriority::from_str_lossy);
    let status = patch.status.as_deref().map(TicketStatus::from_str_lossy);

    let updated: Option<Ticket> = sqlx::query_as(
        r#"
        UPDATE tickets
        SET notes = COALESCE($2, notes),
            priority = COALESCE($3, priority),
            status = COALESCE($4, status)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(ticket_id)
    .bind(patch.notes.as_deref())
    .bind(priority)
    .bind(status)
    .fetch_optional(&state.pool)
    .await?;

    let ticket = updated.ok_or(CoreError::NotFound)?;

    let mut changed = serde_json::Map::new();
    if let Some(notes) = &patch.notes {
        changed.insert("notes".into(), json!(notes));
    }
    if let Some(priority) = priority {
        changed.insert("priority".into(), json!(priority));
    }
    if let Some(status) = status {
        changed.insert("status".into(), json!(status));
    }

    state
        .audit
        .record(
            action::TICKET_UPDATE,
            actor,
            Some(ticket_id),
            &serde_json::Value::Object(changed).to_string(),
        )
        .await;

    if patch.notes.is_some() {
        state
            .events
            .publish(
                EventKind::NotesUpdate,
                json!({
                    "ticket_id": ticket.id,
                    "actor": actor,
                }),
            )
            .await;
    }

    tracing::info!(ticket_id = %ticket_id, actor = %actor, "Ticket fields updated");

    Ok(ticket)
}

// =============================================================================
// Tests
// =============================================================================
