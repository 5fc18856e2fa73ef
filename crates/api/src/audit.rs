//! Append-only audit ledger
//!
//! One entry per mutating operation. Writes never fail the triggering
//! mutation: the primary state change has already committed by the time the
//! entry is appended, so failures are logged and swallowed.

use deskhub_shared::{AuditEntry, CoreError, TicketId};
use sqlx::PgPool;
use uuid::Uuid;

/// Audit action names
///
/// Constants instead of magic strings so the ledger stays greppable and
/// consistent across call sites.
pub mod action {
    pub const TICKET_CREATE: &str = "ticket_create";
    pub const TICKET_CLAIM: &str = "ticket_claim";
    pub const TICKET_CLOSE: &str = "ticket_close";
    pub const TICKET_REOPEN: &str = "ticket_reopen";
    pub const TICKET_UPDATE: &str = "ticket_update";
    pub const TICKET_ESCALATE: &str = "ticket_escalate";
    pub const TICKET_AUTO_ESCALATE: &str = "ticket_auto_escalate";
}

/// Actor name recorded for monitor-driven transitions
pub const SLA_MONITOR_ACTOR: &str = "sla-monitor";

/// Handle to the audit ledger
#[derive(Clone)]
pub struct AuditLog {
    pool: PgPool,
}

impl AuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one immutable entry
    ///
    /// There is no update or delete counterpart. Insert failures are reported
    /// via tracing and do not propagate.
    pub async fn record(
        &self,
        action: &str,
        actor: &str,
        target_ticket: Option<TicketId>,
        details: &str,
    ) {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_log (id, action, actor, target_ticket, details)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(action)
        .bind(actor)
        .bind(target_ticket)
        .bind(details)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(
                action = %action,
                actor = %actor,
                error = %e,
                "Failed to append audit entry"
            );
        }
    }

    /// Paginated read-back, newest first
    pub async fn list(&self, page: i64, limit: i64) -> Result<(Vec<AuditEntry>, i64), CoreError> {
        let offset = (page - 1) * limit;

        let entries: Vec<AuditEntry> = sqlx::query_as(
            r#"
            SELECT id, action, actor, target_ticket, details, created_at
            FROM audit_log
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_log")
            .fetch_one(&self.pool)
            .await?;

        Ok((entries, total.0))
    }
}
