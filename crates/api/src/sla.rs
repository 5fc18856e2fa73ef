//! SLA derivation and the background sweep
//!
//! Breach state is derived from timestamps, never asserted by callers. The
//! sweep runs on a fixed interval decoupled from request handling, refreshes
//! the cached `sla_breached` flag, and auto-escalates tickets left unclaimed
//! past twice the first-response threshold. It reads ticket state and calls
//! the same conditional lifecycle operations as everyone else, so it holds no
//! lock that could block a claim or close.

use deskhub_shared::{CoreError, Ticket, TicketStatus};
use time::{Duration, OffsetDateTime};

use crate::audit::SLA_MONITOR_ACTOR;
use crate::config::Config;
use crate::state::AppState;
use crate::tickets;

/// Breach thresholds
#[derive(Debug, Clone, Copy)]
pub struct SlaPolicy {
    pub first_response: Duration,
    pub resolution: Duration,
}

impl SlaPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            first_response: Duration::minutes(config.sla_first_response_minutes),
            resolution: Duration::minutes(config.sla_resolution_minutes),
        }
    }
}

/// Derive the breach state of a ticket at `now`
///
/// Unclaimed tickets breach once their age exceeds the first-response
/// threshold; claimed-but-unresolved tickets breach once their total age
/// exceeds the resolution threshold. Closed tickets keep whatever flag they
/// ended with.
pub fn is_breached(ticket: &Ticket, now: OffsetDateTime, policy: &SlaPolicy) -> bool {
    if ticket.status == TicketStatus::Closed {
        return ticket.sla_breached;
    }
    match ticket.claimed_at {
        None => now - ticket.created_at > policy.first_response,
        Some(_) => ticket.closed_at.is_none() && now - ticket.created_at > policy.resolution,
    }
}

/// Whether the monitor should escalate this ticket on the current tick
///
/// The stored escalation flag keeps this to a single firing across sweeps.
pub fn needs_auto_escalation(ticket: &Ticket, now: OffsetDateTime, policy: &SlaPolicy) -> bool {
    ticket.status.is_active()
        && ticket.claimed_at.is_none()
        && !ticket.escalation_flag
        && now - ticket.created_at > policy.first_response * 2
}

/// Compliance percentage over a ticket set, rounded to one decimal
///
/// An empty set is 100% compliant by convention.
pub fn compliance_pct(total: i64, breached: i64) -> f64 {
    if total <= 0 {
        return 100.0;
    }
    let pct = (total - breached) as f64 / total as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

/// Outcome of one sweep tick
#[derive(Debug, Default)]
pub struct SweepOutcome {
    pub scanned: usize,
    pub refreshed: usize,
    pub escalated: usize,
}

/// Scan all open tickets, refresh breach flags, and fire auto-escalations
pub async fn sweep(state: &AppState) -> Result<SweepOutcome, CoreError> {
    let policy = SlaPolicy::from_config(&state.config);
    let now = OffsetDateTime::now_utc();

    let open_tickets: Vec<Ticket> = sqlx::query_as("SELECT * FROM tickets WHERE status <> 'closed'")
        .fetch_all(&state.pool)
        .await?;

    let mut outcome = SweepOutcome {
        scanned: open_tickets.len(),
        ..Default::default()
    };

    for ticket in open_tickets {
        let breached = is_breached(&ticket, now, &policy);
        if breached != ticket.sla_breached {
            sqlx::query("UPDATE tickets SET sla_breached = $2 WHERE id = $1")
                .bind(ticket.id)
                .bind(breached)
                .execute(&state.pool)
                .await?;
            outcome.refreshed += 1;
        }

        if needs_auto_escalation(&ticket, now, &policy)
            && tickets::auto_escalate(state, ticket.id, SLA_MONITOR_ACTOR)
                .await?
                .is_some()
        {
            outcome.escalated += 1;
        }
    }

    Ok(outcome)
}

/// Fixed-interval sweep loop, spawned at startup
pub async fn run_sweeper(state: AppState) {
    let interval_secs = state.config.sla_sweep_interval_secs;
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!(interval_secs, "SLA sweeper started");

    loop {
        interval.tick().await;
        match sweep(&state).await {
            Ok(outcome) => {
                if outcome.refreshed > 0 || outcome.escalated > 0 {
                    tracing::info!(
                        scanned = outcome.scanned,
                        refreshed = outcome.refreshed,
                        escalated = outcome.escalated,
                        "SLA sweep applied changes"
                    );
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "SLA sweep failed");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use deskhub_shared::{TicketId, TicketKind, TicketPriority};

    fn policy() -> SlaPolicy {
        SlaPolicy {
            first_response: Duration::minutes(60),
            resolution: Duration::minutes(1440),
        }
    }

    fn ticket(age_minutes: i64) -> Ticket {
        let now = OffsetDateTime::now_utc();
        Ticket {
            id: TicketId::new(),
            channel_id: "ticket-1001".to_string(),
            origin_id: "origin-1".to_string(),
            requester_id: "1".to_string(),
            requester_name: "UserAlpha".to_string(),
            subject: "Voice chat issues".to_string(),
            kind: TicketKind::General,
            lang: "de".to_string(),
            priority: TicketPriority::Medium,
            description: String::new(),
            status: TicketStatus::Open,
            created_at: now - Duration::minutes(age_minutes),
            claimed_by: None,
            claimed_at: None,
            first_response_at: None,
            closed_at: None,
            closed_by: None,
            notes: String::new(),
            escalation_flag: false,
            sla_breached: false,
        }
    }

    #[test]
    fn test_fresh_unclaimed_ticket_is_not_breached() {
        let t = ticket(10);
        assert!(!is_breached(&t, OffsetDateTime::now_utc(), &policy()));
    }

    #[test]
    fn test_unclaimed_past_first_response_threshold_is_breached() {
        let t = ticket(90);
        assert!(is_breached(&t, OffsetDateTime::now_utc(), &policy()));
    }

    #[test]
    fn test_claimed_ticket_uses_resolution_threshold() {
        let now = OffsetDateTime::now_utc();

        let mut t = ticket(90);
        t.status = TicketStatus::Claimed;
        t.claimed_by = Some("agent-A".to_string());
        t.claimed_at = Some(now - Duration::minutes(30));
        // 90 minutes old but claimed: first-response rule no longer applies
        assert!(!is_breached(&t, now, &policy()));

        let mut t = ticket(2000);
        t.status = TicketStatus::Claimed;
        t.claimed_by = Some("agent-A".to_string());
        t.claimed_at = Some(now - Duration::minutes(1990));
        assert!(is_breached(&t, now, &policy()));
    }

    #[test]
    fn test_closed_ticket_keeps_stored_flag() {
        let now = OffsetDateTime::now_utc();

        let mut t = ticket(5000);
        t.status = TicketStatus::Closed;
        t.closed_at = Some(now);
        assert!(!is_breached(&t, now, &policy()));

        t.sla_breached = true;
        assert!(is_breached(&t, now, &policy()));
    }

    #[test]
    fn test_auto_escalation_requires_double_threshold() {
        let now = OffsetDateTime::now_utc();

        // Past one threshold but not two: breached, not escalated
        let t = ticket(90);
        assert!(is_breached(&t, now, &policy()));
        assert!(!needs_auto_escalation(&t, now, &policy()));

        let t = ticket(150);
        assert!(needs_auto_escalation(&t, now, &policy()));
    }

    #[test]
    fn test_auto_escalation_skips_flagged_and_claimed_tickets() {
        let now = OffsetDateTime::now_utc();

        let mut t = ticket(150);
        t.escalation_flag = true;
        assert!(!needs_auto_escalation(&t, now, &policy()));

        let mut t = ticket(150);
        t.status = TicketStatus::Claimed;
        t.claimed_by = Some("agent-A".to_string());
        t.claimed_at = Some(now);
        assert!(!needs_auto_escalation(&t, now, &policy()));
    }

    #[test]
    fn test_compliance_pct() {
        assert_eq!(compliance_pct(0, 0), 100.0);
        assert_eq!(compliance_pct(10, 0), 100.0);
        assert_eq!(compliance_pct(10, 5), 50.0);
        assert_eq!(compliance_pct(3, 1), 66.7);
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_sweep_breaches_and_escalates_exactly_once() {
        use crate::config::Config;
        use crate::state::AppState;

        let url = std::env::var("DATABASE_URL").unwrap();
        let pool = deskhub_shared::db::create_pool(&url, 5).await.unwrap();
        deskhub_shared::db::run_migrations(&pool).await.unwrap();

        // Thresholds of zero minutes: every open ticket immediately breaches
        // and qualifies for auto-escalation.
        let config = Config {
            bind_address: "127.0.0.1:0".to_string(),
            database_url: url,
            database_max_connections: 5,
            ingest_token: "test-ingest-token-0123456789".to_string(),
            sla_first_response_minutes: 0,
            sla_resolution_minutes: 0,
            sla_sweep_interval_secs: 300,
            event_ring_capacity: 50,
            subscriber_queue_capacity: 64,
            heartbeat_interval_secs: 30,
        };
        let state = AppState::new(pool, config);

        let ticket = crate::tickets::create(
            &state,
            "producer:UserAlpha",
            crate::tickets::CreateTicketRequest {
                channel_id: "ticket-2001".to_string(),
                origin_id: "origin-1".to_string(),
                requester_id: "2".to_string(),
                requester_name: "BetaTester".to_string(),
                subject: "Unattended".to_string(),
                kind: None,
                lang: "en".to_string(),
                priority: None,
                description: String::new(),
            },
        )
        .await
        .unwrap();

        let first = sweep(&state).await.unwrap();
        assert!(first.escalated >= 1);

        let stored = crate::tickets::get(&state, ticket.id).await.unwrap();
        assert!(stored.sla_breached);
        assert!(stored.escalation_flag);
        assert_eq!(stored.status, TicketStatus::Escalated);

        // A second tick must not re-fire the escalation for this ticket
        sweep(&state).await.unwrap();
        let stored_again = crate::tickets::get(&state, ticket.id).await.unwrap();
        assert!(stored_again.escalation_flag);
        assert_eq!(stored_again.status, TicketStatus::Escalated);
    }
}
