//! Dashboard read model: KPIs, supporter performance, SLA and volume series
//!
//! Everything here is computed from the repository plus derived SLA state;
//! nothing is written.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime, Time};

use crate::{auth::Actor, error::ApiResult, sla, state::AppState};

// =============================================================================
// KPI
// =============================================================================

#[derive(Debug, Serialize)]
pub struct KpiResponse {
    pub total_tickets: i64,
    pub open_tickets: i64,
    pub closed_today: i64,
    pub escalated: i64,
    pub sla_breached: i64,
    pub avg_response_time_min: f64,
}

#[derive(FromRow)]
struct KpiRow {
    total: i64,
    open: i64,
    closed_today: i64,
    escalated: i64,
    sla_breached: i64,
    avg_response_minutes: Option<f64>,
}

/// Aggregate KPI counts for the dashboard header
pub async fn kpi(State(state): State<AppState>, _actor: Actor) -> ApiResult<Json<KpiResponse>> {
    let today_start = OffsetDateTime::now_utc().replace_time(Time::MIDNIGHT);

    let row: KpiRow = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE status IN ('open', 'claimed', 'escalated')) AS open,
            COUNT(*) FILTER (WHERE status = 'closed' AND closed_at >= $1) AS closed_today,
            COUNT(*) FILTER (WHERE status = 'escalated') AS escalated,
            COUNT(*) FILTER (WHERE sla_breached AND status <> 'closed') AS sla_breached,
            (AVG(EXTRACT(EPOCH FROM (first_response_at - claimed_at)) / 60.0)
                FILTER (WHERE first_response_at IS NOT NULL AND claimed_at IS NOT NULL)
            )::double precision AS avg_response_minutes
        FROM tickets
        "#,
    )
    .bind(today_start)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(KpiResponse {
        total_tickets: row.total,
        open_tickets: row.open,
        closed_today: row.closed_today,
        escalated: row.escalated,
        sla_breached: row.sla_breached,
        avg_response_time_min: row
            .avg_response_minutes
            .map(|v| (v * 10.0).round() / 10.0)
            .unwrap_or(0.0),
    }))
}

// =============================================================================
// Supporter Performance
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SupporterStats {
    pub supporter: String,
    pub total_tickets: i64,
    pub closed_tickets: i64,
    pub escalations: i64,
    pub sla_breaches: i64,
    pub score: i64,
}

#[derive(Debug, Serialize)]
pub struct SupportStatsResponse {
    pub stats: Vec<SupporterStats>,
}

/// Performance score per supporter, ranked descending
pub fn performance_score(escalations: i64, sla_breaches: i64) -> i64 {
    (100 - 10 * escalations - 15 * sla_breaches).max(0)
}

pub async fn support_stats(
    State(state): State<AppState>,
    _actor: Actor,
) -> ApiResult<Json<SupportStatsResponse>> {
    let rows: Vec<(String, i64, i64, i64, i64)> = sqlx::query_as(
        r#"
        SELECT claimed_by,
               COUNT(*) AS total_tickets,
               COUNT(*) FILTER (WHERE status = 'closed') AS closed_tickets,
               COUNT(*) FILTER (WHERE escalation_flag) AS escalations,
               COUNT(*) FILTER (WHERE sla_breached) AS sla_breaches
        FROM tickets
        WHERE claimed_by IS NOT NULL
        GROUP BY claimed_by
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let mut stats: Vec<SupporterStats> = rows
        .into_iter()
        .map(
            |(supporter, total_tickets, closed_tickets, escalations, sla_breaches)| {
                SupporterStats {
                    supporter,
                    total_tickets,
                    closed_tickets,
                    escalations,
                    sla_breaches,
                    score: performance_score(escalations, sla_breaches),
                }
            },
        )
        .collect();
    stats.sort_by(|a, b| b.score.cmp(&a.score));

    Ok(Json(SupportStatsResponse { stats }))
}

// =============================================================================
// SLA Overview
// =============================================================================

#[derive(Debug, Serialize)]
pub struct PrioritySla {
    pub priority: String,
    pub total: i64,
    pub breached: i64,
    pub compliance: f64,
}

#[derive(Debug, Serialize)]
pub struct DailySla {
    pub date: String,
    pub total: i64,
    pub breached: i64,
}

#[derive(Debug, Serialize)]
pub struct SlaOverviewResponse {
    pub compliance: f64,
    pub total: i64,
    pub breached: i64,
    pub by_priority: Vec<PrioritySla>,
    pub daily: Vec<DailySla>,
}

/// SLA compliance breakdown by priority and by day
pub async fn sla_overview(
    State(state): State<AppState>,
    _actor: Actor,
) -> ApiResult<Json<SlaOverviewResponse>> {
    let (total, breached): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE sla_breached) FROM tickets",
    )
    .fetch_one(&state.pool)
    .await?;

    let by_priority_rows: Vec<(String, i64, i64)> = sqlx::query_as(
        r#"
        SELECT priority, COUNT(*), COUNT(*) FILTER (WHERE sla_breached)
        FROM tickets
        GROUP BY priority
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let by_priority = by_priority_rows
        .into_iter()
        .map(|(priority, total, breached)| PrioritySla {
            priority,
            total,
            breached,
            compliance: sla::compliance_pct(total, breached),
        })
        .collect();

    // Most recent 30 day-buckets, returned oldest first for charting
    let mut daily_rows: Vec<(String, i64, i64)> = sqlx::query_as(
        r#"
        SELECT TO_CHAR(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD') AS date,
               COUNT(*), COUNT(*) FILTER (WHERE sla_breached)
        FROM tickets
        GROUP BY 1
        ORDER BY 1 DESC
        LIMIT 30
        "#,
    )
    .fetch_all(&state.pool)
    .await?;
    daily_rows.reverse();

    let daily = daily_rows
        .into_iter()
        .map(|(date, total, breached)| DailySla {
            date,
            total,
            breached,
        })
        .collect();

    Ok(Json(SlaOverviewResponse {
        compliance: sla::compliance_pct(total, breached),
        total,
        breached,
        by_priority,
        daily,
    }))
}

// =============================================================================
// Volume & Distribution Series
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct VolumeQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct VolumePoint {
    pub date: String,
    pub opened: i64,
    pub closed: i64,
}

#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    pub volume: Vec<VolumePoint>,
}

/// Tickets opened/closed per day over a trailing window
pub async fn volume(
    State(state): State<AppState>,
    _actor: Actor,
    Query(query): Query<VolumeQuery>,
) -> ApiResult<Json<VolumeResponse>> {
    let days = query.days.unwrap_or(30).clamp(1, 365);
    let cutoff = OffsetDateTime::now_utc() - Duration::days(days);

    let rows: Vec<(String, i64, i64)> = sqlx::query_as(
        r#"
        SELECT TO_CHAR(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD') AS date,
               COUNT(*) AS opened,
               COUNT(*) FILTER (WHERE status = 'closed') AS closed
        FROM tickets
        WHERE created_at >= $1
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .bind(cutoff)
    .fetch_all(&state.pool)
    .await?;

    let volume = rows
        .into_iter()
        .map(|(date, opened, closed)| VolumePoint {
            date,
            opened,
            closed,
        })
        .collect();

    Ok(Json(VolumeResponse { volume }))
}

#[derive(Debug, Serialize)]
pub struct DistributionBucket {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct DistributionResponse {
    pub distribution: Vec<DistributionBucket>,
}

/// Ticket count per priority
pub async fn priority_distribution(
    State(state): State<AppState>,
    _actor: Actor,
) -> ApiResult<Json<DistributionResponse>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT priority, COUNT(*) FROM tickets GROUP BY priority")
            .fetch_all(&state.pool)
            .await?;

    Ok(Json(DistributionResponse {
        distribution: rows
            .into_iter()
            .map(|(label, count)| DistributionBucket { label, count })
            .collect(),
    }))
}

/// Ticket count per kind
pub async fn kind_distribution(
    State(state): State<AppState>,
    _actor: Actor,
) -> ApiResult<Json<DistributionResponse>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT kind, COUNT(*) FROM tickets GROUP BY kind")
            .fetch_all(&state.pool)
            .await?;

    Ok(Json(DistributionResponse {
        distribution: rows
            .into_iter()
            .map(|(label, count)| DistributionBucket { label, count })
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_performance_score() {
        assert_eq!(performance_score(0, 0), 100);
        assert_eq!(performance_score(2, 1), 65);
        // Score saturates at zero rather than going negative
        assert_eq!(performance_score(5, 5), 0);
        assert_eq!(performance_score(20, 0), 0);
    }
}
