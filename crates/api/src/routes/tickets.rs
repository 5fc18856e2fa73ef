//! Ticket routes: ingestion, read model, and lifecycle transitions

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use deskhub_shared::{PaginatedResponse, Ticket, TicketId};
use serde::Deserialize;

use crate::{
    auth::Actor,
    error::{ApiError, ApiResult},
    state::AppState,
    tickets::{self, CreateTicketRequest, TicketPatch},
};

// =============================================================================
// Ingestion
// =============================================================================

/// Create a ticket on behalf of a producing collaborator
///
/// Producers authenticate with the shared ingest token; support staff may
/// also create tickets directly through the gateway identity.
pub async fn create_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    actor: Option<Actor>,
    Json(req): Json<CreateTicketRequest>,
) -> ApiResult<Json<Ticket>> {
    let token_ok = headers
        .get("x-ingest-token")
        .and_then(|v| v.to_str().ok())
        .map(|token| token == state.config.ingest_token)
        .unwrap_or(false);
    let role_ok = actor
        .as_ref()
        .map(|a| a.role.can_mutate())
        .unwrap_or(false);

    if !token_ok && !role_ok {
        tracing::warn!("Ticket ingestion rejected: no valid ingest token or support identity");
        return Err(ApiError::Unauthorized);
    }

    let actor_name = actor
        .map(|a| a.name)
        .unwrap_or_else(|| format!("producer:{}", req.requester_name));

    let ticket = tickets::create(&state, &actor_name, req).await?;
    Ok(Json(ticket))
}

// =============================================================================
// Read Model
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListTicketsQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub lang: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Paginated, filterable ticket listing
pub async fn list_tickets(
    State(state): State<AppState>,
    _actor: Actor,
    Query(query): Query<ListTicketsQuery>,
) -> ApiResult<Json<PaginatedResponse<Ticket>>> {
    // Filters are strict: a malformed filter value is a caller error, unlike
    // ticket data which normalizes at the ingestion boundary.
    let status = query
        .status
        .as_deref()
        .map(|s| {
            s.parse::<deskhub_shared::TicketStatus>()
                .map_err(ApiError::Validation)
        })
        .transpose()?
        .map(|s| s.to_string());
    let priority = query
        .priority
        .as_deref()
        .map(|s| {
            s.parse::<deskhub_shared::TicketPriority>()
                .map_err(ApiError::Validation)
        })
        .transpose()?
        .map(|p| p.to_string());

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let offset = (page - 1) * limit;

    // Sort column and direction are whitelisted before touching the SQL text
    let sort_column = match query.sort_by.as_deref() {
        Some("priority") => "priority",
        Some("status") => "status",
        Some("subject") => "subject",
        Some("claimed_by") => "claimed_by",
        _ => "created_at",
    };
    let sort_dir = match query.sort_order.as_deref() {
        Some("asc") => "ASC",
        _ => "DESC",
    };

    let list_sql = format!(
        r#"
        SELECT *
        FROM tickets
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::text IS NULL OR priority = $2)
          AND ($3::text IS NULL OR lang = $3)
          AND ($4::text IS NULL
               OR subject ILIKE '%' || $4 || '%'
               OR requester_name ILIKE '%' || $4 || '%'
               OR description ILIKE '%' || $4 || '%'
               OR id::text ILIKE '%' || $4 || '%')
        ORDER BY {sort_column} {sort_dir}
        LIMIT $5 OFFSET $6
        "#
    );

    let rows: Vec<Ticket> = sqlx::query_as(&list_sql)
        .bind(&status)
        .bind(&priority)
        .bind(&query.lang)
        .bind(&query.search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.pool)
        .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM tickets
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::text IS NULL OR priority = $2)
          AND ($3::text IS NULL OR lang = $3)
          AND ($4::text IS NULL
               OR subject ILIKE '%' || $4 || '%'
               OR requester_name ILIKE '%' || $4 || '%'
               OR description ILIKE '%' || $4 || '%'
               OR id::text ILIKE '%' || $4 || '%')
        "#,
    )
    .bind(&status)
    .bind(&priority)
    .bind(&query.lang)
    .bind(&query.search)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(PaginatedResponse::new(rows, total.0, page, limit)))
}

/// Get a single ticket
pub async fn get_ticket(
    State(state): State<AppState>,
    _actor: Actor,
    Path(ticket_id): Path<TicketId>,
) -> ApiResult<Json<Ticket>> {
    let ticket = tickets::get(&state, ticket_id).await?;
    Ok(Json(ticket))
}

// =============================================================================
// Lifecycle Transitions
// =============================================================================

/// Claim a ticket
pub async fn claim_ticket(
    State(state): State<AppState>,
    actor: Actor,
    Path(ticket_id): Path<TicketId>,
) -> ApiResult<Json<Ticket>> {
    actor.require_support()?;
    let ticket = tickets::claim(&state, ticket_id, &actor.name).await?;
    Ok(Json(ticket))
}

/// Close a ticket
pub async fn close_ticket(
    State(state): State<AppState>,
    actor: Actor,
    Path(ticket_id): Path<TicketId>,
) -> ApiResult<Json<Ticket>> {
    actor.require_support()?;
    let ticket = tickets::close(&state, ticket_id, &actor.name).await?;
    Ok(Json(ticket))
}

/// Reopen a closed ticket
pub async fn reopen_ticket(
    State(state): State<AppState>,
    actor: Actor,
    Path(ticket_id): Path<TicketId>,
) -> ApiResult<Json<Ticket>> {
    actor.require_support()?;
    let ticket = tickets::reopen(&state, ticket_id, &actor.name).await?;
    Ok(Json(ticket))
}

/// Escalate a ticket
pub async fn escalate_ticket(
    State(state): State<AppState>,
    actor: Actor,
    Path(ticket_id): Path<TicketId>,
) -> ApiResult<Json<Ticket>> {
    actor.require_support()?;
    let ticket = tickets::escalate(&state, ticket_id, &actor.name).await?;
    Ok(Json(ticket))
}

/// Patch ticket fields (administrative override)
pub async fn update_ticket(
    State(state): State<AppState>,
    actor: Actor,
    Path(ticket_id): Path<TicketId>,
    Json(patch): Json<TicketPatch>,
) -> ApiResult<Json<Ticket>> {
    actor.require_support()?;
    let ticket = tickets::update_fields(&state, ticket_id, &actor.name, patch).await?;
    Ok(Json(ticket))
}
