//! Audit ledger read-back

use axum::{
    extract::{Query, State},
    Json,
};
use deskhub_shared::{AuditEntry, PaginatedResponse};
use serde::Deserialize;

use crate::{auth::Actor, error::ApiResult, state::AppState};

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Paginated audit entries, newest first
pub async fn list_entries(
    State(state): State<AppState>,
    _actor: Actor,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<PaginatedResponse<AuditEntry>>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(100).clamp(1, 500);

    let (entries, total) = state.audit.list(page, limit).await?;

    Ok(Json(PaginatedResponse::new(entries, total, page, limit)))
}
