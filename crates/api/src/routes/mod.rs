//! API routes

pub mod audit;
pub mod feed;
pub mod health;
pub mod stats;
pub mod tickets;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    let api_routes = Router::new()
        // Ticket ingestion + read model
        .route(
            "/tickets",
            post(tickets::create_ticket).get(tickets::list_tickets),
        )
        .route(
            "/tickets/:ticket_id",
            get(tickets::get_ticket).patch(tickets::update_ticket),
        )
        // Lifecycle transitions
        .route("/tickets/:ticket_id/claim", put(tickets::claim_ticket))
        .route("/tickets/:ticket_id/close", put(tickets::close_ticket))
        .route("/tickets/:ticket_id/reopen", put(tickets::reopen_ticket))
        .route("/tickets/:ticket_id/escalate", put(tickets::escalate_ticket))
        // Dashboard read model
        .route("/kpi", get(stats::kpi))
        .route("/support-stats", get(stats::support_stats))
        .route("/sla", get(stats::sla_overview))
        .route("/analytics/volume", get(stats::volume))
        .route(
            "/analytics/priority-distribution",
            get(stats::priority_distribution),
        )
        .route(
            "/analytics/kind-distribution",
            get(stats::kind_distribution),
        )
        // Live feed
        .route("/events", get(feed::stream))
        .route("/events/recent", get(feed::recent))
        // Audit ledger
        .route("/audit", get(audit::list_entries));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
