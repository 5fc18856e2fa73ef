//! Global application state shared across handlers and background tasks

use std::sync::Arc;

use sqlx::PgPool;

use crate::audit::AuditLog;
use crate::config::Config;
use crate::events::EventBus;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub events: EventBus,
    pub audit: AuditLog,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let events = EventBus::new(config.event_ring_capacity, config.subscriber_queue_capacity);
        let audit = AuditLog::new(pool.clone());

        Self {
            pool,
            config: Arc::new(config),
            events,
            audit,
        }
    }
}
