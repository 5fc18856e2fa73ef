//! Application configuration

use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Ticket ingestion (shared secret presented by the producing collaborator)
    pub ingest_token: String,

    // SLA thresholds
    pub sla_first_response_minutes: i64,
    pub sla_resolution_minutes: i64,
    pub sla_sweep_interval_secs: u64,

    // Live event feed
    pub event_ring_capacity: usize,
    pub subscriber_queue_capacity: usize,
    pub heartbeat_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),

            // Ingestion
            ingest_token: {
                let token =
                    env::var("INGEST_TOKEN").map_err(|_| ConfigError::Missing("INGEST_TOKEN"))?;
                if token.len() < 16 {
                    return Err(ConfigError::WeakSecret(
                        "INGEST_TOKEN must be at least 16 characters",
                    ));
                }
                token
            },

            // SLA
            sla_first_response_minutes: env::var("SLA_FIRST_RESPONSE_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            sla_resolution_minutes: env::var("SLA_RESOLUTION_MINUTES")
                .unwrap_or_else(|_| "1440".to_string())
                .parse()
                .unwrap_or(1440),
            sla_sweep_interval_secs: env::var("SLA_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),

            // Live feed
            event_ring_capacity: env::var("EVENT_RING_CAPACITY")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .unwrap_or(50),
            subscriber_queue_capacity: env::var("SUBSCRIBER_QUEUE_CAPACITY")
                .unwrap_or_else(|_| "64".to_string())
                .parse()
                .unwrap_or(64),
            heartbeat_interval_secs: env::var("HEARTBEAT_INTERVAL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}
