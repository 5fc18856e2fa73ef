//! Live event feed (SSE) and the replay snapshot

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
    Json,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{auth::Actor, events::{DomainEvent, EventBus}, state::AppState};

/// Releases the subscriber's queue as soon as the SSE stream is dropped,
/// instead of waiting for the next publish pass to notice the closed queue.
struct FeedGuard {
    id: Uuid,
    bus: EventBus,
}

impl Drop for FeedGuard {
    fn drop(&mut self) {
        let bus = self.bus.clone();
        let id = self.id;
        tokio::spawn(async move {
            bus.unsubscribe(id).await;
        });
    }
}

fn sse_event(event: &DomainEvent) -> Event {
    match Event::default().event(event.event_type.as_str()).json_data(event) {
        Ok(ev) => ev,
        Err(e) => {
            tracing::error!(error = ?e, "Failed to serialize event for SSE");
            Event::default().event("error").data("serialization failure")
        }
    }
}

/// Subscribe to the live domain event stream
///
/// Delivery is FIFO per subscriber. When no event arrives within the idle
/// window a heartbeat is synthesized, so transport keep-alive stays
/// distinguishable from data loss.
pub async fn stream(
    State(state): State<AppState>,
    _actor: Actor,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, rx) = state.events.subscribe().await;
    let idle = Duration::from_secs(state.config.heartbeat_interval_secs);
    let guard = FeedGuard {
        id,
        bus: state.events.clone(),
    };

    tracing::debug!(subscriber_id = %id, "Live feed connected");

    let stream = stream::unfold((rx, guard), move |(mut rx, guard)| async move {
        match tokio::time::timeout(idle, rx.recv()).await {
            Ok(Some(event)) => Some((Ok::<_, Infallible>(sse_event(&event)), (rx, guard))),
            // Bus dropped our sender (queue overflow cleanup): end the stream
            Ok(None) => None,
            Err(_) => {
                let heartbeat = guard.bus.heartbeat();
                Some((Ok(sse_event(&heartbeat)), (rx, guard)))
            }
        }
    });

    Sse::new(stream)
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecentEventsResponse {
    pub events: Vec<DomainEvent>,
}

/// Most recent replay-ring entries, oldest first
///
/// A point-in-time read, not gap-free against concurrent publishes; clients
/// de-duplicate against the live stream by sequence id.
pub async fn recent(
    State(state): State<AppState>,
    _actor: Actor,
    Query(query): Query<RecentQuery>,
) -> Json<RecentEventsResponse> {
    let limit = query.limit.unwrap_or(50).min(200);
    let events = state.events.recent(limit).await;
    Json(RecentEventsResponse { events })
}
