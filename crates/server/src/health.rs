use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use slotbot_agent::ChatRuntime;
use tracing::warn;

#[derive(Clone)]
pub struct HealthState {
    runtime: Arc<ChatRuntime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionHealth {
    pub status: &'static str,
    pub active: usize,
    pub capacity: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub catalog: HealthCheck,
    pub sessions: SessionHealth,
    pub checked_at: String,
}

pub fn router(runtime: Arc<ChatRuntime>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { runtime })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let catalog = catalog_check(&state.runtime);
    let sessions = session_check(&state.runtime);
    let ready = sessions.status == "ready";

    if !ready {
        warn!(
            event_name = "system.health.degraded",
            active = sessions.active,
            capacity = sessions.capacity,
            "session store is at capacity"
        );
    }

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "slotbot-server runtime initialized".to_string(),
        },
        catalog,
        sessions,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn catalog_check(runtime: &ChatRuntime) -> HealthCheck {
    let engine = runtime.engine();
    HealthCheck {
        status: "ready",
        detail: format!(
            "{} intents loaded, matcher {}",
            engine.catalog().len(),
            engine.classifier().matcher_name()
        ),
    }
}

fn session_check(runtime: &ChatRuntime) -> SessionHealth {
    let active = runtime.active_sessions();
    let capacity = runtime.sessions().max_sessions();
    SessionHealth { status: if active < capacity { "ready" } else { "saturated" }, active, capacity }
}
