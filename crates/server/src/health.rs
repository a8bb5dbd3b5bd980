use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use quoteflow_core::config::SalesforceConfig;
use serde::Serialize;

use crate::wizard::WizardState;

#[derive(Clone)]
pub struct HealthState {
    api_version: String,
    login_url: String,
    wizard: WizardState,
}

impl HealthState {
    pub fn new(config: &SalesforceConfig, wizard: WizardState) -> Self {
        Self { api_version: config.api_version.clone(), login_url: config.login_url.clone(), wizard }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub salesforce: HealthCheck,
    pub active_sessions: usize,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Liveness only: a running server already passed config validation, and Salesforce is
/// never called from here.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "quoteflow-server runtime initialized".to_string(),
        },
        salesforce: HealthCheck {
            status: "configured",
            detail: format!("api {} via {}", state.api_version, state.login_url),
        },
        active_sessions: state.wizard.session_count().await,
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
