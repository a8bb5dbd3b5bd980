use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use quoteflow_core::audit::{AuditContext, AuditSink};
use quoteflow_core::errors::InterfaceError;
use quoteflow_core::flows::{SubmissionPlan, WizardController, WizardSnapshot};
use quoteflow_core::schema::validation::FieldIssue;
use quoteflow_core::schema::prefill_record;
use quoteflow_core::RecordSync;

const CORRELATION_HEADER: &str = "x-correlation-id";
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

type SessionHandle = Arc<Mutex<WizardController>>;

struct SessionEntry {
    controller: SessionHandle,
    last_used: StdMutex<Instant>,
}

impl SessionEntry {
    fn new(controller: WizardController) -> Self {
        Self { controller: Arc::new(Mutex::new(controller)), last_used: StdMutex::new(Instant::now()) }
    }

    fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_used.lock().unwrap_or_else(PoisonError::into_inner).elapsed()
    }

    /// A session with a request holding its lock, or a CRM write still running, is never idle.
    fn is_busy(&self) -> bool {
        match self.controller.try_lock() {
            Ok(controller) => controller.is_submitting(),
            Err(_) => true,
        }
    }
}

/// Live wizard sessions, each owned by its own controller.
#[derive(Clone)]
pub struct WizardState {
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    sync: Arc<dyn RecordSync>,
    audit_sink: Arc<dyn AuditSink>,
    idle_ttl: Duration,
}

impl WizardState {
    pub fn new(sync: Arc<dyn RecordSync>, audit_sink: Arc<dyn AuditSink>, idle_ttl: Duration) -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())), sync, audit_sink, idle_ttl }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn session(&self, id: Uuid, correlation_id: &str) -> Result<SessionHandle, ApiError> {
        let sessions = self.sessions.read().await;
        let entry = sessions
            .get(&id)
            .ok_or_else(|| ApiError(InterfaceError::session_not_found(correlation_id)))?;
        entry.touch();
        Ok(entry.controller.clone())
    }

    /// Drops sessions untouched for longer than the idle ttl and returns how many went.
    pub async fn sweep_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.idle_for() < self.idle_ttl || entry.is_busy());
        before - sessions.len()
    }

    /// Runs [`sweep_idle`](Self::sweep_idle) on a fixed cadence until the handle is aborted.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let state = self.clone();
        let period = self.idle_ttl.min(MAX_SWEEP_INTERVAL).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = state.sweep_idle().await;
                if removed > 0 {
                    let remaining = state.session_count().await;
                    info!(
                        event_name = "wizard.sessions_expired",
                        removed,
                        remaining,
                        idle_ttl_secs = state.idle_ttl.as_secs(),
                        "idle wizard sessions dropped"
                    );
                }
            }
        })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub snapshot: WizardSnapshot,
}

#[derive(Clone, Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<FieldIssue>,
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let issues = match &self.0 {
            InterfaceError::Validation { issues, .. } => issues.clone(),
            _ => Vec::new(),
        };
        warn!(
            event_name = "wizard.request_rejected",
            correlation_id = self.0.correlation_id(),
            status = status.as_u16(),
            error = %self.0,
            "wizard request rejected"
        );
        let body = ErrorBody {
            error: self.0.user_message(),
            detail: self.0.to_string(),
            correlation_id: self.0.correlation_id().to_string(),
            issues,
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: WizardState) -> Router {
    Router::new()
        .route("/api/v1/wizard/sessions", post(create_session))
        .route("/api/v1/wizard/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/v1/wizard/sessions/{id}/submit", post(submit_step))
        .route("/api/v1/wizard/sessions/{id}/back", post(go_back))
        .route("/api/v1/wizard/sessions/{id}/start-over", post(start_over))
        .with_state(state)
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn respond(session_id: Uuid, controller: &WizardController) -> Json<SessionResponse> {
    Json(SessionResponse { session_id, snapshot: controller.snapshot(Utc::now().date_naive()) })
}

async fn create_session(
    State(state): State<WizardState>,
    headers: HeaderMap,
    Query(prefill): Query<Vec<(String, String)>>,
) -> (StatusCode, Json<SessionResponse>) {
    let correlation_id = correlation_id(&headers);
    let session_id = Uuid::new_v4();
    let controller = WizardController::with_audit(
        prefill_record(prefill),
        state.audit_sink.clone(),
        AuditContext::new(None, Some(session_id.to_string()), correlation_id, "wizard-api"),
    );
    let response = respond(session_id, &controller);

    state.sessions.write().await.insert(session_id, SessionEntry::new(controller));
    info!(
        event_name = "wizard.session_created",
        session_id = %session_id,
        operation_id = response.snapshot.operation_id.as_deref().unwrap_or_default(),
        "wizard session created"
    );
    (StatusCode::CREATED, response)
}

async fn get_session(
    State(state): State<WizardState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.session(id, &correlation_id(&headers)).await?;
    let controller = session.lock().await;
    Ok(respond(id, &controller))
}

async fn delete_session(
    State(state): State<WizardState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let correlation_id = correlation_id(&headers);
    match state.sessions.write().await.remove(&id) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(ApiError(InterfaceError::session_not_found(correlation_id))),
    }
}

/// The session lock is released while the CRM call runs; the in-flight flag rejects
/// overlapping submissions in the meantime. The call and its completion run on their own
/// task so a dropped request cannot leave the session stuck in flight.
async fn submit_step(
    State(state): State<WizardState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(raw): Json<Value>,
) -> Result<Json<SessionResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let session = state.session(id, &correlation_id).await?;

    let Value::Object(raw) = raw else {
        return Err(ApiError(InterfaceError::BadRequest {
            message: "submission body must be a JSON object of field values".to_string(),
            correlation_id,
        }));
    };

    let plan = {
        let mut controller = session.lock().await;
        controller
            .begin_submission(&raw)
            .map_err(|error| ApiError(error.into_interface(correlation_id.clone())))?
    };

    if let SubmissionPlan::Sync(request) = plan {
        let sync = state.sync.clone();
        let owner = session.clone();
        let completion = tokio::spawn(async move {
            let result = request.execute(sync.as_ref()).await;
            let mut controller = owner.lock().await;
            controller.complete_submission(&request, result)
        });

        match completion.await {
            Ok(outcome) => {
                outcome.map_err(|error| ApiError(error.into_interface(correlation_id.clone())))?;
            }
            Err(join_error) => {
                error!(
                    event_name = "wizard.submission_task_failed",
                    session_id = %id,
                    correlation_id = %correlation_id,
                    error = %join_error,
                    "submission task ended without completing"
                );
                return Err(ApiError(InterfaceError::Internal {
                    message: join_error.to_string(),
                    correlation_id,
                }));
            }
        }
    }

    let controller = session.lock().await;
    Ok(respond(id, &controller))
}

async fn go_back(
    State(state): State<WizardState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let session = state.session(id, &correlation_id).await?;
    let mut controller = session.lock().await;
    controller.back().map_err(|error| ApiError(error.into_interface(correlation_id)))?;
    Ok(respond(id, &controller))
}

async fn start_over(
    State(state): State<WizardState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let session = state.session(id, &correlation_id).await?;
    let mut controller = session.lock().await;
    controller.start_over().map_err(|error| ApiError(error.into_interface(correlation_id)))?;
    Ok(respond(id, &controller))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tokio::sync::Semaphore;
    use tower::ServiceExt;

    use quoteflow_core::audit::InMemoryAuditSink;
    use quoteflow_core::domain::record::{OpportunityClose, QuotationRecord};
    use quoteflow_core::errors::{SyncError, UpstreamBody};
    use quoteflow_core::{CrmResource, RecordSync, SyncPayload, SyncResult};

    use super::{router, WizardState};

    #[derive(Default)]
    struct ScriptedSync {
        replies: StdMutex<VecDeque<Result<SyncResult, SyncError>>>,
    }

    impl ScriptedSync {
        fn with(replies: Vec<Result<SyncResult, SyncError>>) -> Self {
            Self { replies: StdMutex::new(replies.into()) }
        }

        fn next(&self) -> Result<SyncResult, SyncError> {
            self.replies.lock().expect("replies lock").pop_front().expect("scripted reply")
        }
    }

    #[async_trait]
    impl RecordSync for ScriptedSync {
        async fn update_quotation(&self, _: &QuotationRecord) -> Result<SyncResult, SyncError> {
            self.next()
        }

        async fn update_opportunity(
            &self,
            _: &QuotationRecord,
            _: &OpportunityClose,
        ) -> Result<SyncResult, SyncError> {
            self.next()
        }
    }

    /// Holds every CRM write until the test opens the gate.
    struct GatedSync {
        gate: Semaphore,
        inner: ScriptedSync,
    }

    impl GatedSync {
        fn with(replies: Vec<Result<SyncResult, SyncError>>) -> Self {
            Self { gate: Semaphore::new(0), inner: ScriptedSync::with(replies) }
        }

        fn open(&self) {
            self.gate.add_permits(Semaphore::MAX_PERMITS);
        }

        async fn next(&self) -> Result<SyncResult, SyncError> {
            let _permit = self.gate.acquire().await.expect("gate");
            self.inner.next()
        }
    }

    #[async_trait]
    impl RecordSync for GatedSync {
        async fn update_quotation(&self, _: &QuotationRecord) -> Result<SyncResult, SyncError> {
            self.next().await
        }

        async fn update_opportunity(
            &self,
            _: &QuotationRecord,
            _: &OpportunityClose,
        ) -> Result<SyncResult, SyncError> {
            self.next().await
        }
    }

    fn app_with(sync: Arc<dyn RecordSync>, idle_ttl: Duration) -> (Router, WizardState) {
        let state = WizardState::new(sync, Arc::new(InMemoryAuditSink::default()), idle_ttl);
        (router(state.clone()), state)
    }

    fn app(replies: Vec<Result<SyncResult, SyncError>>) -> (Router, WizardState) {
        app_with(Arc::new(ScriptedSync::with(replies)), Duration::from_secs(60))
    }

    fn asset_updated() -> Result<SyncResult, SyncError> {
        Ok(SyncResult::Success {
            resource: CrmResource::Asset,
            subject_id: "XX_Q100".to_string(),
            payload: SyncPayload::NoContent,
        })
    }

    async fn wait_for_submitting(router: &Router, id: &str, expected: bool) -> Value {
        for _ in 0..200 {
            let (_, body) =
                call(router, Method::GET, &format!("/api/v1/wizard/sessions/{id}"), None).await;
            if body["submitting"] == expected {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("session {id} never reached submitting={expected}");
    }

    async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    async fn create(router: &Router, query: &str) -> String {
        let (status, body) =
            call(router, Method::POST, &format!("/api/v1/wizard/sessions{query}"), None).await;
        assert_eq!(status, StatusCode::CREATED);
        body["session_id"].as_str().expect("session id").to_string()
    }

    fn personal() -> Value {
        json!({
            "firstName": "Ana",
            "lastName": "Diaz",
            "birthdate": "1990-01-01",
            "mobilePhone": "555-1234",
            "email": "a@b.com",
        })
    }

    fn quotation() -> Value {
        json!({
            "externalId": "Q100",
            "effectiveDate": "2025-01-01",
            "expirationDate": "2026-01-01",
            "netPremium": 1200,
            "paymentMethod": "01",
            "paymentTerm": "01",
        })
    }

    #[tokio::test]
    async fn create_session_applies_prefill() {
        let (router, state) = app(Vec::new());
        let (status, body) = call(
            &router,
            Method::POST,
            "/api/v1/wizard/sessions?IdExternal__c=Q100&NetPremium__c=abc&accountId=001XYZ",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["step"], "personal_details");
        assert_eq!(body["record"]["externalId"], "Q100");
        assert_eq!(body["record"]["accountId"], "001XYZ");
        assert_eq!(body["record"]["isSelected"], true);
        assert_eq!(body["internal_id"], "XX_Q100");
        assert!(body["operation_id"].as_str().is_some_and(|id| id.starts_with("IS")));
        assert_eq!(state.session_count().await, 1);
    }

    #[tokio::test]
    async fn validation_errors_are_unprocessable_with_issues() {
        let (router, _) = app(Vec::new());
        let id = create(&router, "").await;

        let (status, body) = call(
            &router,
            Method::POST,
            &format!("/api/v1/wizard/sessions/{id}/submit"),
            Some(json!({"firstName": "Ana", "email": "nope"})),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let issues = body["issues"].as_array().expect("issues");
        assert!(issues.iter().any(|issue| issue["field"] == "email"));
        assert!(issues.iter().any(|issue| issue["field"] == "lastName"));
    }

    #[tokio::test]
    async fn full_run_reaches_confirmation_even_when_opportunity_fails() {
        let (router, _) = app(vec![
            asset_updated(),
            Err(SyncError::Upstream {
                resource: CrmResource::Opportunity,
                status: Some(500),
                body: UpstreamBody::Json(json!({"error": "invalid stage"})),
            }),
        ]);
        let id = create(&router, "?OpportunityId__c=006ABC").await;
        let submit = format!("/api/v1/wizard/sessions/{id}/submit");

        let (_, body) = call(&router, Method::POST, &submit, Some(personal())).await;
        assert_eq!(body["step"], "quotation");

        let (_, body) = call(&router, Method::POST, &submit, Some(quotation())).await;
        assert_eq!(body["step"], "emission");
        assert!(body.get("notice").is_none());
        assert_eq!(body["emission_defaults"]["policyNumber"], "Q100");

        let (status, body) = call(
            &router,
            Method::POST,
            &submit,
            Some(json!({"closeDate": "2025-02-01", "amount": 1200, "policyNumber": "POL-999"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "confirmation");
        assert_eq!(body["confirmation"]["status"], "failure");
        assert_eq!(body["confirmation"]["payload"]["body"], json!({"error": "invalid stage"}));

        let (_, body) =
            call(&router, Method::POST, &format!("/api/v1/wizard/sessions/{id}/start-over"), None)
                .await;
        assert_eq!(body["step"], "personal_details");
        assert_eq!(body["record"]["opportunityId"], "006ABC");
    }

    #[tokio::test]
    async fn back_from_first_step_is_a_bad_request() {
        let (router, _) = app(Vec::new());
        let id = create(&router, "").await;

        let (status, body) =
            call(&router, Method::POST, &format!("/api/v1/wizard/sessions/{id}/back"), None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["correlation_id"].as_str().is_some());
    }

    #[tokio::test]
    async fn unknown_and_deleted_sessions_are_not_found() {
        let (router, state) = app(Vec::new());
        let id = create(&router, "").await;

        let (status, _) =
            call(&router, Method::DELETE, &format!("/api/v1/wizard/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.session_count().await, 0);

        let (status, body) =
            call(&router, Method::GET, &format!("/api/v1/wizard/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "The wizard session could not be found. Start a new one.");
    }

    #[tokio::test]
    async fn non_object_submission_is_rejected() {
        let (router, _) = app(Vec::new());
        let id = create(&router, "").await;

        let (status, _) = call(
            &router,
            Method::POST,
            &format!("/api/v1/wizard/sessions/{id}/submit"),
            Some(json!(["not", "an", "object"])),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn second_submit_conflicts_while_the_first_is_in_flight() {
        let gated = Arc::new(GatedSync::with(vec![asset_updated()]));
        let (router, _) = app_with(gated.clone(), Duration::from_secs(60));
        let id = create(&router, "").await;
        let submit = format!("/api/v1/wizard/sessions/{id}/submit");
        let (_, body) = call(&router, Method::POST, &submit, Some(personal())).await;
        assert_eq!(body["step"], "quotation");

        let first = tokio::spawn({
            let router = router.clone();
            let submit = submit.clone();
            async move { call(&router, Method::POST, &submit, Some(quotation())).await }
        });
        wait_for_submitting(&router, &id, true).await;

        let (status, body) = call(&router, Method::POST, &submit, Some(quotation())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "A submission is already being processed. Please wait.");

        let (status, _) =
            call(&router, Method::POST, &format!("/api/v1/wizard/sessions/{id}/back"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        gated.open();
        let (status, body) = first.await.expect("first submit");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "emission");
        assert_eq!(body["submitting"], false);
    }

    #[tokio::test]
    async fn dropped_submit_still_completes_the_session() {
        let gated = Arc::new(GatedSync::with(vec![asset_updated()]));
        let (router, _) = app_with(gated.clone(), Duration::from_secs(60));
        let id = create(&router, "").await;
        let submit = format!("/api/v1/wizard/sessions/{id}/submit");
        call(&router, Method::POST, &submit, Some(personal())).await;

        let abandoned = tokio::time::timeout(
            Duration::from_millis(200),
            call(&router, Method::POST, &submit, Some(quotation())),
        )
        .await;
        assert!(abandoned.is_err(), "submit should still be waiting on the CRM");

        gated.open();
        let body = wait_for_submitting(&router, &id, false).await;
        assert_eq!(body["step"], "emission");

        let (status, body) =
            call(&router, Method::POST, &format!("/api/v1/wizard/sessions/{id}/back"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "quotation");
    }

    #[tokio::test]
    async fn sweep_keeps_sessions_used_within_the_ttl() {
        let (router, state) = app(Vec::new());
        create(&router, "").await;

        assert_eq!(state.sweep_idle().await, 0);
        assert_eq!(state.session_count().await, 1);
    }

    #[tokio::test]
    async fn sweep_drops_idle_sessions_but_not_in_flight_ones() {
        let gated = Arc::new(GatedSync::with(vec![asset_updated()]));
        let (router, state) = app_with(gated.clone(), Duration::ZERO);
        let idle = create(&router, "").await;
        let busy = create(&router, "").await;
        let submit = format!("/api/v1/wizard/sessions/{busy}/submit");
        call(&router, Method::POST, &submit, Some(personal())).await;

        let in_flight = tokio::spawn({
            let router = router.clone();
            async move { call(&router, Method::POST, &submit, Some(quotation())).await }
        });
        wait_for_submitting(&router, &busy, true).await;

        assert_eq!(state.sweep_idle().await, 1);
        assert_eq!(state.session_count().await, 1);
        let (status, _) =
            call(&router, Method::GET, &format!("/api/v1/wizard/sessions/{idle}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        gated.open();
        let (status, _) = in_flight.await.expect("in-flight submit");
        assert_eq!(status, StatusCode::OK);
    }
}
