use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, TracingAuditSink};
use crate::domain::record::{EmissionDefaults, OpportunityClose, QuotationRecord};
use crate::domain::sync::{CrmResource, RecordSync, SyncResult};
use crate::errors::{SyncError, WizardError};
use crate::flows::engine::{FlowEngine, QuotationWizardFlow};
use crate::flows::states::{
    progress_markers, StepMarker, TransitionOutcome, WizardEvent, WizardStep,
};
use crate::schema::validation::{validate_step, RawFields, StepSubmission};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient message for the view; cleared by the next action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, title: title.into(), message: message.into() }
    }
}

/// Network write to perform outside any session lock.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncRequest {
    Quotation { record: QuotationRecord },
    Opportunity { record: QuotationRecord, close: OpportunityClose },
}

impl SyncRequest {
    pub fn resource(&self) -> CrmResource {
        match self {
            Self::Quotation { .. } => CrmResource::Asset,
            Self::Opportunity { .. } => CrmResource::Opportunity,
        }
    }

    pub async fn execute(&self, sync: &dyn RecordSync) -> Result<SyncResult, SyncError> {
        match self {
            Self::Quotation { record } => sync.update_quotation(record).await,
            Self::Opportunity { record, close } => sync.update_opportunity(record, close).await,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubmissionPlan {
    /// The step finished without touching the network.
    Advanced(TransitionOutcome),
    Sync(SyncRequest),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConfirmationView {
    Success { title: String, message: String, subject_id: String, detail: String },
    Failure { title: String, message: String, details: String, payload: Value },
}

impl ConfirmationView {
    pub fn from_result(result: &SyncResult) -> Self {
        match result {
            SyncResult::Success { resource, subject_id, payload } => Self::Success {
                title: "Update successful".to_string(),
                message: format!("The {resource} was updated in Salesforce."),
                subject_id: subject_id.clone(),
                detail: payload.describe(),
            },
            SyncResult::Failure { resource, message, payload } => Self::Failure {
                title: "Update failed".to_string(),
                message: format!(
                    "There was a problem updating the {resource} in Salesforce: {message}"
                ),
                details: serde_json::to_string_pretty(payload)
                    .unwrap_or_else(|_| payload.to_string()),
                payload: payload.clone(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Everything a view needs to render the current step.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WizardSnapshot {
    pub step: WizardStep,
    pub step_number: u8,
    pub step_label: String,
    pub progress: Vec<StepMarker>,
    pub submitting: bool,
    pub operation_id: Option<String>,
    pub internal_id: Option<String>,
    pub record: QuotationRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emission_defaults: Option<EmissionDefaults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<ConfirmationView>,
}

/// Owns one wizard session: current step, cumulative record, in-flight flag, last response.
pub struct WizardController {
    engine: FlowEngine<QuotationWizardFlow>,
    step: WizardStep,
    initial: QuotationRecord,
    record: QuotationRecord,
    submitting: bool,
    last_response: Option<SyncResult>,
    notice: Option<Notice>,
    audit_sink: Arc<dyn AuditSink>,
    audit: AuditContext,
}

impl WizardController {
    pub fn new(prefill: QuotationRecord) -> Self {
        Self::with_audit(
            prefill,
            Arc::new(TracingAuditSink),
            AuditContext::new(None, None, "unassigned", "wizard-controller"),
        )
    }

    pub fn with_audit(
        prefill: QuotationRecord,
        audit_sink: Arc<dyn AuditSink>,
        audit: AuditContext,
    ) -> Self {
        let engine = FlowEngine::new(QuotationWizardFlow);
        let mut record = prefill.clone();
        let operation_id = record.ensure_operation_id().clone();
        let audit = AuditContext { operation_id: Some(operation_id), ..audit };

        Self {
            step: engine.initial_step(),
            engine,
            initial: prefill,
            record,
            submitting: false,
            last_response: None,
            notice: None,
            audit_sink,
            audit,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn record(&self) -> &QuotationRecord {
        &self.record
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn last_response(&self) -> Option<&SyncResult> {
        self.last_response.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Validates and merges step input; returns the network write to perform, if any.
    ///
    /// A returned [`SubmissionPlan::Sync`] leaves the session in flight until
    /// [`complete_submission`](Self::complete_submission) is called.
    pub fn begin_submission(&mut self, raw: &RawFields) -> Result<SubmissionPlan, WizardError> {
        if self.submitting {
            return Err(WizardError::SubmissionInFlight);
        }
        self.engine.apply(self.step, WizardEvent::Submitted)?;

        let submission = validate_step(self.step, raw).inspect_err(|error| {
            self.audit_sink.emit(
                self.audit
                    .event("wizard.validation_failed", AuditCategory::Wizard, AuditOutcome::Rejected)
                    .with_metadata("step", self.step.as_str())
                    .with_metadata("issues", error.issues.len().to_string()),
            );
        })?;

        self.notice = None;
        let outcome = self.engine.apply_with_audit(
            self.step,
            WizardEvent::Submitted,
            self.audit_sink.as_ref(),
            &self.audit,
        )?;

        let request = match submission {
            StepSubmission::PersonalDetails(details) => {
                self.record.merge_personal_details(details);
                self.step = outcome.to;
                return Ok(SubmissionPlan::Advanced(outcome));
            }
            StepSubmission::Quotation(terms) => {
                self.record.merge_quotation_terms(terms);
                SyncRequest::Quotation { record: self.record.clone() }
            }
            StepSubmission::Emission(close) => {
                self.record.merge_opportunity_close(&close);
                SyncRequest::Opportunity { record: self.record.clone(), close }
            }
        };

        self.step = outcome.to;
        self.submitting = true;
        Ok(SubmissionPlan::Sync(request))
    }

    /// Applies the outcome of a sync started by [`begin_submission`](Self::begin_submission).
    pub fn complete_submission(
        &mut self,
        request: &SyncRequest,
        result: Result<SyncResult, SyncError>,
    ) -> Result<TransitionOutcome, WizardError> {
        if !self.submitting {
            return Err(WizardError::NoSubmissionInFlight);
        }
        self.submitting = false;

        let resource = request.resource();
        let result = match result {
            Ok(result) => result,
            Err(error) => {
                error!(
                    event_name = "wizard.sync_failed",
                    operation_id = self.operation_label(),
                    resource = resource.as_str(),
                    error_class = error.error_class(),
                    status = error.status(),
                    error = %error,
                    "record synchronization failed"
                );
                SyncResult::failure(resource, &error)
            }
        };
        self.audit_sync(&result);

        let event = match (request, &result) {
            (SyncRequest::Quotation { .. }, SyncResult::Success { .. }) => {
                WizardEvent::QuotationSynced
            }
            (SyncRequest::Quotation { .. }, SyncResult::Failure { message, .. }) => {
                self.notice = Some(Notice::error("Quotation could not be sent", message.clone()));
                WizardEvent::QuotationSyncFailed
            }
            (SyncRequest::Opportunity { .. }, SyncResult::Success { .. }) => {
                WizardEvent::OpportunitySynced
            }
            (SyncRequest::Opportunity { .. }, SyncResult::Failure { message, .. }) => {
                self.notice =
                    Some(Notice::error("Opportunity could not be updated", message.clone()));
                WizardEvent::OpportunitySyncFailed
            }
        };

        let outcome =
            self.engine.apply_with_audit(self.step, event, self.audit_sink.as_ref(), &self.audit)?;

        // Only the opportunity result is kept. A failed opportunity update still advances to
        // confirmation carrying the failure, while a failed quotation blocks on its own step.
        if matches!(request, SyncRequest::Opportunity { .. }) {
            self.last_response = Some(result);
        }
        self.step = outcome.to;

        info!(
            event_name = "wizard.submission_completed",
            operation_id = self.operation_label(),
            from = outcome.from.as_str(),
            to = outcome.to.as_str(),
            "wizard step completed"
        );
        Ok(outcome)
    }

    /// Runs one full submission of the current step against `sync`.
    pub async fn submit(
        &mut self,
        sync: &dyn RecordSync,
        raw: &RawFields,
    ) -> Result<TransitionOutcome, WizardError> {
        match self.begin_submission(raw)? {
            SubmissionPlan::Advanced(outcome) => Ok(outcome),
            SubmissionPlan::Sync(request) => {
                let result = request.execute(sync).await;
                self.complete_submission(&request, result)
            }
        }
    }

    pub fn back(&mut self) -> Result<TransitionOutcome, WizardError> {
        if self.submitting {
            return Err(WizardError::SubmissionInFlight);
        }
        let outcome = self.engine.apply_with_audit(
            self.step,
            WizardEvent::BackRequested,
            self.audit_sink.as_ref(),
            &self.audit,
        )?;
        self.step = outcome.to;
        self.notice = None;
        Ok(outcome)
    }

    /// Discards everything entered since the session opened and issues a new operation id
    /// unless the prefill carried one.
    pub fn start_over(&mut self) -> Result<TransitionOutcome, WizardError> {
        if self.submitting {
            return Err(WizardError::SubmissionInFlight);
        }
        let outcome = self.engine.apply_with_audit(
            self.step,
            WizardEvent::StartOverRequested,
            self.audit_sink.as_ref(),
            &self.audit,
        )?;

        self.record = self.initial.clone();
        let operation_id = self.record.ensure_operation_id().clone();
        self.audit.operation_id = Some(operation_id);
        self.last_response = None;
        self.notice = None;
        self.step = outcome.to;
        Ok(outcome)
    }

    pub fn confirmation(&self) -> Option<ConfirmationView> {
        if self.step != WizardStep::Confirmation {
            return None;
        }
        self.last_response.as_ref().map(ConfirmationView::from_result)
    }

    pub fn snapshot(&self, today: NaiveDate) -> WizardSnapshot {
        WizardSnapshot {
            step: self.step,
            step_number: self.step.number(),
            step_label: self.step.label().to_string(),
            progress: progress_markers(self.step),
            submitting: self.submitting,
            operation_id: self.record.operation_id.as_ref().map(|id| id.to_string()),
            internal_id: self.record.internal_id(),
            record: self.record.clone(),
            emission_defaults: (self.step == WizardStep::Emission)
                .then(|| self.record.emission_defaults(today)),
            notice: self.notice.clone(),
            confirmation: self.confirmation(),
        }
    }

    fn operation_label(&self) -> &str {
        self.record.operation_id.as_ref().map(|id| id.as_str()).unwrap_or_default()
    }

    fn audit_sync(&self, result: &SyncResult) {
        let event = match result {
            SyncResult::Success { resource, subject_id, .. } => self
                .audit
                .event("crm.sync_succeeded", AuditCategory::Sync, AuditOutcome::Success)
                .with_metadata("resource", resource.as_str())
                .with_metadata("subject_id", subject_id.as_str()),
            SyncResult::Failure { resource, payload, .. } => self
                .audit
                .event("crm.sync_failed", AuditCategory::Sync, AuditOutcome::Failed)
                .with_metadata("resource", resource.as_str())
                .with_metadata(
                    "error_class",
                    payload["error_class"].as_str().unwrap_or("unknown"),
                ),
        };
        self.audit_sink.emit(event);
    }
}
