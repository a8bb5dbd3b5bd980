use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::sync::CrmResource;
use crate::flows::FlowTransitionError;
use crate::schema::validation::{FieldIssue, ValidationError};

/// Body of a failed call against a record endpoint.
#[derive(Clone, Debug, PartialEq)]
pub enum UpstreamBody {
    Empty,
    /// Non-empty body that was not JSON; kept verbatim.
    Unparsable(String),
    Json(Value),
    Timeout { after_secs: u64 },
    Transport(String),
}

fn status_label(status: &Option<u16>) -> String {
    status.map(|code| code.to_string()).unwrap_or_else(|| "n/a".to_string())
}

fn describe_upstream(body: &UpstreamBody, resource: &CrmResource, status: &Option<u16>) -> String {
    let status = status_label(status);
    match body {
        UpstreamBody::Empty => {
            format!("Salesforce returned an empty response with status: {status}")
        }
        UpstreamBody::Unparsable(raw) => {
            format!("Failed to parse Salesforce JSON response. Status: {status}, Body: {raw}")
        }
        UpstreamBody::Json(value) => format!("Failed to update {resource}: {status} {value}"),
        UpstreamBody::Timeout { after_secs } => {
            format!("Salesforce {resource} request timed out after {after_secs}s")
        }
        UpstreamBody::Transport(message) => {
            format!("Salesforce {resource} request failed: {message}")
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum SyncError {
    #[error("Salesforce login failed: {} {body}", status_label(.status))]
    Auth { status: Option<u16>, body: String },
    #[error("Salesforce token response could not be decoded: {0}")]
    TokenDecode(String),
    #[error("{field} is required to identify the {resource}")]
    MissingKey { resource: CrmResource, field: &'static str },
    #[error("{}", describe_upstream(.body, .resource, .status))]
    Upstream { resource: CrmResource, status: Option<u16>, body: UpstreamBody },
}

impl SyncError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::Upstream { status, .. } => *status,
            Self::TokenDecode(_) | Self::MissingKey { .. } => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::TokenDecode(_))
    }

    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::TokenDecode(_) | Self::Upstream { body: UpstreamBody::Unparsable(_), .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Upstream { body: UpstreamBody::Timeout { .. }, .. })
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::TokenDecode(_) => "auth_decode",
            Self::MissingKey { .. } => "missing_key",
            Self::Upstream { body: UpstreamBody::Unparsable(_), .. } => "upstream_parse",
            Self::Upstream { body: UpstreamBody::Timeout { .. }, .. } => "upstream_timeout",
            Self::Upstream { .. } => "upstream",
        }
    }

    /// Structured dump rendered by the confirmation view on failure.
    pub fn diagnostic_payload(&self) -> Value {
        let body = match self {
            Self::Auth { body, .. } => Value::String(body.clone()),
            Self::TokenDecode(message) => Value::String(message.clone()),
            Self::MissingKey { field, .. } => Value::String(format!("missing {field}")),
            Self::Upstream { body, .. } => match body {
                UpstreamBody::Empty => Value::String("empty body".to_string()),
                UpstreamBody::Unparsable(raw) => Value::String(raw.clone()),
                UpstreamBody::Json(value) => value.clone(),
                UpstreamBody::Timeout { after_secs } => {
                    Value::String(format!("timed out after {after_secs}s"))
                }
                UpstreamBody::Transport(message) => Value::String(message.clone()),
            },
        };
        json!({
            "error_class": self.error_class(),
            "status": self.status(),
            "message": self.to_string(),
            "body": body,
        })
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum WizardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transition(#[from] FlowTransitionError),
    #[error("a submission is already in flight for this session")]
    SubmissionInFlight,
    #[error("no submission is in flight for this session")]
    NoSubmissionInFlight,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("validation failed: {message}")]
    Validation { message: String, issues: Vec<FieldIssue>, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "Some fields need attention before continuing.",
            Self::Conflict { .. } => "A submission is already being processed. Please wait.",
            Self::NotFound { .. } => "The wizard session could not be found. Start a new one.",
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Internal { .. } => "Something went wrong on our side. Please try again.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Validation { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::BadRequest { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    pub fn session_not_found(correlation_id: impl Into<String>) -> Self {
        Self::NotFound {
            message: "unknown wizard session".to_owned(),
            correlation_id: correlation_id.into(),
        }
    }
}

impl WizardError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::Validation { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<WizardError> for InterfaceError {
    fn from(value: WizardError) -> Self {
        match value {
            WizardError::Validation(error) => Self::Validation {
                message: error.to_string(),
                issues: error.issues,
                correlation_id: "unassigned".to_owned(),
            },
            WizardError::SubmissionInFlight => Self::Conflict {
                message: WizardError::SubmissionInFlight.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            error @ (WizardError::Transition(_) | WizardError::NoSubmissionInFlight) => {
                Self::BadRequest { message: error.to_string(), correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
