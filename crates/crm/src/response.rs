use serde_json::Value;
use tracing::{error, warn};

use quoteflow_core::domain::sync::{CrmResource, SyncPayload, SyncResult};
use quoteflow_core::errors::{SyncError, UpstreamBody};

use crate::transport::HttpReply;

/// Shape of a PATCH reply, checked in this order.
#[derive(Clone, Debug, PartialEq)]
pub enum PatchOutcome {
    NoContent,
    EmptyBody { status: u16 },
    Unparsable { status: u16, raw: String },
    Json { status: u16, body: Value },
}

impl PatchOutcome {
    pub fn classify(reply: HttpReply) -> Self {
        if reply.status == 204 {
            return Self::NoContent;
        }
        if reply.body.is_empty() {
            return Self::EmptyBody { status: reply.status };
        }
        match serde_json::from_str::<Value>(&reply.body) {
            Ok(body) => Self::Json { status: reply.status, body },
            Err(_) => Self::Unparsable { status: reply.status, raw: reply.body },
        }
    }
}

/// Where the success subject id comes from.
#[derive(Clone, Copy, Debug)]
pub enum SubjectStrategy<'a> {
    /// `body.id` when the JSON reply carries one, else the fallback.
    FromBodyOr(&'a str),
    Fixed(&'a str),
}

impl SubjectStrategy<'_> {
    fn resolve(&self, body: Option<&Value>) -> String {
        match self {
            Self::Fixed(id) => (*id).to_string(),
            Self::FromBodyOr(fallback) => body
                .and_then(|body| body.get("id"))
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .unwrap_or(*fallback)
                .to_string(),
        }
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Maps a PATCH reply onto a sync result for either resource.
pub fn normalize(
    resource: CrmResource,
    subject: SubjectStrategy<'_>,
    reply: HttpReply,
) -> Result<SyncResult, SyncError> {
    match PatchOutcome::classify(reply) {
        PatchOutcome::NoContent => Ok(SyncResult::Success {
            resource,
            subject_id: subject.resolve(None),
            payload: SyncPayload::NoContent,
        }),
        PatchOutcome::EmptyBody { status } if is_success(status) => Ok(SyncResult::Success {
            resource,
            subject_id: subject.resolve(None),
            payload: SyncPayload::NoBody { status },
        }),
        PatchOutcome::EmptyBody { status } => {
            Err(SyncError::Upstream { resource, status: Some(status), body: UpstreamBody::Empty })
        }
        PatchOutcome::Unparsable { status, raw } => {
            error!(
                event_name = "crm.patch.parse_failed",
                resource = resource.as_str(),
                status,
                body = %raw,
                "salesforce reply is not valid json"
            );
            Err(SyncError::Upstream {
                resource,
                status: Some(status),
                body: UpstreamBody::Unparsable(raw),
            })
        }
        PatchOutcome::Json { status, body } if is_success(status) => Ok(SyncResult::Success {
            resource,
            subject_id: subject.resolve(Some(&body)),
            payload: SyncPayload::Json { body },
        }),
        PatchOutcome::Json { status, body } => {
            warn!(
                event_name = "crm.patch.rejected",
                resource = resource.as_str(),
                status,
                body = %body,
                "salesforce rejected the update"
            );
            Err(SyncError::Upstream { resource, status: Some(status), body: UpstreamBody::Json(body) })
        }
    }
}
