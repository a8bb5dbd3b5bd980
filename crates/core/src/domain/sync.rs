use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::record::{OpportunityClose, QuotationRecord};
use crate::errors::SyncError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrmResource {
    Asset,
    Opportunity,
}

impl CrmResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Opportunity => "opportunity",
        }
    }

    /// sObject type name in the REST path.
    pub fn sobject(&self) -> &'static str {
        match self {
            Self::Asset => "Asset",
            Self::Opportunity => "Opportunity",
        }
    }
}

impl fmt::Display for CrmResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncPayload {
    NoContent,
    NoBody { status: u16 },
    Json { body: Value },
}

impl SyncPayload {
    pub fn describe(&self) -> String {
        match self {
            Self::NoContent => "Update successful (No Content)".to_string(),
            Self::NoBody { status } => {
                format!("Request successful with status {status}, but no response body.")
            }
            Self::Json { body } => {
                serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string())
            }
        }
    }
}

/// Uniform outcome of one record synchronization.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncResult {
    Success { resource: CrmResource, subject_id: String, payload: SyncPayload },
    Failure { resource: CrmResource, message: String, payload: Value },
}

impl SyncResult {
    pub fn failure(resource: CrmResource, error: &SyncError) -> Self {
        Self::Failure { resource, message: error.to_string(), payload: error.diagnostic_payload() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn resource(&self) -> CrmResource {
        match self {
            Self::Success { resource, .. } | Self::Failure { resource, .. } => *resource,
        }
    }

    pub fn subject_id(&self) -> Option<&str> {
        match self {
            Self::Success { subject_id, .. } => Some(subject_id),
            Self::Failure { .. } => None,
        }
    }
}

/// The two writes the wizard performs against the CRM.
#[async_trait]
pub trait RecordSync: Send + Sync {
    async fn update_quotation(&self, record: &QuotationRecord) -> Result<SyncResult, SyncError>;

    async fn update_opportunity(
        &self,
        record: &QuotationRecord,
        close: &OpportunityClose,
    ) -> Result<SyncResult, SyncError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{CrmResource, SyncPayload, SyncResult};
    use crate::errors::{SyncError, UpstreamBody};

    #[test]
    fn failure_keeps_upstream_body_for_diagnostics() {
        let error = SyncError::Upstream {
            resource: CrmResource::Opportunity,
            status: Some(500),
            body: UpstreamBody::Json(json!({"error": "invalid stage"})),
        };
        let result = SyncResult::failure(CrmResource::Opportunity, &error);

        assert!(!result.is_success());
        assert_eq!(result.subject_id(), None);
        match result {
            SyncResult::Failure { payload, message, .. } => {
                assert_eq!(payload["body"], json!({"error": "invalid stage"}));
                assert_eq!(payload["status"], json!(500));
                assert!(message.contains("500"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn payload_descriptions_match_user_facing_copy() {
        assert_eq!(SyncPayload::NoContent.describe(), "Update successful (No Content)");
        assert_eq!(
            SyncPayload::NoBody { status: 200 }.describe(),
            "Request successful with status 200, but no response body."
        );
    }

    #[test]
    fn success_serializes_with_status_tag() {
        let result = SyncResult::Success {
            resource: CrmResource::Asset,
            subject_id: "XX_Q100".to_string(),
            payload: SyncPayload::NoContent,
        };
        let value = serde_json::to_value(&result).expect("serializable");
        assert_eq!(value["status"], "success");
        assert_eq!(value["subject_id"], "XX_Q100");
        assert_eq!(value["payload"]["kind"], "no_content");
    }
}
