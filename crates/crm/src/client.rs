use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use quoteflow_core::config::SalesforceConfig;
use quoteflow_core::domain::record::{OpportunityClose, QuotationRecord};
use quoteflow_core::domain::sync::{CrmResource, RecordSync, SyncResult};
use quoteflow_core::errors::{SyncError, UpstreamBody};

use crate::payload::{AssetPayload, OpportunityPayload};
use crate::response::{normalize, SubjectStrategy};
use crate::token::{acquire_token, AuthToken};
use crate::transport::{HttpReply, HttpTransport, ReqwestTransport, TransportError};

/// Salesforce REST implementation of [`RecordSync`]. Every call fetches its own token.
pub struct SalesforceSync<T = ReqwestTransport> {
    transport: T,
    config: SalesforceConfig,
}

impl SalesforceSync<ReqwestTransport> {
    pub fn from_config(config: &SalesforceConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::new(transport, config.clone()))
    }
}

impl<T> SalesforceSync<T>
where
    T: HttpTransport,
{
    pub fn new(transport: T, config: SalesforceConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &SalesforceConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn acquire_token(&self) -> Result<AuthToken, SyncError> {
        acquire_token(&self.transport, &self.config).await
    }

    fn sobject_url(&self, token: &AuthToken, path: &str) -> String {
        format!("{}/services/data/{}/sobjects/{path}", token.base_url(), self.config.api_version)
    }

    async fn patch<P>(
        &self,
        resource: CrmResource,
        url: &str,
        token: &AuthToken,
        payload: &P,
    ) -> Result<HttpReply, SyncError>
    where
        P: Serialize + Sync,
    {
        let body = serde_json::to_string(payload).map_err(|error| SyncError::Upstream {
            resource,
            status: None,
            body: UpstreamBody::Transport(format!("could not encode payload: {error}")),
        })?;

        let reply = self.transport.patch_json(url, token.bearer(), body).await.map_err(
            |error| SyncError::Upstream {
                resource,
                status: None,
                body: match error {
                    TransportError::Timeout { after_secs } => UpstreamBody::Timeout { after_secs },
                    TransportError::Network(message) => UpstreamBody::Transport(message),
                },
            },
        )?;

        info!(
            event_name = "crm.patch.completed",
            resource = resource.as_str(),
            status = reply.status,
            "salesforce patch completed"
        );
        Ok(reply)
    }
}

fn required<'a>(
    value: Option<&'a str>,
    resource: CrmResource,
    field: &'static str,
) -> Result<&'a str, SyncError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(SyncError::MissingKey { resource, field })
}

#[async_trait]
impl<T> RecordSync for SalesforceSync<T>
where
    T: HttpTransport,
{
    async fn update_quotation(&self, record: &QuotationRecord) -> Result<SyncResult, SyncError> {
        let resource = CrmResource::Asset;
        let external_id = required(record.external_id.as_deref(), resource, "IdExternal__c")?;
        required(Some(record.iso_code.as_str()), resource, "ISOCode__c")?;
        let internal_id =
            record.internal_id().ok_or(SyncError::MissingKey { resource, field: "IdExternal__c" })?;

        let token = self.acquire_token().await?;
        let url = self.sobject_url(&token, &format!("Asset/IdInternal__c/{internal_id}"));
        let payload = AssetPayload::from_record(record, external_id);
        let reply = self.patch(resource, &url, &token, &payload).await?;

        normalize(resource, SubjectStrategy::FromBodyOr(&internal_id), reply)
    }

    async fn update_opportunity(
        &self,
        record: &QuotationRecord,
        close: &OpportunityClose,
    ) -> Result<SyncResult, SyncError> {
        let resource = CrmResource::Opportunity;
        let opportunity_id =
            required(record.opportunity_id.as_deref(), resource, "OpportunityId__c")?;

        let token = self.acquire_token().await?;
        let url = self.sobject_url(&token, &format!("Opportunity/{opportunity_id}"));
        let payload = OpportunityPayload::from_close(close);
        let reply = self.patch(resource, &url, &token, &payload).await?;

        normalize(resource, SubjectStrategy::Fixed(opportunity_id), reply)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    use quoteflow_core::domain::record::{
        OpportunityClose, PaymentMethod, PaymentTerm, QuotationRecord,
    };
    use quoteflow_core::domain::sync::{CrmResource, RecordSync, SyncPayload, SyncResult};
    use quoteflow_core::errors::{SyncError, UpstreamBody};

    use super::SalesforceSync;
    use crate::testing::{sample_config, token_reply, Recorded, ScriptedTransport};
    use crate::transport::{HttpReply, TransportError};

    fn quotation_record() -> QuotationRecord {
        QuotationRecord {
            external_id: Some("Q100".to_string()),
            effective_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            expiration_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            net_premium: Some(Decimal::new(1200, 0)),
            payment_method: Some(PaymentMethod::CreditCard),
            payment_term: Some(PaymentTerm::TwelveMonths),
            opportunity_id: Some("006ABC".to_string()),
            ..QuotationRecord::default()
        }
    }

    fn close() -> OpportunityClose {
        OpportunityClose {
            close_date: NaiveDate::from_ymd_opt(2025, 2, 1).expect("valid date"),
            amount: Decimal::new(1200, 0),
            policy_number: "POL-999".to_string(),
        }
    }

    fn client(replies: Vec<Result<HttpReply, TransportError>>) -> SalesforceSync<ScriptedTransport> {
        SalesforceSync::new(ScriptedTransport::new(replies), sample_config())
    }

    #[tokio::test]
    async fn quotation_without_external_id_makes_no_calls() {
        let sync = client(Vec::new());
        let record = QuotationRecord { external_id: None, ..quotation_record() };

        let error = sync.update_quotation(&record).await.expect_err("missing key");

        assert_eq!(
            error,
            SyncError::MissingKey { resource: CrmResource::Asset, field: "IdExternal__c" }
        );
        assert!(sync.transport().calls().is_empty());
    }

    #[tokio::test]
    async fn opportunity_without_id_makes_no_calls() {
        let sync = client(Vec::new());
        let record = QuotationRecord { opportunity_id: Some(" ".to_string()), ..quotation_record() };

        let error = sync.update_opportunity(&record, &close()).await.expect_err("missing key");

        assert!(matches!(error, SyncError::MissingKey { resource: CrmResource::Opportunity, .. }));
        assert!(sync.transport().calls().is_empty());
    }

    #[tokio::test]
    async fn rejected_login_never_patches() {
        let sync = client(vec![
            Ok(HttpReply::new(401, "bad credentials")),
            Ok(HttpReply::new(401, "bad credentials")),
        ]);

        let quotation = sync.update_quotation(&quotation_record()).await.expect_err("auth");
        let opportunity =
            sync.update_opportunity(&quotation_record(), &close()).await.expect_err("auth");

        assert!(quotation.is_auth());
        assert!(opportunity.is_auth());
        assert!(sync
            .transport()
            .calls()
            .iter()
            .all(|call| matches!(call, Recorded::Form { .. })));
    }

    #[tokio::test]
    async fn asset_patch_targets_the_internal_key() {
        let sync = client(vec![token_reply(), Ok(HttpReply::new(204, ""))]);

        let result = sync.update_quotation(&quotation_record()).await.expect("synced");

        assert_eq!(
            result,
            SyncResult::Success {
                resource: CrmResource::Asset,
                subject_id: "XX_Q100".to_string(),
                payload: SyncPayload::NoContent,
            }
        );
        match sync.transport().calls().as_slice() {
            [Recorded::Form { .. }, Recorded::Patch { url, bearer, body }] => {
                assert_eq!(
                    url,
                    "https://instance.example.com/services/data/v59.0/sobjects/Asset/IdInternal__c/XX_Q100"
                );
                assert_eq!(bearer, "token-123");
                let body: Value = serde_json::from_str(body).expect("json body");
                assert_eq!(body["Name"], "Q100");
                assert_eq!(body["RecordType"], json!({"Name": "XX Quotation"}));
            }
            other => panic!("unexpected calls: {other:?}"),
        }
    }

    #[tokio::test]
    async fn asset_subject_comes_from_body_id() {
        let sync = client(vec![token_reply(), Ok(HttpReply::new(200, r#"{"id":"XYZ123"}"#))]);
        let result = sync.update_quotation(&quotation_record()).await.expect("synced");
        assert_eq!(result.subject_id(), Some("XYZ123"));
    }

    #[tokio::test]
    async fn asset_unparsable_reply_is_a_parse_error() {
        let sync = client(vec![token_reply(), Ok(HttpReply::new(200, "not-json"))]);
        let error = sync.update_quotation(&quotation_record()).await.expect_err("parse error");
        assert!(error.is_parse_error());
        assert!(error.to_string().contains("not-json"));
    }

    #[tokio::test]
    async fn identical_opportunity_updates_send_identical_bodies() {
        let sync = client(vec![
            token_reply(),
            Ok(HttpReply::new(204, "")),
            token_reply(),
            Ok(HttpReply::new(204, "")),
        ]);

        sync.update_opportunity(&quotation_record(), &close()).await.expect("first");
        sync.update_opportunity(&quotation_record(), &close()).await.expect("second");

        let bodies: Vec<String> = sync
            .transport()
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Recorded::Patch { body, .. } => Some(body),
                Recorded::Form { .. } => None,
            })
            .collect();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0], bodies[1]);
        assert!(bodies[0].contains(r#""StageName":"06""#));
    }

    #[tokio::test]
    async fn patch_timeout_is_an_upstream_timeout() {
        let sync = client(vec![token_reply(), Err(TransportError::Timeout { after_secs: 30 })]);
        let error =
            sync.update_opportunity(&quotation_record(), &close()).await.expect_err("timeout");
        assert_eq!(
            error,
            SyncError::Upstream {
                resource: CrmResource::Opportunity,
                status: None,
                body: UpstreamBody::Timeout { after_secs: 30 },
            }
        );
    }
}
