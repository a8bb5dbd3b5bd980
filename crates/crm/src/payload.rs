use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use quoteflow_core::domain::record::{
    OpportunityClose, PaymentMethod, PaymentTerm, QuotationRecord, ISO_CODE, RECORD_TYPE_NAME,
};

/// Stage every emitted opportunity is moved to.
pub const EMITTED_STAGE: &str = "06";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecordTypeRef {
    #[serde(rename = "Name")]
    pub name: &'static str,
}

/// Asset upsert body. Only these fields are ever sent; absent values are omitted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssetPayload<'a> {
    #[serde(rename = "IdExternal__c")]
    pub id_external: &'a str,
    #[serde(rename = "Name")]
    pub name: &'a str,
    #[serde(rename = "EffectiveDate__c", skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<NaiveDate>,
    #[serde(rename = "ExpirationDate__c", skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<NaiveDate>,
    #[serde(
        rename = "NetPremium__c",
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub net_premium: Option<Decimal>,
    #[serde(rename = "PaymentMethod__c", skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(rename = "PaymentTerm__c", skip_serializing_if = "Option::is_none")]
    pub payment_term: Option<PaymentTerm>,
    #[serde(rename = "RecordType")]
    pub record_type: RecordTypeRef,
    #[serde(rename = "ISOCode__c")]
    pub iso_code: &'static str,
    #[serde(rename = "OpportunityId__c", skip_serializing_if = "Option::is_none")]
    pub opportunity_id: Option<&'a str>,
    #[serde(rename = "AccountId", skip_serializing_if = "Option::is_none")]
    pub account_id: Option<&'a str>,
}

impl<'a> AssetPayload<'a> {
    /// `Name` mirrors the external id; record type and ISO code are always the constants.
    pub fn from_record(record: &'a QuotationRecord, external_id: &'a str) -> Self {
        Self {
            id_external: external_id,
            name: external_id,
            effective_date: record.effective_date,
            expiration_date: record.expiration_date,
            net_premium: record.net_premium,
            payment_method: record.payment_method,
            payment_term: record.payment_term,
            record_type: RecordTypeRef { name: RECORD_TYPE_NAME },
            iso_code: ISO_CODE,
            opportunity_id: record.opportunity_id.as_deref(),
            account_id: record.account_id.as_deref(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OpportunityPayload<'a> {
    #[serde(rename = "CloseDate")]
    pub close_date: NaiveDate,
    #[serde(rename = "Amount", with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "PolicyNumber__c")]
    pub policy_number: &'a str,
    #[serde(rename = "StageName")]
    pub stage_name: &'static str,
}

impl<'a> OpportunityPayload<'a> {
    pub fn from_close(close: &'a OpportunityClose) -> Self {
        Self {
            close_date: close.close_date,
            amount: close.amount,
            policy_number: &close.policy_number,
            stage_name: EMITTED_STAGE,
        }
    }
}
