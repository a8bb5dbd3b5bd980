use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::record::{
    FieldKey, OpportunityClose, PaymentMethod, PaymentTerm, PersonalDetails, QuotationTerms,
};
use crate::flows::WizardStep;
use crate::schema::catalog::{resolve, spec_for};

/// Raw field values exactly as the view submitted them.
pub type RawFields = Map<String, Value>;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub reason: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { field: field.into(), reason: reason.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{} field(s) failed validation: {}", issues.len(), summarize(issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

fn summarize(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("{} {}", issue.field, issue.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn new(issues: Vec<FieldIssue>) -> Self {
        Self { issues }
    }

    pub fn has_issue_for(&self, field: &str) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }
}

/// Typed input of one wizard step after validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepSubmission {
    PersonalDetails(PersonalDetails),
    Quotation(QuotationTerms),
    Emission(OpportunityClose),
}

pub fn validate_step(step: WizardStep, raw: &RawFields) -> Result<StepSubmission, ValidationError> {
    match step {
        WizardStep::PersonalDetails => {
            validate_personal_details(raw).map(StepSubmission::PersonalDetails)
        }
        WizardStep::Quotation => validate_quotation(raw).map(StepSubmission::Quotation),
        WizardStep::Emission => validate_emission(raw).map(StepSubmission::Emission),
        WizardStep::Confirmation => {
            Err(ValidationError::new(vec![FieldIssue::new("step", "accepts no input")]))
        }
    }
}

pub fn validate_personal_details(raw: &RawFields) -> Result<PersonalDetails, ValidationError> {
    let mut reader = FieldReader::new(raw);
    let first_name = reader.required_text(FieldKey::FirstName);
    let last_name = reader.required_text(FieldKey::LastName);
    let birthdate = reader.required_date(FieldKey::Birthdate);
    let mobile_phone = reader.required_text(FieldKey::MobilePhone);
    let phone = reader.optional_text(FieldKey::Phone);
    let email = reader.required_email(FieldKey::Email);

    match (first_name, last_name, birthdate, mobile_phone, email) {
        (Some(first_name), Some(last_name), Some(birthdate), Some(mobile_phone), Some(email))
            if reader.is_clean() =>
        {
            Ok(PersonalDetails { first_name, last_name, birthdate, mobile_phone, phone, email })
        }
        _ => Err(reader.into_error()),
    }
}

pub fn validate_quotation(raw: &RawFields) -> Result<QuotationTerms, ValidationError> {
    let mut reader = FieldReader::new(raw);
    let external_id = reader.required_text(FieldKey::ExternalId);
    let effective_date = reader.required_date(FieldKey::EffectiveDate);
    let expiration_date = reader.required_date(FieldKey::ExpirationDate);
    let net_premium = reader.required_amount(FieldKey::NetPremium, AmountBound::NonNegative);
    let payment_method = reader.required_code(FieldKey::PaymentMethod, PaymentMethod::from_code);
    let payment_term = reader.required_code(FieldKey::PaymentTerm, PaymentTerm::from_code);
    let opportunity_id = reader.optional_text(FieldKey::OpportunityId);
    let account_id = reader.optional_text(FieldKey::AccountId);

    match (external_id, effective_date, expiration_date, net_premium, payment_method, payment_term)
    {
        (
            Some(external_id),
            Some(effective_date),
            Some(expiration_date),
            Some(net_premium),
            Some(payment_method),
            Some(payment_term),
        ) if reader.is_clean() => Ok(QuotationTerms {
            external_id,
            effective_date,
            expiration_date,
            net_premium,
            payment_method,
            payment_term,
            opportunity_id,
            account_id,
        }),
        _ => Err(reader.into_error()),
    }
}

pub fn validate_emission(raw: &RawFields) -> Result<OpportunityClose, ValidationError> {
    let mut reader = FieldReader::new(raw);
    let close_date = reader.required_date(FieldKey::CloseDate);
    let amount = reader.required_amount(FieldKey::Amount, AmountBound::Positive);
    let policy_number = reader.required_text(FieldKey::PolicyNumber);

    match (close_date, amount, policy_number) {
        (Some(close_date), Some(amount), Some(policy_number)) if reader.is_clean() => {
            Ok(OpportunityClose { close_date, amount, policy_number })
        }
        _ => Err(reader.into_error()),
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw).ok().or_else(|| Decimal::from_scientific(raw).ok())
}

pub fn is_email(raw: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(raw))
}

#[derive(Clone, Copy)]
enum AmountBound {
    NonNegative,
    Positive,
}

/// Reads typed fields out of raw input, collecting every issue instead of stopping at the first.
struct FieldReader<'a> {
    raw: &'a RawFields,
    issues: Vec<FieldIssue>,
}

impl<'a> FieldReader<'a> {
    fn new(raw: &'a RawFields) -> Self {
        Self { raw, issues: Vec::new() }
    }

    fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    fn into_error(self) -> ValidationError {
        ValidationError::new(self.issues)
    }

    fn flag(&mut self, key: FieldKey, reason: &str) {
        self.issues.push(FieldIssue::new(spec_for(key).name, reason));
    }

    fn lookup(&self, key: FieldKey) -> Option<&'a Value> {
        self.raw
            .iter()
            .find(|(raw_key, _)| resolve(raw_key).is_some_and(|spec| spec.key == key))
            .map(|(_, value)| value)
    }

    /// Empty strings and nulls count as absent.
    fn text(&mut self, key: FieldKey) -> Option<String> {
        match self.lookup(key)? {
            Value::Null => None,
            Value::String(value) => {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(value) => Some(value.to_string()),
            Value::Bool(value) => Some(value.to_string()),
            Value::Array(_) | Value::Object(_) => {
                self.flag(key, "must be a string");
                None
            }
        }
    }

    fn optional_text(&mut self, key: FieldKey) -> Option<String> {
        self.text(key)
    }

    fn required_text(&mut self, key: FieldKey) -> Option<String> {
        let issues_before = self.issues.len();
        let value = self.text(key);
        if value.is_none() && self.issues.len() == issues_before {
            self.flag(key, "is required");
        }
        value
    }

    fn required_email(&mut self, key: FieldKey) -> Option<String> {
        let value = self.required_text(key)?;
        if is_email(&value) {
            Some(value)
        } else {
            self.flag(key, "must be a valid email address");
            None
        }
    }

    fn required_date(&mut self, key: FieldKey) -> Option<NaiveDate> {
        let value = self.required_text(key)?;
        let parsed = parse_date(&value);
        if parsed.is_none() {
            self.flag(key, "must be a date in YYYY-MM-DD format");
        }
        parsed
    }

    fn required_amount(&mut self, key: FieldKey, bound: AmountBound) -> Option<Decimal> {
        let value = self.required_text(key)?;
        let Some(amount) = parse_decimal(&value) else {
            self.flag(key, "must be a number");
            return None;
        };
        match bound {
            AmountBound::NonNegative if amount < Decimal::ZERO => {
                self.flag(key, "must be zero or greater");
                None
            }
            AmountBound::Positive if amount <= Decimal::ZERO => {
                self.flag(key, "must be greater than zero");
                None
            }
            _ => Some(amount),
        }
    }

    fn required_code<T>(&mut self, key: FieldKey, lookup: fn(&str) -> Option<T>) -> Option<T> {
        let value = self.required_text(key)?;
        let parsed = lookup(&value);
        if parsed.is_none() {
            self.flag(key, "must be one of 01|02|03");
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    use super::{
        validate_emission, validate_personal_details, validate_quotation, validate_step, RawFields,
        StepSubmission,
    };
    use crate::domain::record::{PaymentMethod, PaymentTerm};
    use crate::flows::WizardStep;

    fn raw(value: Value) -> RawFields {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn personal_details_accept_minimal_input() {
        let details = validate_personal_details(&raw(json!({
            "firstName": "Ana",
            "lastName": "Diaz",
            "birthdate": "1990-01-01",
            "mobilePhone": "555-1234",
            "email": "a@b.com",
        })))
        .expect("valid personal details");

        assert_eq!(details.first_name, "Ana");
        assert_eq!(details.phone, None);
        assert_eq!(details.birthdate.to_string(), "1990-01-01");
    }

    #[test]
    fn personal_details_report_every_failing_field() {
        let error = validate_personal_details(&raw(json!({
            "firstName": "",
            "birthdate": "01/01/1990",
            "mobilePhone": "555",
            "phone": "",
            "email": "not-an-email",
        })))
        .expect_err("invalid input");

        assert!(error.has_issue_for("firstName"));
        assert!(error.has_issue_for("lastName"));
        assert!(error.has_issue_for("birthdate"));
        assert!(error.has_issue_for("email"));
        assert!(!error.has_issue_for("phone"));
        assert_eq!(error.issues.len(), 4);
    }

    #[test]
    fn quotation_coerces_numeric_strings_and_codes() {
        let terms = validate_quotation(&raw(json!({
            "externalId": "Q100",
            "effectiveDate": "2025-01-01",
            "expirationDate": "2026-01-01",
            "netPremium": "1200.50",
            "paymentMethod": "02",
            "paymentTerm": "03",
            "opportunityId": "",
        })))
        .expect("valid quotation");

        assert_eq!(terms.net_premium, Decimal::new(120050, 2));
        assert_eq!(terms.payment_method, PaymentMethod::BankTransfer);
        assert_eq!(terms.payment_term, PaymentTerm::ThirtySixMonths);
        assert_eq!(terms.opportunity_id, None);
    }

    #[test]
    fn quotation_accepts_zero_premium_but_rejects_negative() {
        let base = json!({
            "externalId": "Q100",
            "effectiveDate": "2025-01-01",
            "expirationDate": "2026-01-01",
            "paymentMethod": "01",
            "paymentTerm": "01",
        });

        let mut zero = raw(base.clone());
        zero.insert("netPremium".to_string(), json!(0));
        assert!(validate_quotation(&zero).is_ok());

        let mut negative = raw(base);
        negative.insert("netPremium".to_string(), json!(-5));
        let error = validate_quotation(&negative).expect_err("negative premium");
        assert_eq!(error.issues[0].reason, "must be zero or greater");
    }

    #[test]
    fn quotation_rejects_unknown_payment_codes() {
        let error = validate_quotation(&raw(json!({
            "externalId": "Q100",
            "effectiveDate": "2025-01-01",
            "expirationDate": "2026-01-01",
            "netPremium": 10,
            "paymentMethod": "09",
            "paymentTerm": "01",
        })))
        .expect_err("unknown code");

        assert_eq!(error.issues.len(), 1);
        assert_eq!(error.issues[0].field, "paymentMethod");
    }

    #[test]
    fn emission_requires_positive_amount() {
        let error = validate_emission(&raw(json!({
            "closeDate": "2025-02-01",
            "amount": 0,
            "policyNumber": "POL-999",
        })))
        .expect_err("zero amount");
        assert_eq!(error.issues[0].reason, "must be greater than zero");

        let close = validate_emission(&raw(json!({
            "CloseDate": "2025-02-01",
            "Amount": 1200,
            "PolicyNumber__c": "POL-999",
        })))
        .expect("api names are accepted");
        assert_eq!(close.amount, Decimal::new(1200, 0));
    }

    #[test]
    fn confirmation_step_takes_no_input() {
        let error = validate_step(WizardStep::Confirmation, &RawFields::new())
            .expect_err("confirmation has no form");
        assert!(error.has_issue_for("step"));
    }

    #[test]
    fn validate_step_dispatches_by_step() {
        let submission = validate_step(
            WizardStep::Emission,
            &raw(json!({"closeDate": "2025-02-01", "amount": "1200", "policyNumber": "POL-1"})),
        )
        .expect("valid emission");
        assert!(matches!(submission, StepSubmission::Emission(_)));
    }
}
