use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::operation::OperationId;

/// Country code stamped on every quotation; part of the asset upsert key.
pub const ISO_CODE: &str = "XX";
pub const RECORD_TYPE_NAME: &str = "XX Quotation";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "01")]
    CreditCard,
    #[serde(rename = "02")]
    BankTransfer,
    #[serde(rename = "03")]
    Paypal,
}

impl PaymentMethod {
    pub const ALL: [Self; 3] = [Self::CreditCard, Self::BankTransfer, Self::Paypal];

    pub fn from_code(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.code() == raw.trim())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::CreditCard => "01",
            Self::BankTransfer => "02",
            Self::Paypal => "03",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::CreditCard => "Credit card",
            Self::BankTransfer => "Bank transfer",
            Self::Paypal => "PayPal",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentTerm {
    #[serde(rename = "01")]
    TwelveMonths,
    #[serde(rename = "02")]
    FourteenMonths,
    #[serde(rename = "03")]
    ThirtySixMonths,
}

impl PaymentTerm {
    pub const ALL: [Self; 3] = [Self::TwelveMonths, Self::FourteenMonths, Self::ThirtySixMonths];

    pub fn from_code(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|term| term.code() == raw.trim())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::TwelveMonths => "01",
            Self::FourteenMonths => "02",
            Self::ThirtySixMonths => "03",
        }
    }

    pub fn months(&self) -> u32 {
        match self {
            Self::TwelveMonths => 12,
            Self::FourteenMonths => 14,
            Self::ThirtySixMonths => 36,
        }
    }
}

/// Identifies one settable field of [`QuotationRecord`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKey {
    OperationId,
    ExternalId,
    Name,
    IsoCode,
    RecordTypeName,
    IsSelected,
    FirstName,
    LastName,
    Birthdate,
    MobilePhone,
    Phone,
    Email,
    EffectiveDate,
    ExpirationDate,
    NetPremium,
    PaymentMethod,
    PaymentTerm,
    OpportunityId,
    AccountId,
    IntermediaryInternalId,
    IssueDate,
    DueDate,
    TotalPremium,
    TotalPremiumFactured,
    Commission,
    Taxes,
    PaymentPeriodicity,
    BusinessLine,
    Branch,
    CloseDate,
    Amount,
    PolicyNumber,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    Amount(Decimal),
    Flag(bool),
    PaymentMethod(PaymentMethod),
    PaymentTerm(PaymentTerm),
}

/// Cumulative wizard state. Everything is optional until the step that requires it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationRecord {
    pub operation_id: Option<OperationId>,
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub iso_code: String,
    pub record_type_name: String,
    pub is_selected: bool,

    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub mobile_phone: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,

    pub effective_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub net_premium: Option<Decimal>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_term: Option<PaymentTerm>,

    pub opportunity_id: Option<String>,
    pub account_id: Option<String>,
    pub intermediary_internal_id: Option<String>,

    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub total_premium: Option<Decimal>,
    pub total_premium_factured: Option<Decimal>,
    pub commission: Option<Decimal>,
    pub taxes: Option<Decimal>,
    pub payment_periodicity: Option<String>,
    pub business_line: Option<String>,
    pub branch: Option<String>,

    pub close_date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub policy_number: Option<String>,

    /// Prefill keys with no typed home, kept verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Default for QuotationRecord {
    fn default() -> Self {
        Self {
            operation_id: None,
            external_id: None,
            name: None,
            iso_code: ISO_CODE.to_string(),
            record_type_name: RECORD_TYPE_NAME.to_string(),
            is_selected: true,
            first_name: None,
            last_name: None,
            birthdate: None,
            mobile_phone: None,
            phone: None,
            email: None,
            effective_date: None,
            expiration_date: None,
            net_premium: None,
            payment_method: None,
            payment_term: None,
            opportunity_id: None,
            account_id: None,
            intermediary_internal_id: None,
            issue_date: None,
            due_date: None,
            total_premium: None,
            total_premium_factured: None,
            commission: None,
            taxes: None,
            payment_periodicity: None,
            business_line: None,
            branch: None,
            close_date: None,
            amount: None,
            policy_number: None,
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalDetails {
    pub first_name: String,
    pub last_name: String,
    pub birthdate: NaiveDate,
    pub mobile_phone: String,
    pub phone: Option<String>,
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationTerms {
    pub external_id: String,
    pub effective_date: NaiveDate,
    pub expiration_date: NaiveDate,
    pub net_premium: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_term: PaymentTerm,
    pub opportunity_id: Option<String>,
    pub account_id: Option<String>,
}

/// Fields written onto the opportunity when the policy is emitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityClose {
    pub close_date: NaiveDate,
    pub amount: Decimal,
    pub policy_number: String,
}

/// Values offered to the emission step before the user edits them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissionDefaults {
    pub close_date: NaiveDate,
    pub amount: Decimal,
    pub policy_number: String,
}

impl QuotationRecord {
    /// Asset upsert key `{iso}_{external}`, derived on demand and never stored.
    pub fn internal_id(&self) -> Option<String> {
        let iso_code = self.iso_code.trim();
        let external_id = self.external_id.as_deref().map(str::trim).unwrap_or_default();
        if iso_code.is_empty() || external_id.is_empty() {
            return None;
        }
        Some(format!("{iso_code}_{external_id}"))
    }

    pub fn ensure_operation_id(&mut self) -> &OperationId {
        self.operation_id.get_or_insert_with(OperationId::generate)
    }

    pub fn merge_personal_details(&mut self, details: PersonalDetails) {
        self.first_name = Some(details.first_name);
        self.last_name = Some(details.last_name);
        self.birthdate = Some(details.birthdate);
        self.mobile_phone = Some(details.mobile_phone);
        self.phone = details.phone;
        self.email = Some(details.email);
    }

    /// Merges the quotation step and stamps the constants the asset expects.
    pub fn merge_quotation_terms(&mut self, terms: QuotationTerms) {
        self.name = Some(terms.external_id.clone());
        self.external_id = Some(terms.external_id);
        self.effective_date = Some(terms.effective_date);
        self.expiration_date = Some(terms.expiration_date);
        self.net_premium = Some(terms.net_premium);
        self.payment_method = Some(terms.payment_method);
        self.payment_term = Some(terms.payment_term);
        if let Some(opportunity_id) = terms.opportunity_id {
            self.opportunity_id = Some(opportunity_id);
        }
        if let Some(account_id) = terms.account_id {
            self.account_id = Some(account_id);
        }
        self.iso_code = ISO_CODE.to_string();
        self.record_type_name = RECORD_TYPE_NAME.to_string();
        self.is_selected = true;
    }

    pub fn merge_opportunity_close(&mut self, close: &OpportunityClose) {
        self.close_date = Some(close.close_date);
        self.amount = Some(close.amount);
        self.policy_number = Some(close.policy_number.clone());
    }

    pub fn emission_defaults(&self, today: NaiveDate) -> EmissionDefaults {
        EmissionDefaults {
            close_date: self.issue_date.unwrap_or(today),
            amount: self.net_premium.unwrap_or(Decimal::ZERO),
            policy_number: self.external_id.clone().unwrap_or_default(),
        }
    }

    /// Returns `false` when the value kind does not fit the field.
    pub fn set_field(&mut self, key: FieldKey, value: FieldValue) -> bool {
        use FieldValue::{Amount, Date, Flag, Text};

        match (key, value) {
            (FieldKey::OperationId, Text(v)) => self.operation_id = Some(OperationId(v)),
            (FieldKey::ExternalId, Text(v)) => self.external_id = Some(v),
            (FieldKey::Name, Text(v)) => self.name = Some(v),
            (FieldKey::IsoCode, Text(v)) => self.iso_code = v,
            (FieldKey::RecordTypeName, Text(v)) => self.record_type_name = v,
            (FieldKey::IsSelected, Flag(v)) => self.is_selected = v,
            (FieldKey::FirstName, Text(v)) => self.first_name = Some(v),
            (FieldKey::LastName, Text(v)) => self.last_name = Some(v),
            (FieldKey::Birthdate, Date(v)) => self.birthdate = Some(v),
            (FieldKey::MobilePhone, Text(v)) => self.mobile_phone = Some(v),
            (FieldKey::Phone, Text(v)) => self.phone = Some(v),
            (FieldKey::Email, Text(v)) => self.email = Some(v),
            (FieldKey::EffectiveDate, Date(v)) => self.effective_date = Some(v),
            (FieldKey::ExpirationDate, Date(v)) => self.expiration_date = Some(v),
            (FieldKey::NetPremium, Amount(v)) => self.net_premium = Some(v),
            (FieldKey::PaymentMethod, FieldValue::PaymentMethod(v)) => {
                self.payment_method = Some(v)
            }
            (FieldKey::PaymentTerm, FieldValue::PaymentTerm(v)) => self.payment_term = Some(v),
            (FieldKey::OpportunityId, Text(v)) => self.opportunity_id = Some(v),
            (FieldKey::AccountId, Text(v)) => self.account_id = Some(v),
            (FieldKey::IntermediaryInternalId, Text(v)) => self.intermediary_internal_id = Some(v),
            (FieldKey::IssueDate, Date(v)) => self.issue_date = Some(v),
            (FieldKey::DueDate, Date(v)) => self.due_date = Some(v),
            (FieldKey::TotalPremium, Amount(v)) => self.total_premium = Some(v),
            (FieldKey::TotalPremiumFactured, Amount(v)) => self.total_premium_factured = Some(v),
            (FieldKey::Commission, Amount(v)) => self.commission = Some(v),
            (FieldKey::Taxes, Amount(v)) => self.taxes = Some(v),
            (FieldKey::PaymentPeriodicity, Text(v)) => self.payment_periodicity = Some(v),
            (FieldKey::BusinessLine, Text(v)) => self.business_line = Some(v),
            (FieldKey::Branch, Text(v)) => self.branch = Some(v),
            (FieldKey::CloseDate, Date(v)) => self.close_date = Some(v),
            (FieldKey::Amount, Amount(v)) => self.amount = Some(v),
            (FieldKey::PolicyNumber, Text(v)) => self.policy_number = Some(v),
            _ => return false,
        }
        true
    }
}
