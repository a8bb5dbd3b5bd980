use crate::domain::record::FieldKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    Date,
    Amount,
    Flag,
    PaymentMethod,
    PaymentTerm,
}

/// One entry of the record schema: the form key, its CRM API name, and accepted aliases.
#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub key: FieldKey,
    pub name: &'static str,
    pub api_name: &'static str,
    pub aliases: &'static [&'static str],
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn matches(&self, raw: &str) -> bool {
        raw == self.name || raw == self.api_name || self.aliases.contains(&raw)
    }
}

const fn field(
    key: FieldKey,
    name: &'static str,
    api_name: &'static str,
    aliases: &'static [&'static str],
    kind: FieldKind,
) -> FieldSpec {
    FieldSpec { key, name, api_name, aliases, kind }
}

pub const FIELD_CATALOG: &[FieldSpec] = &[
    field(FieldKey::OperationId, "operationId", "idFullOperation", &[], FieldKind::Text),
    field(FieldKey::ExternalId, "externalId", "IdExternal__c", &["external_id"], FieldKind::Text),
    field(FieldKey::Name, "name", "Name", &[], FieldKind::Text),
    field(FieldKey::IsoCode, "isoCode", "ISOCode__c", &[], FieldKind::Text),
    field(FieldKey::RecordTypeName, "recordTypeName", "RecordType.Name", &[], FieldKind::Text),
    field(FieldKey::IsSelected, "isSelected", "IsSelected__c", &[], FieldKind::Flag),
    field(FieldKey::FirstName, "firstName", "FirstName", &["first_name"], FieldKind::Text),
    field(FieldKey::LastName, "lastName", "LastName", &["last_name"], FieldKind::Text),
    field(FieldKey::Birthdate, "birthdate", "Birthdate", &["birth_date"], FieldKind::Date),
    field(FieldKey::MobilePhone, "mobilePhone", "MobilePhone", &["mobile_phone"], FieldKind::Text),
    field(FieldKey::Phone, "phone", "Phone", &[], FieldKind::Text),
    field(FieldKey::Email, "email", "Email", &[], FieldKind::Email),
    field(
        FieldKey::EffectiveDate,
        "effectiveDate",
        "EffectiveDate__c",
        &["effective_date"],
        FieldKind::Date,
    ),
    field(
        FieldKey::ExpirationDate,
        "expirationDate",
        "ExpirationDate__c",
        &["expiration_date"],
        FieldKind::Date,
    ),
    field(FieldKey::NetPremium, "netPremium", "NetPremium__c", &["net_premium"], FieldKind::Amount),
    field(
        FieldKey::PaymentMethod,
        "paymentMethod",
        "PaymentMethod__c",
        &["payment_method"],
        FieldKind::PaymentMethod,
    ),
    field(
        FieldKey::PaymentTerm,
        "paymentTerm",
        "PaymentTerm__c",
        &["payment_term"],
        FieldKind::PaymentTerm,
    ),
    field(
        FieldKey::OpportunityId,
        "opportunityId",
        "OpportunityId__c",
        &["opportunity_id"],
        FieldKind::Text,
    ),
    field(FieldKey::AccountId, "accountId", "AccountId", &["account_id"], FieldKind::Text),
    field(
        FieldKey::IntermediaryInternalId,
        "intermediaryInternalId",
        "AccountRoleIntermediaryId__r.IdInternal__c",
        &[],
        FieldKind::Text,
    ),
    field(FieldKey::IssueDate, "issueDate", "IssueDate__c", &[], FieldKind::Date),
    field(FieldKey::DueDate, "dueDate", "DueDate__c", &[], FieldKind::Date),
    field(FieldKey::TotalPremium, "totalPremium", "TotalPremium__c", &[], FieldKind::Amount),
    field(
        FieldKey::TotalPremiumFactured,
        "totalPremiumFactured",
        "TotalPremiumFactured__c",
        &[],
        FieldKind::Amount,
    ),
    field(FieldKey::Commission, "commission", "Commission__c", &[], FieldKind::Amount),
    field(FieldKey::Taxes, "taxes", "Taxes__c", &[], FieldKind::Amount),
    field(
        FieldKey::PaymentPeriodicity,
        "paymentPeriodicity",
        "PaymentPeriodicity__c",
        &[],
        FieldKind::Text,
    ),
    field(FieldKey::BusinessLine, "businessLine", "BusinessLine__c", &[], FieldKind::Text),
    field(FieldKey::Branch, "branch", "Branch__c", &[], FieldKind::Text),
    field(FieldKey::CloseDate, "closeDate", "CloseDate", &["close_date"], FieldKind::Date),
    field(FieldKey::Amount, "amount", "Amount", &[], FieldKind::Amount),
    field(
        FieldKey::PolicyNumber,
        "policyNumber",
        "PolicyNumber__c",
        &["policy_number"],
        FieldKind::Text,
    ),
];

pub fn spec_for(key: FieldKey) -> &'static FieldSpec {
    FIELD_CATALOG
        .iter()
        .find(|spec| spec.key == key)
        .unwrap_or(&FIELD_CATALOG[0])
}

pub fn resolve(raw_key: &str) -> Option<&'static FieldSpec> {
    let raw_key = raw_key.trim();
    FIELD_CATALOG.iter().find(|spec| spec.matches(raw_key))
}
