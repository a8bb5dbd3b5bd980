use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use tracing::warn;

use crate::domain::record::{FieldKey, FieldValue, PaymentMethod, PaymentTerm, QuotationRecord};
use crate::schema::catalog::{resolve, FieldKind, FieldSpec};
use crate::schema::validation::{parse_date, parse_decimal};

/// Premium keys that fall back to zero instead of being rejected.
const LENIENT_AMOUNT_KEYS: [&str; 5] =
    ["NetPremium__c", "TotalPremium__c", "Commission__c", "Taxes__c", "TotalPremiumFactured__c"];

const IS_SELECTED_KEY: &str = "IsSelected__c";

/// Builds the initial record from inbound query pairs.
///
/// Later duplicates win. Keys the catalog does not know are kept verbatim in `extra`.
pub fn prefill_record<I, K, V>(pairs: I) -> QuotationRecord
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut record = QuotationRecord::default();
    let mut is_selected_seen = false;

    for (key, value) in pairs {
        let (key, value) = (key.as_ref(), value.as_ref());

        if LENIENT_AMOUNT_KEYS.contains(&key) {
            let amount = leading_number(value).unwrap_or(Decimal::ZERO);
            if let Some(spec) = resolve(key) {
                record.set_field(spec.key, FieldValue::Amount(amount));
            }
            continue;
        }

        if key == IS_SELECTED_KEY {
            is_selected_seen = true;
            record.is_selected = value == "true";
            continue;
        }

        if key.eq_ignore_ascii_case("accountid") {
            record.account_id = Some(value.to_string());
            continue;
        }

        match resolve(key) {
            Some(spec) => apply_typed(&mut record, spec, key, value),
            None => {
                record.extra.insert(key.to_string(), value.to_string());
            }
        }
    }

    if !is_selected_seen {
        record.is_selected = true;
    }
    record
}

fn apply_typed(record: &mut QuotationRecord, spec: &FieldSpec, key: &str, value: &str) {
    if spec.key == FieldKey::OperationId && value.trim().is_empty() {
        return;
    }

    let typed = match spec.kind {
        FieldKind::Text | FieldKind::Email => Some(FieldValue::Text(value.to_string())),
        FieldKind::Date => parse_date(value).map(FieldValue::Date),
        FieldKind::Amount => parse_decimal(value).map(FieldValue::Amount),
        FieldKind::Flag => Some(FieldValue::Flag(value == "true")),
        FieldKind::PaymentMethod => PaymentMethod::from_code(value).map(FieldValue::PaymentMethod),
        FieldKind::PaymentTerm => PaymentTerm::from_code(value).map(FieldValue::PaymentTerm),
    };

    let accepted = typed.is_some_and(|typed| record.set_field(spec.key, typed));
    if !accepted {
        warn!(
            event_name = "prefill.value_untyped",
            field = spec.name,
            "prefill value does not fit the field type; keeping it verbatim"
        );
        record.extra.insert(key.to_string(), value.to_string());
    }
}

/// Leading decimal number of `raw`, ignoring trailing garbage (`"12.5abc"` reads as 12.5).
pub fn leading_number(raw: &str) -> Option<Decimal> {
    static LEADING: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = LEADING
        .get_or_init(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").ok())
        .as_ref()?;
    let matched = pattern.find(raw.trim_start())?;
    parse_decimal(matched.as_str())
}
