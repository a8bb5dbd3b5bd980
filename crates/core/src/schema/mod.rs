pub mod catalog;
pub mod prefill;
pub mod validation;

pub use catalog::{resolve, FieldKind, FieldSpec, FIELD_CATALOG};
pub use prefill::prefill_record;
pub use validation::{validate_step, FieldIssue, RawFields, StepSubmission, ValidationError};
