pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod schema;

pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use config::{AppConfig, ConfigError, LoadOptions};
pub use domain::operation::OperationId;
pub use domain::record::{
    OpportunityClose, PaymentMethod, PaymentTerm, PersonalDetails, QuotationRecord, QuotationTerms,
};
pub use domain::sync::{CrmResource, RecordSync, SyncPayload, SyncResult};
pub use errors::{InterfaceError, SyncError, UpstreamBody, WizardError};
pub use flows::{ConfirmationView, WizardController, WizardSnapshot, WizardStep};
pub use schema::{prefill_record, FieldIssue, RawFields, ValidationError};
