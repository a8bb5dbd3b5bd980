use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use quoteflow_core::audit::{AuditContext, TracingAuditSink};
use quoteflow_core::config::{AppConfig, LoadOptions};
use quoteflow_core::flows::{ConfirmationView, WizardController, WizardStep};
use quoteflow_core::schema::{prefill_record, RawFields};
use quoteflow_core::{RecordSync, WizardError};
use quoteflow_crm::SalesforceSync;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use toml::{Table, Value};
use uuid::Uuid;

use crate::commands::{
    CommandResult, EXIT_CONFIG, EXIT_INPUT, EXIT_OK, EXIT_RUNTIME, EXIT_UPSTREAM,
};

const COMMAND: &str = "submit";

/// One scripted wizard run. Section names follow the wizard steps.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SubmitScript {
    /// Launch parameters, applied exactly like a prefill query string.
    #[serde(default)]
    pub prefill: BTreeMap<String, Value>,
    #[serde(default)]
    pub personal_details: Table,
    #[serde(default)]
    pub quotation: Table,
    #[serde(default)]
    pub emission: Table,
}

impl SubmitScript {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("could not read submission script `{}`", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("could not parse submission script `{}`", path.display()))
    }

    fn prefill_pairs(&self) -> Vec<(String, String)> {
        self.prefill.iter().map(|(key, value)| (key.clone(), scalar_text(value))).collect()
    }

    fn steps(&self) -> [(WizardStep, &Table); 3] {
        [
            (WizardStep::PersonalDetails, &self.personal_details),
            (WizardStep::Quotation, &self.quotation),
            (WizardStep::Emission, &self.emission),
        ]
    }
}

#[derive(Debug, Serialize)]
struct SubmitReport {
    command: &'static str,
    status: &'static str,
    operation_id: Option<String>,
    internal_id: Option<String>,
    confirmation: ConfirmationView,
}

pub fn run(path: &Path) -> CommandResult {
    let script = match SubmitScript::load(path) {
        Ok(script) => script,
        Err(error) => {
            return CommandResult::failure(COMMAND, "script_invalid", format!("{error:#}"), EXIT_INPUT)
        }
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };

    let sync = match SalesforceSync::from_config(&config.salesforce) {
        Ok(sync) => sync,
        Err(error) => {
            return CommandResult::failure(COMMAND, "runtime", error.to_string(), EXIT_RUNTIME)
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            )
        }
    };

    runtime.block_on(drive(&script, &sync, &Uuid::new_v4().to_string()))
}

/// Submits every step in order and stops at the first step that does not advance.
pub async fn drive(
    script: &SubmitScript,
    sync: &dyn RecordSync,
    correlation_id: &str,
) -> CommandResult {
    let mut controller = WizardController::with_audit(
        prefill_record(script.prefill_pairs()),
        Arc::new(TracingAuditSink),
        AuditContext::new(None, None, correlation_id, "cli"),
    );

    for (step, fields) in script.steps() {
        let raw = raw_fields(fields);
        match controller.submit(sync, &raw).await {
            Ok(_) => {}
            Err(WizardError::Validation(error)) => {
                return CommandResult::failure(
                    COMMAND,
                    "input_validation",
                    format!("{}: {error}", step.as_str()),
                    EXIT_INPUT,
                );
            }
            Err(error) => {
                return CommandResult::failure(COMMAND, "runtime", error.to_string(), EXIT_RUNTIME)
            }
        }

        if controller.step() == step {
            let message = controller
                .notice()
                .map(|notice| format!("{}: {}", notice.title, notice.message))
                .unwrap_or_else(|| format!("{} did not advance", step.label()));
            return CommandResult::failure(COMMAND, "upstream", message, EXIT_UPSTREAM);
        }
    }

    let Some(confirmation) = controller.confirmation() else {
        return CommandResult::failure(
            COMMAND,
            "runtime",
            "wizard finished without a confirmation",
            EXIT_RUNTIME,
        );
    };

    let succeeded = confirmation.is_success();
    let record = controller.record();
    let report = SubmitReport {
        command: COMMAND,
        status: if succeeded { "ok" } else { "error" },
        operation_id: record.operation_id.as_ref().map(|id| id.to_string()),
        internal_id: record.internal_id(),
        confirmation,
    };
    CommandResult::report(if succeeded { EXIT_OK } else { EXIT_UPSTREAM }, &report)
}

fn raw_fields(table: &Table) -> RawFields {
    table.iter().map(|(key, value)| (key.clone(), to_json(value))).collect()
}

/// TOML dates become `YYYY-MM-DD` strings so they validate like form input.
fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::String(text) => JsonValue::String(text.clone()),
        Value::Integer(number) => JsonValue::from(*number),
        Value::Float(number) => JsonValue::from(*number),
        Value::Boolean(flag) => JsonValue::Bool(*flag),
        Value::Datetime(datetime) => JsonValue::String(datetime.to_string()),
        Value::Array(items) => JsonValue::Array(items.iter().map(to_json).collect()),
        Value::Table(table) => JsonValue::Object(
            table.iter().map(|(key, value)| (key.clone(), to_json(value))).collect(),
        ),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
