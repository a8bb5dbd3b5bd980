use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use quoteflow_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_OK};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("config", "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let salesforce = &config.salesforce;
    let entries = [
        ("salesforce.login_url", "QUOTEFLOW_SALESFORCE_LOGIN_URL", salesforce.login_url.clone()),
        ("salesforce.client_id", "QUOTEFLOW_SALESFORCE_CLIENT_ID", redact_identifier(&salesforce.client_id)),
        (
            "salesforce.client_secret",
            "QUOTEFLOW_SALESFORCE_CLIENT_SECRET",
            redact_secret(&salesforce.client_secret),
        ),
        ("salesforce.username", "QUOTEFLOW_SALESFORCE_USERNAME", salesforce.username.clone()),
        ("salesforce.password", "QUOTEFLOW_SALESFORCE_PASSWORD", redact_secret(&salesforce.password)),
        ("salesforce.api_version", "QUOTEFLOW_SALESFORCE_API_VERSION", salesforce.api_version.clone()),
        (
            "salesforce.timeout_secs",
            "QUOTEFLOW_SALESFORCE_TIMEOUT_SECS",
            salesforce.timeout_secs.to_string(),
        ),
        ("server.bind_address", "QUOTEFLOW_SERVER_BIND_ADDRESS", config.server.bind_address.clone()),
        ("server.port", "QUOTEFLOW_SERVER_PORT", config.server.port.to_string()),
        (
            "server.graceful_shutdown_secs",
            "QUOTEFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        (
            "server.session_idle_secs",
            "QUOTEFLOW_SERVER_SESSION_IDLE_SECS",
            config.server.session_idle_secs.to_string(),
        ),
        ("logging.level", "QUOTEFLOW_LOGGING_LEVEL", config.logging.level.clone()),
        ("logging.format", "QUOTEFLOW_LOGGING_FORMAT", format!("{:?}", config.logging.format)),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        entries
            .into_iter()
            .map(|(key, env_key, value)| render_line(key, &value, source(key, env_key))),
    );

    CommandResult::text(EXIT_OK, lines.join("\n"))
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("quoteflow.toml"), PathBuf::from("config/quoteflow.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &SecretString) -> String {
    if secret.expose_secret().trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}

/// Keeps the first four characters so operators can tell connected apps apart.
fn redact_identifier(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    let prefix: String = trimmed.chars().take(4).collect();
    format!("{prefix}***")
}
