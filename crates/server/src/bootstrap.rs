use std::sync::Arc;

use quoteflow_core::config::{AppConfig, ConfigError};
use quoteflow_core::RecordSync;
use quoteflow_crm::{SalesforceSync, TransportError};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub sync: Arc<dyn RecordSync>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("salesforce client could not be built: {0}")]
    Transport(#[source] TransportError),
}

/// Builds the runtime from an already loaded config; loading happens first so logging can
/// be initialized from it. Configs assembled in code are validated here as well.
pub async fn bootstrap(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    config.validate()?;
    let sync = SalesforceSync::from_config(&config.salesforce).map_err(BootstrapError::Transport)?;
    info!(
        event_name = "system.bootstrap.salesforce_ready",
        correlation_id = "bootstrap",
        login_url = %config.salesforce.login_url,
        api_version = %config.salesforce.api_version,
        timeout_secs = config.salesforce.timeout_secs,
        "salesforce client configured"
    );

    Ok(Application { config, sync: Arc::new(sync) })
}
