use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{error, info};

use quoteflow_core::config::SalesforceConfig;
use quoteflow_core::errors::SyncError;

use crate::transport::HttpTransport;

/// Bearer token plus the instance URL all record calls must target. Lives for one sync call.
#[derive(Clone)]
pub struct AuthToken {
    pub access_token: SecretString,
    pub instance_url: String,
    pub token_type: String,
    pub issued_at: String,
    pub signature: String,
    pub identity_url: String,
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("access_token", &"[redacted]")
            .field("instance_url", &self.instance_url)
            .field("token_type", &self.token_type)
            .field("issued_at", &self.issued_at)
            .field("identity_url", &self.identity_url)
            .finish()
    }
}

impl AuthToken {
    pub fn bearer(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// Instance URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.instance_url.trim_end_matches('/')
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    instance_url: String,
    token_type: String,
    issued_at: String,
    signature: String,
    id: String,
}

/// Fetches a fresh token with the resource-owner password grant. No caching, no retry.
pub async fn acquire_token<T>(
    transport: &T,
    config: &SalesforceConfig,
) -> Result<AuthToken, SyncError>
where
    T: HttpTransport + ?Sized,
{
    let token_url = config.token_url();
    let form = [
        ("grant_type", "password"),
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.expose_secret()),
        ("username", config.username.as_str()),
        ("password", config.password.expose_secret()),
    ];

    let reply = transport.post_form(&token_url, &form).await.map_err(|error| {
        error!(event_name = "crm.token.request_failed", error = %error, "token request failed");
        SyncError::Auth { status: None, body: error.to_string() }
    })?;

    if !reply.is_success() {
        error!(
            event_name = "crm.token.rejected",
            status = reply.status,
            "token endpoint rejected the credentials"
        );
        return Err(SyncError::Auth { status: Some(reply.status), body: reply.body });
    }

    let decoded: TokenResponse = serde_json::from_str(&reply.body).map_err(|error| {
        error!(event_name = "crm.token.decode_failed", error = %error, "token response is malformed");
        SyncError::TokenDecode(error.to_string())
    })?;
    if decoded.access_token.trim().is_empty() || decoded.instance_url.trim().is_empty() {
        return Err(SyncError::TokenDecode(
            "token response is missing access_token or instance_url".to_string(),
        ));
    }

    info!(
        event_name = "crm.token.acquired",
        instance_url = %decoded.instance_url,
        "salesforce token acquired"
    );
    Ok(AuthToken {
        access_token: SecretString::from(decoded.access_token),
        instance_url: decoded.instance_url,
        token_type: decoded.token_type,
        issued_at: decoded.issued_at,
        signature: decoded.signature,
        identity_url: decoded.id,
    })
}
