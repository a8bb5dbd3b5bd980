use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use thiserror::Error;
use tracing::debug;

/// Status and raw body text of one HTTP exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {after_secs}s")]
    Timeout { after_secs: u64 },
    #[error("request failed: {0}")]
    Network(String),
}

/// Outbound HTTP used by the CRM client. Every call is bounded by the transport's timeout.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpReply, TransportError>;

    /// `body` is sent verbatim with `Content-Type: application/json`.
    async fn patch_json(
        &self,
        url: &str,
        bearer_token: &str,
        body: String,
    ) -> Result<HttpReply, TransportError>;
}

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| TransportError::Network(error.to_string()))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout { after_secs: self.timeout.as_secs() }
        } else {
            TransportError::Network(error.to_string())
        }
    }

    async fn read_reply(&self, response: reqwest::Response) -> Result<HttpReply, TransportError> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|error| self.map_error(error))?;
        debug!(event_name = "crm.http.reply", status, bytes = body.len(), "crm reply received");
        Ok(HttpReply { status, body })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpReply, TransportError> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|error| self.map_error(error))?;
        self.read_reply(response).await
    }

    async fn patch_json(
        &self,
        url: &str,
        bearer_token: &str,
        body: String,
    ) -> Result<HttpReply, TransportError> {
        let response = self
            .client
            .patch(url)
            .bearer_auth(bearer_token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|error| self.map_error(error))?;
        self.read_reply(response).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{HttpReply, ReqwestTransport};

    #[test]
    fn success_covers_the_2xx_range_only() {
        assert!(HttpReply::new(200, "").is_success());
        assert!(HttpReply::new(204, "").is_success());
        assert!(!HttpReply::new(302, "").is_success());
        assert!(!HttpReply::new(500, "oops").is_success());
    }

    #[test]
    fn transport_keeps_its_timeout() {
        let transport = ReqwestTransport::new(Duration::from_secs(7)).expect("client builds");
        assert_eq!(transport.timeout(), Duration::from_secs(7));
    }
}
