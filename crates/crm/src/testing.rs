use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use quoteflow_core::config::{SalesforceConfig, DEFAULT_API_VERSION};

use crate::transport::{HttpReply, HttpTransport, TransportError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recorded {
    Form { url: String, form: Vec<(String, String)> },
    Patch { url: String, bearer: String, body: String },
}

/// Replays queued replies in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpReply, TransportError>>>,
    calls: Mutex<Vec<Recorded>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Result<HttpReply, TransportError>>) -> Self {
        Self { replies: Mutex::new(replies.into()), calls: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn next(&self, call: Recorded) -> Result<HttpReply, TransportError> {
        self.calls.lock().expect("calls lock").push(call);
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("no scripted reply left".to_string())))
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpReply, TransportError> {
        self.next(Recorded::Form {
            url: url.to_string(),
            form: form.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect(),
        })
    }

    async fn patch_json(
        &self,
        url: &str,
        bearer_token: &str,
        body: String,
    ) -> Result<HttpReply, TransportError> {
        self.next(Recorded::Patch { url: url.to_string(), bearer: bearer_token.to_string(), body })
    }
}

pub fn sample_config() -> SalesforceConfig {
    SalesforceConfig {
        login_url: "https://login.example.com/".to_string(),
        client_id: "client-id".to_string(),
        client_secret: "shh".to_string().into(),
        username: "svc@example.com".to_string(),
        password: "pw".to_string().into(),
        api_version: DEFAULT_API_VERSION.to_string(),
        timeout_secs: 30,
    }
}

pub fn token_reply() -> Result<HttpReply, TransportError> {
    Ok(HttpReply::new(
        200,
        r#"{"access_token":"token-123","instance_url":"https://instance.example.com","id":"https://login.example.com/id/1","token_type":"Bearer","issued_at":"1730000000000","signature":"sig"}"#,
    ))
}
