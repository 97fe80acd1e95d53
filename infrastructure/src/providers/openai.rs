//! OpenAI-compatible chat completions adapter
//!
//! Works against any router exposing `POST {base_url}/chat/completions`
//! (OpenRouter, a local proxy, ...). Model ids are sent verbatim, so the
//! `provider/model` naming of [`Model`](hq_domain::Model) must match what the
//! router expects.

use async_trait::async_trait;
use hq_application::{GatewayError, LlmGateway, ModelRequest};
use hq_domain::truncate;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::debug;

const USER_AGENT: &str = concat!("hq/", env!("CARGO_PKG_VERSION"));

pub struct OpenAiCompatibleGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleGateway {
    /// No client-side timeout is set; deadlines belong to
    /// [`FallbackGateway`](super::FallbackGateway).
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GatewayError::ConnectionError(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

fn request_body(request: &ModelRequest) -> Value {
    json!({
        "model": request.model.as_str(),
        "messages": request.messages,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
    })
}

/// First choice's message content
fn extract_content(body: &Value) -> Result<String, GatewayError> {
    if let Some(message) = body.pointer("/error/message").and_then(Value::as_str) {
        return Err(GatewayError::RequestFailed(message.to_string()));
    }
    let content = body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(GatewayError::EmptyResponse);
    }
    Ok(content.to_string())
}

#[async_trait]
impl LlmGateway for OpenAiCompatibleGateway {
    async fn complete(&self, request: &ModelRequest) -> Result<String, GatewayError> {
        debug!(
            "POST {} model={} messages={}",
            self.endpoint(),
            request.model,
            request.messages.len()
        );

        let mut builder = self.client.post(self.endpoint()).json(&request_body(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                GatewayError::ConnectionError(e.to_string())
            } else {
                GatewayError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::ModelNotAvailable(request.model.to_string()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::RequestFailed(format!(
                "HTTP {}: {}",
                status,
                truncate(text.trim(), 200)
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::RequestFailed(format!("invalid response body: {}", e)))?;
        extract_content(&body)
    }
}
