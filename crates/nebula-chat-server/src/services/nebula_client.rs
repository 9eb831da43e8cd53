use crate::config::NebulaConfig;
use crate::models::chat::ChatMessage;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

pub const SECRET_KEY_HEADER: &str = "X-Secret-Key";

#[derive(Debug, Error)]
pub enum NebulaError {
    #[error("Error from Nebula API ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Nebula request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Nebula returned invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Outbound chat payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NebulaRequest {
    pub message: String,
    pub stream: bool,
    pub context: NebulaContext,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NebulaContext {
    /// Records from before `message`; the new message is not repeated here
    pub history: Vec<ChatMessage>,
}

impl NebulaRequest {
    pub fn new(message: impl Into<String>, history: Vec<ChatMessage>) -> Self {
        Self {
            message: message.into(),
            stream: false,
            context: NebulaContext { history },
        }
    }
}

/// Decoded reply body.
///
/// Nebula puts the answer under `message`; some deployments answer under
/// `response` instead. [`NebulaReply::text`] prefers a non-empty `message`,
/// falls back to `response`, and yields `""` for any other shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NebulaReply {
    pub message: Option<String>,
    pub response: Option<String>,
}

impl NebulaReply {
    pub fn from_value(body: &Value) -> Self {
        let field = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_owned);
        Self {
            message: field("message"),
            response: field("response"),
        }
    }

    pub fn text(&self) -> &str {
        self.message
            .as_deref()
            .filter(|m| !m.is_empty())
            .or(self.response.as_deref())
            .unwrap_or_default()
    }
}

/// Remote conversational backend the adapter talks to
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, request: NebulaRequest) -> Result<NebulaReply, NebulaError>;
}

#[derive(Clone)]
pub struct NebulaClient {
    client: Client,
    config: NebulaConfig,
}

impl NebulaClient {
    pub fn new(config: NebulaConfig) -> Result<Self, NebulaError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            config,
        })
    }
}

#[async_trait]
impl ChatBackend for NebulaClient {
    async fn chat(&self, request: NebulaRequest) -> Result<NebulaReply, NebulaError> {
        debug!(
            "Sending request to Nebula API (history: {} messages)",
            request.context.history.len()
        );

        let response = self
            .client
            .post(&self.config.base_url)
            .header(SECRET_KEY_HEADER, &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        debug!("Received response with status code: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Nebula API error ({}): {}", status, body);
            return Err(NebulaError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text)?;
        Ok(NebulaReply::from_value(&body))
    }
}
