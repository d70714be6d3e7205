//! Client for OpenAI-compatible `/chat/completions` endpoints (Groq, LM Studio,
//! Ollama's `/v1`). Failures are classified from the HTTP status and the structured
//! `error.code` field of the response body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use crate::generate::{GenerationError, GenerationErrorKind, GenerationParams, LanguageModel};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";

#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl ChatCompletionsClient {
    /// `request_timeout` bounds each HTTP exchange.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| GenerationError::new(GenerationErrorKind::Other, e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsClient {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": params.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "stream": false,
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let res = req.send().await.map_err(transport_error)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let payload: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
            return Err(GenerationError::new(
                classify_status(status, &payload),
                format!("{status}: {text}"),
            ));
        }

        let payload: Value = res.json().await.map_err(transport_error)?;
        parse_completion(&payload)
    }
}

fn transport_error(e: reqwest::Error) -> GenerationError {
    let kind = if e.is_timeout() {
        GenerationErrorKind::Timeout
    } else if e.is_connect() || e.is_request() {
        GenerationErrorKind::Unavailable
    } else {
        GenerationErrorKind::Other
    };
    GenerationError::new(kind, e.to_string())
}

fn classify_status(status: StatusCode, payload: &Value) -> GenerationErrorKind {
    let code = payload["error"]["code"].as_str().unwrap_or_default();
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => GenerationErrorKind::TokenLimit,
        _ if code == "context_length_exceeded" => GenerationErrorKind::TokenLimit,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => GenerationErrorKind::Timeout,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            GenerationErrorKind::Unavailable
        }
        s if s.is_server_error() => GenerationErrorKind::Unavailable,
        _ => GenerationErrorKind::Other,
    }
}

fn parse_completion(payload: &Value) -> Result<String, GenerationError> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            GenerationError::new(
                GenerationErrorKind::Other,
                format!("response has no message content: {payload}"),
            )
        })
}
