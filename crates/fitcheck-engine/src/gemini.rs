use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;

use crate::config::EngineConfig;
use crate::error::GenerationError;
use crate::transport::{GenerateContentRequest, GenerateContentResponse, ModelTransport};

/// `generateContent` over the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiTransport {
    api_base: String,
    api_key: String,
    timeout: Duration,
    http: HttpClient,
}

impl GeminiTransport {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_base: api_base.into().trim().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
            http: HttpClient::new(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.api_base, &config.api_key, config.request_timeout)
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

#[async_trait]
impl ModelTransport for GeminiTransport {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenerationError> {
        let endpoint = self.endpoint_for_model(model);
        debug!("POST {endpoint}");
        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", self.api_key.as_str())
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|err| {
                GenerationError::from_failure(
                    None,
                    format!("Gemini request failed: {}", err.without_url()),
                )
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            GenerationError::from_failure(
                Some(status.as_u16()),
                format!("Gemini response body read failed: {}", err.without_url()),
            )
        })?;
        if !status.is_success() {
            return Err(map_http_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|err| {
            GenerationError::other(format!("Gemini returned an unexpected payload: {err}"))
        })
    }
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn map_http_error(status: StatusCode, body: &str) -> GenerationError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper
                .error
                .message
                .unwrap_or_else(|| truncate_text(body, 512));
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|_| truncate_text(body, 512));
    GenerationError::from_failure(
        Some(status.as_u16()),
        format!("Gemini request failed ({}): {message}", status.as_u16()),
    )
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
