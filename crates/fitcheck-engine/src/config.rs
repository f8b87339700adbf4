use std::env;
use std::time::Duration;

use crate::retry::RetryPolicy;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_MAX_CONCURRENCY: usize = 6;

const API_KEY_VARS: [&str; 3] = ["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no API key found; set one of GEMINI_API_KEY, GOOGLE_API_KEY or API_KEY")]
    MissingApiKey,
}

#[derive(Clone, PartialEq)]
pub struct EngineConfig {
    pub api_key: String,
    pub api_base: String,
    pub analysis_model: String,
    pub image_model: String,
    pub request_timeout: Duration,
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("analysis_model", &self.analysis_model)
            .field("image_model", &self.image_model)
            .field("request_timeout", &self.request_timeout)
            .field("max_concurrency", &self.max_concurrency)
            .field("retry", &self.retry)
            .finish()
    }
}

impl EngineConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            request_timeout: Duration::from_secs(90),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }

    /// Reads the credential and optional overrides from the process
    /// environment. A missing credential is an error; nothing else is.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let api_key = API_KEY_VARS
            .iter()
            .find_map(|key| non_empty(*key))
            .ok_or(ConfigError::MissingApiKey)?;

        let mut config = Self::new(api_key);
        if let Some(base) = non_empty("GEMINI_API_BASE") {
            config = config.with_api_base(base);
        }
        if let Some(model) = non_empty("FITCHECK_ANALYSIS_MODEL") {
            config.analysis_model = model;
        }
        if let Some(model) = non_empty("FITCHECK_IMAGE_MODEL") {
            config.image_model = model;
        }
        if let Some(width) = non_empty("FITCHECK_MAX_CONCURRENCY").and_then(|v| v.parse().ok()) {
            config = config.with_max_concurrency(width);
        }
        if let Some(secs) = non_empty("FITCHECK_REQUEST_TIMEOUT").and_then(|v| v.parse::<f64>().ok())
        {
            config = config.with_request_timeout_secs(secs);
        }
        Ok(config)
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn with_analysis_model(mut self, model: impl Into<String>) -> Self {
        self.analysis_model = model.into();
        self
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    pub fn with_max_concurrency(mut self, width: usize) -> Self {
        self.max_concurrency = width.clamp(1, 16);
        self
    }

    pub fn with_request_timeout_secs(mut self, secs: f64) -> Self {
        let secs = if secs.is_finite() { secs } else { 90.0 };
        self.request_timeout = Duration::from_secs_f64(secs.clamp(15.0, 300.0));
        self
    }
}
