use std::sync::Arc;

use fitcheck_contracts::image::DataUrl;
use fitcheck_contracts::{OutfitAnalysis, UploadedImage};
use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::GenerationError;
use crate::gemini::GeminiTransport;
use crate::prompts;
use crate::retry::RetryPolicy;
use crate::transport::{GenerateContentRequest, GenerationConfig, ModelTransport};

const NO_IMAGE_PLACEHOLDER: &str = "The model did not return an image.";

/// Stateless wrapper around the analysis and image-generation calls.
///
/// Cloning is cheap; every clone shares the same transport.
#[derive(Clone)]
pub struct GenerationClient {
    transport: Arc<dyn ModelTransport>,
    analysis_model: String,
    image_model: String,
    retry: RetryPolicy,
}

impl GenerationClient {
    pub fn new(
        transport: Arc<dyn ModelTransport>,
        analysis_model: impl Into<String>,
        image_model: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            analysis_model: analysis_model.into(),
            image_model: image_model.into(),
            retry,
        }
    }

    /// Client talking to Gemini with the credential and models from `config`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Arc::new(GeminiTransport::from_config(config)),
            &config.analysis_model,
            &config.image_model,
            config.retry,
        )
    }

    pub fn analysis_model(&self) -> &str {
        &self.analysis_model
    }

    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    /// Classifies body shape and proposes outfits, avoiding `excluded`.
    ///
    /// Called once, without the retry wrapper: the response is schema
    /// constrained and a structurally bad answer is not treated as transient.
    pub async fn analyze_image(
        &self,
        image: &UploadedImage,
        excluded: &[String],
    ) -> Result<OutfitAnalysis, GenerationError> {
        image.validate()?;
        let request = GenerateContentRequest::image_and_text(image, prompts::analysis_prompt(excluded))
            .with_generation_config(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(prompts::analysis_response_schema()),
                response_modalities: Vec::new(),
            });
        debug!(
            "analysis request: model={} excluded={}",
            self.analysis_model,
            excluded.len()
        );

        let response = self
            .transport
            .generate_content(&self.analysis_model, &request)
            .await?;
        let Some(text) = response.text() else {
            let detail = match response.block_reason() {
                Some(reason) => format!("no text in analysis response (reason: {reason})"),
                None => "no text in analysis response".to_string(),
            };
            warn!("{detail}");
            return Err(GenerationError::malformed(detail));
        };

        OutfitAnalysis::from_model_text(&text).map_err(|err| {
            warn!("analysis response rejected: {err}");
            GenerationError::from(err)
        })
    }

    /// Renders the person in `image` wearing `outfit`, as a data URL.
    ///
    /// The primary prompt runs through the retry policy; if it still fails,
    /// one simplified fallback prompt is tried and its outcome is final.
    pub async fn generate_outfit_image(
        &self,
        image: &UploadedImage,
        outfit: &str,
    ) -> Result<String, GenerationError> {
        image.validate()?;

        let primary = prompts::primary_generation_prompt(outfit);
        match self.generate_with_prompt(image, &primary, outfit).await {
            Ok(url) => Ok(url),
            Err(primary_err) => {
                warn!("'{outfit}': primary prompt failed ({primary_err}); trying fallback prompt");
                let fallback = prompts::fallback_generation_prompt(outfit);
                let url = self.generate_with_prompt(image, &fallback, outfit).await?;
                info!("'{outfit}': fallback prompt succeeded");
                Ok(url)
            }
        }
    }

    async fn generate_with_prompt(
        &self,
        image: &UploadedImage,
        prompt: &str,
        outfit: &str,
    ) -> Result<String, GenerationError> {
        let request = GenerateContentRequest::image_and_text(image, prompt).with_generation_config(
            GenerationConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
                ..GenerationConfig::default()
            },
        );
        let label = format!("generate '{outfit}'");
        let response = self
            .retry
            .run(&label, || {
                self.transport.generate_content(&self.image_model, &request)
            })
            .await?;

        if let Some(inline) = response.first_inline_image() {
            return Ok(DataUrl::encode(&inline.mime_type, &inline.data));
        }
        let reason = response
            .text()
            .map(|text| text.trim().to_string())
            .or_else(|| {
                response
                    .block_reason()
                    .map(|reason| format!("Image generation was blocked ({reason})."))
            })
            .unwrap_or_else(|| NO_IMAGE_PLACEHOLDER.to_string());
        Err(GenerationError::NoImageReturned(reason))
    }
}
