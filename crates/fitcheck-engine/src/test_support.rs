use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fitcheck_contracts::UploadedImage;
use serde_json::json;

use crate::error::GenerationError;
use crate::transport::{GenerateContentRequest, GenerateContentResponse, ModelTransport};

pub(crate) const SIX_OUTFITS: [&str; 6] = [
    "Wrap dress with block heels",
    "High-waisted wide-leg trousers and fitted blouse",
    "Belted trench coat over slim jeans",
    "Pencil skirt with tucked silk shirt",
    "Fit-and-flare midi dress",
    "Tailored blazer with straight-leg denim",
];

pub(crate) const NEXT_SIX_OUTFITS: [&str; 6] = [
    "Denim jumpsuit with espadrilles",
    "Cropped cardigan over slip skirt",
    "Safari shirt dress with sandals",
    "Double-breasted suit with loafers",
    "Halter maxi dress",
    "Leather moto jacket with midi skirt",
];

pub(crate) fn photo() -> UploadedImage {
    UploadedImage::from_bytes("image/jpeg", b"\xff\xd8\xff\xe0fake-jpeg")
}

pub(crate) fn analysis_json(outfits: &[&str]) -> String {
    json!({
        "bodyShape": "Hourglass",
        "reason": "Shoulders and hips are balanced with a defined waist.",
        "outfits": outfits,
    })
    .to_string()
}

pub(crate) fn analysis_response(outfits: &[&str]) -> GenerateContentResponse {
    GenerateContentResponse::from_text(analysis_json(outfits))
}

/// Outcome a rule assigns to one generation call: delay, then result.
pub(crate) type GenerationRule =
    Arc<dyn Fn(&str) -> (Duration, Result<GenerateContentResponse, GenerationError>) + Send + Sync>;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub model: String,
    pub prompt: String,
    pub request: GenerateContentRequest,
}

/// In-memory transport: analysis requests (those carrying a response schema)
/// pop from one queue, image requests from another, falling back to a rule
/// keyed on the prompt text.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    analysis: Mutex<VecDeque<Result<GenerateContentResponse, GenerationError>>>,
    generation: Mutex<VecDeque<Result<GenerateContentResponse, GenerationError>>>,
    rule: Mutex<Option<GenerationRule>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_analysis(&self, outcome: Result<GenerateContentResponse, GenerationError>) {
        self.analysis.lock().unwrap().push_back(outcome);
    }

    pub(crate) fn push_generation(&self, outcome: Result<GenerateContentResponse, GenerationError>) {
        self.generation.lock().unwrap().push_back(outcome);
    }

    pub(crate) fn set_rule(&self, rule: GenerationRule) {
        *self.rule.lock().unwrap() = Some(rule);
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn analysis_calls(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| is_analysis(&call.request))
            .collect()
    }
}

fn is_analysis(request: &GenerateContentRequest) -> bool {
    request
        .generation_config
        .as_ref()
        .is_some_and(|config| config.response_schema.is_some())
}

#[async_trait]
impl ModelTransport for ScriptedTransport {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenerationError> {
        let prompt = request.prompt_text();
        self.calls.lock().unwrap().push(RecordedCall {
            model: model.to_string(),
            prompt: prompt.clone(),
            request: request.clone(),
        });

        if is_analysis(request) {
            return self
                .analysis
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::other("no scripted analysis response")));
        }

        let queued = self.generation.lock().unwrap().pop_front();
        if let Some(outcome) = queued {
            return outcome;
        }
        let rule = self.rule.lock().unwrap().clone();
        match rule {
            Some(rule) => {
                let (delay, outcome) = rule(&prompt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                outcome
            }
            None => Err(GenerationError::other("no scripted generation response")),
        }
    }
}
