use serde::{Deserialize, Serialize};

/// Number of outfits every analysis must propose.
pub const OUTFIT_COUNT: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisDecodeError {
    #[error("analysis response was empty")]
    Empty,
    #[error("analysis response is not valid JSON of the expected shape: {0}")]
    Shape(String),
    #[error("expected exactly {expected} outfits, got {actual}")]
    OutfitCount { expected: usize, actual: usize },
    #[error("outfit '{0}' appears more than once")]
    DuplicateOutfit(String),
}

/// Body-shape classification plus the outfits proposed for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutfitAnalysis {
    pub body_shape: String,
    pub reason: String,
    pub outfits: Vec<String>,
}

impl OutfitAnalysis {
    /// Decodes the model's text payload, tolerating a surrounding code fence.
    ///
    /// The outfit list is never truncated or padded: anything other than
    /// exactly [`OUTFIT_COUNT`] distinct names is rejected.
    pub fn from_model_text(text: &str) -> Result<Self, AnalysisDecodeError> {
        let body = strip_code_fence(text);
        if body.is_empty() {
            return Err(AnalysisDecodeError::Empty);
        }
        let analysis: OutfitAnalysis = serde_json::from_str(body)
            .map_err(|err| AnalysisDecodeError::Shape(err.to_string()))?;
        analysis.check()?;
        Ok(analysis)
    }

    fn check(&self) -> Result<(), AnalysisDecodeError> {
        if self.outfits.len() != OUTFIT_COUNT {
            return Err(AnalysisDecodeError::OutfitCount {
                expected: OUTFIT_COUNT,
                actual: self.outfits.len(),
            });
        }
        for (idx, name) in self.outfits.iter().enumerate() {
            if self.outfits[..idx].contains(name) {
                return Err(AnalysisDecodeError::DuplicateOutfit(name.clone()));
            }
        }
        Ok(())
    }
}

/// Returns the inner text of a ```` ``` ```` / ```` ```json ```` fence, or the
/// trimmed input when it is not fenced.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = after_open.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let inner = match inner.split_once('\n') {
        Some((info, rest)) if !info.trim_start().starts_with('{') => rest,
        _ => inner,
    };
    inner.trim()
}
