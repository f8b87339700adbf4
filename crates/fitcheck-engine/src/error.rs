use fitcheck_contracts::{AnalysisDecodeError, ImageError};

/// Failures of the two remote operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("invalid image input: {0}")]
    InvalidInput(#[from] ImageError),

    /// Structural problems with an analysis response. Never retried.
    #[error("AI failed to return a valid analysis.")]
    MalformedResponse { detail: String },

    /// Internal/5xx fault reported by the service; the only retryable kind.
    #[error("model service internal error: {message}")]
    TransientServer { status: Option<u16>, message: String },

    #[error("{last} (gave up after {attempts} attempts)")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<GenerationError>,
    },

    /// Content-policy refusals, bad requests, network failures and anything
    /// else that is not an internal fault.
    #[error("{message}")]
    RefusalOrOther { status: Option<u16>, message: String },

    #[error("{0}")]
    NoImageReturned(String),
}

impl GenerationError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            detail: detail.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::RefusalOrOther {
            status: None,
            message: message.into(),
        }
    }

    /// Builds the right variant for a failed call from its status and message.
    pub fn from_failure(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        let server_status = status.is_some_and(|code| (500..600).contains(&code));
        if server_status || looks_like_server_fault(&message) {
            Self::TransientServer { status, message }
        } else {
            Self::RefusalOrOther { status, message }
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientServer { .. })
    }
}

impl From<AnalysisDecodeError> for GenerationError {
    fn from(err: AnalysisDecodeError) -> Self {
        Self::malformed(err.to_string())
    }
}

/// Matches the signatures the service uses for its own internal faults.
pub fn looks_like_server_fault(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    lowered.contains("internal error")
        || lowered.contains("internal server error")
        || lowered.contains("\"code\":500")
        || lowered.contains("status: internal")
        || lowered.starts_with("internal:")
        || lowered.starts_with("500")
}
