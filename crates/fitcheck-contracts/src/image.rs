use std::fmt;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("unsupported media type '{0}'; expected image/*")]
    UnsupportedMediaType(String),
    #[error("image payload is empty")]
    EmptyPayload,
    #[error("image payload is not valid base64: {0}")]
    InvalidBase64(String),
    #[error("malformed data URL: {0}")]
    MalformedDataUrl(String),
    #[error("failed reading {path}: {message}")]
    Read { path: String, message: String },
}

/// The photo a session works from: a media type plus a base64 body.
///
/// Construction does not validate; `validate` is called by every consumer
/// that is about to put the payload on the wire.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    media_type: String,
    data: String,
}

impl UploadedImage {
    pub fn new(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    pub fn from_bytes(media_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(media_type, BASE64.encode(bytes))
    }

    pub fn from_path(path: &Path) -> Result<Self, ImageError> {
        let bytes = std::fs::read(path).map_err(|err| ImageError::Read {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        let media_type = mime_for_path(path).ok_or_else(|| {
            ImageError::UnsupportedMediaType(
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .unwrap_or("")
                    .to_string(),
            )
        })?;
        Ok(Self::from_bytes(media_type, &bytes))
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn validate(&self) -> Result<(), ImageError> {
        let media_type = self.media_type.trim();
        let subtype = media_type.strip_prefix("image/").unwrap_or_default();
        if subtype.is_empty() || subtype.contains(char::is_whitespace) {
            return Err(ImageError::UnsupportedMediaType(self.media_type.clone()));
        }
        if self.data.trim().is_empty() {
            return Err(ImageError::EmptyPayload);
        }
        BASE64
            .decode(self.data.as_bytes())
            .map_err(|err| ImageError::InvalidBase64(err.to_string()))?;
        Ok(())
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

// The body can be megabytes of base64; keep it out of debug output.
impl fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedImage")
            .field("media_type", &self.media_type)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// A decoded `data:<media type>;base64,<payload>` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    pub fn parse(raw: &str) -> Result<Self, ImageError> {
        let (media_type, payload) = split_data_url(raw)?;
        let bytes = BASE64
            .decode(payload.as_bytes())
            .map_err(|err| ImageError::InvalidBase64(err.to_string()))?;
        Ok(Self { media_type, bytes })
    }

    pub fn encode(media_type: &str, payload_b64: &str) -> String {
        format!("data:{media_type};base64,{payload_b64}")
    }

    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.media_type)
    }
}

fn split_data_url(raw: &str) -> Result<(String, String), ImageError> {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("data:") else {
        return Err(ImageError::MalformedDataUrl(
            "missing 'data:' prefix".to_string(),
        ));
    };
    let Some((header, payload)) = rest.split_once(',') else {
        return Err(ImageError::MalformedDataUrl(
            "missing ',' separator".to_string(),
        ));
    };
    let Some(media_type) = header.strip_suffix(";base64") else {
        return Err(ImageError::MalformedDataUrl(
            "only base64 data URLs are supported".to_string(),
        ));
    };
    if media_type.is_empty() {
        return Err(ImageError::MalformedDataUrl("empty media type".to_string()));
    }
    Ok((media_type.to_string(), payload.to_string()))
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

pub fn extension_for_mime(media_type: &str) -> &'static str {
    let lowered = media_type.to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    "png"
}
