use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::bail;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Everything a session writes to `events.jsonl`. The variant name becomes
/// the `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        analysis_model: String,
        image_model: String,
        max_concurrency: usize,
    },
    ImageUploaded {
        media_type: String,
        bytes_b64: usize,
    },
    AnalysisStarted {
        excluded: Vec<String>,
    },
    AnalysisCompleted {
        body_shape: String,
        reason: String,
        outfits: Vec<String>,
    },
    AnalysisFailed {
        error: String,
    },
    OutfitStarted {
        outfit: String,
    },
    OutfitCompleted {
        outfit: String,
    },
    OutfitFailed {
        outfit: String,
        error: String,
    },
    /// A completion whose run was reset or superseded before it landed.
    StaleUpdateDiscarded {
        target: String,
        token: u64,
    },
    SessionReset,
    StyleboardSaved {
        path: String,
        tiles: usize,
    },
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::ImageUploaded { .. } => "image_uploaded",
            Self::AnalysisStarted { .. } => "analysis_started",
            Self::AnalysisCompleted { .. } => "analysis_completed",
            Self::AnalysisFailed { .. } => "analysis_failed",
            Self::OutfitStarted { .. } => "outfit_started",
            Self::OutfitCompleted { .. } => "outfit_completed",
            Self::OutfitFailed { .. } => "outfit_failed",
            Self::StaleUpdateDiscarded { .. } => "stale_update_discarded",
            Self::SessionReset => "session_reset",
            Self::StyleboardSaved { .. } => "styleboard_saved",
        }
    }
}

/// Append-only writer for a session's `events.jsonl`: one compact object
/// per line carrying `type`, `session_id`, `ts` and the event's fields.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    /// Writer with a freshly generated session id.
    pub fn for_new_session(path: impl Into<PathBuf>) -> Self {
        Self::new(path, format!("session-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn record(&self, event: &SessionEvent) -> anyhow::Result<Value> {
        let Value::Object(fields) = serde_json::to_value(event)? else {
            bail!("{} did not serialize to an object", event.event_type());
        };
        let mut line = Map::new();
        line.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        line.insert("ts".to_string(), Value::String(now_utc_iso()));
        line.extend(fields);

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let encoded = serde_json::to_string(&line)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(encoded.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(line))
    }
}

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Reads back every event of an `events.jsonl` file, skipping the writer's
/// envelope fields.
pub fn read_events(path: &Path) -> anyhow::Result<Vec<SessionEvent>> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str::<SessionEvent>(line)?))
        .collect()
}
