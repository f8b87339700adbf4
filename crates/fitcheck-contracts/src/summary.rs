use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::events::now_utc_iso;
use crate::outfits::OutfitStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutfitSummary {
    pub name: String,
    pub status: OutfitStatus,
    pub file: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub rounds: u64,
    pub body_shape: Option<String>,
    pub reason: Option<String>,
    pub analysis_error: Option<String>,
    pub outfits: Vec<OutfitSummary>,
    pub excluded: Vec<String>,
    pub styleboard: Option<String>,
}

impl SessionSummary {
    pub fn generated(&self) -> usize {
        self.outfits
            .iter()
            .filter(|row| row.status == OutfitStatus::Done)
            .count()
    }
}

pub fn write_summary(
    path: &Path,
    summary: &SessionSummary,
    extra: Option<&Map<String, Value>>,
) -> anyhow::Result<()> {
    let mut payload = match serde_json::to_value(summary)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    payload.insert(
        "generated".to_string(),
        Value::Number(summary.generated().into()),
    );
    payload.insert("ts".to_string(), Value::String(now_utc_iso()));
    if let Some(extra) = extra {
        for (key, value) in extra {
            payload.insert(key.clone(), value.clone());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)?;
    Ok(())
}
