use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutfitStatus {
    Pending,
    Done,
    Error,
}

impl OutfitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutfitResult {
    pub name: String,
    pub status: OutfitStatus,
    pub image_url: Option<String>,
    pub error_message: Option<String>,
}

impl OutfitResult {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: OutfitStatus::Pending,
            image_url: None,
            error_message: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == OutfitStatus::Done
    }
}

/// Per-outfit results of the current run, keyed by outfit name.
///
/// Every mutation addresses a single entry by name, so completions may be
/// applied in any order. Updates for names that are not part of the current
/// run are dropped and reported as `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutfitResults {
    entries: IndexMap<String, OutfitResult>,
}

impl OutfitResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_for<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries = IndexMap::new();
        for name in names {
            let name = name.into();
            entries.insert(name.clone(), OutfitResult::pending(name));
        }
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&OutfitResult> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutfitResult> {
        self.entries.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, status: OutfitStatus) -> usize {
        self.entries
            .values()
            .filter(|result| result.status == status)
            .count()
    }

    pub fn mark_pending(&mut self, name: &str) -> bool {
        self.update(name, |result| {
            result.status = OutfitStatus::Pending;
            result.image_url = None;
            result.error_message = None;
        })
    }

    pub fn mark_done(&mut self, name: &str, image_url: String) -> bool {
        self.update(name, |result| {
            result.status = OutfitStatus::Done;
            result.image_url = Some(image_url);
            result.error_message = None;
        })
    }

    pub fn mark_error(&mut self, name: &str, message: String) -> bool {
        self.update(name, |result| {
            result.status = OutfitStatus::Error;
            result.image_url = None;
            result.error_message = Some(message);
        })
    }

    pub fn to_vec(&self) -> Vec<OutfitResult> {
        self.entries.values().cloned().collect()
    }

    fn update(&mut self, name: &str, apply: impl FnOnce(&mut OutfitResult)) -> bool {
        match self.entries.get_mut(name) {
            Some(result) => {
                apply(result);
                true
            }
            None => false,
        }
    }
}
