use indexmap::IndexSet;

/// Outfit names already suggested in this session.
///
/// Append-only; insertion order is kept for display and for the order the
/// names are handed to the analysis prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionHistory {
    names: IndexSet<String>,
}

impl ExclusionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.names.insert(name.into());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}
