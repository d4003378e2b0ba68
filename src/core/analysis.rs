use crate::core::scores::ScorePair;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Outcome of analyzing one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    #[serde(skip)]
    pub path: String,
    #[serde(flatten)]
    pub scores: ScorePair,
    /// The model's full response, or a readable error message when the
    /// model could not be reached.
    pub full_analysis: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
}

impl AnalysisResult {
    pub fn new(path: impl Into<String>, scores: ScorePair, full_analysis: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            scores,
            full_analysis: full_analysis.into(),
            failed: false,
        }
    }

    pub fn failure(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            scores: ScorePair::unavailable(),
            full_analysis: message.into(),
            failed: true,
        }
    }
}

/// Results keyed by path, kept in discovery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResults {
    entries: Vec<AnalysisResult>,
}

impl AnalysisResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a result. A path seen before keeps its original position.
    pub fn insert(&mut self, result: AnalysisResult) {
        match self.entries.iter_mut().find(|e| e.path == result.path) {
            Some(existing) => *existing = result,
            None => self.entries.push(result),
        }
    }

    #[cfg(test)]
    pub fn get(&self, path: &str) -> Option<&AnalysisResult> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.failed).count()
    }

    /// True when there is nothing usable: no files, or every file failed.
    pub fn is_total_failure(&self) -> bool {
        self.failed_count() == self.entries.len()
    }
}

impl Serialize for AnalysisResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.path, entry)?;
        }
        map.end()
    }
}
