//! Evidence set and the retrieval output contract

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// Deduplicated chunk texts, keyed by trimmed text
///
/// Iteration follows first insertion. Order carries no ranking meaning.
#[derive(Debug, Clone, Default)]
pub struct EvidenceSet {
    seen: AHashSet<String>,
    chunks: Vec<String>,
}

impl EvidenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the trimmed text; returns false when it was already present
    pub fn insert(&mut self, text: &str) -> bool {
        let normalized = text.trim();
        if self.seen.contains(normalized) {
            return false;
        }
        self.seen.insert(normalized.to_string());
        self.chunks.push(normalized.to_string());
        true
    }

    pub fn contains(&self, text: &str) -> bool {
        self.seen.contains(text.trim())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().map(String::as_str)
    }

    pub fn into_chunks(self) -> Vec<String> {
        self.chunks
    }
}

/// Retrieval result handed to the answer-synthesis step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResponse {
    pub question: String,
    /// Always equal to `chunks.len()`
    pub total_chunks_received: usize,
    pub chunks: Vec<String>,
}

impl RetrievalResponse {
    pub fn new(question: impl Into<String>, evidence: EvidenceSet) -> Self {
        let chunks = evidence.into_chunks();
        Self {
            question: question.into(),
            total_chunks_received: chunks.len(),
            chunks,
        }
    }

    /// Evidence joined into one context block, chunks separated by a blank line
    pub fn context(&self) -> String {
        self.chunks.join("\n\n")
    }
}
