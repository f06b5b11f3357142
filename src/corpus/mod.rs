//! Corpus store
//!
//! The corpus is the ordered, immutable sequence of text chunks that both
//! indexes are built from. A chunk's position in the sequence is its identifier.

use crate::error::{RagError, Result};
use serde_json::Value;
use std::path::Path;

/// Ordered collection of text chunks, loaded once and shared read-only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    chunks: Vec<String>,
    fingerprint: String,
}

impl Corpus {
    /// Create a corpus from in-memory chunks
    pub fn new(chunks: Vec<String>) -> Self {
        let fingerprint = fingerprint_chunks(&chunks);
        Self {
            chunks,
            fingerprint,
        }
    }

    /// Load a corpus file (a JSON array of strings)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RagError::Io {
            source: e,
            context: format!("Failed to read corpus file: {:?}", path),
        })?;

        let corpus = Self::from_json_str(&content)?;
        tracing::info!("Loaded corpus with {} chunks from {:?}", corpus.len(), path);

        Ok(corpus)
    }

    /// Parse corpus content, rejecting anything that is not a list of strings
    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content).map_err(|e| RagError::InvalidCorpus {
            reason: format!("not valid JSON: {}", e),
        })?;

        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(RagError::InvalidCorpus {
                    reason: format!("expected a JSON array of strings, found {}", kind_of(&other)),
                })
            }
        };

        let mut chunks = Vec::with_capacity(items.len());
        for (position, item) in items.into_iter().enumerate() {
            match item {
                Value::String(text) => chunks.push(text),
                other => {
                    return Err(RagError::InvalidCorpus {
                        reason: format!(
                            "element {} is {}, expected a string",
                            position,
                            kind_of(&other)
                        ),
                    })
                }
            }
        }

        Ok(Self::new(chunks))
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk text at a corpus position
    pub fn get(&self, index: usize) -> Option<&str> {
        self.chunks.get(index).map(String::as_str)
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().map(String::as_str)
    }

    /// BLAKE3 digest identifying this exact chunk sequence
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn fingerprint_chunks(chunks: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(chunks.len() as u64).to_le_bytes());
    for chunk in chunks {
        // Length prefix keeps ["ab", "c"] distinct from ["a", "bc"]
        hasher.update(&(chunk.len() as u64).to_le_bytes());
        hasher.update(chunk.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
