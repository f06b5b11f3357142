/// Exhaustive cosine vector index with on-disk persistence
use super::{EmbeddingError, EmbeddingProvider};
use crate::corpus::Corpus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Artifact layout version written by `save`
const ARTIFACT_VERSION: u32 = 1;
/// zstd level for the persisted artifact
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index artifact is corrupt: {0}")]
    Corrupt(String),

    #[error("Embedding model mismatch: index built with '{expected}', provider is '{actual}'")]
    ModelMismatch { expected: String, actual: String },

    #[error("Index was built from a different corpus: {0}")]
    CorpusMismatch(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Search result with corpus position and cosine similarity
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    /// Corpus position of the chunk
    pub index: usize,
    /// Cosine similarity (higher is more similar)
    pub score: f32,
}

/// Persisted form of the index
#[derive(Debug, Serialize, Deserialize)]
struct VectorIndexArtifact {
    version: u32,
    model: String,
    dimension: usize,
    corpus_fingerprint: String,
    chunk_count: usize,
    built_at: DateTime<Utc>,
    vectors: Vec<Vec<f32>>,
}

/// Vector index over every corpus chunk
///
/// Search is an exhaustive cosine scan: results are exact and deterministic,
/// ties ordered by corpus position. Queries are embedded with the same
/// provider the index was built or loaded with.
pub struct VectorIndex {
    provider: Arc<dyn EmbeddingProvider>,
    vectors: Vec<Vec<f32>>,
    /// L2 norm of each stored vector
    norms: Vec<f32>,
    dimension: usize,
    corpus_fingerprint: String,
    built_at: DateTime<Utc>,
}

impl VectorIndex {
    /// Embed every corpus chunk, `batch_size` chunks per provider call
    pub fn build(
        corpus: &Corpus,
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
    ) -> Result<Self, VectorIndexError> {
        let start = std::time::Instant::now();
        let dimension = provider.dimension();
        let batch_size = batch_size.max(1);

        tracing::info!(
            "Building vector index: {} chunks with {} ({}D)",
            corpus.len(),
            provider.model_name(),
            dimension
        );

        let mut vectors = Vec::with_capacity(corpus.len());
        for batch in corpus.chunks().chunks(batch_size) {
            let embeddings = provider.embed_batch(batch)?;

            if embeddings.len() != batch.len() {
                return Err(EmbeddingError::GenerationError(format!(
                    "Embedding count mismatch: expected {}, got {}",
                    batch.len(),
                    embeddings.len()
                ))
                .into());
            }

            for embedding in embeddings {
                if embedding.len() != dimension {
                    return Err(VectorIndexError::InvalidDimension {
                        expected: dimension,
                        actual: embedding.len(),
                    });
                }
                vectors.push(embedding);
            }

            tracing::debug!("Embedded {}/{} chunks", vectors.len(), corpus.len());
        }

        tracing::info!(
            "Vector index built: {} vectors in {}ms",
            vectors.len(),
            start.elapsed().as_millis()
        );

        Ok(Self::from_parts(
            provider,
            vectors,
            dimension,
            corpus.fingerprint().to_string(),
            Utc::now(),
        ))
    }

    fn from_parts(
        provider: Arc<dyn EmbeddingProvider>,
        vectors: Vec<Vec<f32>>,
        dimension: usize,
        corpus_fingerprint: String,
        built_at: DateTime<Utc>,
    ) -> Self {
        let norms = vectors
            .iter()
            .map(|v| v.iter().map(|x| x * x).sum::<f32>().sqrt())
            .collect();

        Self {
            provider,
            vectors,
            norms,
            dimension,
            corpus_fingerprint,
            built_at,
        }
    }

    /// Load a persisted index and check it against the corpus and provider
    pub fn load(
        path: &Path,
        corpus: &Corpus,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, VectorIndexError> {
        if !path.exists() {
            return Err(VectorIndexError::IndexNotFound(path.display().to_string()));
        }

        let compressed = std::fs::read(path)?;
        let payload = zstd::decode_all(&compressed[..])
            .map_err(|e| VectorIndexError::Corrupt(format!("decompression failed: {}", e)))?;
        let artifact: VectorIndexArtifact = serde_json::from_slice(&payload)
            .map_err(|e| VectorIndexError::Corrupt(format!("invalid payload: {}", e)))?;

        if artifact.version != ARTIFACT_VERSION {
            return Err(VectorIndexError::Corrupt(format!(
                "unsupported artifact version {}",
                artifact.version
            )));
        }

        if artifact.model != provider.model_name() || artifact.dimension != provider.dimension() {
            return Err(VectorIndexError::ModelMismatch {
                expected: format!("{} ({}D)", artifact.model, artifact.dimension),
                actual: format!("{} ({}D)", provider.model_name(), provider.dimension()),
            });
        }

        if artifact.corpus_fingerprint != corpus.fingerprint()
            || artifact.chunk_count != corpus.len()
        {
            return Err(VectorIndexError::CorpusMismatch(format!(
                "index covers {} chunks, corpus has {}",
                artifact.chunk_count,
                corpus.len()
            )));
        }

        if artifact.vectors.len() != artifact.chunk_count {
            return Err(VectorIndexError::Corrupt(format!(
                "expected {} vectors, found {}",
                artifact.chunk_count,
                artifact.vectors.len()
            )));
        }

        if let Some(bad) = artifact
            .vectors
            .iter()
            .find(|v| v.len() != artifact.dimension)
        {
            return Err(VectorIndexError::InvalidDimension {
                expected: artifact.dimension,
                actual: bad.len(),
            });
        }

        tracing::info!(
            "Loaded vector index from {:?}: {} vectors, model {}, built {}",
            path,
            artifact.vectors.len(),
            artifact.model,
            artifact.built_at.to_rfc3339()
        );

        Ok(Self::from_parts(
            provider,
            artifact.vectors,
            artifact.dimension,
            artifact.corpus_fingerprint,
            artifact.built_at,
        ))
    }

    /// Persist the index; the file is replaced only once fully written
    pub fn save(&self, path: &Path) -> Result<(), VectorIndexError> {
        let artifact = VectorIndexArtifact {
            version: ARTIFACT_VERSION,
            model: self.provider.model_name().to_string(),
            dimension: self.dimension,
            corpus_fingerprint: self.corpus_fingerprint.clone(),
            chunk_count: self.vectors.len(),
            built_at: self.built_at,
            vectors: self.vectors.clone(),
        };

        let payload = serde_json::to_vec(&artifact)
            .map_err(|e| VectorIndexError::Corrupt(format!("serialization failed: {}", e)))?;
        let compressed = zstd::encode_all(&payload[..], COMPRESSION_LEVEL)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &compressed)?;
        std::fs::rename(&tmp_path, path)?;

        tracing::info!(
            "Saved vector index to {:?} ({} bytes)",
            path,
            compressed.len()
        );

        Ok(())
    }

    /// Embed the query and return the k most similar chunks
    ///
    /// A blank query has nothing to embed and yields no hits.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<VectorHit>, VectorIndexError> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.provider.embed(query)?;
        self.search_vector(&embedding, k)
    }

    /// Return the k stored vectors most similar to `query`
    pub fn search_vector(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>, VectorIndexError> {
        if query.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let query_norm = query.iter().map(|x| x * x).sum::<f32>().sqrt();

        let mut hits: Vec<VectorHit> = self
            .vectors
            .iter()
            .zip(self.norms.iter())
            .enumerate()
            .map(|(index, (vector, &norm))| {
                let score = if norm == 0.0 || query_norm == 0.0 {
                    0.0
                } else {
                    let dot: f32 = vector.iter().zip(query.iter()).map(|(a, b)| a * b).sum();
                    dot / (norm * query_norm)
                };
                VectorHit { index, score }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });
        hits.truncate(k);

        Ok(hits)
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Provider used for query embeddings
    pub fn provider(&self) -> Arc<dyn EmbeddingProvider> {
        Arc::clone(&self.provider)
    }

    pub fn corpus_fingerprint(&self) -> &str {
        &self.corpus_fingerprint
    }
}
