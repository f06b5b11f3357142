mod keyword_index;
/// Embedding & indexing
///
/// Both retrieval indexes are built from the same corpus snapshot:
/// - EmbeddingProvider trait for abstraction
/// - FastEmbedProvider for local embedding (all-MiniLM-L6-v2, 384-dim)
/// - HashEmbedder for deterministic offline embedding
/// - VectorIndex: exhaustive cosine search, persisted as a zstd artifact
/// - LexicalIndex: BM25 keyword ranking
mod provider;
mod vector_index;

pub use keyword_index::{KeywordIndexError, LexicalHit, LexicalIndex, Tokenizer};
pub use provider::{
    build_embedder, EmbeddingError, EmbeddingProvider, FastEmbedProvider, HashEmbedder,
};
pub use vector_index::{VectorHit, VectorIndex, VectorIndexError};
