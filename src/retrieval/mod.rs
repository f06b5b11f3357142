//! Hybrid retrieval
//!
//! Expands a question into variants, takes the top-k chunks from both the
//! BM25 and the vector index for every variant, and merges everything into
//! one deduplicated evidence set that always includes the question itself.

mod evidence;
mod hybrid;
mod orchestrator;

pub use evidence::{EvidenceSet, RetrievalResponse};
pub use hybrid::{HybridRetriever, IndexSet};
pub use orchestrator::Retriever;
