//! Hybrid retrieval combining lexical and semantic lookups

use crate::config::{ExpansionConfig, RetrievalConfig};
use crate::corpus::Corpus;
use crate::embedding::{EmbeddingError, EmbeddingProvider, LexicalIndex, VectorIndex};
use crate::error::{RagError, Result};
use crate::expansion::QueryExpander;
use crate::retrieval::{EvidenceSet, RetrievalResponse};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

type PendingEmbedding = JoinHandle<std::result::Result<Vec<f32>, EmbeddingError>>;

/// Lexical and vector indexes built from one corpus snapshot
pub struct IndexSet {
    corpus: Arc<Corpus>,
    lexical: LexicalIndex,
    vector: VectorIndex,
}

impl IndexSet {
    /// Build both indexes from the corpus
    pub fn build(
        corpus: Arc<Corpus>,
        embedder: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
    ) -> Result<Self> {
        let lexical = LexicalIndex::build(&corpus)
            .map_err(|e| RagError::IndexUnavailable(format!("lexical index: {}", e)))?;
        let vector = VectorIndex::build(&corpus, embedder, batch_size)?;

        Self::from_parts(corpus, lexical, vector)
    }

    /// Build the lexical index and load the persisted vector index
    pub fn load(
        corpus: Arc<Corpus>,
        embedder: Arc<dyn EmbeddingProvider>,
        vector_path: &Path,
    ) -> Result<Self> {
        let lexical = LexicalIndex::build(&corpus)
            .map_err(|e| RagError::IndexUnavailable(format!("lexical index: {}", e)))?;
        let vector = VectorIndex::load(vector_path, &corpus, embedder)?;

        Self::from_parts(corpus, lexical, vector)
    }

    fn from_parts(corpus: Arc<Corpus>, lexical: LexicalIndex, vector: VectorIndex) -> Result<Self> {
        if lexical.len() != corpus.len()
            || vector.len() != corpus.len()
            || vector.corpus_fingerprint() != corpus.fingerprint()
        {
            return Err(RagError::IndexUnavailable(format!(
                "indexes do not match corpus: lexical {} / vector {} / corpus {} chunks",
                lexical.len(),
                vector.len(),
                corpus.len()
            )));
        }

        Ok(Self {
            corpus,
            lexical,
            vector,
        })
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn lexical(&self) -> &LexicalIndex {
        &self.lexical
    }

    pub fn vector(&self) -> &VectorIndex {
        &self.vector
    }

    pub fn save_vector_index(&self, path: &Path) -> Result<()> {
        self.vector.save(path)?;
        Ok(())
    }

    fn chunk(&self, index: usize) -> Result<&str> {
        self.corpus.get(index).ok_or_else(|| {
            RagError::RetrievalUnavailable(format!("index returned unknown chunk {}", index))
        })
    }
}

/// Single hybrid strategy: optional expansion, then top-k from both indexes
/// for every variant, merged into one evidence set without re-ranking
#[derive(Clone)]
pub struct HybridRetriever {
    expander: QueryExpander,
    top_k: usize,
}

impl HybridRetriever {
    pub fn new(expander: QueryExpander, top_k: usize) -> Self {
        Self { expander, top_k }
    }

    pub fn from_config(retrieval: &RetrievalConfig, expansion: &ExpansionConfig) -> Self {
        Self::new(QueryExpander::from_config(expansion), retrieval.top_k)
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn expander(&self) -> &QueryExpander {
        &self.expander
    }

    /// Expand, merge, and package the result for one question
    pub async fn retrieve_with(&self, indexes: &IndexSet, question: &str) -> Result<RetrievalResponse> {
        let variants = self.expander.expand(question).await;
        let evidence = self.merge(&variants, question, indexes).await?;
        Ok(RetrievalResponse::new(question, evidence))
    }

    /// Union of lexical and vector top-k over all variants, plus the question
    ///
    /// The query embedding runs on the blocking pool while BM25 scores the
    /// same variant on the calling task. Any lookup failure fails the whole
    /// merge; a one-sided result is never returned.
    pub async fn merge(
        &self,
        variants: &[String],
        question: &str,
        indexes: &IndexSet,
    ) -> Result<EvidenceSet> {
        let mut evidence = EvidenceSet::new();

        for variant in variants {
            let pending = self.embed_query(indexes, variant);
            let lexical_results = self.lexical_search(indexes, variant);
            let semantic_results = self.semantic_search(indexes, pending).await?;

            for index in lexical_results.into_iter().chain(semantic_results) {
                evidence.insert(indexes.chunk(index)?);
            }
        }

        evidence.insert(question);

        tracing::debug!(
            "Merged {} variants into {} evidence chunks",
            variants.len(),
            evidence.len()
        );

        Ok(evidence)
    }

    fn lexical_search(&self, indexes: &IndexSet, query: &str) -> Vec<usize> {
        indexes
            .lexical
            .search(query, self.top_k)
            .into_iter()
            .map(|hit| hit.index)
            .collect()
    }

    /// Start embedding the query; None when there is nothing to embed
    fn embed_query(&self, indexes: &IndexSet, query: &str) -> Option<PendingEmbedding> {
        if query.trim().is_empty() || self.top_k == 0 {
            return None;
        }

        let provider = indexes.vector.provider();
        let query = query.to_string();
        Some(tokio::task::spawn_blocking(move || provider.embed(&query)))
    }

    async fn semantic_search(
        &self,
        indexes: &IndexSet,
        pending: Option<PendingEmbedding>,
    ) -> Result<Vec<usize>> {
        let Some(handle) = pending else {
            return Ok(Vec::new());
        };

        let embedding = handle
            .await
            .map_err(|e| RagError::RetrievalUnavailable(format!("query embedding task failed: {}", e)))?
            .map_err(|e| RagError::RetrievalUnavailable(format!("vector search failed: {}", e)))?;

        let hits = indexes
            .vector
            .search_vector(&embedding, self.top_k)
            .map_err(|e| RagError::RetrievalUnavailable(format!("vector search failed: {}", e)))?;

        Ok(hits.into_iter().map(|hit| hit.index).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;

    fn mammals_corpus() -> Arc<Corpus> {
        Arc::new(Corpus::new(vec![
            "Cats are mammals.".to_string(),
            "Dogs are mammals.".to_string(),
            "The sky is blue.".to_string(),
        ]))
    }

    fn hash_indexes(corpus: Arc<Corpus>) -> IndexSet {
        IndexSet::build(corpus, Arc::new(HashEmbedder::new(384).unwrap()), 16).unwrap()
    }

    /// Embeds the corpus fine but fails on a marker query
    struct FailingQueryEmbedder {
        inner: HashEmbedder,
    }

    impl EmbeddingProvider for FailingQueryEmbedder {
        fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            if text.contains("boom") {
                return Err(EmbeddingError::GenerationError("model crashed".to_string()));
            }
            self.inner.embed(text)
        }

        fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            self.inner.embed_batch(texts)
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn model_name(&self) -> &str {
            self.inner.model_name()
        }
    }

    #[tokio::test]
    async fn test_merge_collects_both_methods_and_question() {
        let indexes = hash_indexes(mammals_corpus());
        let retriever = HybridRetriever::new(QueryExpander::disabled(), 2);

        let evidence = retriever
            .merge(&["What are mammals?".to_string()], "What are mammals?", &indexes)
            .await
            .unwrap();

        assert!(evidence.contains("Cats are mammals."));
        assert!(evidence.contains("Dogs are mammals."));
        assert!(evidence.contains("What are mammals?"));
        assert!((3..=5).contains(&evidence.len()));
    }

    #[tokio::test]
    async fn test_question_is_trimmed_and_always_present() {
        let indexes = hash_indexes(mammals_corpus());
        let retriever = HybridRetriever::new(QueryExpander::disabled(), 1);

        let response = retriever
            .retrieve_with(&indexes, "   zebra quantum   ")
            .await
            .unwrap();

        assert!(response.chunks.contains(&"zebra quantum".to_string()));
        assert_eq!(response.total_chunks_received, response.chunks.len());
    }

    #[tokio::test]
    async fn test_variants_widen_evidence() {
        let indexes = hash_indexes(mammals_corpus());
        let retriever = HybridRetriever::new(QueryExpander::disabled(), 1);

        let single = retriever
            .merge(&["cats".to_string()], "cats", &indexes)
            .await
            .unwrap();
        let widened = retriever
            .merge(&["cats".to_string(), "sky blue".to_string()], "cats", &indexes)
            .await
            .unwrap();

        assert!(!single.contains("The sky is blue."));
        assert!(widened.contains("The sky is blue."));
        assert!(widened.contains("Cats are mammals."));
    }

    #[tokio::test]
    async fn test_empty_corpus_yields_question_only() {
        let indexes = hash_indexes(Arc::new(Corpus::new(Vec::new())));
        let retriever = HybridRetriever::new(QueryExpander::disabled(), 4);

        let response = retriever.retrieve_with(&indexes, "anything?").await.unwrap();
        assert_eq!(response.chunks, vec!["anything?"]);
        assert_eq!(response.total_chunks_received, 1);
    }

    #[tokio::test]
    async fn test_vector_failure_fails_whole_merge() {
        let embedder = Arc::new(FailingQueryEmbedder {
            inner: HashEmbedder::new(64).unwrap(),
        });
        let indexes = IndexSet::build(mammals_corpus(), embedder, 8).unwrap();
        let retriever = HybridRetriever::new(QueryExpander::disabled(), 2);

        let result = retriever
            .merge(&["mammals".to_string(), "boom".to_string()], "mammals", &indexes)
            .await;

        assert!(matches!(result, Err(RagError::RetrievalUnavailable(_))));
    }

    /// Records the thread each query embedding ran on
    struct ThreadRecordingEmbedder {
        inner: HashEmbedder,
        threads: std::sync::Mutex<Vec<std::thread::ThreadId>>,
    }

    impl EmbeddingProvider for ThreadRecordingEmbedder {
        fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            self.threads.lock().unwrap().push(std::thread::current().id());
            self.inner.embed(text)
        }

        fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            self.inner.embed_batch(texts)
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn model_name(&self) -> &str {
            self.inner.model_name()
        }
    }

    #[tokio::test]
    async fn test_query_embedding_runs_off_runtime_thread() {
        let embedder = Arc::new(ThreadRecordingEmbedder {
            inner: HashEmbedder::new(64).unwrap(),
            threads: std::sync::Mutex::new(Vec::new()),
        });
        let indexes = IndexSet::build(mammals_corpus(), embedder.clone(), 8).unwrap();
        let retriever = HybridRetriever::new(QueryExpander::disabled(), 2);

        let evidence = retriever
            .merge(&["mammals".to_string(), "   ".to_string()], "mammals", &indexes)
            .await
            .unwrap();
        assert!(evidence.contains("Cats are mammals."));

        // The blank variant is never embedded
        let threads = embedder.threads.lock().unwrap();
        assert_eq!(threads.len(), 1);
        assert_ne!(threads[0], std::thread::current().id());
    }

    #[test]
    fn test_index_set_rejects_mismatched_corpus() {
        let corpus = mammals_corpus();
        let other = Arc::new(Corpus::new(vec!["Only one chunk.".to_string()]));
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder::new(32).unwrap());

        let lexical = LexicalIndex::build(&corpus).unwrap();
        let vector = VectorIndex::build(&other, embedder, 8).unwrap();

        let result = IndexSet::from_parts(corpus, lexical, vector);
        assert!(matches!(result, Err(RagError::IndexUnavailable(_))));
    }
}
