//! Retrieval orchestrator owning the shared index snapshot

use crate::corpus::Corpus;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::retrieval::{HybridRetriever, IndexSet, RetrievalResponse};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::Instrument;
use uuid::Uuid;

/// Entry point for question retrieval
///
/// Indexes are built once and shared by every concurrent call. A rebuild
/// prepares the replacement completely before publishing it; calls in
/// flight keep the snapshot they started with. Rebuilds and installs are
/// serialized in call order, so the last one requested is the one published.
pub struct Retriever {
    strategy: HybridRetriever,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    indexes: RwLock<Option<Arc<IndexSet>>>,
    // tokio's Mutex grants the lock in FIFO order
    rebuild_lock: Mutex<()>,
}

impl Retriever {
    /// Create a retriever with no indexes yet
    pub fn new(
        strategy: HybridRetriever,
        embedder: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
    ) -> Self {
        Self {
            strategy,
            embedder,
            batch_size,
            indexes: RwLock::new(None),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Create a retriever serving an already built or loaded index set
    pub fn with_indexes(
        strategy: HybridRetriever,
        embedder: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        indexes: IndexSet,
    ) -> Self {
        Self {
            strategy,
            embedder,
            batch_size,
            indexes: RwLock::new(Some(Arc::new(indexes))),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Retrieve the evidence set for a question
    pub async fn retrieve(&self, question: &str) -> Result<RetrievalResponse> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("retrieve", %request_id);

        async {
            let indexes = self.snapshot().await?;

            let response = self
                .strategy
                .retrieve_with(&indexes, question)
                .await
                .map_err(|e| match e {
                    RagError::RetrievalUnavailable(_) => e,
                    other => RagError::RetrievalUnavailable(other.to_string()),
                })?;

            tracing::info!(
                "Retrieved {} chunks for question ({} corpus chunks, top_k {})",
                response.total_chunks_received,
                indexes.corpus().len(),
                self.strategy.top_k()
            );

            Ok(response)
        }
        .instrument(span)
        .await
    }

    /// Build indexes for a new corpus and swap them in
    pub async fn rebuild(&self, corpus: Corpus) -> Result<()> {
        let corpus = Arc::new(corpus);
        let embedder = Arc::clone(&self.embedder);
        let batch_size = self.batch_size;

        let _guard = self.rebuild_lock.lock().await;
        tracing::info!("Rebuilding indexes for {} chunks", corpus.len());

        let built = tokio::task::spawn_blocking(move || IndexSet::build(corpus, embedder, batch_size))
            .await
            .map_err(|e| RagError::IndexUnavailable(format!("index build task failed: {}", e)))??;

        self.publish(built).await;
        Ok(())
    }

    /// Publish a prepared index set, replacing any previous one
    ///
    /// Waits for any rebuild already in progress so it cannot overwrite
    /// this set afterwards.
    pub async fn install(&self, indexes: IndexSet) {
        let _guard = self.rebuild_lock.lock().await;
        self.publish(indexes).await;
    }

    async fn publish(&self, indexes: IndexSet) {
        let fingerprint = indexes.corpus().fingerprint().to_string();
        let mut slot = self.indexes.write().await;
        *slot = Some(Arc::new(indexes));
        tracing::info!("Installed indexes for corpus {}", &fingerprint[..12]);
    }

    /// Whether indexes are available for retrieval
    pub async fn is_ready(&self) -> bool {
        self.indexes.read().await.is_some()
    }

    /// Current index set, shared with any in-flight calls
    pub async fn snapshot(&self) -> Result<Arc<IndexSet>> {
        self.indexes.read().await.clone().ok_or_else(|| {
            RagError::RetrievalUnavailable("indexes have not been built".to_string())
        })
    }

    pub fn strategy(&self) -> &HybridRetriever {
        &self.strategy
    }
}
