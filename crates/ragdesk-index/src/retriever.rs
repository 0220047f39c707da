//! Multi-index retrieval over an immutable, swappable set of loaded pairs.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use ragdesk_core::traits::EmbeddingGateway;
use ragdesk_core::types::RetrievalHit;
use ragdesk_core::{Error, Result};
use tracing::{debug, info, warn};

use crate::flat::FlatL2Index;
use crate::pair_store::{LoadReport, PairStore};

/// One source's index and the chunk table it was built from. Row `i` of
/// `index` embeds `chunks[i]`.
#[derive(Debug, Clone)]
pub struct SourcePair {
    name: String,
    index: FlatL2Index,
    chunks: Vec<String>,
}

impl SourcePair {
    pub fn new(name: impl Into<String>, index: FlatL2Index, chunks: Vec<String>) -> Self {
        Self { name: name.into(), index, chunks }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn is_aligned(&self) -> bool {
        self.index.len() == self.chunks.len()
    }

    /// Nearest chunks of this source. Rows the chunk table cannot resolve
    /// are dropped.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievalHit>> {
        let neighbors = self.index.search(query, k)?;
        let mut hits = Vec::with_capacity(neighbors.len());
        for n in neighbors {
            match self.chunks.get(n.row) {
                Some(text) => hits.push(RetrievalHit {
                    source: self.name.clone(),
                    row: n.row,
                    text: text.clone(),
                    distance: n.distance,
                }),
                None => {
                    let err = Error::OutOfRangeHit { name: self.name.clone(), row: n.row, rows: self.chunks.len() };
                    debug!(error = %err, "dropping hit");
                }
            }
        }
        Ok(hits)
    }
}

/// Loaded pairs keyed by source name. Never mutated once shared; a reload
/// builds a new value.
#[derive(Debug, Clone, Default)]
pub struct RetrieverState {
    sources: BTreeMap<String, Arc<SourcePair>>,
}

impl RetrieverState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = SourcePair>) -> Self {
        let mut state = Self::new();
        for pair in pairs {
            state.insert(pair);
        }
        state
    }

    /// Adds or replaces the pair for `pair.name()`.
    pub fn insert(&mut self, pair: SourcePair) {
        self.sources.insert(pair.name.clone(), Arc::new(pair));
    }

    pub fn get(&self, name: &str) -> Option<&SourcePair> {
        self.sources.get(name).map(|p| p.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn total_chunks(&self) -> usize {
        self.sources.values().map(|p| p.chunks.len()).sum()
    }

    /// Global top `k` across all sources for an already encoded query.
    pub fn rank(&self, query: &[f32], k: usize) -> Vec<RetrievalHit> {
        if k == 0 {
            return Vec::new();
        }
        let mut hits = Vec::new();
        for pair in self.sources.values() {
            match pair.search(query, k) {
                Ok(found) => hits.extend(found),
                Err(e) => warn!(source = %pair.name, error = %e, "skipping source for this query"),
            }
        }
        // stable: equal distances keep source-name order, then row order
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        hits
    }
}

/// Shared handle to the current [`RetrieverState`]. Readers take a snapshot;
/// a reload swaps the whole state at once.
#[derive(Debug, Clone, Default)]
pub struct SharedRetriever {
    inner: Arc<RwLock<Arc<RetrieverState>>>,
}

impl SharedRetriever {
    pub fn new(state: RetrieverState) -> Self {
        Self { inner: Arc::new(RwLock::new(Arc::new(state))) }
    }

    pub fn snapshot(&self) -> Arc<RetrieverState> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    pub fn replace(&self, state: RetrieverState) {
        let state = Arc::new(state);
        match self.inner.write() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }
}

pub struct MultiIndexRetriever {
    embedder: Arc<dyn EmbeddingGateway>,
    shared: SharedRetriever,
}

impl MultiIndexRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingGateway>, state: RetrieverState) -> Self {
        Self { embedder, shared: SharedRetriever::new(state) }
    }

    pub fn with_shared(embedder: Arc<dyn EmbeddingGateway>, shared: SharedRetriever) -> Self {
        Self { embedder, shared }
    }

    /// Loads every pair under `store` at startup.
    pub fn open(embedder: Arc<dyn EmbeddingGateway>, store: &PairStore) -> Result<(Self, LoadReport)> {
        let (state, report) = store.load_all()?;
        Ok((Self::new(embedder, state), report))
    }

    pub fn shared(&self) -> &SharedRetriever {
        &self.shared
    }

    pub fn snapshot(&self) -> Arc<RetrieverState> {
        self.shared.snapshot()
    }

    /// Re-reads `store` and swaps the loaded set. In-flight queries finish on
    /// the previous state.
    pub fn reload(&self, store: &PairStore) -> Result<LoadReport> {
        let (state, report) = store.load_all()?;
        info!(sources = state.len(), "retriever state replaced");
        self.shared.replace(state);
        Ok(report)
    }

    /// Best `k` chunks for `query` across every loaded source.
    pub fn retrieve_hits(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        let state = self.snapshot();
        if state.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.encode(query)?;
        let hits = state.rank(&vector, k);
        debug!(k, hits = hits.len(), "retrieved");
        Ok(hits)
    }

    /// Retrieved chunk texts joined by newlines.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<String> {
        let hits = self.retrieve_hits(query, k)?;
        Ok(hits.into_iter().map(|h| h.text).collect::<Vec<_>>().join("\n"))
    }
}
