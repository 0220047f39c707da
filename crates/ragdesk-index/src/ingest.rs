//! Offline ingestion: discover documents, chunk them with their declared
//! strategy, build and persist one pair per source.

use std::path::Path;

use ragdesk_core::chunking::Chunker;
use ragdesk_core::corpus::{discover, read_document, StrategyMap};
use ragdesk_core::types::ChunkStrategy;
use ragdesk_core::{Error, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::builder::IndexBuilder;
use crate::pair_store::{PairStore, SourceIssue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedSource {
    pub name: String,
    pub strategy: ChunkStrategy,
    pub chunks: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub indexed: Vec<IndexedSource>,
    /// No strategy declared for the source.
    pub skipped: Vec<SourceIssue>,
    pub failed: Vec<SourceIssue>,
}

pub struct Ingestor {
    chunker: Chunker,
    strategies: StrategyMap,
    builder: IndexBuilder,
    store: PairStore,
}

impl Ingestor {
    pub fn new(chunker: Chunker, strategies: StrategyMap, builder: IndexBuilder, store: PairStore) -> Self {
        Self { chunker, strategies, builder, store }
    }

    pub fn store(&self) -> &PairStore {
        &self.store
    }

    /// Indexes every document under `input_dir`, at most `limit` of them.
    /// A failing source is recorded and the run continues.
    pub fn run(&self, input_dir: &Path, limit: Option<usize>) -> Result<IngestReport> {
        if !input_dir.is_dir() {
            return Err(Error::NotFound(format!("input directory {}", input_dir.display())));
        }
        let mut entries = discover(input_dir);
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        info!(documents = entries.len(), dir = %input_dir.display(), "ingestion started");

        let mut report = IngestReport::default();
        for entry in entries {
            let Some(strategy) = self.strategies.resolve(&entry.name) else {
                warn!(source = %entry.name, "no chunking strategy declared, skipping");
                report.skipped.push(SourceIssue {
                    name: entry.name.clone(),
                    reason: "no chunking strategy declared".into(),
                });
                continue;
            };
            match self.ingest_one(&entry, strategy) {
                Ok(chunks) => report.indexed.push(IndexedSource { name: entry.name, strategy, chunks }),
                Err(e) => {
                    warn!(source = %entry.name, error = %e, "source failed");
                    report.failed.push(SourceIssue { name: entry.name, reason: e.to_string() });
                }
            }
        }
        info!(
            indexed = report.indexed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "ingestion finished"
        );
        Ok(report)
    }

    fn ingest_one(&self, entry: &ragdesk_core::corpus::DocumentEntry, strategy: ChunkStrategy) -> Result<usize> {
        let doc = read_document(entry)?;
        let chunks = self.chunker.chunk_document(&doc.name, &doc.text, strategy);
        let pair = self.builder.build_chunks(&doc.name, &chunks)?;
        self.store.write(&pair)?;
        Ok(pair.chunks().len())
    }
}
