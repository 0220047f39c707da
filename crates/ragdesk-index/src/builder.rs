use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use ragdesk_core::traits::EmbeddingGateway;
use ragdesk_core::types::Chunk;
use ragdesk_core::{Error, Result};
use tracing::info;

use crate::flat::FlatL2Index;
use crate::retriever::SourcePair;

pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Embeds a source's chunks in batches and lays them into a fresh index,
/// row `i` for `chunks[i]`.
pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingGateway>,
    batch_size: usize,
    show_progress: bool,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn EmbeddingGateway>) -> Self {
        Self { embedder, batch_size: DEFAULT_BATCH_SIZE, show_progress: false }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Builds from numbered chunks. Each chunk must belong to `name` and its
    /// ordinal must equal the row it lands in.
    pub fn build_chunks(&self, name: &str, chunks: &[Chunk]) -> Result<SourcePair> {
        for (row, chunk) in chunks.iter().enumerate() {
            if chunk.ordinal != row || chunk.source_id != name {
                return Err(Error::MisplacedChunk {
                    name: name.to_string(),
                    source_id: chunk.source_id.clone(),
                    ordinal: chunk.ordinal,
                    row,
                });
            }
        }
        self.build(name, chunks.iter().map(|c| c.text.clone()).collect())
    }

    pub fn build(&self, name: &str, chunks: Vec<String>) -> Result<SourcePair> {
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus(name.to_string()));
        }

        let pb = if self.show_progress {
            let pb = ProgressBar::new(chunks.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb.set_message(name.to_string());
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut index: Option<FlatL2Index> = None;
        for batch in chunks.chunks(self.batch_size) {
            let vectors = self.embedder.encode_batch(batch)?;
            if vectors.len() != batch.len() {
                return Err(Error::upstream(
                    "embedding",
                    format!("expected {} vectors, got {}", batch.len(), vectors.len()),
                ));
            }
            // the first batch fixes the dimension; later ones are checked row by row
            if index.is_none() && vectors[0].is_empty() {
                return Err(Error::upstream("embedding", "gateway returned an empty vector"));
            }
            let index = index.get_or_insert_with(|| FlatL2Index::new(vectors[0].len()));
            for v in &vectors {
                index.add(v)?;
            }
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();

        let index = index.ok_or_else(|| Error::EmptyCorpus(name.to_string()))?;
        info!(source = %name, rows = index.len(), dim = index.dim(), "index built");
        Ok(SourcePair::new(name, index, chunks))
    }
}
