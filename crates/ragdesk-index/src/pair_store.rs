//! On-disk `(index, chunk table)` pairs, one per source:
//! `<name>_index.bin` and `<name>_chunks.json` in a single directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use ragdesk_core::{Error, Result};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::format::{chunk_table_digest, decode_index, encode_index};
use crate::retriever::{RetrieverState, SourcePair};

pub const INDEX_SUFFIX: &str = "_index.bin";
pub const CHUNKS_SUFFIX: &str = "_chunks.json";

/// A source left out of a run, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceIssue {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub skipped: Vec<SourceIssue>,
    /// Loaded, but the index does not match its chunk table.
    pub misaligned: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PairStore {
    dir: PathBuf,
}

impl PairStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{INDEX_SUFFIX}"))
    }

    pub fn chunks_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{CHUNKS_SUFFIX}"))
    }

    /// Persists a pair, replacing any previous one for `name`. Each artifact
    /// is renamed into place from a temp file; the index goes last so its
    /// digest always names the chunk table it was written with.
    pub fn write(&self, pair: &SourcePair) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let mut chunks_tmp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut chunks_tmp, pair.chunks())?;
        chunks_tmp.flush()?;
        chunks_tmp.persist(self.chunks_path(pair.name())).map_err(|e| Error::Io(e.error))?;

        let digest = chunk_table_digest(pair.chunks());
        let mut index_tmp = NamedTempFile::new_in(&self.dir)?;
        index_tmp.write_all(&encode_index(pair.index(), &digest))?;
        index_tmp.flush()?;
        index_tmp.persist(self.index_path(pair.name())).map_err(|e| Error::Io(e.error))?;

        info!(source = %pair.name(), rows = pair.index().len(), dir = %self.dir.display(), "pair written");
        Ok(())
    }

    /// Names of all sources with an index artifact, sorted.
    pub fn source_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_string_lossy().strip_suffix(INDEX_SUFFIX) {
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Loads one pair. The flag is false when the row count differs from the
    /// chunk table; such a pair still loads behind the out-of-range guard.
    /// Equal row counts with a foreign digest mean every row would resolve
    /// to the wrong text, so that pair is refused.
    pub fn load_pair(&self, name: &str) -> Result<(SourcePair, bool)> {
        let chunks_path = self.chunks_path(name);
        if !chunks_path.exists() {
            return Err(Error::MissingChunkTable(name.to_string()));
        }
        let index_path = self.index_path(name);
        let bytes = fs::read(&index_path)?;
        let (header, index) = decode_index(&bytes, &index_path.display().to_string())?;
        let chunks: Vec<String> = serde_json::from_str(&fs::read_to_string(&chunks_path)?)?;

        let same_table = header.chunk_digest == chunk_table_digest(&chunks);
        if !same_table && index.len() == chunks.len() {
            return Err(Error::CorruptIndex {
                path: index_path.display().to_string(),
                reason: "built from a different chunk table".into(),
            });
        }
        let aligned = same_table && index.len() == chunks.len();
        Ok((SourcePair::new(name, index, chunks), aligned))
    }

    /// Loads every pair in the directory. Broken pairs are skipped and
    /// reported; a missing directory yields an empty state.
    pub fn load_all(&self) -> Result<(RetrieverState, LoadReport)> {
        let mut state = RetrieverState::new();
        let mut report = LoadReport::default();
        if !self.dir.is_dir() {
            warn!(dir = %self.dir.display(), "index directory not found, no sources loaded");
            return Ok((state, report));
        }

        for name in self.source_names()? {
            match self.load_pair(&name) {
                Ok((pair, aligned)) => {
                    if !aligned {
                        warn!(
                            source = %name,
                            rows = pair.index().len(),
                            chunks = pair.chunks().len(),
                            "index does not match its chunk table"
                        );
                        report.misaligned.push(name.clone());
                    }
                    state.insert(pair);
                    report.loaded.push(name);
                }
                Err(e) => {
                    warn!(source = %name, error = %e, "skipping source");
                    report.skipped.push(SourceIssue { name, reason: e.to_string() });
                }
            }
        }
        info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            chunks = state.total_chunks(),
            "indices loaded"
        );
        Ok((state, report))
    }
}
