use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;
use crate::types::ChunkStrategy;

/// Extensions picked up when scanning an input directory.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["txt", "md"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub path: PathBuf,
    pub text: String,
}

/// Operator-declared chunking strategy per source, with an optional fallback.
#[derive(Debug, Clone, Default)]
pub struct StrategyMap {
    default: Option<ChunkStrategy>,
    by_source: BTreeMap<String, ChunkStrategy>,
}

impl StrategyMap {
    pub fn new(default: Option<ChunkStrategy>, by_source: BTreeMap<String, ChunkStrategy>) -> Self {
        Self { default, by_source }
    }

    /// Same strategy for every source.
    pub fn uniform(strategy: ChunkStrategy) -> Self {
        Self { default: Some(strategy), by_source: BTreeMap::new() }
    }

    pub fn resolve(&self, source: &str) -> Option<ChunkStrategy> {
        self.by_source.get(source).copied().or(self.default)
    }
}

/// Stable source name: the file stem without a leading `<digits>_` prefix,
/// so `1_policy.txt` and `policy.txt` both name `policy`.
pub fn source_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    let stripped = match stem.split_once('_') {
        Some((prefix, rest))
            if !prefix.is_empty() && !rest.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) =>
        {
            rest
        }
        _ => stem.as_ref(),
    };
    Some(stripped.to_string())
}

/// Lists documents under `root`, sorted by path. When two files map to the
/// same source name the first one wins and the other is reported.
pub fn discover(root: &Path) -> Vec<DocumentEntry> {
    let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|s| s.to_str())
                .map(|ext| DOCUMENT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(name) = source_name(&path) else { continue };
        if !seen.insert(name.clone()) {
            warn!(source = %name, path = %path.display(), "duplicate source name, file ignored");
            continue;
        }
        entries.push(DocumentEntry { name, path });
    }
    entries
}

pub fn read_document(entry: &DocumentEntry) -> Result<SourceDocument> {
    let text = match fs::read_to_string(&entry.path) {
        Ok(text) => text,
        Err(_) => String::from_utf8_lossy(&fs::read(&entry.path)?).to_string(),
    };
    Ok(SourceDocument { name: entry.name.clone(), path: entry.path.clone(), text })
}
