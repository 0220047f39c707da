use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ragdesk_core::chunking::{Chunker, ChunkingOptions};
use ragdesk_core::corpus::StrategyMap;
use ragdesk_core::traits::EmbeddingGateway;
use ragdesk_core::types::ChunkStrategy;
use ragdesk_core::Result;
use ragdesk_embed::HashingEmbedder;
use ragdesk_index::{
    FlatL2Index, IndexBuilder, Ingestor, MultiIndexRetriever, PairStore, RetrieverState, SourcePair,
};
use tempfile::TempDir;

/// Maps every text to the origin of a 1-D space and counts calls.
#[derive(Default)]
struct OriginEmbedder {
    calls: AtomicUsize,
}

impl EmbeddingGateway for OriginEmbedder {
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|_| vec![0.0]).collect())
    }
}

fn pair(name: &str, values: &[f32], chunks: &[&str]) -> SourcePair {
    let vectors: Vec<Vec<f32>> = values.iter().map(|v| vec![*v]).collect();
    SourcePair::new(name, FlatL2Index::from_vectors(&vectors).unwrap(), chunks.iter().map(|c| c.to_string()).collect())
}

fn policy_and_faq() -> RetrieverState {
    // squared distances from the origin: policy [9, 1, 4], faq [0.25, 6.25]
    RetrieverState::from_pairs([
        pair("policy", &[3.0, 1.0, 2.0], &["policy0", "policy1", "policy2"]),
        pair("faq", &[0.5, 2.5], &["faq0", "faq1"]),
    ])
}

fn documents() -> Vec<String> {
    [
        "Refunds are issued within ten business days after the request is approved.",
        "Lost cards can be blocked immediately from the mobile application settings.",
        "Transfers above the daily limit require confirmation with a one time code.",
        "Branches open from nine in the morning until five in the afternoon on weekdays.",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[test]
fn global_top_k_merges_sources_by_distance() {
    let retriever = MultiIndexRetriever::new(Arc::new(OriginEmbedder::default()), policy_and_faq());
    assert_eq!(retriever.retrieve("anything", 3).unwrap(), "faq0\npolicy1\npolicy2");

    let hits = retriever.retrieve_hits("anything", 3).unwrap();
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    assert_eq!((hits[0].source.as_str(), hits[0].row), ("faq", 0));
}

#[test]
fn out_of_range_rows_are_dropped() {
    // index has 8 rows, the chunk table only 5; row 7 is the nearest
    let index = FlatL2Index::from_vectors(
        &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 0.0].iter().map(|v| vec![*v]).collect::<Vec<_>>(),
    )
    .unwrap();
    let chunks = (0..5).map(|i| format!("chunk{i}")).collect();
    let state = RetrieverState::from_pairs([SourcePair::new("policy", index, chunks)]);
    let retriever = MultiIndexRetriever::new(Arc::new(OriginEmbedder::default()), state);

    assert_eq!(retriever.retrieve("q", 3).unwrap(), "chunk0\nchunk1");
}

#[test]
fn k_bounds() {
    let retriever = MultiIndexRetriever::new(Arc::new(OriginEmbedder::default()), policy_and_faq());
    assert_eq!(retriever.retrieve_hits("q", 50).unwrap().len(), 5);
    assert_eq!(retriever.retrieve("q", 0).unwrap(), "");
}

#[test]
fn zero_sources_returns_empty_context_without_encoding() {
    let embedder = Arc::new(OriginEmbedder::default());
    let retriever = MultiIndexRetriever::new(embedder.clone(), RetrieverState::new());
    assert_eq!(retriever.retrieve("q", 4).unwrap(), "");
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn persisted_rows_stay_aligned_with_chunks() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(HashingEmbedder::new(64));
    let store = PairStore::new(tmp.path());

    let built = IndexBuilder::new(embedder.clone()).with_batch_size(3).build("policy", documents()).unwrap();
    store.write(&built).unwrap();

    let (state, report) = store.load_all().unwrap();
    assert_eq!(report.loaded, vec!["policy"]);
    assert!(report.misaligned.is_empty());

    let loaded = state.get("policy").unwrap();
    assert_eq!(loaded.chunks(), documents().as_slice());
    for (i, chunk) in loaded.chunks().iter().enumerate() {
        assert_eq!(loaded.index().row(i).unwrap(), embedder.embed(chunk).as_slice());
    }
}

#[test]
fn index_without_chunk_table_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let store = PairStore::new(tmp.path());
    let embedder = Arc::new(HashingEmbedder::new(16));
    let builder = IndexBuilder::new(embedder);
    store.write(&builder.build("policy", documents()).unwrap()).unwrap();
    store.write(&builder.build("faq", documents()).unwrap()).unwrap();
    fs::remove_file(store.chunks_path("faq")).unwrap();

    let (state, report) = store.load_all().unwrap();
    assert_eq!(state.names().collect::<Vec<_>>(), vec!["policy"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name, "faq");
}

#[test]
fn replaced_chunk_table_is_reported_misaligned_but_loaded() {
    let tmp = TempDir::new().unwrap();
    let store = PairStore::new(tmp.path());
    let builder = IndexBuilder::new(Arc::new(HashingEmbedder::new(16)));
    store.write(&builder.build("policy", documents()).unwrap()).unwrap();
    fs::write(store.chunks_path("policy"), r#"["only one chunk left"]"#).unwrap();

    let (state, report) = store.load_all().unwrap();
    assert_eq!(report.misaligned, vec!["policy"]);
    assert!(!state.get("policy").unwrap().is_aligned());
}

#[test]
fn rewritten_chunk_table_of_same_length_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let store = PairStore::new(tmp.path());
    let builder = IndexBuilder::new(Arc::new(HashingEmbedder::new(16)));
    store.write(&builder.build("policy", documents()).unwrap()).unwrap();
    store.write(&builder.build("faq", documents()).unwrap()).unwrap();

    let mut swapped = documents();
    swapped.reverse();
    fs::write(store.chunks_path("faq"), serde_json::to_string(&swapped).unwrap()).unwrap();

    let (state, report) = store.load_all().unwrap();
    assert_eq!(state.names().collect::<Vec<_>>(), vec!["policy"]);
    assert!(report.misaligned.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name, "faq");
}

#[test]
fn corrupt_index_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let store = PairStore::new(tmp.path());
    fs::write(store.index_path("broken"), b"not an index").unwrap();
    fs::write(store.chunks_path("broken"), "[]").unwrap();

    let (state, report) = store.load_all().unwrap();
    assert!(state.is_empty());
    assert_eq!(report.skipped[0].name, "broken");
}

#[test]
fn missing_directory_loads_nothing() {
    let tmp = TempDir::new().unwrap();
    let (state, report) = PairStore::new(tmp.path().join("absent")).load_all().unwrap();
    assert!(state.is_empty());
    assert!(report.loaded.is_empty());
}

#[test]
fn rebuilding_reproduces_rankings() {
    let embedder = Arc::new(HashingEmbedder::new(128));
    let rank = || {
        let pair = IndexBuilder::new(embedder.clone()).build("policy", documents()).unwrap();
        let retriever = MultiIndexRetriever::new(embedder.clone(), RetrieverState::from_pairs([pair]));
        retriever.retrieve_hits("how do I block a lost card", 4).unwrap()
    };
    assert_eq!(rank(), rank());
}

#[test]
fn ingestion_indexes_declared_sources_and_reload_swaps_state() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    fs::write(input.path().join("1_policy.txt"), documents().join(" ")).unwrap();
    fs::write(input.path().join("cards.md"), documents()[1].clone()).unwrap();
    fs::write(input.path().join("notes.txt"), "Too short.").unwrap();

    let mut by_source = std::collections::BTreeMap::new();
    by_source.insert("policy".to_string(), ChunkStrategy::Sentence);
    by_source.insert("notes".to_string(), ChunkStrategy::Sentence);
    let embedder = Arc::new(HashingEmbedder::new(1024));
    let store = PairStore::new(output.path());
    let ingestor = Ingestor::new(
        Chunker::new(ChunkingOptions { max_len: 120, ..ChunkingOptions::default() }),
        StrategyMap::new(None, by_source),
        IndexBuilder::new(embedder.clone()),
        store.clone(),
    );

    let retriever = MultiIndexRetriever::new(embedder, RetrieverState::new());
    let report = ingestor.run(input.path(), None).unwrap();

    assert_eq!(report.indexed.len(), 1);
    assert_eq!(report.indexed[0].name, "policy");
    assert_eq!(report.indexed[0].chunks, 4);
    assert_eq!(report.skipped[0].name, "cards");
    assert_eq!(report.failed[0].name, "notes", "no chunk survives the length filter");

    assert!(retriever.snapshot().is_empty());
    let load = retriever.reload(&store).unwrap();
    assert_eq!(load.loaded, vec!["policy"]);
    assert!(retriever.retrieve("lost cards blocked", 1).unwrap().contains("Lost cards"));
}
