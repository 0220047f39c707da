//! Per-source exact similarity indices: building, persistence and
//! multi-index retrieval.

pub mod builder;
pub mod flat;
pub mod format;
pub mod ingest;
pub mod pair_store;
pub mod retriever;

pub use builder::IndexBuilder;
pub use flat::{FlatL2Index, Neighbor};
pub use ingest::{IngestReport, Ingestor};
pub use pair_store::{LoadReport, PairStore, SourceIssue};
pub use retriever::{MultiIndexRetriever, RetrieverState, SharedRetriever, SourcePair};
