//! Embedding backends behind [`ragdesk_core::traits::EmbeddingGateway`].
//!
//! The hashing backend is always built. The BERT backend needs the `candle`
//! feature (and `metal` for Apple GPUs).

use std::path::{Path, PathBuf};

use ragdesk_core::config::{expand_path, EmbeddingBackend, EmbeddingSettings};
use ragdesk_core::traits::EmbeddingGateway;
use ragdesk_core::{Error, Result};
use tracing::info;

mod hashing;
pub use hashing::HashingEmbedder;

#[cfg(feature = "candle")]
mod bert;
#[cfg(feature = "candle")]
pub mod device;
#[cfg(feature = "candle")]
mod pool;
#[cfg(feature = "candle")]
mod tokenize;

#[cfg(feature = "candle")]
pub use bert::BertEmbedder;
#[cfg(feature = "candle")]
pub use pool::masked_mean_l2;
#[cfg(feature = "candle")]
pub use tokenize::tokenize_batch;

/// Builds the gateway selected by `settings.backend`.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn EmbeddingGateway>> {
    match settings.backend {
        EmbeddingBackend::Hashing => {
            info!(dim = settings.dimension, "using hashing embedder");
            Ok(Box::new(HashingEmbedder::new(settings.dimension)))
        }
        EmbeddingBackend::Bert => load_bert(settings),
    }
}

#[cfg(feature = "candle")]
fn load_bert(settings: &EmbeddingSettings) -> Result<Box<dyn EmbeddingGateway>> {
    let model_dir = resolve_model_dir(settings.model_dir.as_deref())?;
    Ok(Box::new(BertEmbedder::load(&model_dir, settings.max_tokens)?))
}

#[cfg(not(feature = "candle"))]
fn load_bert(_settings: &EmbeddingSettings) -> Result<Box<dyn EmbeddingGateway>> {
    Err(Error::InvalidConfig(
        "embedding.backend = \"bert\" requires building with the `candle` feature".into(),
    ))
}

/// Finds the model directory: the configured path first, then `APP_MODEL_DIR`,
/// `MODEL_DIR`, and finally `models/bert` under the working directory.
pub fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    let candidates = configured
        .map(expand_path)
        .into_iter()
        .chain(std::env::var("APP_MODEL_DIR").ok().map(PathBuf::from))
        .chain(std::env::var("MODEL_DIR").ok().map(PathBuf::from))
        .chain(std::iter::once(Path::new("models/bert").to_path_buf()));

    for dir in candidates {
        if dir.exists() {
            info!(dir = %dir.display(), "using model dir");
            return Ok(dir);
        }
    }
    Err(Error::NotFound("could not locate an embedding model directory".into()))
}
