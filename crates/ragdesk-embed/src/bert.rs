use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use ragdesk_core::traits::EmbeddingGateway;
use ragdesk_core::{Error, Result};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_batch;

fn upstream(e: impl ToString) -> Error {
    Error::upstream("embedding", e)
}

/// Sentence encoder over a local BERT-family checkpoint (`config.json`,
/// `tokenizer.json` and either `model.safetensors` or `pytorch_model.bin`).
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
}

impl BertEmbedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            upstream(format!("failed to load tokenizer from {}: {}", tokenizer_path.display(), e))
        })?;

        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(model_dir.join("config.json"))?)?;

        let safetensors = model_dir.join("model.safetensors");
        let weights: HashMap<String, Tensor> = if safetensors.exists() {
            candle_core::safetensors::load(&safetensors, &device).map_err(upstream)?
        } else {
            candle_core::pickle::read_all(model_dir.join("pytorch_model.bin"))
                .map_err(upstream)?
                .into_iter()
                .collect()
        };
        let vb = VarBuilder::from_tensors(weights, DTYPE, &device);
        let model = BertModel::load(vb, &config).map_err(upstream)?;
        info!("embedding model loaded");

        Ok(Self { model, tokenizer, device, max_len: max_len.max(1) })
    }

    fn forward(&self, input_ids: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Vec<Vec<f32>>> {
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(input_ids, &token_type_ids, Some(attention_mask))?;
        masked_mean_l2(&hidden, attention_mask)?.to_device(&Device::Cpu)?.to_vec2()
    }
}

impl EmbeddingGateway for BertEmbedder {
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let vectors = self.forward(&input_ids, &attention_mask).map_err(upstream)?;
        debug!(batch = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "encoded batch");
        Ok(vectors)
    }
}
