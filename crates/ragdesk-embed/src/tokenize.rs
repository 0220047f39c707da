use candle_core::{Device, Tensor};
use ragdesk_core::{Error, Result};
use tokenizers::Tokenizer;

/// Tokenizes `texts` into `[B, T]` id and mask tensors. Each input is cut to
/// `max_len` tokens and the batch is padded to its longest member.
pub fn tokenize_batch(
    tokenizer: &Tokenizer,
    texts: &[String],
    max_len: usize,
    device: &Device,
) -> Result<(Tensor, Tensor)> {
    let pad_id = tokenizer
        .get_padding()
        .map(|p| p.pad_id)
        .or_else(|| tokenizer.token_to_id("[PAD]"))
        .unwrap_or(0);

    let mut rows: Vec<(Vec<u32>, Vec<u32>)> = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer
            .encode(text.as_str(), true)
            .map_err(|e| Error::upstream("embedding", format!("tokenization failed: {e}")))?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        ids.truncate(max_len);
        mask.truncate(max_len);
        rows.push((ids, mask));
    }

    let width = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);
    let mut all_ids = Vec::with_capacity(rows.len() * width);
    let mut all_mask = Vec::with_capacity(rows.len() * width);
    for (ids, mask) in rows {
        let pad = width - ids.len();
        all_ids.extend(ids);
        all_ids.extend(std::iter::repeat(pad_id).take(pad));
        all_mask.extend(mask);
        all_mask.extend(std::iter::repeat(0u32).take(pad));
    }

    let batch = texts.len();
    let to_err = |e: candle_core::Error| Error::upstream("embedding", e);
    let input_ids = Tensor::from_vec(all_ids, (batch, width), device).map_err(to_err)?;
    let attention_mask = Tensor::from_vec(all_mask, (batch, width), device).map_err(to_err)?;
    Ok((input_ids, attention_mask))
}
