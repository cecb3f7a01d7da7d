use kfsearch_core::{Error, Result};
use tokenizers::Tokenizer;

pub const CLIP_MAX_LEN: usize = 77;
const END_OF_TEXT: &str = "<|endoftext|>";

/// Token ids for a CLIP text tower, truncated to `max_len`.
///
/// The text tower pools at the highest token id, which is the end-of-text
/// marker, so a truncated sequence must still end with it.
pub fn clip_token_ids(tokenizer: &Tokenizer, text: &str, max_len: usize) -> Result<Vec<u32>> {
    let enc = tokenizer
        .encode(text, true)
        .map_err(|e| Error::Encode(format!("tokenization failed: {}", e)))?;
    let mut ids = enc.get_ids().to_vec();
    if ids.len() > max_len {
        ids.truncate(max_len);
        if let (Some(last), Some(eot)) = (ids.last_mut(), tokenizer.token_to_id(END_OF_TEXT)) {
            *last = eot;
        }
    }
    if ids.is_empty() {
        return Err(Error::Encode("tokenizer produced no tokens".into()));
    }
    Ok(ids)
}
