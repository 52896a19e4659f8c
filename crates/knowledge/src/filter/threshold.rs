//! Similarity threshold stage.

use super::{DropReason, DroppedChunk, FilterConfig};
use crate::types::RetrievedChunk;

/// Keep chunks with `similarity >= config.min_similarity`, then truncate to
/// `config.keep_top` when set. Input order is preserved; drops are appended
/// to `dropped`.
pub fn apply_threshold(
    chunks: Vec<RetrievedChunk>,
    config: &FilterConfig,
    dropped: &mut Vec<DroppedChunk>,
) -> Vec<RetrievedChunk> {
    let mut kept = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        if chunk.similarity < config.min_similarity {
            dropped.push(DroppedChunk::new(&chunk, DropReason::BelowThreshold));
        } else {
            kept.push(chunk);
        }
    }

    if let Some(limit) = config.keep_top {
        if kept.len() > limit {
            for chunk in kept.drain(limit..) {
                dropped.push(DroppedChunk::new(&chunk, DropReason::ExceedsKeepTop));
            }
        }
    }

    kept
}
