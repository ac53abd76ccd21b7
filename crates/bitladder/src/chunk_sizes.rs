use std::{fs, io, path::Path};

use bitladder_abr::ChunkSizes;

use crate::error::CatalogResult;

/// Parse one level's chunk sizes.
///
/// Reads whitespace-separated integers until the first token that is not
/// one, taking at most `total_chunks` values.
pub fn parse_chunk_sizes(text: &str, total_chunks: usize) -> Vec<u64> {
    text.split_whitespace()
        .map_while(|token| token.parse::<u64>().ok())
        .take(total_chunks)
        .collect()
}

/// Load `<root>/<video>/video_size_<level>` for every ladder level.
///
/// A missing file yields an empty level, so the policy sees zero sizes for
/// it. Other I/O errors propagate.
pub fn load_chunk_sizes(
    root: &Path,
    video: &str,
    levels: usize,
    total_chunks: usize,
) -> CatalogResult<ChunkSizes> {
    let dir = root.join(video);
    let mut table = Vec::with_capacity(levels);

    for level in 0..levels {
        let path = dir.join(format!("video_size_{level}"));
        let sizes = match fs::read_to_string(&path) {
            Ok(text) => parse_chunk_sizes(&text, total_chunks),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "chunk size file missing");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        if !sizes.is_empty() && sizes.len() < total_chunks {
            tracing::warn!(
                path = %path.display(),
                found = sizes.len(),
                total_chunks,
                "chunk size table shorter than video"
            );
        }
        table.push(sizes);
    }

    tracing::debug!(video, levels, total_chunks, "chunk sizes loaded");
    Ok(ChunkSizes::new(table))
}
