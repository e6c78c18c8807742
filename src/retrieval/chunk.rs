// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Fixed-size text chunking.
//!
//! Chunks are contiguous, non-overlapping runs of `chunk_size` characters
//! (the last one may be shorter) that together reproduce the input exactly.
//! Offsets count characters, not bytes, so they are stable for any UTF-8
//! input.

use serde::Serialize;

/// Smallest chunk size accepted; smaller requests are raised to this.
pub const MIN_CHUNK_SIZE: usize = 50;

/// Chunk size used when the caller does not choose one.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// A slice of one scraped document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    /// Search rank of the source document
    pub doc_rank: usize,
    /// Character offset of the chunk inside the document
    pub offset: usize,
    /// Chunk text
    pub text: String,
}

/// Raises `requested` to [`MIN_CHUNK_SIZE`] when it is too small.
pub fn clamp_chunk_size(requested: i64) -> usize {
    usize::try_from(requested)
        .unwrap_or(0)
        .max(MIN_CHUNK_SIZE)
}

/// Splits `text` into chunks of `chunk_size` characters.
///
/// `chunk_size` of zero is treated as one character.
pub fn chunk_text(doc_rank: usize, text: &str, chunk_size: usize) -> Vec<Chunk> {
    let size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    let mut offset = 0;

    for (position, ch) in text.chars().enumerate() {
        if count == size {
            chunks.push(Chunk {
                doc_rank,
                offset,
                text: std::mem::take(&mut current),
            });
            offset = position;
            count = 0;
        }
        current.push(ch);
        count += 1;
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            doc_rank,
            offset,
            text: current,
        });
    }

    chunks
}
