//! Text chunking, embedding, and similarity scoring.
//!
//! The trait boundary is an `embed_query`/`embed_documents`-shaped
//! async trait; `find_similar` mirrors a vector store's
//! `similarity_search_by_vector` entry point,
//! scaled down to an in-process linear scan since this crate has no
//! vector store of its own.

use crate::error::{Error, Result};
use crate::model::{ContentVector, VectorContentType};
use async_trait::async_trait;

/// Chunks longer than this (in characters) are split at the nearest
/// preceding sentence boundary.
pub const MAX_CHUNK_CHARS: usize = 1000;

/// Split `text` into chunks of at most `MAX_CHUNK_CHARS`, preferring to
/// break on a sentence boundary (`. `, `! `, `? `, or a newline) within
/// the window rather than mid-sentence.
#[must_use]
pub fn chunk_text(text: &str) -> Vec<String> {
    if text.is_empty() {
        return vec![];
    }
    if text.len() <= MAX_CHUNK_CHARS {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if rest.len() <= MAX_CHUNK_CHARS {
            chunks.push(rest.to_string());
            break;
        }

        let window = char_boundary_floor(rest, MAX_CHUNK_CHARS);
        let slice = &rest[..window];
        let break_at = find_sentence_boundary(slice).unwrap_or(window);
        let break_at = break_at.max(1);

        chunks.push(rest[..break_at].trim_end().to_string());
        rest = rest[break_at..].trim_start();
    }
    chunks
}

fn char_boundary_floor(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Find the last sentence-ending punctuation (followed by a space) or
/// newline within `slice`, returning the index just after it.
fn find_sentence_boundary(slice: &str) -> Option<usize> {
    let bytes = slice.as_bytes();
    for i in (0..bytes.len()).rev() {
        let c = bytes[i];
        if c == b'\n' {
            return Some(i + 1);
        }
        if (c == b'.' || c == b'!' || c == b'?') && bytes.get(i + 1) == Some(&b' ') {
            return Some(i + 2);
        }
    }
    None
}

/// An embedding backend. Implementations wrap a concrete provider (or,
/// in tests, a deterministic fake); this crate owns only chunking,
/// averaging, and similarity math.
#[async_trait]
pub trait ContentVectorizer: Send + Sync {
    /// Embedding dimensionality this vectorizer produces.
    fn dimension(&self) -> usize;

    /// Identifier surfaced in `ContentVector::model_id`.
    fn model_id(&self) -> &str;

    /// Embed a single chunk of text.
    async fn embed_chunk(&self, chunk: &str) -> Result<Vec<f32>>;

    /// Embed `text`, chunking it first and averaging the resulting
    /// per-chunk vectors into one `ContentVector`. Empty input produces
    /// a zero vector rather than an error, since "no content yet" is a
    /// normal state for a freshly registered site.
    async fn embed(&self, text: &str, content_type: VectorContentType, content_hash: &str) -> Result<ContentVector> {
        let dimension = self.dimension();
        let chunks = chunk_text(text);
        if chunks.is_empty() {
            return Ok(ContentVector::zero(dimension, content_type, self.model_id()));
        }

        let mut sum = vec![0.0f32; dimension];
        for chunk in &chunks {
            let v = self.embed_chunk(chunk).await?;
            if v.len() != dimension {
                return Err(Error::Collaborator(format!(
                    "embedding backend returned {} dims, expected {dimension}",
                    v.len()
                )));
            }
            for (acc, x) in sum.iter_mut().zip(v.iter()) {
                *acc += x;
            }
        }
        let count = chunks.len() as f32;
        for x in &mut sum {
            *x /= count;
        }

        Ok(ContentVector {
            values: sum,
            dimension,
            content_type,
            content_hash: content_hash.to_string(),
            model_id: self.model_id().to_string(),
            original_length: text.len(),
            chunk_count: chunks.len(),
        })
    }
}

/// Similarity metric requested of the vectorizer collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityMethod {
    /// Cosine similarity; the primary metric.
    Cosine,
    /// Euclidean distance converted to a `[0,1]` similarity.
    Euclidean,
    /// Manhattan distance converted to a `[0,1]` similarity.
    Manhattan,
}

/// Similarity between two equal-length vectors under `method`, always
/// clamped to `[0,1]`. Euclidean and Manhattan distances are converted
/// via `1 - d/d_max` with `d_max = sqrt(2)` and `d_max = 2`
/// respectively — the maximum distance between two unit vectors under
/// each metric — before clamping.
#[must_use]
pub fn similarity_by_method(a: &[f32], b: &[f32], method: SimilarityMethod) -> f64 {
    match method {
        SimilarityMethod::Cosine => cosine_similarity(a, b).clamp(0.0, 1.0),
        SimilarityMethod::Euclidean => (1.0 - euclidean_distance(a, b) / std::f64::consts::SQRT_2).clamp(0.0, 1.0),
        SimilarityMethod::Manhattan => (1.0 - manhattan_distance(a, b) / 2.0).clamp(0.0, 1.0),
    }
}

/// Cosine similarity between two vectors of equal length, in `[-1,1]`.
/// Returns `0.0` if either vector is all zeros (undefined direction).
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Euclidean distance between two vectors of equal length.
#[must_use]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (f64::from(*x) - f64::from(*y)).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Manhattan distance between two vectors of equal length.
#[must_use]
pub fn manhattan_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (f64::from(*x) - f64::from(*y)).abs())
        .sum()
}

/// Cosine similarity between two `ContentVector`s. Returns `0.0`
/// (treated as maximal drift) if their dimensions don't agree, which
/// can happen across a model upgrade.
#[must_use]
pub fn similarity(a: &ContentVector, b: &ContentVector) -> f64 {
    if a.dimension != b.dimension {
        return 0.0;
    }
    cosine_similarity(&a.values, &b.values)
}

/// Find the `k` candidates most similar to `query` by cosine
/// similarity, highest first. A linear scan: this crate's corpus of
/// candidate vectors per site is small enough that an index isn't
/// warranted.
#[must_use]
pub fn find_similar<'a>(query: &ContentVector, candidates: &'a [ContentVector], k: usize) -> Vec<(&'a ContentVector, f64)> {
    let mut scored: Vec<(&ContentVector, f64)> = candidates.iter().map(|c| (c, similarity(query, c))).collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}
