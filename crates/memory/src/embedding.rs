//! Text embeddings for the chunk index.
//!
//! The default [`HashingEmbedder`] needs no model files: each lowercase
//! alphanumeric token is hashed with SHA-256 into one of `dimensions` buckets,
//! bucket counts form a term-frequency vector, and the vector is L2-normalized.
//! Identical text always embeds identically, across runs and platforms.

use sha2::{Digest, Sha256};

/// Maps text to a fixed-width vector.
pub trait Embedder: Send + Sync {
    /// Stable identifier recorded in the index descriptor.
    fn id(&self) -> &str;

    /// Width of every vector this embedder produces.
    fn dimensions(&self) -> usize;

    /// Embed one text. Text without tokens yields the zero vector.
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Feature-hashing embedder over SHA-256 token digests.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub const ID: &'static str = "hashing-sha256-tf";

    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(head) % self.dimensions as u64) as usize
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(512)
    }
}

impl Embedder for HashingEmbedder {
    fn id(&self) -> &str {
        Self::ID
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            vector[self.bucket(&token)] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

/// Lowercase alphanumeric tokens.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}
