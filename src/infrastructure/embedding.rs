use std::path::PathBuf;
use std::sync::Arc;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::domain::collection::StoreError;
use crate::domain::embedder::Embedder;

/// Generates text embeddings with a locally cached fastembed model.
pub struct FastEmbedder {
    model: TextEmbedding,
    dimension: usize,
}

impl FastEmbedder {
    /// Initializes `model_name`, downloading it into `cache_dir` on first use.
    ///
    /// # Arguments
    ///
    /// * `model_name` - The embedding model to use (e.g., EmbeddingModel::AllMiniLML6V2).
    /// * `cache_dir` - The cache directory for the model files (None for the fastembed default).
    pub fn new(model_name: EmbeddingModel, cache_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let dimension = TextEmbedding::list_supported_models()
            .iter()
            .find(|m| m.model == model_name)
            .map(|m| m.dim)
            .ok_or_else(|| anyhow::anyhow!("Unsupported embedding model: {:?}", model_name))?;

        let mut opts = InitOptions::new(model_name);
        if let Some(dir) = cache_dir {
            opts = opts.with_cache_dir(dir);
        }
        let model = TextEmbedding::try_new(opts)?;
        Ok(Self { model, dimension })
    }
}

impl Embedder for FastEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        self.model
            .embed(texts.to_vec(), None)
            .map_err(|e| StoreError::Embedding(e.to_string()))
    }
}

/// Deterministic bag-of-features embedder: words, word bigrams and character
/// trigrams are hashed (FNV-1a) into a fixed number of buckets, then the
/// vector is L2-normalized. Needs no model files.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn normalize(text: &str) -> String {
        text.chars()
            .map(|ch| {
                if ch.is_alphanumeric() {
                    ch.to_lowercase().next().unwrap_or(ch)
                } else {
                    ' '
                }
            })
            .collect()
    }

    fn bucket(&self, token: &str) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in token.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        (h % self.dimension as u64) as usize
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        let normalized = Self::normalize(text);
        let words: Vec<&str> = normalized.split_whitespace().collect();

        for w in &words {
            v[self.bucket(w)] += 1.0;
        }
        for pair in words.windows(2) {
            v[self.bucket(&format!("{} {}", pair[0], pair[1]))] += 0.5;
        }
        for w in &words {
            let chars: Vec<char> = w.chars().collect();
            for tri in chars.windows(3) {
                let gram: String = tri.iter().collect();
                v[self.bucket(&format!("#{}", gram))] += 0.25;
            }
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Runs the embedder on the blocking pool and checks the output shape.
pub async fn embed_blocking(
    embedder: Arc<dyn Embedder>,
    texts: Vec<String>,
) -> Result<Vec<Vec<f32>>, StoreError> {
    let expected_count = texts.len();
    let expected_dim = embedder.dimension();
    let vectors = tokio::task::spawn_blocking(move || embedder.embed(&texts))
        .await
        .map_err(|e| StoreError::Embedding(format!("embedding task failed: {}", e)))??;

    if vectors.len() != expected_count {
        return Err(StoreError::Embedding(format!(
            "expected {} embeddings, got {}",
            expected_count,
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != expected_dim) {
        return Err(StoreError::DimensionMismatch {
            expected: expected_dim,
            actual: bad.len(),
        });
    }
    Ok(vectors)
}

/// Cosine similarity; zero vectors are similar to nothing.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
