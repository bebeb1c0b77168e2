use std::hash::Hasher;

use studydb_core::traits::Embedder;
use twox_hash::XxHash64;

const SEED: u64 = 0x5354_5544_5944_4231;

/// Feature-hashing embedder over analyzed terms.
///
/// Each term is hashed into one of `dim` buckets with a sign taken from the
/// high bit, so unrelated terms cancel out on collision instead of piling
/// up. No model files, fully deterministic across runs and platforms. A text
/// with no terms maps to the zero vector, which scores 0 against anything.
pub struct HashingEmbedder {
    dim: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, model_id: Self::model_id_for(dim) }
    }

    pub fn model_id_for(dim: usize) -> String {
        format!("hash-v1-d{dim}")
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for term in studydb_text::tokenize(text) {
            let mut hasher = XxHash64::with_seed(SEED);
            hasher.write(term.as_bytes());
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
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
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}
