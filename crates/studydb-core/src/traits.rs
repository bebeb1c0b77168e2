/// Turns text into fixed-length vectors.
///
/// Implementations must be deterministic: the same text under the same
/// `model_id` always yields the same vector. Vectors are L2-normalized so
/// that cosine similarity reduces to a dot product.
pub trait Embedder: Send + Sync {
    /// Pinned model/version tag, stored alongside every persisted index.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}
