use crate::domain::collection::StoreError;

/// Turns texts into fixed-size vectors. Implementations are CPU-bound and
/// synchronous; async callers should run them on the blocking pool.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError>;
}
