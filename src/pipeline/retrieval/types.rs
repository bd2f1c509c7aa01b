use serde::{Deserialize, Serialize};

use super::RetrievalError;

/// One guideline excerpt returned for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub source: String,
    pub chunk_id: String,
    pub text: String,
    /// Cosine similarity in [-1, 1].
    pub score: f32,
    /// 1-based position in the result list.
    pub rank: usize,
}

/// Embedding model abstraction
pub trait EmbeddingModel {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
    fn dimension(&self) -> usize;
}

/// Nearest-neighbour search over the guideline index.
pub trait VectorSearch {
    /// At most `top_k` chunks scoring at least `min_score`, best first.
    fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
