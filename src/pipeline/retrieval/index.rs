use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::embedder::l2_normalize;
use super::types::{RetrievedChunk, VectorSearch};
use super::RetrievalError;

/// File name of the guideline index inside the vector store directory.
pub const INDEX_FILE: &str = "index.json";

/// One chunk as written by the offline ingestion tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub source: String,
    pub chunk_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    dimension: usize,
    chunks: Vec<IndexedChunk>,
}

/// Exact (brute-force) cosine search over L2-normalized vectors.
/// Read-only once built.
pub struct FlatIndex {
    dimension: usize,
    entries: Vec<IndexedChunk>,
}

impl FlatIndex {
    pub fn empty(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
        }
    }

    /// Build from chunks in ingestion order. Vectors are normalized here so
    /// that search is a dot product.
    pub fn from_chunks(
        dimension: usize,
        chunks: Vec<IndexedChunk>,
    ) -> Result<Self, RetrievalError> {
        let mut entries = Vec::with_capacity(chunks.len());
        for mut chunk in chunks {
            if chunk.embedding.len() != dimension {
                return Err(RetrievalError::DimensionMismatch {
                    expected: dimension,
                    actual: chunk.embedding.len(),
                });
            }
            l2_normalize(&mut chunk.embedding);
            entries.push(chunk);
        }
        Ok(Self { dimension, entries })
    }

    /// Load `<dir>/index.json`.
    pub fn load(dir: &Path) -> Result<Self, RetrievalError> {
        let path = dir.join(INDEX_FILE);
        let bytes = std::fs::read(&path)?;
        let file: IndexFile = serde_json::from_slice(&bytes)
            .map_err(|e| RetrievalError::IndexFormat(e.to_string()))?;
        let index = Self::from_chunks(file.dimension, file.chunks)?;

        tracing::info!(
            chunks = index.len(),
            sources = index.source_count(),
            dimension = index.dimension,
            "Guideline index loaded"
        );
        Ok(index)
    }

    /// Load the index, or fall back to an empty one (retrieval disabled)
    /// when it is missing or unreadable.
    pub fn load_or_empty(dir: &Path, dimension: usize) -> Self {
        match Self::load(dir) {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %e,
                    "Guideline index unavailable, retrieval disabled"
                );
                Self::empty(dimension)
            }
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn source_count(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.source.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Write in the on-disk format `load` reads.
    pub fn save(&self, dir: &Path) -> Result<(), RetrievalError> {
        std::fs::create_dir_all(dir)?;
        let file = IndexFile {
            dimension: self.dimension,
            chunks: self.entries.clone(),
        };
        let json = serde_json::to_vec(&file)
            .map_err(|e| RetrievalError::IndexFormat(e.to_string()))?;
        std::fs::write(dir.join(INDEX_FILE), json)?;
        Ok(())
    }
}

impl VectorSearch for FlatIndex {
    fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        if query_embedding.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: query_embedding.len(),
            });
        }

        let mut query = query_embedding.to_vec();
        l2_normalize(&mut query);
        if query.iter().all(|x| *x == 0.0) || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .entries
            .iter()
            .map(|entry| (dot(&query, &entry.embedding).clamp(-1.0, 1.0), entry))
            .filter(|(score, _)| *score >= min_score)
            .collect();

        // Stable sort: ties keep ingestion order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(i, (score, entry))| RetrievedChunk {
                source: entry.source.clone(),
                chunk_id: entry.chunk_id.clone(),
                text: entry.text.clone(),
                score,
                rank: i + 1,
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, source: &str, embedding: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            source: source.into(),
            chunk_id: id.into(),
            text: format!("text of {id}"),
            embedding,
        }
    }

    fn sample_index() -> FlatIndex {
        FlatIndex::from_chunks(
            3,
            vec![
                chunk("c1", "cap.md", vec![1.0, 0.0, 0.0]),
                chunk("c2", "cap.md", vec![0.8, 0.6, 0.0]),
                chunk("c3", "htn.md", vec![0.0, 1.0, 0.0]),
                chunk("c4", "copd.md", vec![-1.0, 0.0, 0.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn search_returns_top_k_ranked() {
        let results = sample_index().search(&[1.0, 0.0, 0.0], 2, -1.0).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, "c1");
        assert_eq!(results[0].rank, 1);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results[1].chunk_id, "c2");
        assert_eq!(results[1].rank, 2);
    }

    #[test]
    fn threshold_filters_low_scores() {
        let results = sample_index().search(&[1.0, 0.0, 0.0], 10, 0.5).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2"]);
    }

    #[test]
    fn ties_keep_ingestion_order() {
        let index = FlatIndex::from_chunks(
            2,
            vec![
                chunk("first", "a.md", vec![1.0, 1.0]),
                chunk("second", "b.md", vec![1.0, 1.0]),
                chunk("third", "c.md", vec![1.0, 1.0]),
            ],
        )
        .unwrap();
        let results = index.search(&[1.0, 1.0], 3, 0.0).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, ["first", "second", "third"]);
    }

    #[test]
    fn search_is_deterministic() {
        let index = sample_index();
        let a = index.search(&[0.3, 0.7, 0.1], 4, -1.0).unwrap();
        let b = index.search(&[0.3, 0.7, 0.1], 4, -1.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = FlatIndex::empty(3);
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 0.0, 0.0], 4, 0.0).unwrap().is_empty());
    }

    #[test]
    fn zero_query_returns_nothing() {
        assert!(sample_index()
            .search(&[0.0, 0.0, 0.0], 4, -1.0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn query_dimension_mismatch_errors() {
        assert!(matches!(
            sample_index().search(&[1.0, 0.0], 4, 0.0),
            Err(RetrievalError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn chunk_dimension_mismatch_errors() {
        let result = FlatIndex::from_chunks(3, vec![chunk("bad", "x.md", vec![1.0])]);
        assert!(result.is_err());
    }

    #[test]
    fn save_and_load_preserve_order_and_sources() {
        let dir = tempfile::tempdir().unwrap();
        sample_index().save(dir.path()).unwrap();

        let loaded = FlatIndex::load(dir.path()).unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.source_count(), 3);
        assert_eq!(loaded.dimension(), 3);
        let results = loaded.search(&[1.0, 0.0, 0.0], 1, 0.0).unwrap();
        assert_eq!(results[0].chunk_id, "c1");
    }

    #[test]
    fn missing_index_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = FlatIndex::load_or_empty(dir.path(), 384);
        assert!(index.is_empty());
        assert_eq!(index.dimension(), 384);
    }

    #[test]
    fn malformed_index_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(INDEX_FILE), b"{not json").unwrap();
        assert!(matches!(
            FlatIndex::load(dir.path()),
            Err(RetrievalError::IndexFormat(_))
        ));
    }
}
