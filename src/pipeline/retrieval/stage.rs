use serde::Serialize;

use super::embedder::{HashEmbedder, EMBEDDING_DIM};
use super::index::FlatIndex;
use super::types::{EmbeddingModel, RetrievedChunk, VectorSearch};
use super::RetrievalError;
use crate::config::{DEFAULT_MIN_RELEVANCE, DEFAULT_TOP_K};
use crate::models::{DifferentialDiagnosis, SoapNote};
use crate::pipeline::validation::{NOT_DOCUMENTED, UNAVAILABLE};

/// What the audit trail keeps about one retrieval.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalSummary {
    pub query_chars: usize,
    pub chunk_ids: Vec<String>,
    pub sources: Vec<String>,
    pub top_score: Option<f32>,
    /// Set when retrieval failed and was treated as empty.
    pub error: Option<String>,
}

impl RetrievalSummary {
    pub fn new(query: &str, chunks: &[RetrievedChunk], error: Option<String>) -> Self {
        Self {
            query_chars: query.chars().count(),
            chunk_ids: chunks.iter().map(|c| c.chunk_id.clone()).collect(),
            sources: distinct_sources(chunks),
            top_score: chunks.first().map(|c| c.score),
            error,
        }
    }
}

/// Embeds a clinical query and searches the guideline index. Stateless per
/// call; the index is read-only.
pub struct RetrievalStage {
    embedder: Box<dyn EmbeddingModel + Send + Sync>,
    index: Box<dyn VectorSearch + Send + Sync>,
    top_k: usize,
    min_relevance: f32,
}

impl RetrievalStage {
    pub fn new(
        embedder: Box<dyn EmbeddingModel + Send + Sync>,
        index: Box<dyn VectorSearch + Send + Sync>,
        top_k: usize,
        min_relevance: f32,
    ) -> Self {
        Self {
            embedder,
            index,
            top_k,
            min_relevance,
        }
    }

    /// Empty index: every query returns no chunks.
    pub fn disabled() -> Self {
        Self::new(
            Box::new(HashEmbedder::default()),
            Box::new(FlatIndex::empty(EMBEDDING_DIM)),
            DEFAULT_TOP_K,
            DEFAULT_MIN_RELEVANCE,
        )
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn is_enabled(&self) -> bool {
        !self.index.is_empty()
    }

    /// Up to `k` chunks above the relevance threshold, best first.
    /// An empty result is valid. Errors are reported, not swallowed.
    pub fn try_retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        if query.trim().is_empty() || self.index.is_empty() {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed(query)?;
        self.index.search(&embedding, k, self.min_relevance)
    }

    /// Like [`try_retrieve`](Self::try_retrieve), with failures degraded to
    /// an empty result.
    pub fn retrieve(&self, query: &str, k: usize) -> Vec<RetrievedChunk> {
        self.try_retrieve(query, k).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Guideline retrieval failed, continuing without excerpts");
            Vec::new()
        })
    }
}

/// Retrieval query: the SOAP assessment plus the differential's condition
/// names. The clinician's raw note never goes into the query.
pub fn build_query(soap: &SoapNote, ddx: &DifferentialDiagnosis) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let assessment = soap.assessment.trim();
    if !assessment.is_empty() && assessment != NOT_DOCUMENTED && assessment != UNAVAILABLE {
        parts.push(assessment);
    }
    parts.extend(ddx.condition_names().map(str::trim).filter(|c| !c.is_empty()));
    parts.join(" ")
}

/// Distinct chunk sources in rank order.
pub fn distinct_sources(chunks: &[RetrievedChunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for chunk in chunks {
        if !chunk.source.is_empty() && !sources.contains(&chunk.source) {
            sources.push(chunk.source.clone());
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiagnosisEntry, Likelihood};
    use crate::pipeline::retrieval::IndexedChunk;
    use crate::pipeline::validation::schemas;

    struct BrokenEmbedder;

    impl EmbeddingModel for BrokenEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
            Err(RetrievalError::Embedding("model offline".into()))
        }

        fn dimension(&self) -> usize {
            EMBEDDING_DIM
        }
    }

    fn guideline_index() -> FlatIndex {
        let embedder = HashEmbedder::default();
        let texts = [
            ("cap.md", "cap-1", "Community acquired pneumonia: obtain chest radiograph"),
            ("cap.md", "cap-2", "Pneumonia severity assessment with CURB-65"),
            ("thyroid.md", "thy-1", "Thyroid function testing intervals for hypothyroidism"),
        ];
        let chunks = texts
            .iter()
            .map(|(source, id, text)| IndexedChunk {
                source: source.to_string(),
                chunk_id: id.to_string(),
                text: text.to_string(),
                embedding: embedder.embed(text).unwrap(),
            })
            .collect();
        FlatIndex::from_chunks(EMBEDDING_DIM, chunks).unwrap()
    }

    fn stage() -> RetrievalStage {
        RetrievalStage::new(
            Box::new(HashEmbedder::default()),
            Box::new(guideline_index()),
            DEFAULT_TOP_K,
            0.1,
        )
    }

    fn ddx(conditions: &[&str]) -> DifferentialDiagnosis {
        DifferentialDiagnosis {
            diagnoses: conditions
                .iter()
                .enumerate()
                .map(|(i, c)| DiagnosisEntry {
                    rank: (i + 1) as u8,
                    condition: c.to_string(),
                    likelihood: Likelihood::Moderate,
                    supporting_features: String::new(),
                    against_features: String::new(),
                })
                .collect(),
            reasoning_summary: String::new(),
            raw: String::new(),
        }
    }

    #[test]
    fn relevant_chunks_rank_first() {
        let chunks = stage().retrieve("community acquired pneumonia", 4);
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].source, "cap.md");
        assert!(chunks.iter().all(|c| c.source != "thyroid.md"));
        assert!(chunks.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn k_limits_results() {
        assert!(stage().retrieve("pneumonia chest radiograph severity", 1).len() <= 1);
    }

    #[test]
    fn retrieval_is_deterministic() {
        let s = stage();
        assert_eq!(s.retrieve("pneumonia", 4), s.retrieve("pneumonia", 4));
    }

    #[test]
    fn blank_query_and_empty_index_return_nothing() {
        assert!(stage().retrieve("   ", 4).is_empty());
        let disabled = RetrievalStage::disabled();
        assert!(!disabled.is_enabled());
        assert!(disabled.retrieve("pneumonia", 4).is_empty());
    }

    #[test]
    fn nothing_above_threshold_returns_nothing() {
        assert!(stage().retrieve("fracture splint orthopaedic", 4).is_empty());
    }

    #[test]
    fn embedding_failure_degrades_to_empty() {
        let s = RetrievalStage::new(
            Box::new(BrokenEmbedder),
            Box::new(guideline_index()),
            DEFAULT_TOP_K,
            0.1,
        );
        assert!(s.try_retrieve("pneumonia", 4).is_err());
        assert!(s.retrieve("pneumonia", 4).is_empty());
    }

    #[test]
    fn query_uses_assessment_and_conditions_only() {
        let mut soap = schemas::soap_fallback();
        soap.subjective = "Patient John Smith reports cough".into();
        soap.assessment = "Suspected lower respiratory tract infection".into();
        let query = build_query(&soap, &ddx(&["Community-acquired pneumonia", "Acute bronchitis"]));
        assert_eq!(
            query,
            "Suspected lower respiratory tract infection Community-acquired pneumonia Acute bronchitis"
        );
        assert!(!query.contains("John Smith"));
    }

    #[test]
    fn query_skips_placeholder_assessment() {
        let soap = schemas::soap_fallback();
        assert_eq!(build_query(&soap, &ddx(&[])), "");
        assert_eq!(build_query(&soap, &ddx(&["Asthma"])), "Asthma");
    }

    #[test]
    fn summary_records_sources_in_rank_order() {
        let chunks = stage().retrieve("pneumonia", 4);
        let summary = RetrievalSummary::new("pneumonia", &chunks, None);
        assert_eq!(summary.query_chars, 9);
        assert_eq!(summary.sources, vec!["cap.md".to_string()]);
        assert_eq!(summary.chunk_ids.len(), chunks.len());
    }

    #[test]
    fn distinct_sources_dedupes_preserving_order() {
        let chunk = |source: &str, rank| RetrievedChunk {
            source: source.into(),
            chunk_id: format!("{source}-{rank}"),
            text: String::new(),
            score: 0.5,
            rank,
        };
        let chunks = vec![chunk("b.md", 1), chunk("a.md", 2), chunk("b.md", 3)];
        assert_eq!(distinct_sources(&chunks), vec!["b.md", "a.md"]);
    }
}
