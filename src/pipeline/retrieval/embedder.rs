use super::types::EmbeddingModel;
use super::RetrievalError;
use crate::pipeline::inference::OllamaClient;

/// Standard embedding dimension for all-MiniLM-L6-v2
pub const EMBEDDING_DIM: usize = 384;

// ═══════════════════════════════════════════════════════════
// ONNX Embedder, behind `onnx-embeddings` feature
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx-embeddings")]
mod onnx {
    use super::{l2_normalize, mean_pool, EmbeddingModel, RetrievalError, EMBEDDING_DIM};
    use ort::session::Session;
    use std::path::Path;
    use std::sync::Mutex;

    /// all-MiniLM-L6-v2 through ONNX Runtime.
    ///
    /// Requires two files in the model directory:
    /// - `model.onnx`: the ONNX model weights
    /// - `tokenizer.json`: HuggingFace tokenizer definition
    ///
    /// `ort::Session::run` needs `&mut self`, hence the Mutex.
    pub struct OnnxEmbedder {
        session: Mutex<Session>,
        tokenizer: tokenizers::Tokenizer,
    }

    impl OnnxEmbedder {
        /// `model_dir` must contain `model.onnx` and `tokenizer.json`.
        pub fn load(model_dir: &Path) -> Result<Self, RetrievalError> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(RetrievalError::ModelNotFound(model_path));
            }
            if !tokenizer_path.exists() {
                return Err(RetrievalError::ModelNotFound(tokenizer_path));
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| RetrievalError::ModelInit(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| RetrievalError::ModelInit(e.to_string()))?
                .commit_from_file(&model_path)
                .map_err(|e: ort::Error| {
                    RetrievalError::ModelInit(format!("ONNX load failed: {e}"))
                })?;

            let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| RetrievalError::ModelInit(format!("Tokenizer load failed: {e}")))?;

            tracing::info!(dir = %model_dir.display(), "ONNX embedder loaded");

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
            })
        }

        /// Tokenize, run the model, mean-pool over the attention mask, L2-normalize.
        fn infer(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
            use ort::value::TensorRef;

            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| RetrievalError::Tokenization(e.to_string()))?;

            let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
            let attention_mask: Vec<i64> = encoding
                .get_attention_mask()
                .iter()
                .map(|&m| m as i64)
                .collect();
            let token_type_ids: Vec<i64> = encoding
                .get_type_ids()
                .iter()
                .map(|&t| t as i64)
                .collect();

            let seq_len = input_ids.len();
            let embedding_err = |e: ndarray::ShapeError| RetrievalError::Embedding(e.to_string());

            let ids_array =
                ndarray::Array2::from_shape_vec((1, seq_len), input_ids).map_err(embedding_err)?;
            let mask_array = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())
                .map_err(embedding_err)?;
            let type_array = ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids)
                .map_err(embedding_err)?;

            let ids_tensor = TensorRef::from_array_view(&ids_array)
                .map_err(|e| RetrievalError::Embedding(e.to_string()))?;
            let mask_tensor = TensorRef::from_array_view(&mask_array)
                .map_err(|e| RetrievalError::Embedding(e.to_string()))?;
            let type_tensor = TensorRef::from_array_view(&type_array)
                .map_err(|e| RetrievalError::Embedding(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| RetrievalError::Embedding("Session lock poisoned".to_string()))?;

            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_tensor])
                .map_err(|e| RetrievalError::Embedding(format!("ONNX inference failed: {e}")))?;

            let (shape, output_data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| RetrievalError::Embedding(format!("Output extraction: {e}")))?;

            let mut pooled = mean_pool(&shape, output_data, &attention_mask, EMBEDDING_DIM)?;
            l2_normalize(&mut pooled);
            Ok(pooled)
        }
    }

    impl EmbeddingModel for OnnxEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
            self.infer(text)
        }

        fn dimension(&self) -> usize {
            EMBEDDING_DIM
        }
    }
}

#[cfg(feature = "onnx-embeddings")]
pub use onnx::OnnxEmbedder;

// ═══════════════════════════════════════════════════════════
// Ollama Embedder, local `/api/embed`
// ═══════════════════════════════════════════════════════════

/// Embeddings from a model served by the local Ollama instance.
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    dimension: usize,
}

impl OllamaEmbedder {
    /// `dimension` is what the index was built with; responses of any
    /// other size are rejected.
    pub fn new(client: OllamaClient, model: &str, dimension: usize) -> Self {
        Self {
            client,
            model: model.to_string(),
            dimension,
        }
    }
}

impl EmbeddingModel for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut vector = self
            .client
            .embed(&self.model, text)
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;
        if vector.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ═══════════════════════════════════════════════════════════
// Hash Embedder, deterministic, dependency-free
// ═══════════════════════════════════════════════════════════

/// Feature-hashing bag-of-words embedder. Deterministic and offline; texts
/// sharing words land close together. Used in tests and when no neural
/// embedding model is installed.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(EMBEDDING_DIM)
    }
}

impl EmbeddingModel for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        Ok(hashed_vector(text, self.dimension))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn hashed_vector(text: &str, dim: usize) -> Vec<f32> {
    let mut vec = vec![0.0f32; dim];

    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let hash = fnv1a(&token.to_lowercase());
        let slot = (hash % dim as u64) as usize;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        vec[slot] += sign;
    }

    l2_normalize(&mut vec);
    vec
}

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Mean of the token embeddings selected by `mask`. `shape` is the model
/// output shape `[1, seq_len, dim]`; the buffer must hold exactly that many
/// values and `mask` one entry per token.
pub fn mean_pool(
    shape: &[i64],
    data: &[f32],
    mask: &[i64],
    dim: usize,
) -> Result<Vec<f32>, RetrievalError> {
    let bad_shape = || {
        RetrievalError::Embedding(format!(
            "Unexpected output shape {shape:?} for {} tokens and {} values, expected [1, {}, {dim}]",
            mask.len(),
            data.len(),
            mask.len()
        ))
    };
    let [batch, seq_len, width] = shape else {
        return Err(bad_shape());
    };
    let (Ok(batch), Ok(seq_len), Ok(width)) = (
        usize::try_from(*batch),
        usize::try_from(*seq_len),
        usize::try_from(*width),
    ) else {
        return Err(bad_shape());
    };
    if batch != 1 || dim == 0 || width != dim || seq_len != mask.len() || data.len() != seq_len * dim {
        return Err(bad_shape());
    }

    let mut pooled = vec![0.0f32; dim];
    let mut mask_sum = 0.0f32;
    for (token, &m) in data.chunks_exact(dim).zip(mask) {
        let weight = m as f32;
        mask_sum += weight;
        for (p, v) in pooled.iter_mut().zip(token) {
            *p += v * weight;
        }
    }
    if mask_sum > 0.0 {
        pooled.iter_mut().for_each(|p| *p /= mask_sum);
    }
    Ok(pooled)
}

/// Scale to unit length. Zero vectors are left as is.
pub fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in vec.iter_mut() {
            *val /= norm;
        }
    }
}
