use std::sync::Arc;

use medassist_lib::config::{self, AppConfig, AuditBackend};
use medassist_lib::engine_service::EngineService;
use medassist_lib::pipeline::audit::{AuditSink, JsonlAuditSink, SqliteAuditSink};
use medassist_lib::pipeline::diagnostic::DiagnosticDump;
use medassist_lib::pipeline::inference::{InferenceError, OllamaClient};
use medassist_lib::pipeline::orchestrator::Pipeline;
use medassist_lib::pipeline::retrieval::{
    EmbeddingModel, FlatIndex, OllamaEmbedder, RetrievalStage, VectorSearch, EMBEDDING_DIM,
};

#[tokio::main]
async fn main() {
    medassist_lib::init_tracing();

    let config = AppConfig::from_env();
    tracing::info!(
        model = %config.model,
        api_port = config.api_port,
        "{} starting v{}",
        config::APP_NAME,
        config::APP_VERSION
    );

    let port = config.api_port;
    // reqwest's blocking client must be built and dropped off the async runtime.
    let pipeline = match tokio::task::spawn_blocking(move || build_pipeline(&config)).await {
        Ok(Ok(pipeline)) => Arc::new(pipeline),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Inference engine unavailable, refusing to start");
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!(error = %e, "Startup task failed");
            std::process::exit(1);
        }
    };

    let server = match medassist_lib::api::start_api_server(Arc::clone(&pipeline), port).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(port, error = %e, "Could not bind API port");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %server.session.server_addr, "Ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Could not listen for shutdown signal");
    }
    server.shutdown().await;

    let _ = tokio::task::spawn_blocking(move || drop(pipeline)).await;
    tracing::info!("{} stopped", config::APP_NAME);
}

fn build_pipeline(config: &AppConfig) -> Result<Pipeline, InferenceError> {
    let client = OllamaClient::new(
        &config.ollama_url,
        &config.model,
        config::INFERENCE_TIMEOUT_SECS,
    )?;
    client.verify_model()?;
    tracing::info!(url = client.base_url(), "Inference engine ready");

    let engine = EngineService::new(Box::new(client));
    let retrieval = build_retrieval(config)?;

    Ok(
        Pipeline::new(Arc::new(engine), retrieval, build_audit_sink(config))
            .with_dump(DiagnosticDump::from_env()),
    )
}

/// An empty or missing index leaves retrieval disabled; the guideline agent
/// then reports that no excerpts were available.
fn build_retrieval(config: &AppConfig) -> Result<RetrievalStage, InferenceError> {
    let index = FlatIndex::load_or_empty(&config::vector_store_dir(), EMBEDDING_DIM);
    if index.is_empty() {
        tracing::warn!("No guideline excerpts indexed, retrieval disabled");
        return Ok(RetrievalStage::disabled());
    }

    let embedder = build_embedder(config, index.dimension())?;
    Ok(RetrievalStage::new(
        embedder,
        Box::new(index),
        config.top_k,
        config.min_relevance,
    ))
}

fn build_embedder(
    config: &AppConfig,
    dimension: usize,
) -> Result<Box<dyn EmbeddingModel + Send + Sync>, InferenceError> {
    #[cfg(feature = "onnx-embeddings")]
    {
        let dir = config::embedding_model_dir();
        if dir.exists() {
            match medassist_lib::pipeline::retrieval::OnnxEmbedder::load(&dir) {
                Ok(embedder) if embedder.dimension() == dimension => return Ok(Box::new(embedder)),
                Ok(embedder) => tracing::warn!(
                    expected = dimension,
                    actual = embedder.dimension(),
                    "ONNX embedder does not match index, using Ollama embeddings"
                ),
                Err(e) => tracing::warn!(error = %e, "ONNX embedder unavailable, using Ollama embeddings"),
            }
        }
    }

    let client = OllamaClient::new(
        &config.ollama_url,
        &config.embed_model,
        config::EMBEDDING_TIMEOUT_SECS,
    )?;
    Ok(Box::new(OllamaEmbedder::new(
        client,
        &config.embed_model,
        dimension,
    )))
}

fn build_audit_sink(config: &AppConfig) -> Box<dyn AuditSink + Send + Sync> {
    if config.audit_backend == AuditBackend::Sqlite {
        match SqliteAuditSink::open(&config::audit_db_path()) {
            Ok(sink) => return Box::new(sink),
            Err(e) => tracing::error!(error = %e, "SQLite audit unavailable, falling back to JSONL"),
        }
    }
    Box::new(JsonlAuditSink::new(config::audit_log_path()))
}
