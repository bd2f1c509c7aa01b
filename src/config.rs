use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "MedAssist-Edge";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Attached verbatim to every analysis result.
pub const DISCLAIMER: &str = "CLINICAL DECISION SUPPORT ONLY. This output is AI-generated and \
must be reviewed by a qualified clinician. It does not constitute a diagnosis, prescription, \
or medical order. The clinician retains full clinical responsibility.";

/// Upper bound on any single free-text input field (characters).
pub const MAX_INPUT_CHARS: usize = 8000;

/// Clinical notes shorter than this are rejected before any inference.
pub const MIN_NOTES_CHARS: usize = 20;

/// Chunks retrieved per guideline query.
pub const DEFAULT_TOP_K: usize = 4;

/// Cosine similarity below which a retrieved chunk is discarded.
pub const DEFAULT_MIN_RELEVANCE: f32 = 0.20;

pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_MODEL: &str = "medgemma";
pub const DEFAULT_EMBED_MODEL: &str = "all-minilm";
pub const DEFAULT_API_PORT: u16 = 8000;

/// Per-agent generation budgets (tokens).
pub const SOAP_MAX_TOKENS: u32 = 1024;
pub const DIFFERENTIAL_MAX_TOKENS: u32 = 1024;
pub const GUIDELINE_MAX_TOKENS: u32 = 2048;
pub const PATIENT_MAX_TOKENS: u32 = 768;

/// HTTP timeouts for the local engine (seconds).
pub const INFERENCE_TIMEOUT_SECS: u64 = 300;
pub const EMBEDDING_TIMEOUT_SECS: u64 = 60;

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if is_dev() {
        "medassist_lib=debug,medassist=debug,info"
    } else {
        "medassist_lib=info,medassist=info,warn"
    }
}

/// Debug builds auto-enable developer conveniences (verbose logs).
pub fn is_dev() -> bool {
    cfg!(debug_assertions)
}

/// Get the application data directory.
/// `MEDASSIST_DATA_DIR` wins; otherwise `~/MedAssist/`.
pub fn app_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MEDASSIST_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("MedAssist")
}

/// Where the offline ingestion tool writes the guideline index.
pub fn vector_store_dir() -> PathBuf {
    app_data_dir().join("vector_store")
}

/// Get the models directory (for ONNX embeddings, etc.)
pub fn models_dir() -> PathBuf {
    app_data_dir().join("models")
}

/// Get the embedding model directory (all-MiniLM-L6-v2)
pub fn embedding_model_dir() -> PathBuf {
    models_dir().join("all-MiniLM-L6-v2")
}

pub fn audit_log_path() -> PathBuf {
    app_data_dir().join("logs").join("audit.jsonl")
}

pub fn audit_db_path() -> PathBuf {
    app_data_dir().join("logs").join("audit.db")
}

/// Which audit backend the binary wires into the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditBackend {
    Jsonl,
    Sqlite,
}

/// Runtime configuration resolved from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ollama_url: String,
    pub model: String,
    pub embed_model: String,
    pub top_k: usize,
    pub min_relevance: f32,
    pub api_port: u16,
    pub audit_backend: AuditBackend,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            top_k: DEFAULT_TOP_K,
            min_relevance: DEFAULT_MIN_RELEVANCE,
            api_port: DEFAULT_API_PORT,
            audit_backend: AuditBackend::Jsonl,
        }
    }
}

impl AppConfig {
    /// Read `MEDASSIST_*` overrides. Unparseable values keep the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("MEDASSIST_OLLAMA_URL") {
            if is_loopback_url(&url) {
                config.ollama_url = url.trim_end_matches('/').to_string();
            } else {
                tracing::warn!("MEDASSIST_OLLAMA_URL is not a loopback address, ignoring");
            }
        }
        if let Some(model) = lookup("MEDASSIST_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = model;
        }
        if let Some(model) = lookup("MEDASSIST_EMBED_MODEL").filter(|m| !m.trim().is_empty()) {
            config.embed_model = model;
        }
        config.top_k = parse_or_default(lookup("MEDASSIST_TOP_K"), "MEDASSIST_TOP_K", config.top_k);
        config.min_relevance = parse_or_default(
            lookup("MEDASSIST_MIN_RELEVANCE"),
            "MEDASSIST_MIN_RELEVANCE",
            config.min_relevance,
        );
        config.api_port = parse_or_default(
            lookup("MEDASSIST_API_PORT"),
            "MEDASSIST_API_PORT",
            config.api_port,
        );
        if let Some(backend) = lookup("MEDASSIST_AUDIT") {
            match backend.to_ascii_lowercase().as_str() {
                "sqlite" => config.audit_backend = AuditBackend::Sqlite,
                "jsonl" => config.audit_backend = AuditBackend::Jsonl,
                _ => tracing::warn!(value = %backend, "Unknown MEDASSIST_AUDIT backend, using jsonl"),
            }
        }

        config
    }
}

fn parse_or_default<T: std::str::FromStr + Copy>(raw: Option<String>, key: &str, default: T) -> T {
    match raw {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %value, "Invalid configuration value, using default");
            default
        }),
    }
}

/// The inference engine must never leave the machine. Only `http(s)` URLs
/// without credentials whose host is `localhost` or a loopback IP pass.
pub fn is_loopback_url(url: &str) -> bool {
    let Ok(url) = reqwest::Url::parse(url) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    if !url.username().is_empty() || url.password().is_some() {
        return false;
    }
    match url.host_str() {
        Some("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<std::net::IpAddr>()
            .is_ok_and(|ip| ip.is_loopback()),
        None => false,
    }
}
