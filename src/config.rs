//! Carga y gestión de configuración de la aplicación (servidor, LLM, embeddings y troceado).

use std::env;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

use crate::chunker::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::error::{RagError, RagResult};
use crate::vector_store::DEFAULT_TOP_K;

/// Tope de MAX_UPLOAD_MB (1 GiB).
const MAX_UPLOAD_MB_LIMIT: usize = 1024;

/// Proveedor del modelo que responde a las preguntas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    Groq,
    OpenAI,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::OpenAI),
            other => Err(anyhow!("Proveedor LLM no soportado: {other}")),
        }
    }
}

/// Origen de los vectores de embeddings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Feature hashing local, determinista y sin red.
    Local,
    /// all-MiniLM-L6-v2 exportado a ONNX, ejecutado localmente con tract.
    MiniLm,
    OpenAI,
}

impl EmbeddingProvider {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" | "hash" => Ok(Self::Local),
            "minilm" => Ok(Self::MiniLm),
            "openai" => Ok(Self::OpenAI),
            other => Err(anyhow!("Proveedor de embeddings no soportado: {other}")),
        }
    }
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    pub frontend_dir: String,
    pub open_browser: bool,
    pub max_upload_mb: usize,

    pub llm_provider: LlmProvider,
    pub llm_chat_model: String,

    pub embedding_provider: EmbeddingProvider,
    pub llm_embedding_model: String,
    pub embedding_dim: usize,
    pub minilm_model_path: String,
    pub minilm_tokenizer_path: String,

    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:3322".to_string(),
            frontend_dir: "frontend".to_string(),
            open_browser: true,
            max_upload_mb: 50,
            llm_provider: LlmProvider::Groq,
            llm_chat_model: "llama-3.1-8b-instant".to_string(),
            embedding_provider: EmbeddingProvider::Local,
            llm_embedding_model: "text-embedding-3-small".to_string(),
            embedding_dim: 384,
            minilm_model_path: "models/all-MiniLM-L6-v2/model.onnx".to_string(),
            minilm_tokenizer_path: "models/all-MiniLM-L6-v2/tokenizer.json".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let server_addr = env::var("SERVER_ADDR").unwrap_or(defaults.server_addr);
        let frontend_dir = env::var("FRONTEND_DIR").unwrap_or(defaults.frontend_dir);
        let open_browser = parse_var("OPEN_BROWSER", defaults.open_browser)?;
        let max_upload_mb = parse_var("MAX_UPLOAD_MB", defaults.max_upload_mb)?;

        let llm_provider_str = env::var("LLM_PROVIDER").unwrap_or_else(|_| "groq".to_string());
        let llm_provider = LlmProvider::from_str(&llm_provider_str)?;
        let llm_chat_model = env::var("LLM_CHAT_MODEL").unwrap_or_else(|_| match llm_provider {
            LlmProvider::Groq => defaults.llm_chat_model.clone(),
            LlmProvider::OpenAI => "gpt-4o-mini".to_string(),
        });

        let embedding_provider_str =
            env::var("EMBEDDING_PROVIDER").unwrap_or_else(|_| "local".to_string());
        let embedding_provider = EmbeddingProvider::from_str(&embedding_provider_str)?;
        let llm_embedding_model =
            env::var("LLM_EMBEDDING_MODEL").unwrap_or(defaults.llm_embedding_model);
        let embedding_dim = parse_var("EMBEDDING_DIM", defaults.embedding_dim)?;
        let minilm_model_path =
            env::var("MINILM_MODEL_PATH").unwrap_or(defaults.minilm_model_path);
        let minilm_tokenizer_path =
            env::var("MINILM_TOKENIZER_PATH").unwrap_or(defaults.minilm_tokenizer_path);

        let chunk_size = parse_var("CHUNK_SIZE", defaults.chunk_size)?;
        let chunk_overlap = parse_var("CHUNK_OVERLAP", defaults.chunk_overlap)?;
        let top_k = parse_var("TOP_K", defaults.top_k)?;

        Ok(Self {
            server_addr,
            frontend_dir,
            open_browser,
            max_upload_mb,
            llm_provider,
            llm_chat_model,
            embedding_provider,
            llm_embedding_model,
            embedding_dim,
            minilm_model_path,
            minilm_tokenizer_path,
            chunk_size,
            chunk_overlap,
            top_k,
        })
    }

    /// Comprueba las restricciones entre parámetros. Un error aquí es fatal al arrancar.
    pub fn validate(&self) -> RagResult<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("CHUNK_SIZE debe ser mayor que 0".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "CHUNK_OVERLAP ({}) debe ser menor que CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("TOP_K debe ser mayor que 0".into()));
        }
        if self.embedding_provider == EmbeddingProvider::Local && self.embedding_dim == 0 {
            return Err(RagError::Config("EMBEDDING_DIM debe ser mayor que 0".into()));
        }
        if !(1..=MAX_UPLOAD_MB_LIMIT).contains(&self.max_upload_mb) {
            return Err(RagError::Config(format!(
                "MAX_UPLOAD_MB ({}) debe estar entre 1 y {MAX_UPLOAD_MB_LIMIT}",
                self.max_upload_mb
            )));
        }
        Ok(())
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Valor inválido para {name}: '{raw}'")),
        Err(_) => Ok(default),
    }
}
