//! Cálculo de embeddings para chunks y preguntas.
//!
//! El mismo `Embedder` se usa para construir el índice y para las consultas;
//! una dimensión distinta entre ambos es un error de configuración.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{AppConfig, EmbeddingProvider};
use crate::error::{RagError, RagResult};
use crate::minilm::MiniLmEmbedder;

/// Vector de embeddings.
pub type Embedding = Vec<f32>;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    /// Dimensión fija de todos los vectores que produce este modelo.
    fn dimension(&self) -> usize;

    /// Calcula los embeddings de varios textos, en el mismo orden.
    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Embedding>>;

    async fn embed(&self, text: &str) -> RagResult<Embedding> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::Embedding("el modelo no devolvió ningún vector".into()))
    }
}

/// Construye el embedder configurado. MiniLM falla si no encuentra sus ficheros.
pub fn from_config(cfg: &AppConfig) -> RagResult<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match cfg.embedding_provider {
        EmbeddingProvider::Local => Arc::new(HashEmbedder::new(cfg.embedding_dim)),
        EmbeddingProvider::MiniLm => Arc::new(MiniLmEmbedder::load(
            &cfg.minilm_model_path,
            &cfg.minilm_tokenizer_path,
        )?),
        EmbeddingProvider::OpenAI => Arc::new(OpenAiEmbedder::new(&cfg.llm_embedding_model)),
    };
    Ok(embedder)
}

// ---------------------------------------------------------------------
// LOCAL (feature hashing)
// ---------------------------------------------------------------------

/// Embeddings locales mediante el truco del hashing: cada token se asigna a
/// un cubo de `[0, dim)` y el vector de frecuencias se normaliza (L2).
/// Es una función pura: el mismo texto produce siempre el mismo vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
    name: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            name: format!("feature-hash-{dim}"),
        }
    }

    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut tf = vec![0.0f32; self.dim];
        if self.dim == 0 {
            return tf;
        }

        let tokens = text
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|t| !t.is_empty());

        for token in tokens {
            let idx = self.bucket(&token.to_lowercase());
            tf[idx] += 1.0;
        }

        normalize(&mut tf);
        tf
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() % self.dim as u64) as usize
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

// ---------------------------------------------------------------------
// OPENAI (vía Rig)
// ---------------------------------------------------------------------

/// Embeddings remotos de OpenAI a través de Rig.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    model: String,
    dim: usize,
}

impl OpenAiEmbedder {
    pub fn new(model: &str) -> Self {
        use rig::providers::openai::TEXT_EMBEDDING_3_SMALL;

        let model = if model.is_empty() { TEXT_EMBEDDING_3_SMALL } else { model };
        let dim = match model {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        };
        Self {
            model: model.to_string(),
            dim,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Embedding>> {
        use rig::client::EmbeddingsClient as _;
        use rig::embeddings::EmbeddingModel as _;
        use rig::providers::openai;

        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(RagError::Embedding("falta OPENAI_API_KEY en el entorno".into()));
        }

        let client = openai::Client::from_env();
        let embedding_model = client.embedding_model(&self.model);

        // Embeddings en bloque
        let embeddings = embedding_model
            .embed_texts(texts.to_vec())
            .await
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "Número de embeddings ({}) distinto al número de textos ({})",
                embeddings.len(),
                texts.len()
            )));
        }

        let mut result = Vec::with_capacity(embeddings.len());
        for emb in embeddings {
            if emb.vec.len() != self.dim {
                return Err(RagError::Embedding(format!(
                    "el modelo {} devolvió dimensión {} (esperada {})",
                    self.model,
                    emb.vec.len(),
                    self.dim
                )));
            }
            result.push(emb.vec.iter().map(|v| *v as f32).collect());
        }
        debug!("{} embeddings calculados con {}", result.len(), self.model);
        Ok(result)
    }
}

// ---------------------------------------------------------------------
// UTILIDADES
// ---------------------------------------------------------------------

pub(crate) fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Similitud coseno; 0.0 si las dimensiones no coinciden o algún vector es nulo.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
