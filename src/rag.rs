//! Pipeline RAG sobre un único PDF.
//!
//! Flujo:
//!   1. Subida: PDF → páginas → chunks → embeddings → índice nuevo, que
//!      sustituye al de la sesión sólo si todo el proceso termina bien.
//!   2. Pregunta: embedding de la pregunta → top-k chunks → prompt → LLM →
//!      nueva entrada en la transcripción. Si el LLM falla no se añade nada.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::{
    chunker::TextChunker,
    config::AppConfig,
    embeddings::{self, Embedder, Embedding},
    error::{RagError, RagResult},
    llm::{AnsweringClient, LlmManager},
    loader,
    models::{ScoredChunk, TranscriptEntry},
    prompt,
    session::SharedSession,
    vector_store::VectorIndex,
};

/// Textos por petición de embeddings.
const EMBED_BATCH_SIZE: usize = 64;

/// Resumen de la indexación de un documento.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IngestionSummary {
    pub document: String,
    pub pages: usize,
    pub chunks: usize,
}

impl std::fmt::Display for IngestionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}': {} páginas, {} chunks indexados.",
            self.document, self.pages, self.chunks
        )
    }
}

/// Prompt listo para enviar junto con los chunks que lo originaron.
#[derive(Debug, Clone)]
pub struct PreparedPrompt {
    pub prompt: String,
    pub retrieved: Vec<ScoredChunk>,
}

#[derive(Clone)]
pub struct RagPipeline {
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    answerer: Arc<dyn AnsweringClient>,
    top_k: usize,
}

impl RagPipeline {
    pub fn new(
        chunker: TextChunker,
        embedder: Arc<dyn Embedder>,
        answerer: Arc<dyn AnsweringClient>,
        top_k: usize,
    ) -> Self {
        Self {
            chunker,
            embedder,
            answerer,
            top_k: top_k.max(1),
        }
    }

    /// Pipeline de producción: embedder configurado y `LlmManager` vía Rig.
    pub fn from_config(cfg: &AppConfig) -> RagResult<Self> {
        cfg.validate()?;
        let chunker = TextChunker::new(cfg.chunk_size, cfg.chunk_overlap)?;
        Ok(Self::new(
            chunker,
            embeddings::from_config(cfg)?,
            Arc::new(LlmManager::from_config(cfg)),
            cfg.top_k,
        ))
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    // ---------------------------------------------------------------------
    // INDEXACIÓN
    // ---------------------------------------------------------------------

    /// Construye un índice completo a partir de los bytes de un PDF, sin
    /// tocar ninguna sesión.
    pub async fn build_index(
        &self,
        document: &str,
        bytes: Vec<u8>,
    ) -> RagResult<(VectorIndex, IngestionSummary)> {
        let pages = tokio::task::spawn_blocking(move || loader::load_pdf(&bytes))
            .await
            .map_err(|e| RagError::Load(format!("la tarea de extracción falló: {e}")))??;

        let chunks = self.chunker.split_pages(&pages);
        if chunks.is_empty() {
            return Err(RagError::Load("el PDF no contiene texto extraíble".into()));
        }
        info!("'{document}': {} páginas troceadas en {} chunks", pages.len(), chunks.len());

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed_all(&texts).await?;

        let index = VectorIndex::build(self.embedder.dimension(), chunks, vectors)?;
        let summary = IngestionSummary {
            document: document.to_string(),
            pages: pages.len(),
            chunks: index.len(),
        };
        Ok((index, summary))
    }

    /// Indexa un PDF y, sólo si todo ha ido bien, sustituye el índice de la sesión.
    pub async fn ingest_pdf(
        &self,
        session: &SharedSession,
        document: &str,
        bytes: Vec<u8>,
    ) -> RagResult<IngestionSummary> {
        let (index, summary) = self.build_index(document, bytes).await?;
        session.lock().await.set_index(index, document);
        info!("Índice de la sesión sustituido. {summary}");
        Ok(summary)
    }

    async fn embed_all(&self, texts: &[String]) -> RagResult<Vec<Embedding>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            vectors.extend(self.embedder.embed_batch(batch).await?);
        }
        Ok(vectors)
    }

    // ---------------------------------------------------------------------
    // PREGUNTAS
    // ---------------------------------------------------------------------

    /// Recupera los `top_k` chunks más relevantes para la pregunta.
    pub async fn retrieve(&self, index: &VectorIndex, question: &str) -> RagResult<Vec<ScoredChunk>> {
        if index.dimension() != self.embedder.dimension() {
            return Err(RagError::Embedding(format!(
                "el índice tiene dimensión {} y el modelo {} produce {}",
                index.dimension(),
                self.embedder.model_name(),
                self.embedder.dimension()
            )));
        }
        let query_vec = self.embedder.embed(question).await?;
        index.query(&query_vec, self.top_k)
    }

    /// Recupera el contexto y construye el prompt sin llamar al LLM.
    pub async fn prepare_prompt(&self, index: &VectorIndex, question: &str) -> RagResult<PreparedPrompt> {
        let retrieved = self.retrieve(index, question).await?;
        let context = prompt::join_context(&retrieved);
        Ok(PreparedPrompt {
            prompt: prompt::build_prompt(&context, question),
            retrieved,
        })
    }

    /// Ciclo completo de una pregunta. La transcripción sólo cambia si hay respuesta.
    pub async fn ask(&self, session: &SharedSession, question: &str) -> RagResult<TranscriptEntry> {
        let index = session
            .lock()
            .await
            .index_snapshot()
            .ok_or_else(|| RagError::NotReady("sube un PDF antes de preguntar".into()))?;

        let prepared = self.prepare_prompt(&index, question).await?;
        info!(
            "Pregunta con {} chunks de contexto (prompt de {} caracteres)",
            prepared.retrieved.len(),
            prepared.prompt.len()
        );

        let answer = match self.answerer.answer(&prepared.prompt).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!("La pregunta no se ha respondido: {err}");
                return Err(err);
            }
        };

        let mut sources = Vec::new();
        for scored in &prepared.retrieved {
            if !sources.contains(&scored.chunk.page) {
                sources.push(scored.chunk.page);
            }
        }

        let entry = TranscriptEntry {
            question: question.to_string(),
            answer,
            sources,
            asked_at: Utc::now(),
        };
        session.lock().await.append_entry(entry.clone());
        Ok(entry)
    }
}
