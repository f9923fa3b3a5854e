//! Preguntas y respuestas sobre un PDF mediante RAG en memoria.
//!
//! El documento se trocea, se indexa por embeddings y cada pregunta se
//! responde con un LLM usando sólo los chunks recuperados como contexto.

pub mod api;
pub mod app_state;
pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod llm;
pub mod loader;
pub mod minilm;
pub mod models;
pub mod prompt;
pub mod rag;
pub mod session;
pub mod vector_store;

pub use error::{RagError, RagResult};
