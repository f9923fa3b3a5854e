//! Modelos de dominio (páginas, chunks, resultados de búsqueda y transcripción).

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Texto plano de una página del PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Número de página, empezando en 1.
    pub number: usize,
    pub text: String,
}

/// Representa un trozo contiguo del texto de una página.
/// No se modifica una vez creado por el chunker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub id: String,
    /// Página de origen (procedencia).
    pub page: usize,
    /// Posición global del chunk dentro del documento, en orden de inserción.
    pub index: usize,
    /// Desplazamiento en caracteres dentro del texto de la página.
    pub start: usize,
    pub text: String,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Chunk recuperado junto con su similitud con la consulta.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub score: f32,
    pub chunk: Chunk,
}

/// Par pregunta/respuesta dentro de la transcripción de la sesión.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub question: String,
    pub answer: String,
    /// Páginas de los chunks usados como contexto, en orden de recuperación.
    pub sources: Vec<usize>,
    pub asked_at: DateTime<Utc>,
}
