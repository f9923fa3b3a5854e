//! Estado de una sesión interactiva: el índice del documento activo y la
//! transcripción de preguntas y respuestas. Nada se persiste.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::TranscriptEntry;
use crate::vector_store::VectorIndex;

/// Sesión compartida entre handlers. El índice se sustituye entero bajo el
/// candado, así que un lector ve el índice viejo o el nuevo completos.
pub type SharedSession = Arc<Mutex<Session>>;

#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    index: Option<Arc<VectorIndex>>,
    document: Option<String>,
    transcript: Vec<TranscriptEntry>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            index: None,
            document: None,
            transcript: Vec::new(),
        }
    }

    pub fn shared() -> SharedSession {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Sustituye incondicionalmente el índice anterior.
    pub fn set_index(&mut self, index: VectorIndex, document: impl Into<String>) {
        self.index = Some(Arc::new(index));
        self.document = Some(document.into());
    }

    /// Copia barata del índice actual para consultarlo sin mantener el candado.
    pub fn index_snapshot(&self) -> Option<Arc<VectorIndex>> {
        self.index.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.index.as_ref().is_some_and(|idx| !idx.is_empty())
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn chunks_indexed(&self) -> usize {
        self.index.as_ref().map_or(0, |idx| idx.len())
    }

    /// Añade una entrada al final. Las entradas nunca se editan ni se borran.
    pub fn append_entry(&mut self, entry: TranscriptEntry) {
        self.transcript.push(entry);
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }
}
