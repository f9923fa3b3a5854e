//! Errores del pipeline de preguntas y respuestas.
//!
//! Cada variante corresponde a una acción concreta del usuario (una subida o
//! una pregunta) y nunca invalida el estado ya confirmado de la sesión.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    /// PDF ilegible o sin texto extraíble. La subida se aborta.
    #[error("No se pudo cargar el PDF: {0}")]
    Load(String),
    /// Parámetros de configuración inválidos. Fatal al arrancar.
    #[error("Configuración inválida: {0}")]
    Config(String),
    /// Modelo de embeddings no disponible o dimensión incoherente.
    #[error("Error de embeddings: {0}")]
    Embedding(String),
    /// Pregunta recibida antes de construir ningún índice.
    #[error("Todavía no hay ningún documento indexado: {0}")]
    NotReady(String),
    /// Fallo de red, autenticación o del proveedor del LLM.
    #[error("Error de inferencia: {0}")]
    Inference(String),
}

impl RagError {
    /// Etiqueta estable que se expone en las respuestas de la API.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Load(_) => "load_error",
            Self::Config(_) => "config_error",
            Self::Embedding(_) => "embedding_error",
            Self::NotReady(_) => "not_ready",
            Self::Inference(_) => "inference_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Load(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Embedding(_) => StatusCode::BAD_GATEWAY,
            Self::NotReady(_) => StatusCode::CONFLICT,
            Self::Inference(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Mensaje de estado para el usuario, uno por tipo de error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Load(_) => format!("{self}. Prueba con otro fichero PDF."),
            Self::Config(_) => format!("{self}. Revisa la configuración del servidor."),
            Self::Embedding(_) => format!("{self}. El documento no se ha indexado."),
            Self::NotReady(_) => "Sube un PDF antes de hacer preguntas.".to_string(),
            Self::Inference(_) => format!("{self}. La pregunta no se ha respondido, inténtalo de nuevo."),
        }
    }
}

pub type RagResult<T> = std::result::Result<T, RagError>;
