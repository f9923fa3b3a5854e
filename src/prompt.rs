//! Construcción del prompt a partir del contexto recuperado y la pregunta.
//!
//! Formateo puro: no hay truncado. El tamaño lo acotan `TOP_K` y `CHUNK_SIZE`.

use crate::models::ScoredChunk;

/// Respuesta literal que el modelo debe dar cuando el contexto no contiene la respuesta.
pub const FALLBACK_ANSWER: &str = "I don't know based on the provided document.";

/// Separador entre chunks dentro del bloque de contexto.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

const SYSTEM_INSTRUCTION: &str =
    "You are an AI assistant answering questions strictly based on the given context.";

/// Concatena los textos recuperados en orden de recuperación.
pub fn join_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "\n{SYSTEM_INSTRUCTION}\n\
         If the answer is not present in the context, say:\n\
         \"{FALLBACK_ANSWER}\"\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question:\n\
         {question}\n\
         \n\
         Answer:\n"
    )
}
