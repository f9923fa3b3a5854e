//! Rutas HTTP: subida del PDF, preguntas, transcripción, estado y apagado.

use axum::{
    extract::{DefaultBodyLimit, Json, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::spawn;
use tracing::{error, info, warn};

use crate::{
    app_state::AppState,
    error::RagError,
    models::TranscriptEntry,
    rag::IngestionSummary,
};

type ApiError = (StatusCode, Json<serde_json::Value>);

// --- Payloads de la API ---

#[derive(Deserialize)]
pub struct AskPayload {
    question: String,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    let body_limit = app_state.config.max_upload_mb.saturating_mul(1024 * 1024);
    Router::new()
        .route("/api/upload", post(upload_handler))
        .route("/api/ask", post(ask_handler))
        .route("/api/transcript", get(transcript_handler))
        .route("/api/status", get(status_handler))
        .route("/api/session/reset", post(reset_session_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app_state)
}

fn rag_error(err: &RagError) -> ApiError {
    (
        err.status_code(),
        Json(json!({ "error": err.user_message(), "kind": err.kind() })),
    )
}

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

// --- Handlers ---

/// Recibe el PDF (campo multipart `file`) y reconstruye el índice de la sesión.
#[axum::debug_handler]
async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestionSummary>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(&format!("Formulario inválido: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("documento.pdf").to_string();
        let content_type = field.content_type().map(str::to_string);
        if !is_pdf(&filename, content_type.as_deref()) {
            return Err(bad_request("Sólo se admiten ficheros PDF."));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(&format!("No se pudo leer el fichero: {e}")))?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(bad_request("Falta el campo 'file' con el PDF."));
    };

    let Some(session) = state.begin_upload(&filename) else {
        return Err((
            StatusCode::CONFLICT,
            Json(json!({ "error": "Ya se está procesando otro PDF." })),
        ));
    };

    // La indexación sigue aunque el cliente se desconecte.
    let task_state = state.clone();
    let task = spawn(async move {
        let result = task_state.pipeline.ingest_pdf(&session, &filename, bytes).await;
        if let Err(err) = &result {
            error!("Error procesando '{filename}': {err}");
        }
        task_state.finish_upload(&session, &result);
        result
    });

    match task.await {
        Ok(Ok(summary)) => Ok(Json(summary)),
        Ok(Err(err)) => Err(rag_error(&err)),
        Err(join_err) => {
            error!("La tarea de indexación terminó de forma inesperada: {join_err}");
            let err = RagError::Load("la tarea de indexación se interrumpió".into());
            state.update_status(|status| {
                status.is_busy = false;
                status.message = err.user_message();
            });
            Err(rag_error(&err))
        }
    }
}

#[axum::debug_handler]
async fn ask_handler(
    State(state): State<AppState>,
    Json(payload): Json<AskPayload>,
) -> Result<Json<TranscriptEntry>, ApiError> {
    let question = payload.question.trim();
    if question.is_empty() {
        return Err(bad_request("La pregunta está vacía."));
    }

    let session = state.current_session();
    match state.pipeline.ask(&session, question).await {
        Ok(entry) => Ok(Json(entry)),
        Err(err) => {
            warn!("Pregunta rechazada ({}): {err}", err.kind());
            Err(rag_error(&err))
        }
    }
}

#[axum::debug_handler]
async fn transcript_handler(State(state): State<AppState>) -> Json<Vec<TranscriptEntry>> {
    let session = state.current_session();
    let entries = session.lock().await.transcript().to_vec();
    Json(entries)
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<crate::app_state::Status> {
    Json(state.status_snapshot())
}

#[axum::debug_handler]
async fn reset_session_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let Some(session) = state.reset_session() else {
        return Err((
            StatusCode::CONFLICT,
            Json(json!({ "error": "Espera a que termine el PDF en curso para reiniciar la sesión." })),
        ));
    };
    let id = session.lock().await.id;
    info!("Sesión reiniciada: {id}");
    Ok((StatusCode::OK, Json(json!({ "session_id": id }))))
}

// --- Handler de Apagado y Utilidades ---

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = crate::app_state::lock(&state.shutdown_sender).take() {
        let _ = sender.send(());
    }
    StatusCode::OK
}

/// Acepta el PDF por tipo MIME declarado o, si falta, por la extensión del nombre.
fn is_pdf(filename: &str, content_type: Option<&str>) -> bool {
    match content_type {
        Some("application/pdf") => true,
        Some("application/octet-stream") | None => {
            mime_guess::from_path(filename).first_raw() == Some("application/pdf")
        }
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf("informe.pdf", Some("application/pdf")));
        assert!(is_pdf("informe.PDF", None));
        assert!(is_pdf("informe.pdf", Some("application/octet-stream")));
        assert!(!is_pdf("notas.txt", None));
        assert!(!is_pdf("informe.pdf", Some("text/plain")));
    }
}
