//! Estado compartido por los handlers: sesión activa, indicador de progreso y apagado.

use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use crate::{
    config::AppConfig,
    error::RagResult,
    rag::{IngestionSummary, RagPipeline},
    session::{Session, SharedSession},
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: RagPipeline,
    /// Sesión activa. Se sustituye por una nueva al reiniciar.
    pub session: Arc<Mutex<SharedSession>>,
    pub status: Arc<Mutex<Status>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: RagPipeline, shutdown_sender: Option<oneshot::Sender<()>>) -> Self {
        Self {
            config,
            pipeline,
            session: Arc::new(Mutex::new(Session::shared())),
            status: Arc::new(Mutex::new(Status::idle())),
            shutdown_sender: Arc::new(Mutex::new(shutdown_sender)),
        }
    }

    /// Sesión activa en este momento.
    pub fn current_session(&self) -> SharedSession {
        lock(&self.session).clone()
    }

    /// Termina la sesión actual (índice y transcripción) y arranca una nueva.
    /// Devuelve `None` si hay una subida en curso: la sesión no cambia.
    pub fn reset_session(&self) -> Option<SharedSession> {
        let mut status = lock(&self.status);
        if status.is_busy {
            return None;
        }
        let fresh = Session::shared();
        *lock(&self.session) = fresh.clone();
        *status = Status::idle();
        Some(fresh)
    }

    /// Marca el inicio de una subida. Devuelve la sesión destino, o `None`
    /// si ya hay otra subida en curso.
    pub fn begin_upload(&self, document: &str) -> Option<SharedSession> {
        let mut status = lock(&self.status);
        if status.is_busy {
            return None;
        }
        status.is_busy = true;
        status.message = format!("Procesando '{document}'...");
        Some(self.current_session())
    }

    /// Cierra una subida: libera `is_busy` siempre, pero sólo publica el
    /// resultado si `session` sigue siendo la sesión activa.
    pub fn finish_upload(&self, session: &SharedSession, result: &RagResult<IngestionSummary>) {
        let mut status = lock(&self.status);
        status.is_busy = false;
        if !Arc::ptr_eq(session, &self.current_session()) {
            return;
        }
        match result {
            Ok(summary) => {
                status.ready = true;
                status.document = Some(summary.document.clone());
                status.chunks_indexed = summary.chunks;
                status.message = format!("PDF procesado correctamente. {summary}");
            }
            // El índice anterior, si existía, sigue en uso.
            Err(err) => status.message = err.user_message(),
        }
    }

    pub fn update_status(&self, f: impl FnOnce(&mut Status)) {
        f(&mut lock(&self.status));
    }

    pub fn status_snapshot(&self) -> Status {
        lock(&self.status).clone()
    }
}

/// Un candado envenenado sólo indica que otro handler hizo panic; el dato sigue siendo válido.
pub fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Status {
    pub is_busy: bool,
    pub ready: bool,
    pub message: String,
    pub document: Option<String>,
    pub chunks_indexed: usize,
}

impl Status {
    pub fn idle() -> Self {
        Self {
            message: "Sube un PDF desde la barra lateral para empezar a preguntar.".to_string(),
            ..Self::default()
        }
    }
}
