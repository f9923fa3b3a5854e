//! Extracción de texto por página a partir de los bytes de un PDF subido.
//!
//! `pdf-extract` trabaja sobre rutas, así que los bytes se vuelcan a un
//! fichero temporal que se elimina al salir del ámbito, también cuando el
//! parser falla.

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::{info, warn};

use crate::error::{RagError, RagResult};
use crate::models::Page;

/// La cabecera `%PDF-` puede aparecer tras basura inicial dentro del primer KiB.
const HEADER_WINDOW: usize = 1024;

/// Carga un PDF usando el directorio temporal del sistema.
pub fn load_pdf(bytes: &[u8]) -> RagResult<Vec<Page>> {
    load_pdf_in(bytes, &std::env::temp_dir())
}

/// Carga un PDF escribiendo el fichero temporal en `dir`.
pub fn load_pdf_in(bytes: &[u8], dir: &Path) -> RagResult<Vec<Page>> {
    if !has_pdf_header(bytes) {
        return Err(RagError::Load("el fichero no es un PDF válido".into()));
    }

    let mut tmp = tempfile::Builder::new()
        .prefix("pdf_qa_")
        .suffix(".pdf")
        .tempfile_in(dir)
        .map_err(|e| RagError::Load(format!("no se pudo crear el fichero temporal: {e}")))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| RagError::Load(format!("no se pudo escribir el fichero temporal: {e}")))?;

    // pdf-extract entra en pánico con algunas fuentes y estructuras corruptas.
    let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_by_pages(tmp.path())
    }));

    let raw_pages = match extracted {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            warn!("No se pudo extraer texto del PDF: {e}");
            return Err(RagError::Load(format!("PDF ilegible: {e}")));
        }
        Err(_) => {
            warn!("El parser de PDF abortó durante la extracción");
            return Err(RagError::Load("PDF ilegible: el parser abortó".into()));
        }
    };

    let pages: Vec<Page> = raw_pages
        .into_iter()
        .enumerate()
        .map(|(idx, text)| Page { number: idx + 1, text })
        .collect();

    if pages.iter().all(|p| p.text.trim().is_empty()) {
        return Err(RagError::Load("el PDF no contiene texto extraíble".into()));
    }

    info!("PDF cargado: {} páginas", pages.len());
    Ok(pages)
}

fn has_pdf_header(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}
