//! Troceado de texto con solapamiento.
//!
//! Cada página se recorre de forma voraz: el chunk termina en el mejor corte
//! disponible dentro de la ventana (párrafo, línea, frase, palabra) y si no
//! hay ninguno se corta a `chunk_size` caracteres. El siguiente chunk empieza
//! exactamente `chunk_overlap` caracteres antes del final del anterior, así que
//! quitando el solapamiento se recupera el texto original sin huecos.

use tracing::debug;
use uuid::Uuid;

use crate::error::{RagError, RagResult};
use crate::models::{Chunk, Page};

pub const DEFAULT_CHUNK_SIZE: usize = 1200;
pub const DEFAULT_CHUNK_OVERLAP: usize = 300;

/// Separadores por orden de preferencia.
const SEPARATORS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "? ", "! "], &[" "]];

#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> RagResult<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk_size debe ser mayor que 0".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({chunk_overlap}) debe ser menor que chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Trocea todas las páginas. Los chunks nunca cruzan un límite de página.
    pub fn split_pages(&self, pages: &[Page]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in pages {
            for (start, text) in self.split_text(&page.text) {
                chunks.push(Chunk {
                    id: Uuid::new_v4().to_string(),
                    page: page.number,
                    index: chunks.len(),
                    start,
                    text,
                });
            }
        }
        debug!("{} páginas troceadas en {} chunks", pages.len(), chunks.len());
        chunks
    }

    /// Devuelve `(inicio_en_caracteres, texto)` de cada chunk de `text`.
    /// Un texto vacío o sólo con espacios no produce chunks.
    pub fn split_text(&self, text: &str) -> Vec<(usize, String)> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut spans = Vec::new();
        let mut start = 0;

        loop {
            if total - start <= self.chunk_size {
                spans.push((start, chars[start..].iter().collect()));
                break;
            }

            // El final debe superar al del chunk anterior para avanzar.
            let min_end = start + self.chunk_overlap + 1;
            let hard_end = start + self.chunk_size;
            let end = find_break(&chars, min_end, hard_end);

            spans.push((start, chars[start..end].iter().collect()));
            start = end - self.chunk_overlap;
        }

        spans
    }
}

/// Mejor posición de corte en `[min_end, hard_end]`, o `hard_end` si no hay separador.
fn find_break(chars: &[char], min_end: usize, hard_end: usize) -> usize {
    for tier in SEPARATORS {
        let mut best: Option<usize> = None;
        for sep in tier.iter() {
            let sep: Vec<char> = sep.chars().collect();
            best = best.max(rfind_end(chars, &sep, min_end, hard_end));
        }
        if let Some(end) = best {
            return end;
        }
    }
    hard_end
}

/// Última posición `end` con `chars[end - sep.len()..end] == sep`.
fn rfind_end(chars: &[char], sep: &[char], min_end: usize, hard_end: usize) -> Option<usize> {
    let lower = min_end.max(sep.len());
    let mut end = hard_end.min(chars.len());
    while end >= lower {
        if chars[end - sep.len()..end] == *sep {
            return Some(end);
        }
        end -= 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(spans: &[(usize, String)], overlap: usize) -> String {
        let mut out = String::new();
        for (i, (_, text)) in spans.iter().enumerate() {
            if i == 0 {
                out.push_str(text);
            } else {
                out.extend(text.chars().skip(overlap));
            }
        }
        out
    }

    fn sample_text() -> String {
        let mut text = String::new();
        for p in 0..12 {
            for s in 0..9 {
                text.push_str(&format!("Párrafo {p}, frase {s} sobre el tema número {p}. "));
            }
            text.push_str("\n\n");
        }
        text
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        assert!(matches!(TextChunker::new(100, 100), Err(RagError::Config(_))));
        assert!(matches!(TextChunker::new(100, 250), Err(RagError::Config(_))));
        assert!(matches!(TextChunker::new(0, 0), Err(RagError::Config(_))));
        assert!(TextChunker::new(100, 99).is_ok());
    }

    #[test]
    fn test_default_parameters() {
        let chunker = TextChunker::default();
        assert_eq!(chunker.chunk_size(), 1200);
        assert_eq!(chunker.chunk_overlap(), 300);
    }

    #[test]
    fn test_reassembly_reconstructs_text() {
        let text = sample_text();
        for (size, overlap) in [(1200, 300), (200, 50), (64, 63), (40, 0)] {
            let chunker = TextChunker::new(size, overlap).unwrap();
            let spans = chunker.split_text(&text);
            assert!(spans.len() > 1 || size >= text.chars().count());
            assert_eq!(reassemble(&spans, overlap), text, "size={size} overlap={overlap}");
        }
    }

    #[test]
    fn test_chunk_length_and_overlap_bounds() {
        let text = sample_text();
        let chunker = TextChunker::new(200, 50).unwrap();
        let spans = chunker.split_text(&text);
        for (_, chunk) in &spans {
            assert!(chunk.chars().count() <= 200);
        }
        for pair in spans.windows(2) {
            let (prev_start, prev) = &pair[0];
            let (next_start, next) = &pair[1];
            let prev_end = prev_start + prev.chars().count();
            assert_eq!(*next_start, prev_end - 50);
            let tail: String = prev.chars().skip(prev.chars().count() - 50).collect();
            let head: String = next.chars().take(50).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let text = format!("{}\n\n{}", "a".repeat(30), "b".repeat(40));
        let chunker = TextChunker::new(50, 10).unwrap();
        let spans = chunker.split_text(&text);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].1, format!("{}\n\n", "a".repeat(30)));
        assert_eq!(spans[1].0, 22);
    }

    #[test]
    fn test_hard_cut_without_separators() {
        let text = "x".repeat(250);
        let chunker = TextChunker::new(100, 20).unwrap();
        let spans = chunker.split_text(&text);
        assert_eq!(spans[0].1.len(), 100);
        assert_eq!(spans[1].0, 80);
        assert_eq!(reassemble(&spans, 20), text);
    }

    #[test]
    fn test_multibyte_text_is_split_on_chars() {
        let text = "ñandú 🦀 ".repeat(60);
        let chunker = TextChunker::new(50, 10).unwrap();
        let spans = chunker.split_text(&text);
        assert!(spans.iter().all(|(_, t)| t.chars().count() <= 50));
        assert_eq!(reassemble(&spans, 10), text);
    }

    #[test]
    fn test_pages_do_not_share_chunks() {
        let pages = vec![
            Page { number: 1, text: "uno ".repeat(100) },
            Page { number: 2, text: "   \n ".to_string() },
            Page { number: 3, text: "tres ".repeat(10) },
        ];
        let chunker = TextChunker::new(120, 30).unwrap();
        let chunks = chunker.split_pages(&pages);
        assert!(chunks.iter().all(|c| c.page != 2));
        let last = chunks.last().unwrap();
        assert_eq!(last.page, 3);
        assert_eq!(last.start, 0);
        assert_eq!(last.text, "tres ".repeat(10));
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn test_empty_text() {
        assert!(TextChunker::default().split_text("").is_empty());
    }
}
