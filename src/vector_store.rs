//! Índice vectorial en memoria para los chunks del documento activo.
//!
//! API pública:
//!   - `VectorIndex::build(chunks, vectors)`: construcción completa en un solo paso.
//!   - `VectorIndex::query(&vector, k)`: los `k` chunks más similares (coseno).
//!
//! Búsqueda exacta por fuerza bruta: un PDF de 50-60 páginas produce unos
//! pocos cientos de chunks.

use std::cmp::Ordering;

use tracing::info;

use crate::embeddings::{cosine_similarity, Embedding};
use crate::error::{RagError, RagResult};
use crate::models::{Chunk, ScoredChunk};

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone)]
struct IndexEntry {
    chunk: Chunk,
    vector: Embedding,
}

/// Pares (vector, chunk) inmutables tras la construcción.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Construye un índice nuevo. Todos los vectores deben tener la dimensión
    /// del modelo (`dimension`) y haber uno por chunk.
    pub fn build(dimension: usize, chunks: Vec<Chunk>, vectors: Vec<Embedding>) -> RagResult<Self> {
        if chunks.len() != vectors.len() {
            return Err(RagError::Embedding(format!(
                "Número de vectores ({}) distinto al número de chunks ({})",
                vectors.len(),
                chunks.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(RagError::Embedding(format!(
                "vector de dimensión {} en un índice de dimensión {dimension}",
                bad.len()
            )));
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();

        info!("Índice vectorial construido: {} chunks, dimensión {dimension}", entries.len());
        Ok(Self { dimension, entries })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Devuelve los `k` chunks más cercanos, del más similar al menos.
    /// Los empates se resuelven por orden de inserción.
    pub fn query(&self, vector: &[f32], k: usize) -> RagResult<Vec<ScoredChunk>> {
        if self.entries.is_empty() {
            return Err(RagError::NotReady("el índice está vacío".into()));
        }
        if vector.len() != self.dimension {
            return Err(RagError::Embedding(format!(
                "consulta de dimensión {} contra un índice de dimensión {}",
                vector.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (pos, cosine_similarity(vector, &entry.vector)))
            .collect();

        // sort_by es estable: a igual puntuación se mantiene el orden de inserción.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(pos, score)| ScoredChunk {
                score,
                chunk: self.entries[pos].chunk.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            id: format!("c{index}"),
            page: 1,
            index,
            start: 0,
            text: text.to_string(),
        }
    }

    fn sample_index() -> VectorIndex {
        let chunks = vec![chunk(0, "a"), chunk(1, "b"), chunk(2, "c"), chunk(3, "a-bis")];
        let vectors = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.7, 0.7, 0.0],
            vec![1.0, 0.0, 0.0],
        ];
        VectorIndex::build(3, chunks, vectors).unwrap()
    }

    #[test]
    fn test_query_orders_nearest_first() {
        let index = sample_index();
        let results = index.query(&[0.0, 1.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "b");
        assert_eq!(results[1].chunk.text, "c");
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = sample_index();
        let results = index.query(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results[0].chunk.index, 0);
        assert_eq!(results[1].chunk.index, 3);
    }

    #[test]
    fn test_repeated_queries_are_identical() {
        let index = sample_index();
        let first: Vec<_> = index.query(&[0.3, 0.2, 0.9], 4).unwrap().into_iter().map(|r| r.chunk.id).collect();
        let second: Vec<_> = index.query(&[0.3, 0.2, 0.9], 4).unwrap().into_iter().map(|r| r.chunk.id).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_k_larger_than_index() {
        let index = sample_index();
        assert_eq!(index.query(&[1.0, 0.0, 0.0], 10).unwrap().len(), 4);
    }

    #[test]
    fn test_empty_index_is_not_ready() {
        let index = VectorIndex::build(3, Vec::new(), Vec::new()).unwrap();
        assert!(matches!(index.query(&[1.0, 0.0, 0.0], 5), Err(RagError::NotReady(_))));
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = VectorIndex::build(3, vec![chunk(0, "a")], vec![vec![1.0, 0.0]]).unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));

        let index = sample_index();
        assert!(matches!(index.query(&[1.0, 0.0], 1), Err(RagError::Embedding(_))));
    }

    #[test]
    fn test_count_mismatch() {
        let err = VectorIndex::build(3, vec![chunk(0, "a"), chunk(1, "b")], vec![vec![1.0, 0.0, 0.0]]).unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
    }
}
