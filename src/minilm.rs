//! Embeddings semánticos locales con all-MiniLM-L6-v2.
//!
//! El modelo se carga desde un ONNX exportado de sentence-transformers y se
//! ejecuta con tract; el tokenizador es el `tokenizer.json` del mismo modelo.
//! Sentencia = media de los tokens reales (máscara de atención) normalizada L2.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokenizers::Tokenizer;
use tracing::{debug, info};
use tract_onnx::prelude::*;

use crate::embeddings::{normalize, Embedder, Embedding};
use crate::error::{RagError, RagResult};

/// Dimensión de salida de all-MiniLM-L6-v2.
pub const MINILM_DIM: usize = 384;

/// Longitud máxima de secuencia con la que se entrenó el modelo de frases.
const MAX_TOKENS: usize = 256;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Entrada tokenizada de un texto.
#[derive(Debug, Clone, PartialEq)]
struct Encoded {
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
    token_type_ids: Vec<i64>,
}

#[derive(Clone)]
pub struct MiniLmEmbedder {
    model: Arc<TractModel>,
    tokenizer: Arc<Tokenizer>,
    name: String,
}

impl MiniLmEmbedder {
    /// Carga el modelo y el tokenizador. Si falta alguno de los ficheros es un
    /// error de configuración: la aplicación no debe arrancar.
    pub fn load(model_path: &str, tokenizer_path: &str) -> RagResult<Self> {
        for path in [model_path, tokenizer_path] {
            if !Path::new(path).is_file() {
                return Err(RagError::Config(format!(
                    "no se encuentra '{path}' (descarga all-MiniLM-L6-v2 en formato ONNX)"
                )));
            }
        }

        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| RagError::Config(format!("no se pudo cargar {model_path}: {e}")))?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| RagError::Config(format!("no se pudo cargar {tokenizer_path}: {e}")))?;

        info!("Modelo de embeddings MiniLM cargado desde {model_path}");
        Ok(Self {
            model: Arc::new(model),
            tokenizer: Arc::new(tokenizer),
            name: "all-MiniLM-L6-v2".to_string(),
        })
    }
}

#[async_trait]
impl Embedder for MiniLmEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        MINILM_DIM
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.model.clone();
        let tokenizer = self.tokenizer.clone();
        let texts = texts.to_vec();

        // La inferencia es CPU pura; no debe bloquear el runtime.
        tokio::task::spawn_blocking(move || infer(&model, &tokenizer, &texts))
            .await
            .map_err(|e| RagError::Embedding(format!("la tarea de embeddings falló: {e}")))?
    }
}

fn infer(model: &TractModel, tokenizer: &Tokenizer, texts: &[String]) -> RagResult<Vec<Embedding>> {
    let encoded = texts
        .iter()
        .map(|text| encode(tokenizer, text))
        .collect::<RagResult<Vec<_>>>()?;
    let (padded, seq_len) = pad_batch(encoded);
    let batch = padded.len();
    if seq_len == 0 {
        return Err(RagError::Embedding("el tokenizador no produjo ningún token".into()));
    }

    let inputs: TVec<TValue> = tvec![
        input_tensor(&padded, seq_len, |e| &e.input_ids)?.into(),
        input_tensor(&padded, seq_len, |e| &e.attention_mask)?.into(),
        input_tensor(&padded, seq_len, |e| &e.token_type_ids)?.into(),
    ];
    let outputs = model
        .run(inputs)
        .map_err(|e| RagError::Embedding(format!("inferencia MiniLM: {e}")))?;

    // Salida: (batch, seq_len, hidden)
    let hidden_states = outputs[0]
        .to_array_view::<f32>()
        .map_err(|e| RagError::Embedding(e.to_string()))?;
    let shape = hidden_states.shape().to_vec();
    if shape != [batch, seq_len, MINILM_DIM] {
        return Err(RagError::Embedding(format!(
            "forma de salida inesperada {shape:?} (esperada [{batch}, {seq_len}, {MINILM_DIM}])"
        )));
    }
    let flat: Vec<f32> = hidden_states.iter().copied().collect();

    let vectors = padded
        .iter()
        .zip(flat.chunks(seq_len * MINILM_DIM))
        .map(|(input, tokens)| {
            let mut pooled = mean_pool(tokens, &input.attention_mask, MINILM_DIM);
            normalize(&mut pooled);
            pooled
        })
        .collect::<Vec<_>>();
    debug!("{} embeddings MiniLM calculados (secuencia de {seq_len} tokens)", vectors.len());
    Ok(vectors)
}

fn encode(tokenizer: &Tokenizer, text: &str) -> RagResult<Encoded> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| RagError::Embedding(format!("tokenización: {e}")))?;

    let take = |values: &[u32]| -> Vec<i64> {
        values.iter().take(MAX_TOKENS).map(|&v| i64::from(v)).collect()
    };
    Ok(Encoded {
        input_ids: take(encoding.get_ids()),
        attention_mask: take(encoding.get_attention_mask()),
        token_type_ids: take(encoding.get_type_ids()),
    })
}

/// Rellena con ceros hasta la secuencia más larga del lote.
fn pad_batch(mut inputs: Vec<Encoded>) -> (Vec<Encoded>, usize) {
    let seq_len = inputs.iter().map(|e| e.input_ids.len()).max().unwrap_or(0);
    for input in &mut inputs {
        input.input_ids.resize(seq_len, 0);
        input.attention_mask.resize(seq_len, 0);
        input.token_type_ids.resize(seq_len, 0);
    }
    (inputs, seq_len)
}

fn input_tensor<F>(inputs: &[Encoded], seq_len: usize, field: F) -> RagResult<Tensor>
where
    F: Fn(&Encoded) -> &[i64],
{
    let mut data = Vec::with_capacity(inputs.len() * seq_len);
    for input in inputs {
        data.extend_from_slice(field(input));
    }
    Tensor::from_shape(&[inputs.len(), seq_len], &data).map_err(|e| RagError::Embedding(e.to_string()))
}

/// Media de los vectores de token con máscara distinta de cero.
/// `tokens` es la matriz `seq_len x hidden` aplanada por filas.
fn mean_pool(tokens: &[f32], mask: &[i64], hidden: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden];
    let mut count = 0.0f32;
    for (row, &m) in tokens.chunks(hidden).zip(mask) {
        if m > 0 {
            for (acc, value) in sum.iter_mut().zip(row) {
                *acc += value;
            }
            count += 1.0;
        }
    }
    if count > 0.0 {
        sum.iter_mut().for_each(|v| *v /= count);
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(ids: &[i64]) -> Encoded {
        Encoded {
            input_ids: ids.to_vec(),
            attention_mask: vec![1; ids.len()],
            token_type_ids: vec![0; ids.len()],
        }
    }

    #[test]
    fn test_missing_model_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.onnx");
        let tokenizer = dir.path().join("tokenizer.json");
        let err = MiniLmEmbedder::load(model.to_str().unwrap(), tokenizer.to_str().unwrap())
            .err()
            .unwrap();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[test]
    fn test_pad_batch_to_longest() {
        let (padded, seq_len) = pad_batch(vec![encoded(&[101, 7592, 102]), encoded(&[101, 102])]);
        assert_eq!(seq_len, 3);
        assert_eq!(padded[1].input_ids, vec![101, 102, 0]);
        assert_eq!(padded[1].attention_mask, vec![1, 1, 0]);
        assert_eq!(padded[0], encoded(&[101, 7592, 102]));
    }

    #[test]
    fn test_mean_pool_ignores_padding() {
        // Tres tokens de dimensión 2; el último es relleno.
        let tokens = [1.0, 3.0, 3.0, 5.0, 100.0, 100.0];
        let pooled = mean_pool(&tokens, &[1, 1, 0], 2);
        assert_eq!(pooled, vec![2.0, 4.0]);
    }

    #[test]
    fn test_mean_pool_all_masked_is_zero() {
        assert_eq!(mean_pool(&[1.0, 2.0], &[0], 2), vec![0.0, 0.0]);
    }

    #[test]
    fn test_input_tensor_shape() {
        let (padded, seq_len) = pad_batch(vec![encoded(&[1, 2]), encoded(&[3])]);
        let tensor = input_tensor(&padded, seq_len, |e| &e.input_ids).unwrap();
        assert_eq!(tensor.shape(), &[2, 2]);
    }
}
