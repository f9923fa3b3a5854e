#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use pdf_qa::chunker::TextChunker;
use pdf_qa::embeddings::{Embedder, Embedding, HashEmbedder};
use pdf_qa::llm::AnsweringClient;
use pdf_qa::prompt::FALLBACK_ANSWER;
use pdf_qa::rag::RagPipeline;
use pdf_qa::{RagError, RagResult};

pub const EMBEDDING_DIM: usize = 384;

/// Genera un PDF con una página por elemento; cada página es una lista de líneas.
pub fn make_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        if !lines.is_empty() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), Object::Integer(10)]));
            operations.push(Operation::new("Td", vec![Object::Integer(40), Object::Integer(780)]));
            for line in lines.iter() {
                operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
                operations.push(Operation::new("Td", vec![Object::Integer(0), Object::Integer(-14)]));
            }
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// PDF de tres páginas con temas distintos. La respuesta buscada está en la página 2.
pub fn three_topic_pdf() -> Vec<u8> {
    make_pdf(&[
        &[
            "Photosynthesis converts sunlight into chemical energy in plants.",
            "Chlorophyll absorbs light mostly in the blue and red wavelengths.",
        ],
        &[
            "The Eiffel Tower is 330 metres tall.",
            "It was completed in Paris in 1889 for the World Fair.",
        ],
        &[
            "The Rust compiler enforces memory safety through ownership.",
            "Borrowing rules prevent data races at compile time.",
        ],
    ])
}

pub fn pipeline_with(answerer: Arc<dyn AnsweringClient>) -> RagPipeline {
    RagPipeline::new(
        TextChunker::default(),
        Arc::new(HashEmbedder::new(EMBEDDING_DIM)),
        answerer,
        5,
    )
}

/// Embedder local que tarda `delay` en cada lote, para observar subidas en curso.
pub struct SlowEmbedder {
    pub inner: HashEmbedder,
    pub delay: Duration,
}

impl SlowEmbedder {
    pub fn new(delay: Duration) -> Self {
        Self { inner: HashEmbedder::new(EMBEDDING_DIM), delay }
    }
}

#[async_trait]
impl Embedder for SlowEmbedder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Embedding>> {
        tokio::time::sleep(self.delay).await;
        self.inner.embed_batch(texts).await
    }
}

/// Devuelve el bloque de contexto del prompt tal cual.
pub struct EchoContext;

#[async_trait]
impl AnsweringClient for EchoContext {
    async fn answer(&self, prompt: &str) -> RagResult<String> {
        let start = prompt.find("Context:\n").map(|i| i + "Context:\n".len()).unwrap_or(0);
        let end = prompt.find("\n\nQuestion:").unwrap_or(prompt.len());
        Ok(prompt[start..end].to_string())
    }
}

/// Sigue la instrucción de respaldo cuando el contexto no contiene `needle`.
pub struct FallbackFollower {
    pub needle: String,
}

#[async_trait]
impl AnsweringClient for FallbackFollower {
    async fn answer(&self, prompt: &str) -> RagResult<String> {
        let context = prompt.split("\n\nQuestion:").next().unwrap_or_default();
        if context.contains(&self.needle) {
            Ok(format!("Found: {}", self.needle))
        } else {
            Ok(FALLBACK_ANSWER.to_string())
        }
    }
}

/// Falla siempre, como una caída de red del proveedor.
#[derive(Default)]
pub struct FailingClient {
    pub calls: AtomicUsize,
}

#[async_trait]
impl AnsweringClient for FailingClient {
    async fn answer(&self, _prompt: &str) -> RagResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RagError::Inference("connection reset by peer".into()))
    }
}
