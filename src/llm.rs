//! Abstracción sobre Rig para obtener la respuesta del LLM a un prompt ya construido.
//! Se soportan Groq (por defecto) y OpenAI, siempre con temperatura 0.

use async_trait::async_trait;
use rig::completion::Prompt;
use tracing::{debug, warn};

use crate::config::{AppConfig, LlmProvider};
use crate::error::{RagError, RagResult};

/// Cliente que genera la respuesta a partir del prompt completo.
#[async_trait]
pub trait AnsweringClient: Send + Sync {
    async fn answer(&self, prompt: &str) -> RagResult<String>;
}

/// Gestor del modelo de chat.
#[derive(Debug, Clone)]
pub struct LlmManager {
    pub provider: LlmProvider,
    pub chat_model: String,
    pub temperature: f64,
}

impl LlmManager {
    /// Construye el manager a partir de la configuración.
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            provider: cfg.llm_provider.clone(),
            chat_model: cfg.llm_chat_model.clone(),
            temperature: 0.0,
        }
    }

    fn require_key(var: &str) -> RagResult<()> {
        std::env::var(var)
            .map(|_| ())
            .map_err(|_| RagError::Inference(format!("falta {var} en el entorno")))
    }

    async fn answer_with_groq(&self, prompt: &str) -> RagResult<String> {
        use rig::client::CompletionClient as _;
        use rig::providers::groq;

        Self::require_key("GROQ_API_KEY")?;
        let client = groq::Client::from_env();

        let agent = client
            .agent(&self.chat_model)
            .temperature(self.temperature)
            .build();

        agent
            .prompt(prompt)
            .await
            .map_err(|e| RagError::Inference(e.to_string()))
    }

    async fn answer_with_openai(&self, prompt: &str) -> RagResult<String> {
        use rig::client::CompletionClient as _;
        use rig::providers::openai;

        Self::require_key("OPENAI_API_KEY")?;
        let client = openai::Client::from_env();

        let agent = client
            .agent(&self.chat_model)
            .temperature(self.temperature)
            .build();

        agent
            .prompt(prompt)
            .await
            .map_err(|e| RagError::Inference(e.to_string()))
    }
}

#[async_trait]
impl AnsweringClient for LlmManager {
    async fn answer(&self, prompt: &str) -> RagResult<String> {
        debug!("Enviando prompt de {} caracteres a {}", prompt.len(), self.chat_model);
        let answer = match self.provider {
            LlmProvider::Groq => self.answer_with_groq(prompt).await,
            LlmProvider::OpenAI => self.answer_with_openai(prompt).await,
        }?;

        // Una respuesta vacía no puede mostrarse como si fuera válida.
        let answer = answer.trim().to_string();
        if answer.is_empty() {
            warn!("El modelo {} devolvió una respuesta vacía", self.chat_model);
            return Err(RagError::Inference("el modelo devolvió una respuesta vacía".into()));
        }
        Ok(answer)
    }
}
