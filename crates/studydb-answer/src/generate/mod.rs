//! Generative backends behind one capability trait.
//!
//! The synthesizer only sees [`Generator`]; the concrete backend is picked
//! once at startup from `generator.backend`.

mod ollama;
mod openai;
pub mod prompt;
mod template;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use studydb_core::config::{GeneratorBackend, GeneratorSettings};

pub use ollama::OllamaGenerator;
pub use openai::OpenAiGenerator;
pub use template::TemplateGenerator;

/// A retrieved passage handed to a generator as context.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub source: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerateError {
    #[error("generative backend timed out after {0:?}")]
    Timeout(Duration),
    #[error("generative backend unavailable: {0}")]
    Unavailable(String),
    #[error("generative backend returned an empty response")]
    EmptyResponse,
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    /// Answer `prompt` (the student's question) using `context`.
    async fn generate(&self, prompt: &str, context: &[Passage]) -> Result<String, GenerateError>;
}

/// Outcome of one bounded generation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Generation {
    Success(String),
    Degraded(String, String),
}

/// Run `generator` under `timeout`. Any failure, including the deadline,
/// degrades to the deterministic template answer over the same context.
pub async fn generate_bounded(
    generator: &dyn Generator,
    prompt: &str,
    context: &[Passage],
    timeout: Duration,
) -> Generation {
    let outcome = match tokio::time::timeout(timeout, generator.generate(prompt, context)).await {
        Ok(result) => result,
        Err(_) => Err(GenerateError::Timeout(timeout)),
    };
    match outcome {
        Ok(text) => Generation::Success(text),
        Err(e) => {
            tracing::warn!("{} generation failed: {}", generator.name(), e);
            Generation::Degraded(template::compose(prompt, context), e.to_string())
        }
    }
}

/// Trim a backend response and reject blank output.
pub(crate) fn clean_response(raw: &str) -> Result<String, GenerateError> {
    let text = raw.trim();
    if text.is_empty() {
        Err(GenerateError::EmptyResponse)
    } else {
        Ok(text.to_string())
    }
}

pub fn build_generator(settings: &GeneratorSettings) -> anyhow::Result<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = match settings.backend {
        GeneratorBackend::Template => Arc::new(TemplateGenerator),
        GeneratorBackend::Ollama => Arc::new(OllamaGenerator::new(settings)?),
        GeneratorBackend::OpenAi => Arc::new(OpenAiGenerator::new(settings)?),
    };
    tracing::info!("generative backend: {}", generator.name());
    Ok(generator)
}
