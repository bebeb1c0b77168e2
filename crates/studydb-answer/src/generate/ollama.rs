use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use studydb_core::config::GeneratorSettings;

use super::{clean_response, prompt, GenerateError, Generator, Passage};

/// Local Ollama server, `/api/generate` without streaming.
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: Options,
}

#[derive(Serialize)]
struct Options {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaGenerator {
    pub fn new(settings: &GeneratorSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout: settings.timeout(),
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, question: &str, context: &[Passage]) -> Result<String, GenerateError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt: prompt::educational_prompt(question, context),
            stream: false,
            options: Options { temperature: self.temperature, num_predict: self.max_tokens },
        };
        let response = self.client.post(&url).json(&request).send().await.map_err(|e| map_reqwest(e, self.timeout))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Unavailable(format!("Ollama returned {status}: {body}")));
        }
        let body: GenerateResponse = response.json().await.map_err(|e| map_reqwest(e, self.timeout))?;
        debug!(model = %self.model, "ollama answered");
        clean_response(&body.response)
    }
}

pub(super) fn map_reqwest(e: reqwest::Error, timeout: Duration) -> GenerateError {
    if e.is_timeout() {
        GenerateError::Timeout(timeout)
    } else {
        GenerateError::Unavailable(e.to_string())
    }
}
