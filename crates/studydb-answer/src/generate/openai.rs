use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use studydb_core::config::GeneratorSettings;

use super::ollama::map_reqwest;
use super::{clean_response, prompt, GenerateError, Generator, Passage};

/// OpenAI-compatible `/v1/chat/completions` endpoint. The API key is read
/// from the environment variable named by `generator.api_key_env`.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

impl OpenAiGenerator {
    pub fn new(settings: &GeneratorSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(settings.timeout()).build()?;
        let api_key = std::env::var(&settings.api_key_env).ok().filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!("{} is not set; requests will be sent without authorization", settings.api_key_env);
        }
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout: settings.timeout(),
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, question: &str, context: &[Passage]) -> Result<String, GenerateError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message { role: "system".into(), content: prompt::SYSTEM_INSTRUCTIONS.to_string() },
                Message { role: "user".into(), content: prompt::user_message(question, context) },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(|e| map_reqwest(e, self.timeout))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Unavailable(format!("chat completion returned {status}: {body}")));
        }
        let body: ChatResponse = response.json().await.map_err(|e| map_reqwest(e, self.timeout))?;
        debug!(model = %self.model, choices = body.choices.len(), "chat completion answered");
        let content = body.choices.into_iter().next().map(|c| c.message.content).unwrap_or_default();
        clean_response(&content)
    }
}
