//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge compiled defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nesting, e.g. `APP_RETRIEVAL__TOP_K=5`).
//! The result is extracted once into an immutable [`Settings`] that is handed
//! to constructors; nothing reads configuration after startup.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::DEFAULT_SUBJECT;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Wrap an already assembled figment (used by tests and embedders of the
    /// engine that bring their own sources).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the full typed settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        if matches!(env, "prod" | "production") {
            let backend: GeneratorBackend = self.get("generator.backend")?;
            if backend == GeneratorBackend::Template {
                tracing::warn!("production config uses the template generator");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ingest: IngestSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub retrieval: RetrievalSettings,
    pub answer: AnswerSettings,
    pub confidence: ConfidenceSettings,
    pub fallback: FallbackSettings,
    pub generator: GeneratorSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Window length in words.
    pub chunk_size: usize,
    /// Words shared between consecutive chunks.
    pub chunk_overlap: usize,
    pub default_subject: String,
    pub max_file_bytes: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            chunk_overlap: 40,
            default_subject: DEFAULT_SUBJECT.to_string(),
            max_file_bytes: 20 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProvider {
    Hashing,
    BgeM3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    /// Pinned model tag. Startup fails if the loaded model reports another.
    pub model_version: String,
    pub dimension: usize,
    pub model_dir: Option<String>,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            model_version: "hash-v1-d384".to_string(),
            dimension: 384,
            model_dir: None,
            max_len: 256,
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Where the index artifact lives. `None` keeps the index in memory only.
    pub artifact_path: Option<String>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { artifact_path: Some("data/index/studydb-index.json".to_string()) }
    }
}

impl IndexSettings {
    pub fn resolved_artifact_path(&self) -> Option<PathBuf> {
        self.artifact_path.as_deref().map(expand_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    /// The index is asked for `top_k * candidate_multiplier` entries before
    /// reranking trims back to `top_k`.
    pub candidate_multiplier: usize,
    pub vector_weight: f32,
    pub lexical_weight: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 3, candidate_multiplier: 2, vector_weight: 0.7, lexical_weight: 0.3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerSettings {
    /// Minimum top similarity for a corpus-grounded generated answer.
    pub generative_threshold: f32,
    pub max_context_passages: usize,
    pub max_passage_chars: usize,
    pub excerpt_chars: usize,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            generative_threshold: 0.35,
            max_context_passages: 3,
            max_passage_chars: 500,
            excerpt_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceSettings {
    /// Sources below this similarity do not count as corroboration.
    pub similarity_floor: f32,
    /// Number of corroborating sources that earns the full corroboration term.
    pub full_corroboration: usize,
    pub top_weight: f32,
    pub corroboration_weight: f32,
    pub fallback_confidence: f32,
}

impl Default for ConfidenceSettings {
    fn default() -> Self {
        Self {
            similarity_floor: 0.2,
            full_corroboration: 3,
            top_weight: 0.7,
            corroboration_weight: 0.3,
            fallback_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackSettings {
    /// TOML knowledge base. The built-in curated base is used when unset.
    pub knowledge_path: Option<String>,
    /// Fraction of a trigger's terms that must appear for a partial match.
    pub partial_match_threshold: f32,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self { knowledge_path: None, partial_match_threshold: 0.5 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorBackend {
    Template,
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub backend: GeneratorBackend,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            backend: GeneratorBackend::Template,
            base_url: "http://localhost:11434".to_string(),
            model: "mistral".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.1,
            max_tokens: 1000,
            timeout_ms: 30_000,
        }
    }
}

impl GeneratorSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_entries: u64,
    pub ttl_secs: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { max_entries: 1024, ttl_secs: Some(3600) }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let ingest = &self.ingest;
        if ingest.chunk_size == 0 {
            return invalid("ingest.chunk_size must be positive");
        }
        if ingest.chunk_overlap >= ingest.chunk_size {
            return invalid(format!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                ingest.chunk_overlap, ingest.chunk_size
            ));
        }
        if self.embedding.dimension == 0 {
            return invalid("embedding.dimension must be positive");
        }
        if self.embedding.batch_size == 0 {
            return invalid("embedding.batch_size must be positive");
        }
        if self.retrieval.top_k == 0 || self.retrieval.candidate_multiplier == 0 {
            return invalid("retrieval.top_k and retrieval.candidate_multiplier must be positive");
        }
        unit("retrieval.vector_weight", self.retrieval.vector_weight)?;
        unit("retrieval.lexical_weight", self.retrieval.lexical_weight)?;
        unit("answer.generative_threshold", self.answer.generative_threshold)?;
        unit("fallback.partial_match_threshold", self.fallback.partial_match_threshold)?;

        let c = &self.confidence;
        unit("confidence.similarity_floor", c.similarity_floor)?;
        unit("confidence.top_weight", c.top_weight)?;
        unit("confidence.corroboration_weight", c.corroboration_weight)?;
        unit("confidence.fallback_confidence", c.fallback_confidence)?;
        if (c.top_weight + c.corroboration_weight - 1.0).abs() > 1e-6 {
            return invalid("confidence.top_weight + confidence.corroboration_weight must equal 1");
        }
        if c.fallback_confidence >= 1.0 {
            return invalid("confidence.fallback_confidence must stay below 1");
        }
        if c.full_corroboration == 0 {
            return invalid("confidence.full_corroboration must be positive");
        }
        if self.cache.max_entries == 0 {
            return invalid("cache.max_entries must be positive");
        }
        Ok(())
    }
}

fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::InvalidConfig(msg.into()))
}

fn unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        invalid(format!("{name} must be within [0, 1], got {value}"))
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::Toml;

    #[test]
    fn defaults_are_valid() {
        Settings::default().validate().unwrap();
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let mut s = Settings::default();
        s.ingest.chunk_overlap = s.ingest.chunk_size;
        assert!(matches!(s.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn fallback_confidence_cannot_reach_one() {
        let mut s = Settings::default();
        s.confidence.fallback_confidence = 1.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn toml_overrides_merge_over_defaults() {
        let figment = Figment::new().merge(Toml::string(
            r#"
            [retrieval]
            top_k = 5

            [generator]
            backend = "openai"
            "#,
        ));
        let settings = Config::from_figment(figment).settings().unwrap();
        assert_eq!(settings.retrieval.top_k, 5);
        assert_eq!(settings.retrieval.candidate_multiplier, 2);
        assert_eq!(settings.generator.backend, GeneratorBackend::OpenAi);
    }
}
