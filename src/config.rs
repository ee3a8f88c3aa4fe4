use std::sync::Arc;
use std::time::Duration;

use crate::apis::{self, PaperSource, Source};
use crate::llm::{self, GroqClient, LlmError};

const DEFAULT_TIMEOUT_SECS: u64 = 20;
const PLACEHOLDER_KEY: &str = "your_groq_api_key_here";
const USER_AGENT: &str = concat!("litreview/", env!("CARGO_PKG_VERSION"));

const ALL_SOURCES: [Source; 4] = [
    Source::ArXiv,
    Source::OpenAlex,
    Source::Crossref,
    Source::SemanticScholar,
];

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub groq_base_url: String,
    pub groq_timeout: Option<Duration>,
    pub semantic_scholar_api_key: Option<String>,
    pub openalex_email: Option<String>,
    pub request_timeout: Duration,
    pub enabled_source_names: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            groq_api_key: None,
            groq_model: llm::DEFAULT_MODEL.to_string(),
            groq_base_url: llm::DEFAULT_BASE_URL.to_string(),
            groq_timeout: None,
            semantic_scholar_api_key: None,
            openalex_email: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            enabled_source_names: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let secs = |key: &str| -> Option<Duration> {
            let raw = var(key)?;
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    tracing::warn!(value = %raw, "Invalid {}, using default", key);
                    None
                }
            }
        };
        let request_timeout = secs("LITREVIEW_TIMEOUT_SECS").unwrap_or(defaults.request_timeout);
        let groq_timeout = secs("GROQ_TIMEOUT_SECS");

        let enabled_source_names = var("LITREVIEW_SOURCES")
            .map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            groq_api_key: var("GROQ_API_KEY"),
            groq_model: var("GROQ_MODEL_NAME").unwrap_or(defaults.groq_model),
            groq_base_url: var("GROQ_BASE_URL").unwrap_or(defaults.groq_base_url),
            groq_timeout,
            semantic_scholar_api_key: var("SEMANTIC_SCHOLAR_API_KEY"),
            openalex_email: var("OPENALEX_EMAIL"),
            request_timeout,
            enabled_source_names,
        }
    }

    fn is_enabled(&self, source: Source) -> bool {
        self.enabled_source_names.is_empty()
            || self.enabled_source_names.iter().any(|n| n == source.key())
    }

    /// One pooled client shared by every adapter, with the per-request timeout.
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.request_timeout)
            .build()
    }

    /// Client for model calls. Completions are not bound by the adapter
    /// timeout; only `GROQ_TIMEOUT_SECS` limits them.
    pub fn model_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let builder = reqwest::Client::builder().user_agent(USER_AGENT);
        match self.groq_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
        .build()
    }

    /// Build the enabled adapters, in their fixed merge order.
    pub fn build_sources(&self, client: &reqwest::Client) -> Vec<Arc<dyn PaperSource>> {
        ALL_SOURCES
            .iter()
            .copied()
            .filter(|s| self.is_enabled(*s))
            .map(|s| -> Arc<dyn PaperSource> {
                match s {
                    Source::ArXiv => Arc::new(apis::arxiv::ArxivClient::new(client.clone())),
                    Source::OpenAlex => Arc::new(apis::openalex::OpenAlexClient::new(
                        client.clone(),
                        self.openalex_email.clone(),
                    )),
                    Source::Crossref => Arc::new(apis::crossref::CrossRefClient::new(client.clone())),
                    Source::SemanticScholar => Arc::new(
                        apis::semantic_scholar::SemanticScholarClient::new(
                            client.clone(),
                            self.semantic_scholar_api_key.clone(),
                        ),
                    ),
                }
            })
            .collect()
    }

    /// The model client. A missing or placeholder key is a configuration error.
    pub fn build_model(&self, client: &reqwest::Client) -> Result<GroqClient, LlmError> {
        let key = self
            .groq_api_key
            .clone()
            .filter(|k| k != PLACEHOLDER_KEY)
            .ok_or_else(|| LlmError::MissingKey("GROQ_API_KEY is not set".to_string()))?;
        Ok(GroqClient::new(client.clone(), &self.groq_base_url, key, &self.groq_model))
    }

    /// Return a list of source status descriptions.
    pub fn source_status(&self) -> Vec<SourceStatus> {
        ALL_SOURCES
            .iter()
            .map(|&source| {
                let enabled = self.is_enabled(source);
                let note = if !enabled {
                    "Disabled by LITREVIEW_SOURCES filter".to_string()
                } else {
                    match source {
                        Source::SemanticScholar if self.semantic_scholar_api_key.is_some() => {
                            "API key set".to_string()
                        }
                        Source::SemanticScholar => "No API key (rate limited)".to_string(),
                        Source::OpenAlex if self.openalex_email.is_some() => {
                            "Polite pool email set".to_string()
                        }
                        Source::OpenAlex => "No email (limited rate)".to_string(),
                        _ => "No API key required".to_string(),
                    }
                };
                SourceStatus { name: source.key().to_string(), enabled, note }
            })
            .collect()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub enabled: bool,
    pub note: String,
}
