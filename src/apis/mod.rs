pub mod arxiv;
pub mod crossref;
pub mod openalex;
pub mod semantic_scholar;

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upstream index a record was retrieved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "arXiv")]
    ArXiv,
    OpenAlex,
    Crossref,
    #[serde(rename = "Semantic Scholar")]
    SemanticScholar,
}

impl Source {
    /// Configuration key used by `LITREVIEW_SOURCES`.
    pub fn key(&self) -> &'static str {
        match self {
            Source::ArXiv => "arxiv",
            Source::OpenAlex => "openalex",
            Source::Crossref => "crossref",
            Source::SemanticScholar => "semantic_scholar",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Source::ArXiv => "arXiv",
            Source::OpenAlex => "OpenAlex",
            Source::Crossref => "Crossref",
            Source::SemanticScholar => "Semantic Scholar",
        };
        f.write_str(label)
    }
}

/// One paper as normalized from any upstream schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub title: Option<String>,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub published_date: Option<NaiveDate>,
    pub year: Option<i32>,
    pub identifier: Option<String>,
    pub pdf_url: Option<String>,
    pub categories: Vec<String>,
    pub source: Source,
}

impl PaperRecord {
    pub fn new(source: Source) -> Self {
        Self {
            title: None,
            authors: Vec::new(),
            abstract_text: String::new(),
            published_date: None,
            year: None,
            identifier: None,
            pdf_url: None,
            categories: Vec::new(),
            source,
        }
    }

    /// Lowercased, trimmed title; `None` when there is nothing to key on.
    pub fn dedup_key(&self) -> Option<String> {
        let key = self.title.as_deref()?.trim().to_lowercase();
        if key.is_empty() { None } else { Some(key) }
    }
}

/// Accept only four-digit years.
pub(crate) fn four_digit_year(year: i64) -> Option<i32> {
    if (1000..=9999).contains(&year) {
        Some(year as i32)
    } else {
        None
    }
}

/// First of January of `year`, used when an upstream only reports the year.
pub(crate) fn year_start(year: Option<i32>) -> Option<NaiveDate> {
    year.and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
}

/// Treat empty strings from upstream payloads as absent.
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Collapse runs of whitespace (including the newlines arXiv wraps titles with).
pub(crate) fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("API returned status {0}")]
    Api(reqwest::StatusCode),
}

/// Fail on any non-2xx upstream status.
pub(crate) fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, SourceError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(SourceError::Api(status))
    }
}

#[async_trait]
pub trait PaperSource: Send + Sync {
    fn source(&self) -> Source;
    async fn search(&self, topic: &str, max_results: u32) -> Result<Vec<PaperRecord>, SourceError>;
}
