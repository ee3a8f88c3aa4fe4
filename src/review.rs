use std::sync::Arc;

use serde::Serialize;

use crate::apis::{PaperRecord, PaperSource, Source};
use crate::llm::ChatModel;
use crate::references;
use crate::search;

/// Papers quoted in full in the review prompt.
const PROMPT_PAPER_LIMIT: usize = 10;
/// Papers considered for a quick trend summary.
const SUMMARY_PAPER_LIMIT: u32 = 5;
/// Abstract length kept in the returned source list.
const ABSTRACT_PREVIEW_CHARS: usize = 200;

const REVIEW_SYSTEM_PROMPT: &str = "You are an expert academic researcher and literature review specialist. Your task is to:

1. Analyze research topics and objectives to identify key themes
2. Search for relevant academic literature
3. Synthesize findings into comprehensive literature reviews
4. Maintain academic standards with proper citations

When generating literature reviews:
- Structure them with clear sections
- Include in-text citations where appropriate (Author, Year)
- Maintain academic tone and rigor
- Highlight gaps in current research
- Provide critical analysis of existing literature
- Write well-developed paragraphs rather than bullet points
- Ensure paragraphs are coherent, focused, and use clear transitions between ideas

Format in-text citations as: (Author, Year) or Author (Year) depending on context.";

const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a research assistant. Provide concise summaries of academic literature.";

const REVIEW_SECTIONS: [&str; 5] = [
    "Introduction and Background",
    "Current State of Research",
    "Key Findings and Trends (map to objectives if available)",
    "Research Gaps and Future Directions",
    "Conclusion",
];

/// How much prose to ask for in each review section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewLength {
    Brief,
    Standard,
    #[default]
    Comprehensive,
}

impl ReviewLength {
    /// Case-insensitive; anything unrecognised is treated as comprehensive.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "brief" => ReviewLength::Brief,
            "standard" => ReviewLength::Standard,
            "comprehensive" | "" => ReviewLength::Comprehensive,
            other => {
                tracing::warn!(review_length = other, "Unknown review length, using comprehensive");
                ReviewLength::Comprehensive
            }
        }
    }

    fn section_guidance(&self) -> &'static str {
        match self {
            ReviewLength::Brief => "one focused paragraph",
            ReviewLength::Standard => "around two substantial paragraphs",
            ReviewLength::Comprehensive => "around three substantial paragraphs",
        }
    }
}

/// Inputs to [`ReviewAgent::generate_review`].
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub topic: String,
    pub field: String,
    pub max_sources: u32,
    pub review_length: ReviewLength,
    pub objectives: String,
}

impl ReviewRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            field: "general".to_string(),
            max_sources: 20,
            review_length: ReviewLength::Comprehensive,
            objectives: String::new(),
        }
    }
}

/// Trimmed projection of a [`PaperRecord`] returned alongside the review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub url: Option<String>,
    pub identifier: Option<String>,
    pub source: Source,
}

impl SourceSummary {
    pub fn from_record(paper: &PaperRecord) -> Self {
        Self {
            title: paper.title.clone(),
            authors: paper.authors.clone(),
            year: paper.year.map(|y| y.to_string()),
            abstract_text: preview(&paper.abstract_text),
            url: paper.pdf_url.clone(),
            identifier: paper.identifier.clone(),
            source: paper.source,
        }
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(ABSTRACT_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewResult {
    pub review: String,
    pub sources: Vec<SourceSummary>,
    pub topic: String,
    pub field: String,
    pub total_sources: usize,
}

pub fn build_review_prompt(
    papers: &[PaperRecord],
    topic: &str,
    objectives: &str,
    length: ReviewLength,
) -> String {
    let mut papers_text = String::new();
    for (i, paper) in papers.iter().take(PROMPT_PAPER_LIMIT).enumerate() {
        let published = paper
            .published_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "n.d.".to_string());
        papers_text.push_str(&format!(
            "\nPaper {} ({}):\nTitle: {}\nAuthors: {}\nAbstract: {}\nPublished: {}\nCategories: {}\nURL: {}\n\n",
            i + 1,
            paper.source,
            paper.title.as_deref().unwrap_or("Untitled"),
            paper.authors.join(", "),
            paper.abstract_text,
            published,
            paper.categories.join(", "),
            paper.pdf_url.as_deref().unwrap_or(""),
        ));
    }

    let objectives = objectives.trim();
    let objectives_block = if objectives.is_empty() {
        String::new()
    } else {
        format!("\nResearch Objectives to address:\n{}\n", objectives)
    };

    let sections: String = REVIEW_SECTIONS
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}\n", i + 1, s))
        .collect();

    format!(
        "\nTopic: {topic}\n{objectives_block}\n\
         Based on the following academic papers collected from multiple platforms (arXiv, OpenAlex, Crossref, Semantic Scholar), \
         generate a comprehensive and detailed literature review that explicitly addresses the objectives where provided.\n\n\
         {papers_text}\n\
         Please structure the literature review with the following sections, and for EACH section write {guidance} \
         of analysis and synthesis (not bullet points):\n\
         {sections}\n\
         Use an academic tone with appropriate in-text citations (Author, Year). Ensure each paragraph is well-developed, \
         with clear topic sentences, supporting evidence, and explanatory commentary.",
        guidance = length.section_guidance(),
    )
}

pub fn build_summary_prompt(papers: &[PaperRecord], topic: &str) -> String {
    let listing: Vec<String> = papers
        .iter()
        .map(|p| {
            let year = p.year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".to_string());
            format!("- {} ({})", p.title.as_deref().unwrap_or("Untitled"), year)
        })
        .collect();
    format!(
        "\nTopic: {}\n\nBased on the following recent papers, provide a brief 2-3 sentence summary of current research trends:\n\n{}\n\nSummary:\n",
        topic,
        listing.join("\n"),
    )
}

/// Aggregation pipeline plus model, assembled explicitly from configuration.
pub struct ReviewAgent {
    sources: Vec<Arc<dyn PaperSource>>,
    model: Arc<dyn ChatModel>,
}

impl ReviewAgent {
    pub fn new(sources: Vec<Arc<dyn PaperSource>>, model: Arc<dyn ChatModel>) -> Self {
        Self { sources, model }
    }

    pub async fn search_literature(&self, topic: &str, max_results: u32) -> Vec<PaperRecord> {
        search::search_literature(&self.sources, topic, max_results).await
    }

    /// Ask the model for a review of `papers`. A failed model call yields an
    /// explanatory message in place of the review.
    pub async fn analyze_papers(
        &self,
        papers: &[PaperRecord],
        topic: &str,
        objectives: &str,
        length: ReviewLength,
    ) -> String {
        let prompt = build_review_prompt(papers, topic, objectives, length);
        match self.model.complete(REVIEW_SYSTEM_PROMPT, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(topic, "Review generation failed: {}", e);
                format!("Error generating literature review: {}", e)
            }
        }
    }

    pub async fn generate_review(&self, request: &ReviewRequest) -> ReviewResult {
        let topic = request.topic.as_str();
        let papers = self.search_literature(topic, request.max_sources).await;
        if papers.is_empty() {
            return ReviewResult {
                review: format!(
                    "No relevant literature found for the topic: {}. Please try a different search term or broader topic.",
                    topic
                ),
                sources: Vec::new(),
                topic: request.topic.clone(),
                field: request.field.clone(),
                total_sources: 0,
            };
        }

        let review = self
            .analyze_papers(&papers, topic, &request.objectives, request.review_length)
            .await;
        let sources: Vec<SourceSummary> = papers.iter().map(SourceSummary::from_record).collect();
        let review = references::append_references(&review, &sources);
        tracing::info!(topic, sources = sources.len(), "Review generated");

        ReviewResult {
            review,
            total_sources: papers.len(),
            sources,
            topic: request.topic.clone(),
            field: request.field.clone(),
        }
    }

    /// Two or three sentences on recent trends for `topic`.
    pub async fn summarize(&self, topic: &str) -> String {
        let papers = self.search_literature(topic, SUMMARY_PAPER_LIMIT).await;
        if papers.is_empty() {
            return format!("No recent literature found for '{}'.", topic);
        }
        let prompt = build_summary_prompt(&papers, topic);
        match self.model.complete(SUMMARY_SYSTEM_PROMPT, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(topic, "Summary generation failed: {}", e);
                format!("Error generating summary: {}", e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::search::tests::{paper, StubSource};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingModel {
        reply: Option<String>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl RecordingModel {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self { reply: Some(text.to_string()), ..Default::default() })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push((system.to_string(), user.to_string()));
            match &self.reply {
                Some(text) => Ok(text.clone()),
                None => Err(LlmError::Api { status: 503, body: "over capacity".into() }),
            }
        }
    }

    fn empty_sources() -> Vec<Arc<dyn PaperSource>> {
        vec![
            StubSource::returning(Source::ArXiv, vec![]),
            StubSource::returning(Source::OpenAlex, vec![]),
            StubSource::failing(Source::Crossref),
            StubSource::returning(Source::SemanticScholar, vec![]),
        ]
    }

    fn detailed(title: &str, year: i32, abstract_len: usize) -> PaperRecord {
        let mut p = paper(Source::OpenAlex, title, Some(year));
        p.authors = vec!["Jane Mary Smith".into()];
        p.abstract_text = "x".repeat(abstract_len);
        p.pdf_url = Some(format!("https://example.org/{}", title));
        p.identifier = Some(format!("https://openalex.org/{}", title));
        p
    }

    #[test]
    fn test_preview_truncates_long_abstracts() {
        assert_eq!(preview(&"a".repeat(200)), "a".repeat(200));
        let long = preview(&"é".repeat(250));
        assert!(long.ends_with("..."));
        assert_eq!(long.chars().count(), 203);
    }

    #[test]
    fn test_source_summary_projection() {
        let s = SourceSummary::from_record(&detailed("Foo", 2021, 10));
        assert_eq!(s.year.as_deref(), Some("2021"));
        assert_eq!(s.url.as_deref(), Some("https://example.org/Foo"));
        assert_eq!(s.identifier.as_deref(), Some("https://openalex.org/Foo"));
        assert_eq!(s.abstract_text, "xxxxxxxxxx");
    }

    #[test]
    fn test_review_length_parsing() {
        assert_eq!(ReviewLength::parse_lenient("Brief"), ReviewLength::Brief);
        assert_eq!(ReviewLength::parse_lenient("standard"), ReviewLength::Standard);
        assert_eq!(ReviewLength::parse_lenient("epic"), ReviewLength::Comprehensive);
    }

    #[test]
    fn test_prompt_includes_first_ten_papers_and_sections() {
        let papers: Vec<PaperRecord> = (0..12).map(|i| detailed(&format!("P{}", i), 2020, 5)).collect();
        let prompt = build_review_prompt(&papers, "surface codes", "Compare decoders", ReviewLength::Comprehensive);
        assert!(prompt.contains("Topic: surface codes"));
        assert!(prompt.contains("Research Objectives to address:\nCompare decoders"));
        assert!(prompt.contains("Paper 10 (OpenAlex):\nTitle: P9"));
        assert!(!prompt.contains("Paper 11"));
        for section in REVIEW_SECTIONS {
            assert!(prompt.contains(section));
        }
        assert!(prompt.contains("around three substantial paragraphs"));
        assert!(prompt.contains("(Author, Year)"));
    }

    #[test]
    fn test_prompt_omits_empty_objectives() {
        let prompt = build_review_prompt(&[], "t", "  ", ReviewLength::Brief);
        assert!(!prompt.contains("Research Objectives"));
        assert!(prompt.contains("one focused paragraph"));
    }

    #[tokio::test]
    async fn test_no_literature_found() {
        let model = RecordingModel::replying("unused");
        let agent = ReviewAgent::new(empty_sources(), model.clone());
        let result = agent.generate_review(&ReviewRequest::new("quantum error correction")).await;
        assert!(result
            .review
            .starts_with("No relevant literature found for the topic: quantum error correction"));
        assert!(result.sources.is_empty());
        assert_eq!(result.total_sources, 0);
        assert_eq!(result.field, "general");
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn test_generate_review_appends_references_in_prompt_order() {
        let sources = vec![
            StubSource::returning(Source::ArXiv, vec![detailed("Older", 2019, 20)]),
            StubSource::returning(Source::Crossref, vec![detailed("Newer", 2023, 300)]),
        ];
        let model = RecordingModel::replying("Generated review.");
        let agent = ReviewAgent::new(sources, model.clone());

        let mut request = ReviewRequest::new("qec");
        request.field = "physics".into();
        let result = agent.generate_review(&request).await;

        assert_eq!(result.total_sources, 2);
        assert_eq!(result.field, "physics");
        assert_eq!(result.sources[0].title.as_deref(), Some("Newer"));
        assert!(result.sources[0].abstract_text.ends_with("..."));
        assert_eq!(
            result.review,
            "Generated review.\n\nReferences (APA)\n\
             - Smith, J.M. (2023). Newer. https://example.org/Newer\n\
             - Smith, J.M. (2019). Older. https://example.org/Older"
        );

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, REVIEW_SYSTEM_PROMPT);
        let newer = calls[0].1.find("Title: Newer").unwrap();
        let older = calls[0].1.find("Title: Older").unwrap();
        assert!(newer < older);
    }

    #[tokio::test]
    async fn test_model_failure_becomes_review_text() {
        let sources = vec![StubSource::returning(Source::ArXiv, vec![detailed("Only", 2022, 10)])];
        let agent = ReviewAgent::new(sources, RecordingModel::failing());
        let result = agent.generate_review(&ReviewRequest::new("t")).await;
        assert!(result.review.starts_with("Error generating literature review: API error (HTTP 503)"));
        assert!(result.review.contains("References (APA)"));
        assert_eq!(result.total_sources, 1);
    }

    #[tokio::test]
    async fn test_analyze_papers_returns_model_text_verbatim() {
        let agent = ReviewAgent::new(vec![], RecordingModel::replying("  verbatim\n"));
        let text = agent
            .analyze_papers(&[detailed("A", 2020, 5)], "t", "", ReviewLength::Comprehensive)
            .await;
        assert_eq!(text, "  verbatim\n");
    }

    #[tokio::test]
    async fn test_summarize() {
        let agent = ReviewAgent::new(empty_sources(), RecordingModel::replying("Trends."));
        assert_eq!(agent.summarize("nothing").await, "No recent literature found for 'nothing'.");

        let sources = vec![StubSource::returning(Source::ArXiv, vec![paper(Source::ArXiv, "Foo", Some(2021))])];
        let model = RecordingModel::replying("Trends.");
        let agent = ReviewAgent::new(sources, model.clone());
        assert_eq!(agent.summarize("foo").await, "Trends.");
        let calls = model.calls();
        assert_eq!(calls[0].0, SUMMARY_SYSTEM_PROMPT);
        assert!(calls[0].1.contains("- Foo (2021)"));

        let sources = vec![StubSource::returning(Source::ArXiv, vec![paper(Source::ArXiv, "Foo", Some(2021))])];
        let agent = ReviewAgent::new(sources, RecordingModel::failing());
        assert!(agent.summarize("foo").await.starts_with("Error generating summary:"));
    }
}
