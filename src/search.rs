use std::collections::HashSet;
use std::sync::Arc;

use crate::apis::{PaperRecord, PaperSource, Source};

/// What one adapter contributed to an aggregation run.
#[derive(Debug)]
pub enum SourceOutcome {
    Found { source: Source, papers: Vec<PaperRecord> },
    Failed { source: Source, reason: String },
}

impl SourceOutcome {
    pub fn source(&self) -> Source {
        match self {
            SourceOutcome::Found { source, .. } | SourceOutcome::Failed { source, .. } => *source,
        }
    }

    fn into_papers(self) -> Vec<PaperRecord> {
        match self {
            SourceOutcome::Found { papers, .. } => papers,
            SourceOutcome::Failed { .. } => Vec::new(),
        }
    }
}

/// Results requested from each adapter for an overall budget of `max_results`.
pub fn per_source_limit(max_results: u32) -> u32 {
    (max_results / 3).max(5)
}

/// Query every source concurrently and wait for all of them to settle.
/// Outcomes come back in `sources` order regardless of completion order.
pub async fn gather(
    sources: &[Arc<dyn PaperSource>],
    topic: &str,
    per_source: u32,
) -> Vec<SourceOutcome> {
    let handles: Vec<_> = sources
        .iter()
        .map(|source| {
            let source = Arc::clone(source);
            let topic = topic.to_string();
            let tag = source.source();
            (tag, tokio::spawn(async move { source.search(&topic, per_source).await }))
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (source, handle) in handles {
        let outcome = match handle.await {
            Ok(Ok(papers)) => {
                tracing::debug!(%source, count = papers.len(), "Source returned results");
                SourceOutcome::Found { source, papers }
            }
            Ok(Err(e)) => {
                tracing::warn!(%source, "Source search failed: {}", e);
                SourceOutcome::Failed { source, reason: e.to_string() }
            }
            Err(e) => {
                tracing::warn!(%source, "Source task panicked: {}", e);
                SourceOutcome::Failed { source, reason: e.to_string() }
            }
        };
        outcomes.push(outcome);
    }
    outcomes
}

/// Fan out to all sources, then merge, deduplicate by title, order by year
/// (newest first) and keep at most `max_results`. Never fails: if every
/// source fails the result is simply empty.
pub async fn search_literature(
    sources: &[Arc<dyn PaperSource>],
    topic: &str,
    max_results: u32,
) -> Vec<PaperRecord> {
    let outcomes = gather(sources, topic, per_source_limit(max_results)).await;
    let failed: Vec<Source> = outcomes
        .iter()
        .filter(|o| matches!(o, SourceOutcome::Failed { .. }))
        .map(SourceOutcome::source)
        .collect();
    let papers = merge_outcomes(outcomes, max_results as usize);
    tracing::info!(
        topic,
        papers = papers.len(),
        failed_sources = ?failed,
        "Literature search complete"
    );
    papers
}

/// Merge in adapter order, dedupe, sort and truncate.
pub fn merge_outcomes(outcomes: Vec<SourceOutcome>, limit: usize) -> Vec<PaperRecord> {
    let combined = outcomes.into_iter().flat_map(SourceOutcome::into_papers).collect();
    let mut papers = dedupe_by_title(combined);
    sort_by_recency(&mut papers);
    papers.truncate(limit);
    papers
}

/// Keep the first record for each normalized title; drop untitled records.
pub fn dedupe_by_title(papers: Vec<PaperRecord>) -> Vec<PaperRecord> {
    let mut seen = HashSet::new();
    papers
        .into_iter()
        .filter(|p| match p.dedup_key() {
            Some(key) => seen.insert(key),
            None => false,
        })
        .collect()
}

/// Stable sort, newest year first; a missing year counts as year 0.
pub fn sort_by_recency(papers: &mut [PaperRecord]) {
    papers.sort_by(|a, b| b.year.unwrap_or(0).cmp(&a.year.unwrap_or(0)));
}
