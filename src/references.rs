//! APA 7 style reference list built from the sources a review used.
//!
//! Pure string formatting: the same sources always render the same block.

use crate::review::SourceSummary;

pub const REFERENCES_HEADING: &str = "References (APA)";

/// "Jane Mary Smith" -> "Smith, J.M.". A single token is returned unchanged.
pub fn format_author(name: &str) -> String {
    let parts: Vec<&str> = name.split_whitespace().collect();
    let Some((surname, given)) = parts.split_last() else {
        return name.to_string();
    };
    let initials: String = given
        .iter()
        .filter_map(|p| p.chars().next())
        .map(|c| format!("{}.", c.to_uppercase()))
        .collect();
    if initials.is_empty() {
        surname.to_string()
    } else {
        format!("{}, {}", surname, initials)
    }
}

/// One author as-is, two joined with "&", three or more as "A, B, & C".
pub fn join_authors(authors: &[String]) -> String {
    let formatted: Vec<String> = authors.iter().map(|a| format_author(a)).collect();
    match formatted.as_slice() {
        [] => "Author".to_string(),
        [only] => only.clone(),
        [first, second] => format!("{} & {}", first, second),
        [init @ .., last] => format!("{}, & {}", init.join(", "), last),
    }
}

pub fn reference_line(source: &SourceSummary) -> String {
    let authors = join_authors(&source.authors);
    let year = source.year.as_deref().unwrap_or("n.d.");
    let title = source.title.as_deref().unwrap_or("Untitled").trim();
    let title = title.trim_end_matches('.');
    let url = source.url.as_deref().unwrap_or("");
    format!("{} ({}). {}. {}", authors, year, title, url)
        .trim_end()
        .to_string()
}

/// The heading plus one "- " bullet per source; empty when there are no sources.
pub fn references_block(sources: &[SourceSummary]) -> String {
    if sources.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = sources
        .iter()
        .map(|s| format!("- {}", reference_line(s)))
        .collect();
    format!("{}\n{}", REFERENCES_HEADING, lines.join("\n"))
}

pub fn append_references(review: &str, sources: &[SourceSummary]) -> String {
    let block = references_block(sources);
    if block.is_empty() {
        review.to_string()
    } else {
        format!("{}\n\n{}", review, block)
    }
}
