use super::{
    check_status, four_digit_year, non_empty, year_start, PaperRecord, PaperSource, Source,
    SourceError,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

const BASE_URL: &str = "https://api.crossref.org/works";

static MARKUP_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^<]+?>").expect("valid regex"));

pub struct CrossRefClient {
    client: reqwest::Client,
    base_url: String,
}

impl CrossRefClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }
}

#[derive(Deserialize)]
struct CRResponse {
    message: CRMessage,
}

#[derive(Deserialize)]
struct CRMessage {
    #[serde(default)]
    items: Vec<CRItem>,
}

#[derive(Deserialize)]
struct CRItem {
    #[serde(rename = "URL")]
    url: Option<String>,
    title: Option<Vec<String>>,
    #[serde(default)]
    author: Vec<CRAuthor>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    issued: Option<CRDate>,
}

#[derive(Deserialize)]
struct CRAuthor {
    given: Option<String>,
    family: Option<String>,
}

#[derive(Deserialize)]
struct CRDate {
    #[serde(rename = "date-parts")]
    date_parts: Option<Vec<Vec<Option<i64>>>>,
}

impl CRDate {
    /// `[[year, month?, day?]]`, where any component may be null.
    fn parts(&self) -> (Option<i64>, Option<i64>, Option<i64>) {
        let first = self.date_parts.as_ref().and_then(|p| p.first());
        let at = |i: usize| first.and_then(|p| p.get(i).copied().flatten());
        (at(0), at(1), at(2))
    }
}

fn strip_markup(text: &str) -> String {
    MARKUP_TAG_RE.replace_all(text, "").trim().to_string()
}

fn item_to_paper(item: CRItem) -> PaperRecord {
    let title = item.title.as_ref()
        .and_then(|t| t.first())
        .and_then(|t| non_empty(Some(t.as_str())));
    let authors = item.author.iter()
        .map(|a| {
            format!("{} {}",
                a.given.as_deref().unwrap_or("").trim(),
                a.family.as_deref().unwrap_or("").trim()).trim().to_string()
        })
        .filter(|name| !name.is_empty())
        .collect();

    let (y, m, d) = item.issued.as_ref().map(CRDate::parts).unwrap_or_default();
    let year = y.and_then(four_digit_year);
    let published_date = match (year, m, d) {
        (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m as u32, d as u32),
        (Some(y), Some(m), None) => NaiveDate::from_ymd_opt(y, m as u32, 1),
        _ => None,
    }
    .or_else(|| year_start(year));

    let url = non_empty(item.url.as_deref());
    let mut record = PaperRecord::new(Source::Crossref);
    record.title = title;
    record.authors = authors;
    record.abstract_text = item.abstract_text.as_deref().map(strip_markup).unwrap_or_default();
    record.published_date = published_date;
    record.year = year;
    record.identifier = url.clone();
    record.pdf_url = url;
    record
}

#[async_trait]
impl PaperSource for CrossRefClient {
    fn source(&self) -> Source {
        Source::Crossref
    }

    async fn search(&self, topic: &str, max_results: u32) -> Result<Vec<PaperRecord>, SourceError> {
        let rows = max_results.min(100).to_string();
        let resp = self.client
            .get(&self.base_url)
            .query(&[
                ("query", topic),
                ("rows", rows.as_str()),
                ("sort", "issued"),
                ("order", "desc"),
            ])
            .send().await?;
        let body: CRResponse = check_status(resp)?.json().await?;
        Ok(body.message.items.into_iter().map(item_to_paper).collect())
    }
}
