use super::{
    check_status, four_digit_year, non_empty, year_start, PaperRecord, PaperSource, Source,
    SourceError,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};

const BASE_URL: &str = "https://api.openalex.org";

pub struct OpenAlexClient {
    client: reqwest::Client,
    base_url: String,
    email: Option<String>,
}

impl OpenAlexClient {
    pub fn new(client: reqwest::Client, email: Option<String>) -> Self {
        Self::with_base_url(client, email, BASE_URL)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        email: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self { client, base_url: base_url.into(), email }
    }
}

#[derive(Deserialize)]
struct OAResponse {
    #[serde(default)]
    results: Vec<OAWork>,
}

#[derive(Deserialize)]
struct OAWork {
    id: Option<String>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    abstract_inverted_index: Option<Map<String, Value>>,
    #[serde(default)]
    authorships: Vec<OAAuthorship>,
    publication_year: Option<i64>,
    publication_date: Option<String>,
    primary_location: Option<OALocation>,
}

#[derive(Deserialize)]
struct OAAuthorship {
    author: Option<OAAuthor>,
}

#[derive(Deserialize)]
struct OAAuthor {
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct OALocation {
    pdf_url: Option<String>,
    landing_page_url: Option<String>,
    source: Option<OAHostSource>,
}

#[derive(Deserialize)]
struct OAHostSource {
    host_page_url: Option<String>,
}

/// Rebuild abstract text from OpenAlex's `word -> [positions]` index.
/// The map keeps payload order, which the position-less fallback relies on.
fn rebuild_abstract(index: &Map<String, Value>) -> String {
    let mut positioned: Vec<(u64, &str)> = index
        .iter()
        .flat_map(|(word, positions)| {
            positions
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(Value::as_u64)
                .map(move |p| (p, word.as_str()))
        })
        .collect();
    if positioned.is_empty() {
        // No positions at all: the keys are the only text available.
        return index.keys().map(String::as_str).collect::<Vec<_>>().join(" ");
    }
    positioned.sort_by_key(|&(pos, _)| pos);
    positioned.iter().map(|&(_, w)| w).collect::<Vec<_>>().join(" ")
}

fn oa_to_paper(w: OAWork) -> PaperRecord {
    let abstract_text = non_empty(w.abstract_text.as_deref())
        .or_else(|| w.abstract_inverted_index.as_ref().map(rebuild_abstract))
        .unwrap_or_default();
    let authors = w.authorships.iter()
        .filter_map(|a| a.author.as_ref())
        .filter_map(|a| non_empty(a.display_name.as_deref()))
        .collect();
    let year = w.publication_year.and_then(four_digit_year);
    let published_date = w.publication_date.as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .or_else(|| year_start(year));

    // Direct PDF, then the host page, then the landing page, then the work itself.
    let location = w.primary_location.as_ref();
    let pdf_url = location
        .and_then(|l| non_empty(l.pdf_url.as_deref()))
        .or_else(|| location
            .and_then(|l| l.source.as_ref())
            .and_then(|s| non_empty(s.host_page_url.as_deref())))
        .or_else(|| location.and_then(|l| non_empty(l.landing_page_url.as_deref())))
        .or_else(|| non_empty(w.id.as_deref()));

    let mut record = PaperRecord::new(Source::OpenAlex);
    record.title = non_empty(w.title.as_deref());
    record.authors = authors;
    record.abstract_text = abstract_text;
    record.published_date = published_date;
    record.year = year;
    record.identifier = non_empty(w.id.as_deref());
    record.pdf_url = pdf_url;
    record
}

#[async_trait]
impl PaperSource for OpenAlexClient {
    fn source(&self) -> Source {
        Source::OpenAlex
    }

    async fn search(&self, topic: &str, max_results: u32) -> Result<Vec<PaperRecord>, SourceError> {
        let per_page = max_results.min(200).to_string();
        let mut params = vec![
            ("search", topic),
            ("per_page", per_page.as_str()),
            ("sort", "publication_year:desc"),
        ];
        if let Some(ref email) = self.email {
            params.push(("mailto", email.as_str()));
        }
        let resp = self.client
            .get(format!("{}/works", self.base_url))
            .query(&params)
            .send().await?;
        let body: OAResponse = check_status(resp)?.json().await?;
        Ok(body.results.into_iter().map(oa_to_paper).collect())
    }
}
