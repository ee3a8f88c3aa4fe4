use super::{
    check_status, four_digit_year, non_empty, year_start, PaperRecord, PaperSource, Source,
    SourceError,
};
use async_trait::async_trait;
use serde::Deserialize;

const BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";

const FIELDS: &str = "title,abstract,authors,year,openAccessPdf,url";

pub struct SemanticScholarClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self::with_base_url(client, api_key, BASE_URL)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        api_key: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self { client, base_url: base_url.into(), api_key }
    }

    fn add_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("x-api-key", key),
            None => req,
        }
    }
}

#[derive(Deserialize)]
struct S2SearchResponse {
    data: Option<Vec<S2Paper>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<S2Author>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<i64>,
    url: Option<String>,
    open_access_pdf: Option<S2Pdf>,
}

#[derive(Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[derive(Deserialize)]
struct S2Pdf {
    url: Option<String>,
}

fn s2_to_paper(p: S2Paper) -> PaperRecord {
    let year = p.year.and_then(four_digit_year);
    let url = non_empty(p.url.as_deref());
    let open_access = p.open_access_pdf.as_ref().and_then(|pdf| non_empty(pdf.url.as_deref()));

    let mut record = PaperRecord::new(Source::SemanticScholar);
    record.title = non_empty(p.title.as_deref());
    record.authors = p.authors.iter().filter_map(|a| non_empty(a.name.as_deref())).collect();
    record.abstract_text = p.abstract_text.unwrap_or_default();
    record.published_date = year_start(year);
    record.year = year;
    record.pdf_url = open_access.or_else(|| url.clone());
    record.identifier = url;
    record
}

#[async_trait]
impl PaperSource for SemanticScholarClient {
    fn source(&self) -> Source {
        Source::SemanticScholar
    }

    async fn search(&self, topic: &str, max_results: u32) -> Result<Vec<PaperRecord>, SourceError> {
        let url = format!("{}/paper/search", self.base_url);
        let limit = max_results.min(100).to_string();
        let resp = self.add_auth(
            self.client.get(&url)
                .query(&[
                    ("query", topic),
                    ("limit", limit.as_str()),
                    ("fields", FIELDS),
                ])
        ).send().await?;
        let body: S2SearchResponse = check_status(resp)?.json().await?;
        Ok(body.data.unwrap_or_default().into_iter().map(s2_to_paper).collect())
    }
}
