use super::{
    check_status, four_digit_year, squash_whitespace, PaperRecord, PaperSource, Source,
    SourceError,
};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

const BASE_URL: &str = "https://export.arxiv.org/api/query";

pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
}

impl ArxivClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }
}

#[async_trait]
impl PaperSource for ArxivClient {
    fn source(&self) -> Source {
        Source::ArXiv
    }

    async fn search(&self, topic: &str, max_results: u32) -> Result<Vec<PaperRecord>, SourceError> {
        // Exact-phrase match across all fields, newest submissions first.
        let phrase = format!("all:\"{}\"", topic);
        let max = max_results.min(200).to_string();
        let resp = self.client
            .get(&self.base_url)
            .query(&[
                ("search_query", phrase.as_str()),
                ("start", "0"),
                ("max_results", max.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .send().await?;
        let body = check_status(resp)?.text().await?;
        parse_atom_feed(&body)
    }
}

#[derive(Default)]
struct EntryBuilder {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
    author_name: String,
    pdf_url: Option<String>,
    categories: Vec<String>,
}

impl EntryBuilder {
    fn absorb_element(&mut self, e: &BytesStart<'_>) {
        match e.name().as_ref() {
            b"link" => {
                let mut href = None;
                let mut is_pdf = false;
                for attr in e.attributes().flatten() {
                    let val = String::from_utf8_lossy(&attr.value).to_string();
                    match attr.key.as_ref() {
                        b"href" => href = Some(val),
                        b"title" if val == "pdf" => is_pdf = true,
                        _ => {}
                    }
                }
                if is_pdf {
                    self.pdf_url = href;
                }
            }
            b"category" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"term" {
                        let term = String::from_utf8_lossy(&attr.value).to_string();
                        if !term.is_empty() && !self.categories.contains(&term) {
                            self.categories.push(term);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> Option<PaperRecord> {
        let title = squash_whitespace(&self.title);
        let id = self.id.trim().to_string();
        if id.is_empty() || title.is_empty() {
            return None;
        }
        let published = self.published.trim()
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        let mut record = PaperRecord::new(Source::ArXiv);
        record.title = Some(title);
        record.authors = self.authors;
        record.abstract_text = squash_whitespace(&self.summary);
        record.published_date = published;
        record.year = published.and_then(|d| four_digit_year(d.year() as i64));
        record.identifier = Some(id);
        record.pdf_url = self.pdf_url;
        record.categories = self.categories;
        Some(record)
    }
}

fn parse_atom_feed(xml: &str) -> Result<Vec<PaperRecord>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut papers = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut current_tag = String::new();
    let mut in_author = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "entry" {
                    entry = Some(EntryBuilder::default());
                } else if let Some(ref mut b) = entry {
                    if tag == "author" {
                        in_author = true;
                        b.author_name.clear();
                    }
                    b.absorb_element(&e);
                    current_tag = tag;
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(ref mut b) = entry {
                    b.absorb_element(&e);
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(ref mut b) = entry {
                    let text = e.unescape()
                        .map_err(|e| SourceError::Parse(format!("XML text error: {}", e)))?;
                    match current_tag.as_str() {
                        "title" => b.title.push_str(&text),
                        "summary" => b.summary.push_str(&text),
                        "id" => b.id.push_str(&text),
                        "published" => b.published.push_str(&text),
                        "name" if in_author => b.author_name.push_str(&text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "entry" {
                    if let Some(paper) = entry.take().and_then(EntryBuilder::finish) {
                        papers.push(paper);
                    }
                } else if tag == "author" && in_author {
                    in_author = false;
                    if let Some(ref mut b) = entry {
                        let name = squash_whitespace(&b.author_name);
                        if !name.is_empty() {
                            b.authors.push(name);
                        }
                    }
                }
                if tag == current_tag {
                    current_tag.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::Parse(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(papers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const SAMPLE_ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <entry>
    <id>http://arxiv.org/abs/2301.12345v1</id>
    <title>Surface Codes for
  Quantum Error Correction</title>
    <summary>This is a test abstract about
 surface codes.</summary>
    <published>2023-01-15T00:00:00Z</published>
    <author><name>John Doe</name></author>
    <author><name>Jane Smith</name></author>
    <link href="http://arxiv.org/abs/2301.12345v1" rel="alternate" type="text/html"/>
    <link href="http://arxiv.org/pdf/2301.12345v1" title="pdf" type="application/pdf"/>
    <arxiv:primary_category term="quant-ph" scheme="http://arxiv.org/schemas/atom"/>
    <category term="quant-ph" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.IT" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2301.99999v1</id>
    <title>   </title>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_atom_feed() {
        let papers = parse_atom_feed(SAMPLE_ATOM).unwrap();
        assert_eq!(papers.len(), 1);
        let p = &papers[0];
        assert_eq!(p.title.as_deref(), Some("Surface Codes for Quantum Error Correction"));
        assert_eq!(p.abstract_text, "This is a test abstract about surface codes.");
        assert_eq!(p.authors, vec!["John Doe", "Jane Smith"]);
        assert_eq!(p.year, Some(2023));
        assert_eq!(p.published_date, NaiveDate::from_ymd_opt(2023, 1, 15));
        assert_eq!(p.identifier.as_deref(), Some("http://arxiv.org/abs/2301.12345v1"));
        assert_eq!(p.pdf_url.as_deref(), Some("http://arxiv.org/pdf/2301.12345v1"));
        assert_eq!(p.categories, vec!["quant-ph", "cs.IT"]);
        assert_eq!(p.source, Source::ArXiv);
    }

    #[test]
    fn test_parse_rejects_malformed_xml() {
        assert!(parse_atom_feed("<feed><entry><title>x</wrong></entry></feed>").is_err());
    }

    #[tokio::test]
    async fn test_search_sends_phrase_query_sorted_by_date() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("search_query".into(), "all:\"quantum error correction\"".into()),
                Matcher::UrlEncoded("max_results".into(), "6".into()),
                Matcher::UrlEncoded("sortBy".into(), "submittedDate".into()),
                Matcher::UrlEncoded("sortOrder".into(), "descending".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/atom+xml")
            .with_body(SAMPLE_ATOM)
            .create_async()
            .await;

        let client = ArxivClient::with_base_url(
            reqwest::Client::new(),
            format!("{}/api/query", server.url()),
        );
        let papers = client.search("quantum error correction", 6).await.unwrap();
        mock.assert_async().await;
        assert_eq!(papers.len(), 1);
    }

    #[tokio::test]
    async fn test_search_fails_on_server_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/query")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let client = ArxivClient::with_base_url(
            reqwest::Client::new(),
            format!("{}/api/query", server.url()),
        );
        let err = client.search("anything", 5).await.unwrap_err();
        assert!(matches!(err, SourceError::Api(s) if s.as_u16() == 503));
    }
}
