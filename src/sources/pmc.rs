//! PubMed Central (PMC) research source implementation.
//!
//! Search and metadata come from NCBI E-utilities (`esearch` and `esummary`
//! against `db=pmc`); full text comes from the BioC open-access service.

use async_trait::async_trait;
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

use super::bioc::{get_attr, parse_bioc_xml, text_content};
use crate::config::{Config, NcbiConfig, RetrySettings};
use crate::models::{ArticleMetadata, ArticleMetadataBuilder, FullTextDocument, SearchQuery};
use crate::sources::{ArticleSource, SourceError};
use crate::utils::{with_retry, HttpClient};

const PMC_PREFIX: &str = "PMC";

/// PMC research source
#[derive(Debug, Clone)]
pub struct PmcSource {
    client: HttpClient,
    ncbi: NcbiConfig,
    retry: RetrySettings,
}

impl PmcSource {
    /// Build a source with its own HTTP client from application config
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        let client = HttpClient::from_config(&config.rate_limits)?;
        let mut ncbi = config.ncbi.clone();
        ncbi.api_key = ncbi.resolved_api_key();
        Ok(Self::with_client(client, ncbi, config.retry.clone()))
    }

    /// Build a source that shares an existing HTTP client
    pub fn with_client(client: HttpClient, ncbi: NcbiConfig, retry: RetrySettings) -> Self {
        Self {
            client,
            ncbi,
            retry,
        }
    }

    /// Numeric part of a PMC id (`PMC123` and `123` both give `123`)
    fn numeric_id(id: &str) -> &str {
        let id = id.trim();
        id.strip_prefix(PMC_PREFIX).unwrap_or(id)
    }

    /// Canonical `PMC`-prefixed id
    fn external_id(id: &str) -> String {
        format!("{}{}", PMC_PREFIX, Self::numeric_id(id))
    }

    fn bioc_url(&self, id: &str) -> String {
        format!(
            "{}/BioC_xml/{}/unicode",
            self.ncbi.bioc_base_url.trim_end_matches('/'),
            Self::external_id(id)
        )
    }

    /// Query parameters shared by every E-utilities call
    fn eutils_params<'a>(&'a self, params: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        let mut all = vec![("db", "pmc"), ("retmode", "xml")];
        all.extend_from_slice(params);
        all.push(("tool", self.ncbi.tool.as_str()));
        if let Some(key) = self.ncbi.api_key.as_deref().filter(|k| !k.is_empty()) {
            all.push(("api_key", key));
        }
        if let Some(email) = self.ncbi.email.as_deref().filter(|e| !e.is_empty()) {
            all.push(("email", email));
        }
        all
    }

    /// Parse E-utilities search response XML
    fn parse_search_response(xml: &str) -> Result<Vec<String>, SourceError> {
        #[derive(Debug, Deserialize)]
        struct ESearchResult {
            #[serde(rename = "IdList", default)]
            id_list: IdList,
        }

        #[derive(Debug, Default, Deserialize)]
        struct IdList {
            #[serde(rename = "Id", default)]
            ids: Vec<String>,
        }

        let result: ESearchResult = from_str(xml)
            .map_err(|e| SourceError::Parse(format!("Failed to parse PMC search XML: {}", e)))?;

        Ok(result
            .id_list
            .ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .map(|id| Self::external_id(&id))
            .collect())
    }

    /// Parse the first `DocSum` of an E-utilities summary response
    fn parse_summary_response(xml: &str, external_id: &str) -> Result<ArticleMetadata, SourceError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut builder = ArticleMetadata::builder(external_id);
        let mut authors = Vec::new();
        // Open `Item` elements as (Name attribute, collected text)
        let mut items: Vec<(String, String)> = Vec::new();
        let mut in_docsum = false;
        let mut found = false;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => match e.name().as_ref() {
                    b"DocSum" if !found => {
                        in_docsum = true;
                        found = true;
                    }
                    b"Item" if in_docsum => {
                        items.push((get_attr(e, "Name").unwrap_or_default(), String::new()));
                    }
                    _ => {}
                },
                Event::Text(ref e) => {
                    if let (true, Some((_, text))) = (in_docsum, items.last_mut()) {
                        text.push_str(&text_content(e));
                    }
                }
                Event::End(ref e) => match e.name().as_ref() {
                    b"Item" if in_docsum => {
                        if let Some((name, text)) = items.pop() {
                            let parent = items.last().map(|(parent, _)| parent.as_str());
                            builder = apply_item(builder, &mut authors, &name, parent, text.trim());
                        }
                    }
                    b"DocSum" => in_docsum = false,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !found {
            return Err(SourceError::Parse(format!(
                "No DocSum in summary for {}",
                external_id
            )));
        }

        Ok(builder.authors(authors).build())
    }
}

/// Copy one closed DocSum `Item` into the metadata being built
fn apply_item(
    builder: ArticleMetadataBuilder,
    authors: &mut Vec<String>,
    name: &str,
    parent: Option<&str>,
    text: &str,
) -> ArticleMetadataBuilder {
    if text.is_empty() {
        return builder;
    }
    match (name, parent) {
        ("Author", Some("AuthorList")) => {
            authors.push(text.to_string());
            builder
        }
        ("Title", None) => builder.title(text),
        ("PubDate", None) => builder.publication_date(text),
        ("Source", None) => builder.journal_name(text),
        ("DOI", None) => builder.doi(text),
        _ => builder,
    }
}

#[async_trait]
impl ArticleSource for PmcSource {
    fn id(&self) -> &str {
        "pmc"
    }

    fn name(&self) -> &str {
        "PubMed Central"
    }

    async fn search_ids(&self, query: &SearchQuery) -> Result<Vec<String>, SourceError> {
        if query.query.trim().is_empty() {
            return Err(SourceError::InvalidRequest("empty query".to_string()));
        }
        let term = query.search_term();

        let retmax = query.page_size().to_string();
        let params = self.eutils_params(&[("term", term.as_str()), ("retmax", retmax.as_str())]);

        let xml = with_retry(self.retry.metadata(), || {
            self.client.get_text(&self.ncbi.esearch_url, &params)
        })
        .await?;

        let ids = Self::parse_search_response(&xml)?;
        tracing::debug!("PMC search for {:?} returned {} ids", term, ids.len());
        Ok(ids)
    }

    async fn fetch_metadata(&self, id: &str) -> Result<ArticleMetadata, SourceError> {
        let external_id = Self::external_id(id);
        let params = self.eutils_params(&[("id", Self::numeric_id(id))]);

        let xml = with_retry(self.retry.metadata(), || {
            self.client.get_text(&self.ncbi.esummary_url, &params)
        })
        .await?;

        Self::parse_summary_response(&xml, &external_id)
    }

    async fn has_full_text(&self, id: &str) -> Result<bool, SourceError> {
        let url = self.bioc_url(id);
        with_retry(self.retry.metadata(), || self.client.url_exists(&url)).await
    }

    async fn fetch_full_text(&self, id: &str) -> Result<FullTextDocument, SourceError> {
        let url = self.bioc_url(id);
        let xml = with_retry(self.retry.full_text(), || self.client.get_text(&url, &[])).await?;
        parse_bioc_xml(&xml)
    }

    fn article_url(&self, id: &str) -> String {
        format!(
            "{}/{}/",
            self.ncbi.article_base_url.trim_end_matches('/'),
            Self::external_id(id)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::models::{Section, NO_DOI, NO_TITLE};
    use mockito::Matcher;

    const SUMMARY: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<!DOCTYPE eSummaryResult PUBLIC "-//NLM//DTD esummary v1 20041029//EN" "https://eutils.ncbi.nlm.nih.gov/eutils/dtd/20041029/esummary-v1.dtd">
<eSummaryResult>
<DocSum>
	<Id>11111</Id>
	<Item Name="PubDate" Type="Date">2024 Mar 5</Item>
	<Item Name="Source" Type="String">Gut Microbes</Item>
	<Item Name="AuthorList" Type="List">
		<Item Name="Author" Type="String">Smith J</Item>
		<Item Name="Author" Type="String">Doe A</Item>
	</Item>
	<Item Name="Title" Type="String">Diet &amp; the gut microbiome</Item>
	<Item Name="DOI" Type="String">10.1000/gm.2024.1</Item>
	<Item Name="ArticleIds" Type="List">
		<Item Name="doi" Type="String">10.1000/ignored</Item>
	</Item>
</DocSum>
</eSummaryResult>"#;

    fn source_for(server: &mockito::Server) -> PmcSource {
        let client = HttpClient::from_config(&RateLimitConfig {
            requests_per_second: 0.0,
            ..Default::default()
        })
        .unwrap();
        let base = server.url();
        let ncbi = NcbiConfig {
            esearch_url: format!("{}/esearch.fcgi", base),
            esummary_url: format!("{}/esummary.fcgi", base),
            bioc_base_url: format!("{}/pmcoa.cgi", base),
            article_base_url: "https://www.ncbi.nlm.nih.gov/pmc/articles".to_string(),
            api_key: None,
            tool: "research-gap-tests".to_string(),
            email: None,
        };
        let retry = RetrySettings {
            initial_delay_ms: 5,
            gap_delay_ms: 5,
            ..Default::default()
        };
        PmcSource::with_client(client, ncbi, retry)
    }

    #[test]
    fn test_id_normalization() {
        assert_eq!(PmcSource::numeric_id("PMC123"), "123");
        assert_eq!(PmcSource::numeric_id("123"), "123");
        assert_eq!(PmcSource::external_id("123"), "PMC123");
        assert_eq!(PmcSource::external_id("PMC123"), "PMC123");
    }

    #[test]
    fn test_parse_search_response() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" ?>
<eSearchResult><Count>3</Count><RetMax>3</RetMax><RetStart>0</RetStart>
<IdList><Id>111</Id><Id>222</Id><Id>333</Id></IdList>
<TranslationSet/></eSearchResult>"#;

        let ids = PmcSource::parse_search_response(xml).unwrap();
        assert_eq!(ids, vec!["PMC111", "PMC222", "PMC333"]);
    }

    #[test]
    fn test_parse_search_response_without_ids() {
        let xml = r#"<eSearchResult><Count>0</Count><RetMax>0</RetMax><IdList></IdList></eSearchResult>"#;
        assert!(PmcSource::parse_search_response(xml).unwrap().is_empty());
    }

    #[test]
    fn test_parse_summary_response() {
        let meta = PmcSource::parse_summary_response(SUMMARY, "PMC11111").unwrap();

        assert_eq!(meta.external_id, "PMC11111");
        assert_eq!(meta.title, "Diet & the gut microbiome");
        assert_eq!(meta.authors, vec!["Smith J", "Doe A"]);
        assert_eq!(meta.publication_date, "2024 Mar 5");
        assert_eq!(meta.journal_name, "Gut Microbes");
        assert_eq!(meta.doi, "10.1000/gm.2024.1");
    }

    #[test]
    fn test_parse_summary_defaults() {
        let xml = r#"<eSummaryResult><DocSum><Id>5</Id><Item Name="Source" Type="String">J</Item></DocSum></eSummaryResult>"#;
        let meta = PmcSource::parse_summary_response(xml, "PMC5").unwrap();

        assert_eq!(meta.title, NO_TITLE);
        assert_eq!(meta.doi, NO_DOI);
        assert!(meta.authors.is_empty());
        assert_eq!(meta.publication_date, "");
        assert_eq!(meta.journal_name, "J");
    }

    #[test]
    fn test_parse_summary_without_docsum() {
        let xml = r#"<eSummaryResult><ERROR>Invalid uid</ERROR></eSummaryResult>"#;
        assert!(matches!(
            PmcSource::parse_summary_response(xml, "PMC9"),
            Err(SourceError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_search_ids_builds_term() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/esearch.fcgi")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("db".into(), "pmc".into()),
                Matcher::UrlEncoded(
                    "term".into(),
                    "microbiome [Title/Abstract] AND open access[filter]".into(),
                ),
                Matcher::UrlEncoded("retmax".into(), "20".into()),
                Matcher::UrlEncoded("retmode".into(), "xml".into()),
            ]))
            .with_status(200)
            .with_body("<eSearchResult><IdList><Id>1</Id><Id>2</Id></IdList></eSearchResult>")
            .create_async()
            .await;

        let source = source_for(&server);
        let ids = source.search_ids(&SearchQuery::new("microbiome")).await.unwrap();

        assert_eq!(ids, vec!["PMC1", "PMC2"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_metadata_retries_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        let limited = server
            .mock("GET", "/esummary.fcgi")
            .match_query(Matcher::UrlEncoded("id".into(), "11111".into()))
            .with_status(429)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/esummary.fcgi")
            .match_query(Matcher::UrlEncoded("id".into(), "11111".into()))
            .with_status(200)
            .with_body(SUMMARY)
            .expect(1)
            .create_async()
            .await;

        let source = source_for(&server);
        let meta = source.fetch_metadata("PMC11111").await.unwrap();

        assert_eq!(meta.title, "Diet & the gut microbiome");
        limited.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_metadata_gives_up_after_three_rate_limits() {
        let mut server = mockito::Server::new_async().await;
        let limited = server
            .mock("GET", "/esummary.fcgi")
            .match_query(Matcher::Any)
            .with_status(429)
            .expect(3)
            .create_async()
            .await;

        let source = source_for(&server);
        let result = source.fetch_metadata("PMC7").await;

        assert!(matches!(result, Err(SourceError::RateLimit(_))));
        limited.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_metadata_not_found_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let missing = server
            .mock("GET", "/esummary.fcgi")
            .match_query(Matcher::Any)
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let source = source_for(&server);
        let result = source.fetch_metadata("PMC404").await;

        assert!(matches!(result, Err(SourceError::NotFound(_))));
        missing.assert_async().await;
    }

    #[tokio::test]
    async fn test_full_text_availability_and_fetch() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"<collection><document><passage>
            <infon key="section_type">ABSTRACT</infon><text>Short abstract.</text>
        </passage></document></collection>"#;
        let _available = server
            .mock("GET", "/pmcoa.cgi/BioC_xml/PMC1/unicode")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/pmcoa.cgi/BioC_xml/PMC2/unicode")
            .with_status(404)
            .create_async()
            .await;

        let source = source_for(&server);
        assert!(source.has_full_text("PMC1").await.unwrap());
        assert!(!source.has_full_text("PMC2").await.unwrap());

        let doc = source.fetch_full_text("PMC1").await.unwrap();
        assert_eq!(doc.sections.get(Section::Abstract), "Short abstract.");

        assert!(source.fetch_full_text("PMC2").await.is_err());
    }

    #[tokio::test]
    async fn test_full_text_retries_rate_limits_up_to_five_attempts() {
        let mut server = mockito::Server::new_async().await;
        let limited = server
            .mock("GET", "/pmcoa.cgi/BioC_xml/PMC9/unicode")
            .with_status(429)
            .expect(4)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/pmcoa.cgi/BioC_xml/PMC9/unicode")
            .with_status(200)
            .with_body(
                r#"<collection><document><passage>
                <infon key="section_type">METHODS</infon><text>Shotgun sequencing.</text>
                </passage></document></collection>"#,
            )
            .expect(1)
            .create_async()
            .await;

        let source = source_for(&server);
        let doc = source.fetch_full_text("PMC9").await.unwrap();

        assert_eq!(doc.sections.get(Section::Methods), "Shotgun sequencing.");
        limited.assert_async().await;
        ok.assert_async().await;
    }

    #[test]
    fn test_article_url() {
        let server_url = "https://www.ncbi.nlm.nih.gov/pmc/articles";
        let source = PmcSource::with_client(
            HttpClient::new().unwrap(),
            NcbiConfig {
                article_base_url: format!("{}/", server_url),
                ..NcbiConfig::default()
            },
            RetrySettings::default(),
        );
        assert_eq!(
            source.article_url("123"),
            "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC123/"
        );
    }
}
