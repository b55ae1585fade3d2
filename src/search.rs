//! Search-result formatting for the Vertex AI Search backend.
//!
//! The backend's payload comes in more than one shape: the response may be a full object
//! (`results` plus optional `summary`) or a bare array of results, and a result's derived
//! fields may be a plain map or a protobuf `Struct` (`{"fields": {"k": {"stringValue": ..}}}`).
//! Both variations are captured as serde sum types and normalized once into a
//! [`SearchAnswer`]; rendering works only on the normalized form and never fails.

use crate::config::SearchConfig;
use crate::error::ApiError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error};

pub const NOTHING_FOUND: &str =
    "I couldn't find any specific information about that in the rules.";
pub const RESULTS_ONLY_PREAMBLE: &str = "I found some relevant documents, but I can't generate a specific summary right now. You might find the answer in these files:";
pub const SEARCH_APOLOGY: &str =
    "Sorry, I encountered an error while searching the knowledge base.";
const SOURCES_SEPARATOR: &str = "\n\n*Sources:*\n";
const BUCKET_SCHEME: &str = "gs://";
const BUCKET_WEB_PREFIX: &str = "https://storage.cloud.google.com/";

/// Search response as received
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawSearchResponse {
    ResultsOnly(Vec<RawSearchResult>),
    Full(RawSearchBody),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSearchBody {
    pub results: Option<Vec<RawSearchResult>>,
    pub summary: Option<RawSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSummary {
    pub summary_text: Option<String>,
    pub citations: Option<Vec<RawCitation>>,
    pub summary_with_metadata: Option<RawSummaryWithMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSummaryWithMetadata {
    pub citation_metadata: Option<RawCitationMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCitationMetadata {
    pub citations: Option<Vec<RawCitation>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCitation {
    pub sources: Option<Vec<RawSource>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSource {
    pub uri: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSearchResult {
    pub document: Option<RawDocument>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawDocument {
    pub name: Option<String>,
    pub derived_struct_data: Option<DerivedData>,
}

/// Derived document fields in either of their two encodings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DerivedData {
    ProtoStruct { fields: HashMap<String, Value> },
    Plain(HashMap<String, Value>),
}

impl DerivedData {
    /// String value of `key`, unwrapping a protobuf `stringValue` when present
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match self {
            DerivedData::ProtoStruct { fields } => fields.get(key)?,
            DerivedData::Plain(map) => map.get(key)?,
        };
        value
            .get("stringValue")
            .and_then(Value::as_str)
            .or_else(|| value.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Pointer from an inline `[n]` marker in the summary to its source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    /// 1-based position, matching the marker in the summary text
    pub index: usize,
    pub source_uri: String,
    pub source_title: Option<String>,
}

impl Citation {
    /// Explicit title, else the URI's last path segment, else a generic label
    pub fn display_title(&self) -> String {
        self.source_title
            .clone()
            .or_else(|| match self.source_uri.as_str() {
                "#" => None,
                uri => uri_tail(uri),
            })
            .unwrap_or_else(|| "Source".to_string())
    }
}

/// A ranked result rendered as a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultLink {
    pub link: String,
    pub title: String,
}

/// Normalized search response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchAnswer {
    pub summary: Option<String>,
    pub citations: Vec<Citation>,
    pub results: Vec<ResultLink>,
}

impl From<RawSearchResponse> for SearchAnswer {
    fn from(raw: RawSearchResponse) -> Self {
        let (results, summary) = match raw {
            RawSearchResponse::Full(body) => (body.results.unwrap_or_default(), body.summary),
            RawSearchResponse::ResultsOnly(results) => (results, None),
        };

        let (summary_text, raw_citations) = match summary {
            Some(summary) => {
                // An empty top-level list still defers to the metadata citations
                let citations = summary
                    .citations
                    .filter(|citations| !citations.is_empty())
                    .or_else(|| {
                        summary
                            .summary_with_metadata
                            .and_then(|m| m.citation_metadata)
                            .and_then(|m| m.citations)
                    })
                    .unwrap_or_default();
                (summary.summary_text, citations)
            }
            None => (None, Vec::new()),
        };

        let citations = raw_citations
            .into_iter()
            .enumerate()
            .filter_map(|(position, citation)| {
                let source = citation.sources?.into_iter().next()?;
                Some(Citation {
                    index: position + 1,
                    source_uri: source
                        .uri
                        .filter(|u| !u.is_empty())
                        .unwrap_or_else(|| "#".to_string()),
                    source_title: source.title.filter(|t| !t.is_empty()),
                })
            })
            .collect();

        SearchAnswer {
            summary: summary_text.filter(|text| !text.trim().is_empty()),
            citations,
            results: results.into_iter().map(result_link).collect(),
        }
    }
}

fn result_link(result: RawSearchResult) -> ResultLink {
    let document = result.document.unwrap_or_default();
    let derived = document.derived_struct_data.as_ref();

    let link = derived
        .and_then(|d| d.get("link").or_else(|| d.get("uri")))
        .map(browsable_uri)
        .unwrap_or_else(|| "#".to_string());

    // Titles starting with '0' are content hashes, not names
    let title = derived
        .and_then(|d| d.get("title"))
        .filter(|t| !t.starts_with('0'))
        .map(str::to_string)
        .or_else(|| if link == "#" { None } else { uri_tail(&link) })
        .or_else(|| document.name.as_deref().and_then(uri_tail))
        .unwrap_or_else(|| "Untitled Document".to_string());

    ResultLink { link, title }
}

/// Rewrite a bucket URI to its web-browsable equivalent; other URIs pass through
pub fn browsable_uri(uri: &str) -> String {
    match uri.strip_prefix(BUCKET_SCHEME) {
        Some(rest) => format!("{}{}", BUCKET_WEB_PREFIX, rest),
        None => uri.to_string(),
    }
}

/// Last path segment of a URI with any query string removed
fn uri_tail(uri: &str) -> Option<String> {
    let without_query = uri.split('?').next().unwrap_or(uri);
    without_query
        .rsplit('/')
        .next()
        .filter(|tail| !tail.is_empty())
        .map(str::to_string)
}

impl SearchAnswer {
    /// Render as chat text with `<link|title>` markup
    pub fn render(&self) -> String {
        if let Some(summary) = &self.summary {
            let references: Vec<String> = self
                .citations
                .iter()
                .map(|c| {
                    format!(
                        "[{}] <{}|{}>",
                        c.index,
                        browsable_uri(&c.source_uri),
                        c.display_title()
                    )
                })
                .collect();
            if references.is_empty() {
                return summary.clone();
            }
            return format!("{}{}{}", summary, SOURCES_SEPARATOR, references.join("\n"));
        }

        if self.results.is_empty() {
            return NOTHING_FOUND.to_string();
        }

        let lines: Vec<String> = self
            .results
            .iter()
            .map(|r| format!("- <{}|{}>", r.link, r.title))
            .collect();
        format!("{}\n{}", RESULTS_ONLY_PREAMBLE, lines.join("\n"))
    }
}

/// Format a raw search payload. Never fails; unreadable payloads yield an apology.
pub fn format_response(payload: &Value) -> String {
    match RawSearchResponse::deserialize(payload) {
        Ok(raw) => SearchAnswer::from(raw).render(),
        Err(err) => {
            error!(error = %err, "Unrecognized search response");
            SEARCH_APOLOGY.to_string()
        }
    }
}

/// Client for the Vertex AI Search `servingConfigs.search` method
pub struct VertexSearchClient {
    client: Client,
    serving_config_url: String,
    access_token: Option<String>,
    page_size: u32,
}

impl VertexSearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ApiError::ProviderError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            serving_config_url: serving_config_url(config),
            access_token: config.access_token.clone(),
            page_size: config.page_size,
        })
    }

    fn request_body(&self, query: &str) -> Value {
        json!({
            "query": query,
            "pageSize": self.page_size,
            "contentSearchSpec": {
                "summarySpec": {
                    "summaryResultCount": self.page_size,
                    "ignoreAdversarialQuery": true,
                    "includeCitations": true,
                    "modelSpec": { "version": "preview" }
                },
                "snippetSpec": { "returnSnippet": true }
            }
        })
    }

    /// Raw search payload
    pub async fn search_raw(&self, query: &str) -> Result<Value, ApiError> {
        let url = format!("{}:search", self.serving_config_url);
        let mut request = self.client.post(&url).json(&self.request_body(query));
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::transport(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::transport(Some(status.as_u16()), body));
        }
        response
            .json()
            .await
            .map_err(|e| ApiError::ProviderError(format!("Failed to parse search response: {}", e)))
    }

    /// Search and format the answer. Failures become the apology string.
    pub async fn search(&self, query: &str) -> String {
        match self.search_raw(query).await {
            Ok(payload) => {
                debug!(query, "Formatting search response");
                format_response(&payload)
            }
            Err(err) => {
                error!(error = %err, "Error querying Vertex AI Search");
                SEARCH_APOLOGY.to_string()
            }
        }
    }
}

fn serving_config_url(config: &SearchConfig) -> String {
    format!(
        "{}/projects/{}/locations/{}/collections/{}/dataStores/{}/servingConfigs/{}",
        config.endpoint.trim_end_matches('/'),
        config.project_id,
        config.location,
        config.collection_id,
        config.data_store_id,
        config.serving_config_id
    )
}
