//! Model Provider Abstraction
//!
//! Ports for the two remote services the core talks to (a file store holding context
//! documents and a generative model) plus the Gemini REST client that implements both.
//! Components receive the client by injection; nothing here is a process-wide singleton.

use crate::config::GeminiConfig;
use crate::document::RemoteFile;
use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// One part of a generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    /// Reference to an uploaded document
    FileData { mime_type: String, file_uri: String },
    /// Literal text, e.g. the question
    Text(String),
}

impl ContentPart {
    pub fn file(mime_type: impl Into<String>, file_uri: impl Into<String>) -> Self {
        ContentPart::FileData {
            mime_type: mime_type.into(),
            file_uri: file_uri.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text(text.into())
    }
}

/// Remote store for context documents
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Submit a local file; returns the store's record for the new handle
    async fn upload(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, ApiError>;

    /// Fetch the store's current view of a handle
    async fn get(&self, handle: &str) -> Result<RemoteFile, ApiError>;

    /// All files currently held by the store
    async fn list(&self) -> Result<Vec<RemoteFile>, ApiError>;

    async fn delete(&self, handle: &str) -> Result<(), ApiError>;
}

/// Text generation against a named model
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Generate text from ordered content parts. Parts are sent in the given order.
    async fn generate(&self, model: &str, parts: &[ContentPart]) -> Result<String, ApiError>;
}

// Gemini wire structures
#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<WireContent<'a>>,
}

#[derive(Serialize)]
struct WireContent<'a> {
    role: &'static str,
    parts: Vec<WirePart<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum WirePart<'a> {
    FileData {
        #[serde(rename = "mimeType")]
        mime_type: &'a str,
        #[serde(rename = "fileUri")]
        file_uri: &'a str,
    },
    Text(&'a str),
}

impl<'a> From<&'a ContentPart> for WirePart<'a> {
    fn from(part: &'a ContentPart) -> Self {
        match part {
            ContentPart::FileData {
                mime_type,
                file_uri,
            } => WirePart::FileData {
                mime_type,
                file_uri,
            },
            ContentPart::Text(text) => WirePart::Text(text),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Deserialize)]
struct TextPart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct FileEnvelope {
    file: RemoteFile,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListFilesResponse {
    #[serde(default)]
    files: Vec<RemoteFile>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn build_request_body(parts: &[ContentPart]) -> GenerateContentRequest<'_> {
    GenerateContentRequest {
        contents: vec![WireContent {
            role: "user",
            parts: parts.iter().map(WirePart::from).collect(),
        }],
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String, ApiError> {
    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no reason given".to_string());
        ApiError::ProviderError(format!("No candidates in response ({})", reason))
    })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    Ok(text)
}

/// Turn an error body into a transport message. The canonical status name is kept in front
/// of the text so message-based classification still works when only the text survives.
fn error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let message = envelope.error.message.unwrap_or_default();
            match envelope.error.status {
                Some(name) => format!("{}: {}", name, message),
                None => message,
            }
        }
        Err(_) if body.trim().is_empty() => format!("Request failed with status {}", status),
        Err(_) => body.trim().to_string(),
    }
}

// Helper function to map transport failures to ApiError
fn map_http_error(error: reqwest::Error) -> ApiError {
    let status = error.status().map(|s| s.as_u16());
    if error.is_timeout() {
        ApiError::transport(status, format!("Request timeout: {}", error))
    } else if error.is_connect() {
        ApiError::transport(status, format!("Connection error: {}", error))
    } else {
        ApiError::transport(status, format!("HTTP error: {}", error))
    }
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::transport(
        Some(status.as_u16()),
        error_message(status.as_u16(), &body),
    ))
}

async fn parse_json<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, ApiError> {
    response
        .json()
        .await
        .map_err(|e| ApiError::ProviderError(format!("Failed to parse response: {}", e)))
}

/// Gemini API client (Files API + generateContent)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    api_version: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, ApiError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ApiError::ConfigError(
                    "GEMINI_API_KEY is not set in environment or configuration".to_string(),
                )
            })?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::ProviderError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.api_version, path)
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/{}/files", self.base_url, self.api_version)
    }

    /// Names of the models the API exposes
    pub async fn list_models(&self) -> Result<Vec<String>, ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct ModelsResponse {
            #[serde(default)]
            models: Vec<ModelInfo>,
            next_page_token: Option<String>,
        }
        #[derive(Deserialize)]
        struct ModelInfo {
            name: String,
        }

        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .get(self.api_url("models"))
                .header("x-goog-api-key", &self.api_key)
                .query(&[("pageSize", "1000")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let response = ensure_success(request.send().await.map_err(map_http_error)?).await?;
            let page: ModelsResponse = parse_json(response).await?;
            names.extend(page.models.into_iter().map(|m| m.name));
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(names)
    }
}

#[async_trait]
impl FileStore for GeminiClient {
    async fn upload(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, ApiError> {
        let bytes = tokio::fs::read(path).await?;

        // Resumable protocol: start a session, then upload and finalize in one request
        let start = self
            .client
            .post(self.upload_url())
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(map_http_error)?;
        let start = ensure_success(start).await?;

        let session_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                ApiError::ProviderError("Upload session response had no upload URL".to_string())
            })?;

        debug!(path = %path.display(), size = bytes.len(), "Uploading file bytes");
        let finish = self
            .client
            .post(&session_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(map_http_error)?;
        let envelope: FileEnvelope = parse_json(ensure_success(finish).await?).await?;
        Ok(envelope.file)
    }

    async fn get(&self, handle: &str) -> Result<RemoteFile, ApiError> {
        let response = self
            .client
            .get(self.api_url(handle))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(map_http_error)?;
        parse_json(ensure_success(response).await?).await
    }

    async fn list(&self) -> Result<Vec<RemoteFile>, ApiError> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .get(self.api_url("files"))
                .header("x-goog-api-key", &self.api_key)
                .query(&[("pageSize", "100")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let response = ensure_success(request.send().await.map_err(map_http_error)?).await?;
            let page: ListFilesResponse = parse_json(response).await?;
            files.extend(page.files);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(files)
    }

    async fn delete(&self, handle: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.api_url(handle))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(map_http_error)?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, model: &str, parts: &[ContentPart]) -> Result<String, ApiError> {
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };
        let url = self.api_url(&format!("{}:generateContent", model_path));

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request_body(parts))
            .send()
            .await
            .map_err(map_http_error)?;

        let body: GenerateContentResponse = parse_json(ensure_success(response).await?).await?;
        extract_text(body)
    }
}
