//! Configuration System
//!
//! Layered configuration built with the `config` crate. Sources, lowest precedence first:
//! built-in defaults, the user config file (`$XDG_CONFIG_HOME/rulekeeper/config.toml`),
//! `config/config.toml` and `config/{RULEKEEPER_ENV}.toml` under the workspace root, an
//! explicit file, and finally `RULEKEEPER__SECTION__KEY` environment variables.
//! `GEMINI_API_KEY` and `GEMINI_MODEL` are honoured on top of everything else.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulekeeperConfig {
    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub documents: DocumentsConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,

    /// Vertex AI Search data store; search commands are unavailable without it
    #[serde(default)]
    pub search: Option<SearchConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Gemini API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// API version pin sent with every call
    pub api_version: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_version: "v1beta".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 300,
        }
    }
}

/// Model identifiers per tier and the markers that identify model families
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub primary: String,
    pub standard: String,
    pub economy: String,
    /// Substring marking the high-capability family
    pub high_capability_marker: String,
    /// Substring marking the cheapest family
    pub economy_marker: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            primary: "gemini-2.5-flash".to_string(),
            standard: "gemini-2.5-flash".to_string(),
            economy: "gemini-2.5-flash-lite".to_string(),
            high_capability_marker: "pro".to_string(),
            economy_marker: "lite".to_string(),
        }
    }
}

/// Local reference documents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    pub dir: PathBuf,
    /// File extension (without dot) picked up by directory scans, matched case-insensitively
    pub extension: String,
    pub mime_type: String,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("documents"),
            extension: "pdf".to_string(),
            mime_type: "application/pdf".to_string(),
        }
    }
}

/// Upload polling bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            max_poll_attempts: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    pub manifest_path: PathBuf,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from("knowledge_base.json"),
        }
    }
}

/// Vertex AI Search (Discovery Engine) data store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub project_id: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_collection_id")]
    pub collection_id: String,
    pub data_store_id: String,
    #[serde(default = "default_serving_config_id")]
    pub serving_config_id: String,
    /// OAuth bearer token minted by the host
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_location() -> String {
    "global".to_string()
}

fn default_collection_id() -> String {
    "default_collection".to_string()
}

fn default_serving_config_id() -> String {
    "default_config".to_string()
}

fn default_search_endpoint() -> String {
    "https://discoveryengine.googleapis.com/v1beta".to_string()
}

fn default_page_size() -> u32 {
    5
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Models(String),
    Documents(String),
    Upload(String),
    Search(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Models(msg) => write!(f, "models: {}", msg),
            ValidationError::Documents(msg) => write!(f, "documents: {}", msg),
            ValidationError::Upload(msg) => write!(f, "upload: {}", msg),
            ValidationError::Search(msg) => write!(f, "search: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl RulekeeperConfig {
    /// Validate the entire configuration, reporting every problem found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (tier, model) in [
            ("primary", &self.models.primary),
            ("standard", &self.models.standard),
            ("economy", &self.models.economy),
        ] {
            if model.trim().is_empty() {
                errors.push(ValidationError::Models(format!("{} model cannot be empty", tier)));
            }
        }

        if self.documents.extension.trim_start_matches('.').is_empty() {
            errors.push(ValidationError::Documents(
                "extension cannot be empty".to_string(),
            ));
        }
        if self.documents.mime_type.is_empty() {
            errors.push(ValidationError::Documents(
                "mime_type cannot be empty".to_string(),
            ));
        }

        if self.upload.poll_interval_ms == 0 {
            errors.push(ValidationError::Upload(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.upload.max_poll_attempts == 0 {
            errors.push(ValidationError::Upload(
                "max_poll_attempts must be greater than zero".to_string(),
            ));
        }

        if let Some(search) = &self.search {
            if search.project_id.is_empty() {
                errors.push(ValidationError::Search("project_id cannot be empty".to_string()));
            }
            if search.data_store_id.is_empty() {
                errors.push(ValidationError::Search(
                    "data_store_id cannot be empty".to_string(),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Apply the environment variables the deployment historically used.
    /// `lookup` abstracts the environment so the precedence can be tested.
    pub fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY").filter(|v| !v.is_empty()) {
            self.gemini.api_key = Some(key);
        }
        if let Some(model) = lookup("GEMINI_MODEL").filter(|v| !v.is_empty()) {
            self.models.primary = model;
        }
    }
}

/// Path to the user-level config file
pub fn global_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "rulekeeper").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn add_file_if_exists(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> ConfigBuilder<DefaultState> {
    if path.exists() {
        debug!(config_path = %path.display(), "Adding configuration file");
        builder.add_source(File::from(path.to_path_buf()).required(false))
    } else {
        builder
    }
}

/// Loads [`RulekeeperConfig`] from its layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace root
    pub fn load(workspace_root: &Path) -> Result<RulekeeperConfig, ApiError> {
        Self::build(workspace_root, None)
    }

    /// Load configuration with an explicit file taking precedence over workspace files
    pub fn load_from_file(workspace_root: &Path, path: &Path) -> Result<RulekeeperConfig, ApiError> {
        if !path.exists() {
            return Err(ApiError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Self::build(workspace_root, Some(path))
    }

    fn build(workspace_root: &Path, explicit: Option<&Path>) -> Result<RulekeeperConfig, ApiError> {
        let mut builder = Config::builder()
            .set_default("documents.dir", "documents")?
            .set_default("knowledge_base.manifest_path", "knowledge_base.json")?;

        if let Some(global) = global_config_path() {
            builder = add_file_if_exists(builder, &global);
        }

        let config_dir = workspace_root.join("config");
        let env_name =
            std::env::var("RULEKEEPER_ENV").unwrap_or_else(|_| "development".to_string());
        builder = add_file_if_exists(builder, &config_dir.join("config.toml"));
        builder = add_file_if_exists(builder, &config_dir.join(format!("{}.toml", env_name)));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("RULEKEEPER")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: RulekeeperConfig = builder.build()?.try_deserialize()?;
        config.apply_legacy_env(|name| std::env::var(name).ok());

        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;

        Ok(config)
    }
}
