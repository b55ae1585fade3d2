//! CLI route: builds components from configuration and dispatches commands.

use crate::cli::parse::{Commands, FileCommands};
use crate::cli::presentation::{format_documents, format_sync_report};
use crate::config::{ConfigLoader, RulekeeperConfig};
use crate::error::ApiError;
use crate::executor::{QueryExecutor, QueryRun};
use crate::manifest::KnowledgeBase;
use crate::provider::GeminiClient;
use crate::refresher::ContextRefresher;
use crate::registry::DocumentRegistry;
use crate::search::VertexSearchClient;
use crate::sync::sync_documents;
use crate::tiers::{ModelLadder, ModelTiers};
use crate::uploader::{DocumentUploader, PollPolicy};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const GREETING: &str = "Hello! How can I help you today?";
pub const NOT_CONFIGURED: &str =
    "I'm not fully configured yet. No knowledge base files found.";

/// Configuration plus workspace root; components are built per command
pub struct RunContext {
    workspace_root: PathBuf,
    config: RulekeeperConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(&workspace_root, path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Ok(Self::from_config(workspace_root, config))
    }

    pub fn from_config(workspace_root: PathBuf, config: RulekeeperConfig) -> Self {
        Self {
            workspace_root,
            config,
        }
    }

    pub fn config(&self) -> &RulekeeperConfig {
        &self.config
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.resolve(&self.config.documents.dir)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.resolve(&self.config.knowledge_base.manifest_path)
    }

    fn gemini(&self) -> Result<Arc<GeminiClient>, ApiError> {
        Ok(Arc::new(GeminiClient::new(&self.config.gemini)?))
    }

    fn uploader(&self, client: Arc<GeminiClient>) -> DocumentUploader {
        DocumentUploader::new(client, PollPolicy::from(&self.config.upload))
    }

    fn refresher(&self, client: Arc<GeminiClient>) -> ContextRefresher {
        ContextRefresher::from_config(self.uploader(client), &self.config.documents)
    }

    /// Executor wired with refresh-on-expiry from the documents directory
    pub fn executor(&self, client: Arc<GeminiClient>) -> QueryExecutor {
        let ladder = ModelLadder::new(ModelTiers::from(&self.config.models));
        QueryExecutor::new(client.clone(), ladder, self.config.documents.mime_type.clone())
            .with_refresher(self.refresher(client), self.documents_dir())
    }

    /// Execute a command and return its printable output
    pub async fn execute(
        &self,
        command: &Commands,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        match command {
            Commands::Ask { question, model } => {
                self.handle_ask(&question.join(" "), model.as_deref(), cancel)
                    .await
            }
            Commands::Sync => {
                let client = self.gemini()?;
                let registry = DocumentRegistry::new(client.clone());
                let refresher = self.refresher(client);
                let report = sync_documents(
                    &registry,
                    &refresher,
                    &self.documents_dir(),
                    &self.manifest_path(),
                    cancel,
                )
                .await?;
                Ok(format_sync_report(&report))
            }
            Commands::Upload { path, display_name } => {
                let uploader = self.uploader(self.gemini()?);
                let document = uploader
                    .upload(
                        &self.resolve(path),
                        &self.config.documents.mime_type,
                        display_name.as_deref(),
                        cancel,
                    )
                    .await?;
                Ok(format!("File URI: {}", document.uri().unwrap_or_default()))
            }
            Commands::Files { command } => {
                let registry = DocumentRegistry::new(self.gemini()?);
                match command {
                    FileCommands::List => Ok(format_documents(&registry.list().await?)),
                    FileCommands::Delete { name } => {
                        registry.delete(name).await?;
                        Ok("File deleted successfully.".to_string())
                    }
                }
            }
            Commands::Models => Ok(self.gemini()?.list_models().await?.join("\n")),
            Commands::Search { query } => {
                let search = self.config.search.as_ref().ok_or_else(|| {
                    ApiError::ConfigError("no [search] section configured".to_string())
                })?;
                let client = VertexSearchClient::new(search)?;
                Ok(client.search(&query.join(" ")).await)
            }
        }
    }

    async fn handle_ask(
        &self,
        question: &str,
        model: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(GREETING.to_string());
        }

        let manifest_path = self.manifest_path();
        let mut knowledge_base = KnowledgeBase::load(&manifest_path)?;
        if knowledge_base.is_empty() {
            return Ok(NOT_CONFIGURED.to_string());
        }

        info!(context_files = knowledge_base.len(), "Answering question");
        let executor = self.executor(self.gemini()?);
        let run = executor
            .run(question, knowledge_base.uris(), model, cancel)
            .await;
        persist_refreshed_context(&run, &mut knowledge_base, &manifest_path);
        run.result
    }
}

/// Save the context set a refresh produced so later questions start from it
fn persist_refreshed_context(
    run: &QueryRun,
    knowledge_base: &mut KnowledgeBase,
    manifest_path: &Path,
) {
    let context = match run.context() {
        Some(context) if run.refreshed() && !context.is_empty() => context,
        _ => return,
    };
    if let Err(err) = knowledge_base.update(context, manifest_path) {
        warn!(error = %err, manifest = %manifest_path.display(), "Failed to save refreshed context");
    }
}
