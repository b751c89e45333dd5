use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use axum::http::StatusCode;
use serde::Serialize;
use tracing::Instrument as _;

use crate::cli::AnalyzeArgs;
use crate::config::Settings;
use crate::error::{AnalyzeError, ErrorDetail};
use crate::extract::{self, DEFAULT_MAX_CONTENT_CHARS};
use crate::fetch::PageFetcher;
use crate::openai::{CompletionClient, CompletionError, OpenAiChatClient};
use crate::prompt;

const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

/// Pipeline position of one `analyze` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    Fetching,
    Extracting,
    Prompting,
    Completing,
    Done,
}

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub max_content_chars: usize,
    pub completion_timeout: Duration,
    pub error_detail: ErrorDetail,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
            error_detail: ErrorDetail::default(),
        }
    }
}

/// Boundary result: either the roast or a caller-facing error with its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RoastResult {
    Analysis {
        analysis: String,
    },
    Failure {
        error: String,
        #[serde(skip)]
        http_status: StatusCode,
    },
}

impl RoastResult {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Analysis { .. } => StatusCode::OK,
            Self::Failure { http_status, .. } => *http_status,
        }
    }
}

pub struct Analyzer {
    fetcher: PageFetcher,
    completion: Arc<dyn CompletionClient>,
    options: AnalyzeOptions,
}

impl Analyzer {
    pub fn new(
        fetcher: PageFetcher,
        completion: Arc<dyn CompletionClient>,
        options: AnalyzeOptions,
    ) -> Self {
        Self {
            fetcher,
            completion,
            options,
        }
    }

    /// Runs the whole pipeline and folds any failure into a classified
    /// [`RoastResult::Failure`]. Never panics on bad input or a bad target.
    pub async fn analyze(&self, raw_url: &str) -> RoastResult {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("analyze", %request_id, url = %raw_url.trim());

        async {
            match self.try_analyze(raw_url).await {
                Ok(analysis) => {
                    tracing::info!(chars = analysis.chars().count(), "analysis complete");
                    RoastResult::Analysis { analysis }
                }
                Err(err) => {
                    let kind = err.kind();
                    let status = err.status();
                    tracing::warn!(
                        ?kind,
                        status = status.as_u16(),
                        stage = ?err.stage(),
                        error = %err,
                        "analysis failed"
                    );
                    RoastResult::Failure {
                        error: err.user_message(self.options.error_detail),
                        http_status: status,
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    pub async fn try_analyze(&self, raw_url: &str) -> Result<String, AnalyzeError> {
        tracing::debug!(stage = ?Stage::Validating, "stage");
        let url = crate::validate::validate(raw_url)?;

        tracing::debug!(stage = ?Stage::Fetching, "stage");
        let page = self.fetcher.fetch(&url).await?;
        tracing::debug!(
            status = page.status.as_u16(),
            content_type = %page.content_type,
            bytes = page.body.len(),
            truncated = page.truncated,
            final_url = %page.final_url,
            "fetched page"
        );

        tracing::debug!(stage = ?Stage::Extracting, "stage");
        let max_chars = self.options.max_content_chars;
        let extracted = tokio::task::spawn_blocking(move || extract::extract(&page.body, max_chars))
            .await
            .map_err(|err| AnalyzeError::Unknown {
                stage: Stage::Extracting,
                message: format!("extraction task failed: {err}"),
            })?;
        if !extracted.has_readable_content() {
            return Err(AnalyzeError::NoReadableContent);
        }
        tracing::debug!(
            title = %extracted.title,
            headings = extracted.headings.len(),
            chars = extracted.content.chars().count(),
            "extracted content"
        );

        tracing::debug!(stage = ?Stage::Prompting, "stage");
        let payload = prompt::build(raw_url.trim(), &extracted);

        tracing::debug!(stage = ?Stage::Completing, "stage");
        let deadline = self.options.completion_timeout;
        let analysis = tokio::time::timeout(deadline, self.completion.complete(&payload))
            .await
            .map_err(|_| CompletionError::Timeout(deadline))??;

        tracing::debug!(stage = ?Stage::Done, "stage");
        Ok(analysis)
    }
}

pub async fn run(args: AnalyzeArgs) -> anyhow::Result<()> {
    let settings = Settings::from_env().context("load settings")?;
    let completion = OpenAiChatClient::new(
        &settings.openai_base_url,
        settings.require_api_key()?,
        settings.openai_model.clone(),
    )?;
    let fetcher = PageFetcher::new(settings.fetch_timeout, settings.max_body_bytes)?;
    let analyzer = Analyzer::new(fetcher, Arc::new(completion), settings.analyze_options());

    match analyzer.analyze(&args.url).await {
        RoastResult::Analysis { analysis } => {
            println!("{analysis}");
            Ok(())
        }
        RoastResult::Failure { error, http_status } => {
            anyhow::bail!("{error} (HTTP {})", http_status.as_u16())
        }
    }
}
