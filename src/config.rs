use std::str::FromStr;
use std::time::Duration;

use anyhow::Context as _;

use crate::analyze::AnalyzeOptions;
use crate::error::ErrorDetail;
use crate::extract::DEFAULT_MAX_CONTENT_CHARS;
use crate::fetch::{DEFAULT_MAX_BODY_BYTES, DEFAULT_TIMEOUT};
use crate::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};

const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;
const DEFAULT_RATE_LIMIT_MAX: usize = 100;

#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,

    pub fetch_timeout: Duration,
    pub completion_timeout: Duration,
    pub max_content_chars: usize,
    pub max_body_bytes: usize,

    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,

    pub error_detail: ErrorDetail,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let lookup = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let fetch_timeout_secs = parse_or(
            &lookup,
            "ROASTMYSITE_FETCH_TIMEOUT_SECS",
            DEFAULT_TIMEOUT.as_secs(),
        )?;
        let completion_timeout_secs = parse_or(
            &lookup,
            "ROASTMYSITE_COMPLETION_TIMEOUT_SECS",
            DEFAULT_COMPLETION_TIMEOUT_SECS,
        )?;
        let max_content_chars = parse_or(
            &lookup,
            "ROASTMYSITE_MAX_CONTENT_CHARS",
            DEFAULT_MAX_CONTENT_CHARS,
        )?;
        let max_body_bytes = parse_or(
            &lookup,
            "ROASTMYSITE_MAX_BODY_BYTES",
            DEFAULT_MAX_BODY_BYTES,
        )?;
        let rate_limit_window_secs = parse_or(
            &lookup,
            "ROASTMYSITE_RATE_LIMIT_WINDOW_SECS",
            DEFAULT_RATE_LIMIT_WINDOW_SECS,
        )?;
        let rate_limit_max = parse_or(
            &lookup,
            "ROASTMYSITE_RATE_LIMIT_MAX",
            DEFAULT_RATE_LIMIT_MAX,
        )?;

        for (name, value) in [
            ("ROASTMYSITE_FETCH_TIMEOUT_SECS", fetch_timeout_secs as usize),
            ("ROASTMYSITE_COMPLETION_TIMEOUT_SECS", completion_timeout_secs as usize),
            ("ROASTMYSITE_MAX_CONTENT_CHARS", max_content_chars),
            ("ROASTMYSITE_MAX_BODY_BYTES", max_body_bytes),
            ("ROASTMYSITE_RATE_LIMIT_WINDOW_SECS", rate_limit_window_secs as usize),
            ("ROASTMYSITE_RATE_LIMIT_MAX", rate_limit_max),
        ] {
            if value == 0 {
                anyhow::bail!("{name} must be > 0");
            }
        }

        let error_detail = match lookup("ROASTMYSITE_ENV") {
            Some(env) if env.eq_ignore_ascii_case("production") => ErrorDetail::Production,
            _ => ErrorDetail::Verbose,
        };

        Ok(Self {
            openai_api_key: lookup("OPENAI_API_KEY"),
            openai_model: lookup("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            openai_base_url: lookup("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            completion_timeout: Duration::from_secs(completion_timeout_secs),
            max_content_chars,
            max_body_bytes,
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
            rate_limit_max,
            error_detail,
        })
    }

    pub fn require_api_key(&self) -> anyhow::Result<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is not set"))
    }

    pub fn analyze_options(&self) -> AnalyzeOptions {
        AnalyzeOptions {
            max_content_chars: self.max_content_chars,
            completion_timeout: self.completion_timeout,
            error_detail: self.error_detail,
        }
    }
}

fn parse_or<T>(lookup: impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("parse {key}={raw:?}")),
        None => Ok(default),
    }
}
