use std::error::Error as _;
use std::time::Duration;

use anyhow::Context as _;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use url::Url;

use crate::error::ErrorKind;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

const BOT_USER_AGENT: &str = "RoastMy.Site Bot/1.0";
const HTML_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.5";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("target page not found (404 Not Found)")]
    NotFound,

    #[error("target denied access ({0})")]
    Forbidden(StatusCode),

    #[error("target server error ({0})")]
    UpstreamError(StatusCode),

    #[error("Failed to fetch URL: {0}")]
    UnexpectedStatus(StatusCode),

    #[error("unsupported content type: {}", .0.as_deref().unwrap_or("<missing>"))]
    UnsupportedContentType(Option<String>),

    #[error("target returned an empty body")]
    EmptyBody,

    #[error("read target body: {0}")]
    UnreadableBody(String),

    #[error("no response within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("connect timed out: {0}")]
    ConnectTimeout(String),

    #[error("dns lookup failed: {0}")]
    DnsFailure(String),

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::UpstreamError(_) => ErrorKind::UpstreamError,
            Self::UnexpectedStatus(_) => ErrorKind::UnknownError,
            Self::UnsupportedContentType(_) => ErrorKind::UnsupportedContentType,
            Self::EmptyBody | Self::UnreadableBody(_) => ErrorKind::EmptyBody,
            Self::Timeout(_) | Self::ConnectTimeout(_) => ErrorKind::Timeout,
            Self::DnsFailure(_) => ErrorKind::DnsFailure,
            Self::ConnectionRefused(_) => ErrorKind::ConnectionRefused,
            Self::Transport(_) => ErrorKind::TransportError,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: Url,
    pub status: StatusCode,
    pub content_type: String,
    pub body: String,
    pub truncated: bool,
}

/// Single-attempt, deadline-bounded HTML retrieval.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_body_bytes: usize,
}

impl PageFetcher {
    pub fn new(timeout: Duration, max_body_bytes: usize) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build fetch http client")?;

        Ok(Self {
            client,
            timeout,
            max_body_bytes: max_body_bytes.max(1),
        })
    }

    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        tracing::debug!(%url, timeout_ms = self.timeout.as_millis() as u64, "fetch target page");

        // Dropping the exchange future on expiry cancels the in-flight request.
        match tokio::time::timeout(self.timeout, self.exchange(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        }
    }

    async fn exchange(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, BOT_USER_AGENT)
            .header(ACCEPT, HTML_ACCEPT)
            .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGE_VALUE)
            .send()
            .await
            .map_err(|err| classify_transport_error(&err, self.timeout))?;

        let status = response.status();
        check_status(status)?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let content_type = match content_type {
            Some(content_type) if is_html_content_type(&content_type) => content_type,
            other => return Err(FetchError::UnsupportedContentType(other)),
        };

        let final_url = response.url().clone();
        let (body, truncated) =
            read_text_limited(response, self.max_body_bytes, self.timeout).await?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }
        if truncated {
            tracing::debug!(%final_url, limit = self.max_body_bytes, "target body truncated");
        }

        Ok(FetchedPage {
            final_url,
            status,
            content_type,
            body,
            truncated,
        })
    }
}

fn check_status(status: StatusCode) -> Result<(), FetchError> {
    if status.is_success() {
        return Ok(());
    }

    Err(match status {
        StatusCode::NOT_FOUND => FetchError::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Forbidden(status),
        status if status.is_server_error() => FetchError::UpstreamError(status),
        status => FetchError::UnexpectedStatus(status),
    })
}

fn is_html_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("text/html") || content_type.contains("application/xhtml+xml")
}

async fn read_text_limited(
    mut resp: reqwest::Response,
    limit: usize,
    timeout: Duration,
) -> Result<(String, bool), FetchError> {
    let mut out: Vec<u8> = Vec::new();
    let mut truncated = false;

    loop {
        let chunk = match resp.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(err) if err.is_timeout() => return Err(FetchError::Timeout(timeout)),
            Err(err) => return Err(FetchError::UnreadableBody(error_chain(&err))),
        };
        if out.len() + chunk.len() > limit {
            let remaining = limit.saturating_sub(out.len());
            out.extend_from_slice(&chunk[..remaining]);
            out.truncate(utf8_boundary(&out));
            truncated = true;
            break;
        }
        out.extend_from_slice(&chunk);
    }

    Ok((String::from_utf8_lossy(&out).into_owned(), truncated))
}

/// Length of the longest prefix of `bytes` that does not end inside a
/// multi-byte UTF-8 sequence.
fn utf8_boundary(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(4) {
        let byte = bytes[len - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { len - back } else { len };
    }
    len
}

fn classify_transport_error(err: &reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        return FetchError::Timeout(timeout);
    }
    classify_error_chain(err)
}

fn classify_error_chain(err: &(dyn std::error::Error + 'static)) -> FetchError {
    let detail = error_chain(err);
    let mut source = Some(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionRefused => {
                    return FetchError::ConnectionRefused(detail);
                }
                std::io::ErrorKind::TimedOut => return FetchError::ConnectTimeout(detail),
                _ => {}
            }
        }
        source = cause.source();
    }

    classify_transport_detail(detail)
}

/// Resolver failures surface only as text in the connector's error chain.
fn classify_transport_detail(detail: String) -> FetchError {
    let lower = detail.to_ascii_lowercase();
    if lower.contains("dns error") || lower.contains("failed to lookup address") {
        FetchError::DnsFailure(detail)
    } else if lower.contains("connection refused") {
        FetchError::ConnectionRefused(detail)
    } else {
        FetchError::Transport(detail)
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}
