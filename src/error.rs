use axum::http::StatusCode;
use serde::Serialize;

use crate::analyze::Stage;
use crate::fetch::FetchError;
use crate::openai::CompletionError;
use crate::validate::UrlRejection;

pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to analyze the webpage. Please try again later.";

const CONNECT_TIMEOUT_MESSAGE: &str =
    "The connection to the website timed out. Please try again later.";

/// Every failure `analyze` can report, one kind per user-visible outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidUrl,
    NotFound,
    Forbidden,
    UpstreamError,
    UnsupportedContentType,
    EmptyBody,
    NoReadableContent,
    Timeout,
    DnsFailure,
    ConnectionRefused,
    TransportError,
    CompletionFailure,
    UnknownError,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            Self::InvalidUrl
            | Self::UnsupportedContentType
            | Self::EmptyBody
            | Self::NoReadableContent => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::UpstreamError => StatusCode::BAD_GATEWAY,
            Self::Timeout
            | Self::DnsFailure
            | Self::ConnectionRefused
            | Self::TransportError
            | Self::CompletionFailure
            | Self::UnknownError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Fixed caller-facing text; `None` for kinds that report the raw cause
    /// outside production.
    fn fixed_message(self) -> Option<&'static str> {
        let message = match self {
            Self::InvalidUrl => "Invalid URL format",
            Self::NotFound => {
                "The webpage could not be found. Please check if the URL is correct."
            }
            Self::Forbidden => "Access to this webpage is restricted. Please try a different URL.",
            Self::UpstreamError => {
                "The target website is experiencing issues. Please try again later."
            }
            Self::UnsupportedContentType => {
                "The URL must point to a webpage (HTML content). Other file types are not supported."
            }
            Self::EmptyBody => {
                "Failed to read webpage content. The page might be too large or empty."
            }
            Self::NoReadableContent => {
                "No readable content found on this webpage. Try a different URL."
            }
            Self::Timeout => "The webpage took too long to respond. Please try a different URL.",
            Self::DnsFailure => {
                "Could not connect to the website. Please check if the URL is correct."
            }
            Self::ConnectionRefused => {
                "The website refused the connection. It might be down or blocking our requests."
            }
            Self::TransportError | Self::CompletionFailure | Self::UnknownError => return None,
        };
        Some(message)
    }
}

/// How much of an unclassified failure reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorDetail {
    /// Raw error text (development).
    #[default]
    Verbose,
    /// Generic text only.
    Production,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    InvalidUrl(#[from] UrlRejection),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("no readable content found on the page")]
    NoReadableContent,

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("{message}")]
    Unknown { stage: Stage, message: String },
}

impl AnalyzeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl(_) => ErrorKind::InvalidUrl,
            Self::Fetch(err) => err.kind(),
            Self::NoReadableContent => ErrorKind::NoReadableContent,
            Self::Completion(_) => ErrorKind::CompletionFailure,
            Self::Unknown { .. } => ErrorKind::UnknownError,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind().status()
    }

    /// The pipeline stage the failure originated in.
    pub fn stage(&self) -> Stage {
        match self {
            Self::InvalidUrl(_) => Stage::Validating,
            Self::Fetch(_) => Stage::Fetching,
            Self::NoReadableContent => Stage::Extracting,
            Self::Completion(_) => Stage::Completing,
            Self::Unknown { stage, .. } => *stage,
        }
    }

    pub fn user_message(&self, detail: ErrorDetail) -> String {
        match self {
            Self::InvalidUrl(UrlRejection::Missing) => return "URL is required".to_owned(),
            Self::Fetch(FetchError::ConnectTimeout(_)) => {
                return CONNECT_TIMEOUT_MESSAGE.to_owned();
            }
            _ => {}
        }
        if let Some(message) = self.kind().fixed_message() {
            return message.to_owned();
        }
        match detail {
            ErrorDetail::Production => GENERIC_FAILURE_MESSAGE.to_owned(),
            ErrorDetail::Verbose => self.to_string(),
        }
    }
}
