use url::Url;

/// Why a candidate target URL was turned away before any network access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlRejection {
    #[error("url is required")]
    Missing,

    #[error("parse url: {0}")]
    Malformed(#[from] url::ParseError),

    #[error("url must include a host: {0}")]
    MissingHost(String),

    #[error("url scheme must be http/https: {0}")]
    UnsupportedScheme(String),
}

/// Syntactic check of a caller-supplied URL. Never touches the network.
pub fn validate(raw: &str) -> Result<Url, UrlRejection> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlRejection::Missing);
    }

    let url = Url::parse(raw)?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlRejection::UnsupportedScheme(url.scheme().to_owned()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlRejection::MissingHost(raw.to_owned()));
    }

    Ok(url)
}
