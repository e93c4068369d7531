use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{ParseError, Url};

/// The decomposed form of a requested URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationTarget {
    /// Host, including an explicit port when the URL carries one
    pub host: String,

    /// Path component, never empty
    pub path: String,

    /// Raw query string without the leading `?`
    pub query: String,
}

/// Raised when the input is not a URL with an authority
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid URL format: {0:?}")]
pub struct InvalidUrl(pub String);

impl NavigationTarget {
    /// Interprets a raw URL string as a navigation target
    ///
    /// `url` validates the input, but host, path and query are taken from the
    /// raw text so case, IDN hosts and percent-encoding reach the prompt unchanged.
    pub fn interpret(raw: &str) -> Result<Self, InvalidUrl> {
        let trimmed = raw.trim();
        let url = parse_lenient(trimmed).ok_or_else(|| InvalidUrl(raw.to_string()))?;

        match url.host_str() {
            Some(host) if !host.is_empty() => {}
            _ => return Err(InvalidUrl(raw.to_string())),
        }

        let (host, path, query) = match raw_parts(trimmed) {
            Some((host, path, query)) if !host.is_empty() => {
                (host.to_string(), path.to_string(), query.to_string())
            }
            _ => normalized_parts(&url),
        };

        let path = if path.is_empty() { "/".to_string() } else { path };

        Ok(Self { host, path, query })
    }
}

/// Splits host (with port), path and query out of `raw` without normalizing them
fn raw_parts(raw: &str) -> Option<(&str, &str, &str)> {
    let after_scheme = match raw.split_once(':') {
        Some((scheme, rest))
            if !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
        {
            rest
        }
        _ => raw,
    };

    let rest = after_scheme.strip_prefix("//")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, rest) = rest.split_at(end);
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);

    let rest = rest.split_once('#').map_or(rest, |(before, _)| before);
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    Some((host, path, query))
}

/// Host, path and query as `url` normalized them
fn normalized_parts(url: &Url) -> (String, String, String) {
    let host = url.host_str().unwrap_or_default();
    let host = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    (
        host,
        url.path().to_string(),
        url.query().unwrap_or_default().to_string(),
    )
}

/// Parses a URL, accepting scheme-relative input (`//host/path`) as http
pub(crate) fn parse_lenient(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(ParseError::RelativeUrlWithoutBase) if raw.starts_with("//") => {
            Url::parse(&format!("http:{}", raw)).ok()
        }
        Err(e) => {
            ::log::debug!("Rejecting URL {:?}: {}", raw, e);
            None
        }
    }
}
