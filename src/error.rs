use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::SelectorType;

/// Which stage of a fetch went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Network,
    HttpStatus,
    Timeout,
    Render,
}

impl FetchErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Network => "network",
            FetchErrorKind::HttpStatus => "http_status",
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::Render => "render",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A page could not be retrieved by a fetch strategy
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} error fetching {url}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub url: String,
    pub message: String,
    /// Response status, set for `HttpStatus` errors
    pub status: Option<u16>,
}

impl FetchError {
    fn new(kind: FetchErrorKind, url: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.to_string(),
            message: message.into(),
            status: None,
        }
    }

    pub fn network(url: &str, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Network, url, message)
    }

    pub fn http_status(url: &str, status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::new(FetchErrorKind::HttpStatus, url, format!("server answered HTTP {}", status))
        }
    }

    pub fn timeout(url: &str, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Timeout, url, message)
    }

    pub fn render(url: &str, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Render, url, message)
    }
}

/// A CSS selector or XPath expression that could not be compiled.
///
/// Always field-level: the extractor records null (or the default) and moves on.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {selector_type} selector '{selector}': {message}")]
pub struct SelectorError {
    pub selector: String,
    pub selector_type: SelectorType,
    pub message: String,
}

impl SelectorError {
    pub fn new(selector: &str, selector_type: SelectorType, message: impl Into<String>) -> Self {
        Self {
            selector: selector.to_string(),
            selector_type,
            message: message.into(),
        }
    }
}

/// Fatal outcome of a scrape request
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScrapeError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl ScrapeError {
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Validation(_) => "validation",
            ScrapeError::Fetch(e) => e.kind.as_str(),
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

/// Wire form of a fatal error: `{kind, message}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("failed to read preset file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse preset file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("preset file {0} does not declare a category")]
    MissingCategory(PathBuf),

    #[error("preset file {path} is invalid: {message}")]
    Invalid { path: PathBuf, message: String },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("export buffer error: {0}")]
    Io(#[from] std::io::Error),

    #[error("export produced invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
