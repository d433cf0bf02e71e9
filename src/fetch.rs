use async_trait::async_trait;
use scraper::Html;
use std::time::Duration;

use crate::error::FetchError;
use crate::models::Strategy;

/// Per-fetch knobs taken from the request
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub wait_for_selector: Option<String>,
}

impl FetchOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            wait_for_selector: None,
        }
    }

    pub fn wait_for(mut self, selector: Option<&str>) -> Self {
        self.wait_for_selector = selector.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        self
    }
}

/// A retrieved page. `url` is the final URL after redirects.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub url: String,
    pub body: String,
}

impl Page {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }

    /// Parses the body. `Html` is not `Send`, so keep it out of `.await` points.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// A way of turning a URL into page content
#[async_trait]
pub trait PageFetcher: Send + Sync {
    fn strategy(&self) -> Strategy;

    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<Page, FetchError>;
}
