#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use field_scraper::{FetchError, FetchOptions, Page, PageFetcher, Strategy};

/// Serves canned pages by URL and records every fetch
pub struct FakeFetcher {
    strategy: Strategy,
    pages: HashMap<String, Result<String, FetchError>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            pages: HashMap::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), Ok(body.into()));
        self
    }

    pub fn failing(mut self, url: &str, error: FetchError) -> Self {
        self.pages.insert(url.to_string(), Err(error));
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    fn strategy(&self) -> Strategy {
        self.strategy
    }

    async fn fetch(&self, url: &str, _options: &FetchOptions) -> Result<Page, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.pages.get(url) {
            Some(Ok(body)) => Ok(Page::new(url, body.clone())),
            Some(Err(e)) => Err(e.clone()),
            None => Err(FetchError::http_status(url, 404)),
        }
    }
}

/// A quotes listing with `count` quotes and an optional next link
pub fn quotes_page(page: u32, count: usize, next: Option<&str>) -> String {
    let mut html = String::from("<html><head><title>Quotes</title></head><body><div class=\"col-md-8\">");
    for i in 1..=count {
        html.push_str(&format!(
            r#"<div class="quote">
                <span class="text">"Quote {page}.{i}"</span>
                <span>by <small class="author">Author {i}</small></span>
                <div class="tags"><a class="tag" href="/tag/t{i}/">t{i}</a></div>
            </div>"#
        ));
    }
    if let Some(href) = next {
        html.push_str(&format!(r#"<nav><ul class="pager"><li class="next"><a href="{href}">Next</a></li></ul></nav>"#));
    }
    html.push_str("</div></body></html>");
    html
}

/// A server-rendered page with enough prose to read as static
pub fn article_page(count: usize) -> String {
    let prose = "Plain server rendered prose that fills the page with readable text. ".repeat(40);
    let quotes = quotes_page(1, count, None);
    quotes.replace(
        "<div class=\"col-md-8\">",
        &format!("<div class=\"col-md-8\"><article><p>{prose}</p></article>"),
    )
}

/// An empty single-page-app shell
pub const SPA_SHELL: &str = r#"<html><head><script id="__NEXT_DATA__" type="application/json">{}</script>
<script src="/main.js"></script></head><body><div id="root"></div></body></html>"#;
