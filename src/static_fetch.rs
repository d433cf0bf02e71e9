use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::ScraperSettings;
use crate::error::FetchError;
use crate::fetch::{FetchOptions, Page, PageFetcher};
use crate::models::Strategy;
use crate::utils::get_random_user_agent;

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Plain HTTP GET, no script execution
pub struct StaticFetcher {
    client: reqwest::Client,
    user_agent: Option<String>,
    accept_language: String,
}

impl StaticFetcher {
    pub fn new(settings: &ScraperSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .gzip(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            user_agent: settings.user_agent.clone(),
            accept_language: settings.accept_language.clone(),
        })
    }

    fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or_else(|| get_random_user_agent())
    }
}

fn describe(error: &reqwest::Error) -> String {
    if error.is_connect() {
        format!("connection failed: {}", error)
    } else if error.is_redirect() {
        format!("too many redirects: {}", error)
    } else {
        error.to_string()
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    fn strategy(&self) -> Strategy {
        Strategy::Static
    }

    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<Page, FetchError> {
        if options.wait_for_selector.is_some() {
            log::debug!("Static fetch ignores wait_for_selector for {}", url);
        }

        let response = self
            .client
            .get(url)
            .timeout(options.timeout)
            .header("User-Agent", self.user_agent())
            .header("Accept", ACCEPT)
            .header("Accept-Language", self.accept_language.as_str())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::timeout(url, format!("no response within {}s", options.timeout.as_secs()))
                } else {
                    FetchError::network(url, describe(&e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url, "timed out reading the response body")
            } else {
                FetchError::network(url, format!("failed to read response body: {}", e))
            }
        })?;

        log::debug!("Fetched {} ({} bytes)", final_url, body.len());
        Ok(Page::new(final_url, body))
    }
}
