use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::fetch::{FetchOptions, Page, PageFetcher};
use crate::models::Strategy;

/// Chromium launch and render options (`[browser]` in the config file)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub sandbox: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Scroll through the page once loaded so lazy content appears
    pub scroll: bool,
    /// Pause after scrolling before the DOM is read
    pub settle_ms: u64,
    pub user_agent: Option<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: false,
            window_width: 1920,
            window_height: 1080,
            scroll: true,
            settle_ms: 1000,
            user_agent: None,
        }
    }
}

/// Renders pages in headless Chromium; one browser per page fetch
pub struct DynamicFetcher {
    settings: BrowserSettings,
}

impl DynamicFetcher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl PageFetcher for DynamicFetcher {
    fn strategy(&self) -> Strategy {
        Strategy::Dynamic
    }

    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<Page, FetchError> {
        let settings = self.settings.clone();
        let target = url.to_string();
        let options = options.clone();

        // headless_chrome is synchronous
        tokio::task::spawn_blocking(move || render::render_page(&settings, &target, &options))
            .await
            .map_err(|e| FetchError::render(url, format!("render task failed: {}", e)))?
    }
}

#[cfg(feature = "headless")]
mod render {
    use headless_chrome::{Browser, LaunchOptions};
    use std::time::{Duration, Instant};

    use super::BrowserSettings;
    use crate::error::FetchError;
    use crate::fetch::{FetchOptions, Page};
    use crate::utils::get_random_user_agent;

    const SCROLL_SCRIPT: &str = r#"
        (async () => {
            const delay = ms => new Promise(resolve => setTimeout(resolve, ms));
            const height = document.body ? document.body.scrollHeight : 0;
            for (let y = 0; y < height; y += window.innerHeight) {
                window.scrollTo(0, y);
                await delay(200);
            }
            window.scrollTo(0, 0);
            return true;
        })()
    "#;

    /// headless_chrome waits fail with `util::Timeout`; CDP calls that outlive the
    /// tab's default timeout only say so in their message
    pub fn is_timeout(error: &anyhow::Error) -> bool {
        error.downcast_ref::<headless_chrome::util::Timeout>().is_some()
            || error.chain().any(|cause| {
                let message = cause.to_string().to_lowercase();
                message.contains("timed out") || message.contains("timeout")
            })
    }

    /// Wall-clock budget shared by every step of one render
    pub struct Deadline {
        end: Instant,
        budget: Duration,
    }

    impl Deadline {
        pub fn new(budget: Duration) -> Self {
            Self {
                end: Instant::now() + budget,
                budget,
            }
        }

        /// Time left, or `None` once the budget is spent
        pub fn remaining(&self) -> Option<Duration> {
            let left = self.end.saturating_duration_since(Instant::now());
            (!left.is_zero()).then_some(left)
        }

        fn require(&self, url: &str, stage: &str) -> Result<Duration, FetchError> {
            self.remaining().ok_or_else(|| {
                FetchError::timeout(url, format!("{} not reached within {}s", stage, self.budget.as_secs()))
            })
        }
    }

    /// A launched browser, closed when dropped
    pub struct RenderSession {
        browser: Browser,
        url: String,
    }

    impl RenderSession {
        pub fn launch(settings: &BrowserSettings, url: &str, idle: Duration) -> Result<Self, FetchError> {
            let launch_options = LaunchOptions::default_builder()
                .headless(settings.headless)
                .sandbox(settings.sandbox)
                .window_size(Some((settings.window_width, settings.window_height)))
                .idle_browser_timeout(idle)
                .build()
                .map_err(|e| FetchError::render(url, format!("invalid browser options: {}", e)))?;

            let browser = Browser::new(launch_options)
                .map_err(|e| FetchError::render(url, format!("failed to launch browser: {}", e)))?;

            log::debug!("Browser session opened for {}", url);
            Ok(Self {
                browser,
                url: url.to_string(),
            })
        }

        /// Every wait gets only what is left of `deadline`, so the session is
        /// dropped within the request timeout
        pub fn render(
            &self,
            settings: &BrowserSettings,
            options: &FetchOptions,
            deadline: &Deadline,
        ) -> Result<Page, FetchError> {
            let url = self.url.as_str();
            let tab = self
                .browser
                .new_tab()
                .map_err(|e| FetchError::render(url, format!("failed to open tab: {}", e)))?;
            tab.set_default_timeout(deadline.require(url, "page load")?);

            let user_agent = settings.user_agent.as_deref().unwrap_or_else(|| get_random_user_agent());
            if let Err(e) = tab.set_user_agent(user_agent, None, None) {
                log::debug!("Could not set user agent for {}: {}", url, e);
            }

            tab.navigate_to(url)
                .and_then(|tab| tab.wait_until_navigated())
                .map_err(|e| {
                    if is_timeout(&e) {
                        FetchError::timeout(url, format!("page did not load within {}s", options.timeout.as_secs()))
                    } else {
                        FetchError::render(url, format!("navigation failed: {}", e))
                    }
                })?;

            if let Some(selector) = &options.wait_for_selector {
                let left = deadline.require(url, &format!("'{}'", selector))?;
                tab.wait_for_element_with_custom_timeout(selector, left)
                    .map_err(|e| {
                        if is_timeout(&e) {
                            FetchError::timeout(
                                url,
                                format!("'{}' did not appear within {}s", selector, options.timeout.as_secs()),
                            )
                        } else {
                            FetchError::render(url, format!("waiting for '{}' failed: {}", selector, e))
                        }
                    })?;
            }

            if settings.scroll {
                match deadline.remaining() {
                    Some(left) => {
                        tab.set_default_timeout(left);
                        if let Err(e) = tab.evaluate(SCROLL_SCRIPT, true) {
                            log::debug!("Scroll script failed on {}: {}", url, e);
                        }
                    }
                    None => log::debug!("No time left to scroll {}", url),
                }
            }
            if settings.settle_ms > 0 {
                if let Some(left) = deadline.remaining() {
                    std::thread::sleep(Duration::from_millis(settings.settle_ms).min(left));
                }
            }

            let body = tab
                .get_content()
                .map_err(|e| FetchError::render(url, format!("failed to read rendered DOM: {}", e)))?;
            let final_url = tab.get_url();
            let _ = tab.close(true);

            Ok(Page::new(final_url, body))
        }
    }

    impl Drop for RenderSession {
        fn drop(&mut self) {
            log::debug!("Browser session closed for {}", self.url);
        }
    }

    pub fn render_page(settings: &BrowserSettings, url: &str, options: &FetchOptions) -> Result<Page, FetchError> {
        let deadline = Deadline::new(options.timeout);
        let idle = options.timeout + Duration::from_secs(30);
        let session = RenderSession::launch(settings, url, idle)?;
        session.render(settings, options, &deadline)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_wait_timeouts_are_classified_as_timeouts() {
            let waited = anyhow::Error::from(headless_chrome::util::Timeout);
            assert!(is_timeout(&waited));

            let wrapped = waited.context("waiting for '.results'");
            assert!(is_timeout(&wrapped));

            let failed = anyhow::anyhow!("Method call error -32000: net::ERR_NAME_NOT_RESOLVED");
            assert!(!is_timeout(&failed));
        }

        #[test]
        fn test_deadline_budget() {
            let deadline = Deadline::new(Duration::from_secs(60));
            let left = deadline.remaining().unwrap();
            assert!(left <= Duration::from_secs(60));
            assert!(left > Duration::from_secs(50));

            let spent = Deadline::new(Duration::ZERO);
            assert!(spent.remaining().is_none());
            let err = spent.require("https://example.com", "page load").unwrap_err();
            assert_eq!(err.kind, crate::error::FetchErrorKind::Timeout);
        }
    }
}

#[cfg(not(feature = "headless"))]
mod render {
    use super::BrowserSettings;
    use crate::error::FetchError;
    use crate::fetch::{FetchOptions, Page};

    pub fn render_page(_settings: &BrowserSettings, url: &str, _options: &FetchOptions) -> Result<Page, FetchError> {
        Err(FetchError::render(
            url,
            "browser support not compiled in (build with the `headless` feature)",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_settings_partial_config() {
        let settings: BrowserSettings = toml::from_str("settle_ms = 0\nscroll = false").unwrap();
        assert!(settings.headless);
        assert!(!settings.scroll);
        assert_eq!(settings.settle_ms, 0);
        assert_eq!(settings.window_width, 1920);
    }

    #[test]
    fn test_reports_dynamic_strategy() {
        let fetcher = DynamicFetcher::new(BrowserSettings::default());
        assert_eq!(fetcher.strategy(), Strategy::Dynamic);
    }

    #[cfg(not(feature = "headless"))]
    #[tokio::test]
    async fn test_without_browser_support_fetch_fails_with_render() {
        use crate::error::FetchErrorKind;
        use std::time::Duration;

        let fetcher = DynamicFetcher::new(BrowserSettings::default());
        let err = fetcher
            .fetch("https://example.com", &FetchOptions::new(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Render);
    }
}
