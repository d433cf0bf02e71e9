use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::detector::PageTypeDetector;
use crate::dynamic_fetch::DynamicFetcher;
use crate::error::{FetchError, ScrapeError};
use crate::fetch::{FetchOptions, Page, PageFetcher};
use crate::models::{validate_url, DetectionResult, ExtractionRequest, ExtractionResult, Strategy};
use crate::pagination::{PaginationController, PaginationOutcome};
use crate::static_fetch::StaticFetcher;

/// Validates requests, picks a strategy and runs the pagination loop
pub struct ScrapeEngine {
    static_fetcher: Arc<dyn PageFetcher>,
    dynamic_fetcher: Arc<dyn PageFetcher>,
    detector: PageTypeDetector,
    grace: Duration,
}

impl ScrapeEngine {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let static_fetcher = StaticFetcher::new(&config.scraper)?;
        let dynamic_fetcher = DynamicFetcher::new(config.browser.clone());

        Ok(Self::with_fetchers(
            Arc::new(static_fetcher),
            Arc::new(dynamic_fetcher),
            PageTypeDetector::new(config.detector.clone()),
        )
        .with_grace(Duration::from_secs(config.scraper.timeout_grace_secs)))
    }

    pub fn with_fetchers(
        static_fetcher: Arc<dyn PageFetcher>,
        dynamic_fetcher: Arc<dyn PageFetcher>,
        detector: PageTypeDetector,
    ) -> Self {
        Self {
            static_fetcher,
            dynamic_fetcher,
            detector,
            grace: Duration::from_secs(5),
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn detector(&self) -> &PageTypeDetector {
        &self.detector
    }

    fn fetcher(&self, strategy: Strategy) -> &dyn PageFetcher {
        match strategy {
            Strategy::Static => self.static_fetcher.as_ref(),
            Strategy::Dynamic => self.dynamic_fetcher.as_ref(),
        }
    }

    /// Static sample fetch + detection; URL-only detection when the sample fails
    async fn sample_and_detect(&self, url: &str) -> (DetectionResult, Option<Page>) {
        let timeout = Duration::from_secs(self.detector.config().sample_timeout_secs.max(1));
        let options = FetchOptions::new(timeout);

        let sample = match tokio::time::timeout(timeout + self.grace, self.static_fetcher.fetch(url, &options)).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!("no response within {}s", timeout.as_secs())),
        };

        match sample {
            Ok(page) => {
                let detection = self.detector.detect(url, Some(&page.body));
                (detection, Some(page))
            }
            Err(message) => {
                log::warn!("Detection sample for {} failed: {}", url, message);
                let mut detection = self.detector.detect(url, None);
                detection.indicators.push(format!("sample fetch failed: {}", message));
                (detection, None)
            }
        }
    }

    pub async fn detect_page_type(&self, url: &str) -> Result<DetectionResult, ScrapeError> {
        validate_url(url).map_err(ScrapeError::Validation)?;
        let (detection, _) = self.sample_and_detect(url.trim()).await;
        Ok(detection)
    }

    async fn paginate(
        &self,
        strategy: Strategy,
        request: &ExtractionRequest,
        seed: Option<Page>,
    ) -> Result<PaginationOutcome, FetchError> {
        PaginationController::new(self.fetcher(strategy), request)
            .with_grace(self.grace)
            .run(seed)
            .await
    }

    pub async fn scrape(&self, request: &ExtractionRequest) -> Result<ExtractionResult, ScrapeError> {
        let started = Instant::now();
        request.validate()?;

        let (strategy, detection, seed) = match request.scraper_type.explicit() {
            Some(strategy) => (strategy, None, None),
            None => {
                let (detection, sample) = self.sample_and_detect(&request.url).await;
                let strategy = detection.recommended_scraper;
                log::info!(
                    "Detected {} page ({:.0}% confidence) for {}",
                    strategy,
                    detection.confidence * 100.0,
                    request.url
                );
                let seed = if strategy == Strategy::Static { sample } else { None };
                (strategy, Some(detection), seed)
            }
        };

        log::info!("Scraping {} with the {} strategy", request.url, strategy);

        let (strategy, outcome) = match self.paginate(strategy, request, seed).await {
            Ok(outcome) => (strategy, outcome),
            Err(e) if request.fallback => {
                let other = strategy.other();
                log::warn!(
                    "{} strategy failed on {} ({}); retrying with {}",
                    strategy,
                    request.url,
                    e,
                    other
                );
                let outcome = self.paginate(other, request, None).await.map_err(|e| {
                    log::error!("Scrape of {} failed with both strategies: {}", request.url, e);
                    ScrapeError::from(e)
                })?;
                (other, outcome)
            }
            Err(e) => {
                log::error!("Scrape of {} failed: {}", request.url, e);
                return Err(e.into());
            }
        };

        let result = ExtractionResult::new(
            &request.url,
            strategy,
            outcome.records,
            outcome.pages_scraped,
            started.elapsed().as_secs_f64(),
            detection,
        );
        log::info!(
            "Scraped {} item(s) from {} page(s) in {:.2}s",
            result.total_items,
            result.pages_scraped,
            result.elapsed_time
        );
        Ok(result)
    }
}
