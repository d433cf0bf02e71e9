use std::collections::HashSet;
use std::time::Duration;

use crate::error::FetchError;
use crate::extractor::build_records;
use crate::fetch::{FetchOptions, Page, PageFetcher};
use crate::models::{ExtractionRequest, Record};
use crate::normalize::Normalizer;
use crate::selector::first_href;
use crate::utils::resolve_url;

/// Where a pagination run currently is
#[derive(Debug)]
pub enum PageState {
    Fetching { url: String, number: u32 },
    Extracting { page: Page, number: u32 },
    Advancing { next: Option<String>, number: u32 },
    Done,
    Failed(FetchError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaginationOutcome {
    pub records: Vec<Record>,
    pub pages_scraped: u32,
}

/// Drives fetch / extract cycles over a paginated listing
pub struct PaginationController<'a> {
    fetcher: &'a dyn PageFetcher,
    request: &'a ExtractionRequest,
    options: FetchOptions,
    grace: Duration,
    records: Vec<Record>,
    pages_scraped: u32,
    visited: HashSet<String>,
}

impl<'a> PaginationController<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, request: &'a ExtractionRequest) -> Self {
        let options = FetchOptions::new(Duration::from_secs(request.timeout))
            .wait_for(request.wait_for_selector.as_deref());

        Self {
            fetcher,
            request,
            options,
            grace: Duration::from_secs(5),
            records: Vec::new(),
            pages_scraped: 0,
            visited: HashSet::new(),
        }
    }

    /// Slack on top of the request timeout before a fetch is abandoned
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Starting state; `seed` is an already fetched first page
    pub fn initial_state(&mut self, seed: Option<Page>) -> PageState {
        match seed {
            Some(page) => {
                self.visited.insert(self.request.url.clone());
                PageState::Extracting { page, number: 1 }
            }
            None => PageState::Fetching {
                url: self.request.url.clone(),
                number: 1,
            },
        }
    }

    pub async fn run(mut self, seed: Option<Page>) -> Result<PaginationOutcome, FetchError> {
        let mut state = self.initial_state(seed);
        loop {
            state = match state {
                PageState::Done => {
                    return Ok(PaginationOutcome {
                        records: self.records,
                        pages_scraped: self.pages_scraped,
                    });
                }
                PageState::Failed(e) => return Err(e),
                other => self.step(other).await,
            };
        }
    }

    pub async fn step(&mut self, state: PageState) -> PageState {
        match state {
            PageState::Fetching { url, number } => {
                self.visited.insert(url.clone());
                log::info!("Fetching page {}/{}: {}", number, self.request.max_pages(), url);

                match self.fetch(&url).await {
                    Ok(page) => PageState::Extracting { page, number },
                    Err(e) if number == 1 => PageState::Failed(e),
                    Err(e) => {
                        log::warn!("Stopping after {} page(s): {}", self.pages_scraped, e);
                        PageState::Done
                    }
                }
            }
            PageState::Extracting { page, number } => {
                self.visited.insert(page.url.clone());
                let (mut records, next) = self.extract_page(&page, number);
                log::info!("Page {} yielded {} record(s)", number, records.len());

                self.records.append(&mut records);
                self.pages_scraped = number;
                PageState::Advancing { next, number }
            }
            PageState::Advancing { next, number } => {
                if !self.request.pagination_enabled() || number >= self.request.max_pages() {
                    return PageState::Done;
                }
                match next {
                    None => {
                        log::debug!("No next page after page {}", number);
                        PageState::Done
                    }
                    Some(url) if self.visited.contains(&url) => {
                        log::info!("Next page {} was already visited; stopping", url);
                        PageState::Done
                    }
                    Some(url) => PageState::Fetching { url, number: number + 1 },
                }
            }
            terminal => terminal,
        }
    }

    async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        let limit = self.options.timeout + self.grace;
        match tokio::time::timeout(limit, self.fetcher.fetch(url, &self.options)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::timeout(
                url,
                format!("no page within {}s", self.options.timeout.as_secs()),
            )),
        }
    }

    /// Parses, extracts and locates the next link; the parsed document
    /// never outlives this call
    fn extract_page(&self, page: &Page, number: u32) -> (Vec<Record>, Option<String>) {
        let document = page.document();
        let mut records = build_records(
            &document,
            self.request.container_selector.as_deref(),
            &self.request.fields,
        );

        if self.request.normalize {
            Normalizer::new(&page.url).normalize_records(&mut records);
        }

        let wants_next = self.request.pagination_enabled() && number < self.request.max_pages();
        let next = match self.request.next_page_selector() {
            Some(selector) if wants_next => match first_href(&document, selector) {
                Ok(href) => href.and_then(|href| resolve_url(&page.url, &href)),
                Err(e) => {
                    log::warn!("Next page selector: {}", e);
                    None
                }
            },
            _ => None,
        };

        (records, next)
    }
}
