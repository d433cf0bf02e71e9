mod common;

use common::{quotes_page, FakeFetcher};
use field_scraper::{
    ExtractionRequest, FetchError, FetchErrorKind, FieldSpec, Page, PageState, PaginationController,
    PaginationSpec, Strategy,
};
use std::time::Duration;

const PAGE_1: &str = "https://quotes.example/page/1/";
const PAGE_2: &str = "https://quotes.example/page/2/";
const PAGE_3: &str = "https://quotes.example/page/3/";

fn request(pagination: Option<PaginationSpec>) -> ExtractionRequest {
    let mut request = ExtractionRequest::new(
        PAGE_1,
        vec![FieldSpec::css("text", ".text"), FieldSpec::css("author", ".author")],
    );
    request.container_selector = Some(".quote".to_string());
    request.pagination = pagination;
    request
}

fn paging(max_pages: u32) -> Option<PaginationSpec> {
    Some(PaginationSpec {
        enabled: true,
        next_page_selector: Some("li.next a".to_string()),
        max_pages,
    })
}

fn three_pages() -> FakeFetcher {
    FakeFetcher::new(Strategy::Static)
        .page(PAGE_1, quotes_page(1, 3, Some("/page/2/")))
        .page(PAGE_2, quotes_page(2, 3, Some("/page/3/")))
        .page(PAGE_3, quotes_page(3, 2, None))
}

#[tokio::test]
async fn test_disabled_pagination_scrapes_one_page() {
    let fetcher = three_pages();
    let request = request(None);

    let outcome = PaginationController::new(&fetcher, &request).run(None).await.unwrap();

    assert_eq!(outcome.pages_scraped, 1);
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(fetcher.calls(), vec![PAGE_1]);
}

#[tokio::test]
async fn test_follows_next_links_until_last_page() {
    let fetcher = three_pages();
    let request = request(paging(10));

    let outcome = PaginationController::new(&fetcher, &request).run(None).await.unwrap();

    assert_eq!(outcome.pages_scraped, 3);
    assert_eq!(outcome.records.len(), 8);
    assert_eq!(fetcher.calls(), vec![PAGE_1, PAGE_2, PAGE_3]);
    // page order, then container order
    assert_eq!(outcome.records[0].get("text").unwrap().as_text(), Some("\"Quote 1.1\""));
    assert_eq!(outcome.records[3].get("text").unwrap().as_text(), Some("\"Quote 2.1\""));
    assert_eq!(outcome.records[7].get("text").unwrap().as_text(), Some("\"Quote 3.2\""));
}

#[tokio::test]
async fn test_page_cap_is_respected() {
    let fetcher = three_pages();
    let request = request(paging(2));

    let outcome = PaginationController::new(&fetcher, &request).run(None).await.unwrap();

    assert_eq!(outcome.pages_scraped, 2);
    assert_eq!(outcome.records.len(), 6);
    assert_eq!(fetcher.calls().len(), 2);
}

#[tokio::test]
async fn test_missing_next_link_on_page_two_stops_at_two() {
    let fetcher = FakeFetcher::new(Strategy::Static)
        .page(PAGE_1, quotes_page(1, 3, Some("/page/2/")))
        .page(PAGE_2, quotes_page(2, 3, None));
    let request = request(paging(5));

    let outcome = PaginationController::new(&fetcher, &request).run(None).await.unwrap();
    assert_eq!(outcome.pages_scraped, 2);
    assert_eq!(outcome.records.len(), 6);
}

#[tokio::test]
async fn test_failure_after_first_page_keeps_partial_results() {
    let fetcher = FakeFetcher::new(Strategy::Static)
        .page(PAGE_1, quotes_page(1, 3, Some("/page/2/")))
        .failing(PAGE_2, FetchError::network(PAGE_2, "connection reset"));
    let request = request(paging(5));

    let outcome = PaginationController::new(&fetcher, &request).run(None).await.unwrap();
    assert_eq!(outcome.pages_scraped, 1);
    assert_eq!(outcome.records.len(), 3);
}

#[tokio::test]
async fn test_first_page_failure_is_fatal() {
    let fetcher = FakeFetcher::new(Strategy::Static)
        .failing(PAGE_1, FetchError::network(PAGE_1, "connection refused"));
    let request = request(paging(5));

    let err = PaginationController::new(&fetcher, &request).run(None).await.unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::Network);
}

#[tokio::test]
async fn test_revisited_page_ends_the_run() {
    let fetcher = FakeFetcher::new(Strategy::Static)
        .page(PAGE_1, quotes_page(1, 1, Some("/page/2/")))
        .page(PAGE_2, quotes_page(2, 1, Some("/page/1/")));
    let request = request(paging(10));

    let outcome = PaginationController::new(&fetcher, &request).run(None).await.unwrap();
    assert_eq!(outcome.pages_scraped, 2);
    assert_eq!(fetcher.calls(), vec![PAGE_1, PAGE_2]);
}

#[tokio::test]
async fn test_seeded_first_page_is_not_fetched_again() {
    let fetcher = three_pages();
    let request = request(paging(2));
    let seed = Page::new(PAGE_1, quotes_page(1, 3, Some("/page/2/")));

    let outcome = PaginationController::new(&fetcher, &request).run(Some(seed)).await.unwrap();
    assert_eq!(outcome.pages_scraped, 2);
    assert_eq!(fetcher.calls(), vec![PAGE_2]);
}

#[tokio::test]
async fn test_state_transitions() {
    let fetcher = FakeFetcher::new(Strategy::Static).page(PAGE_1, quotes_page(1, 2, Some("/page/2/")));
    let request = request(paging(1));
    let mut controller = PaginationController::new(&fetcher, &request);

    let state = controller.initial_state(None);
    assert!(matches!(&state, PageState::Fetching { url, number: 1 } if url == PAGE_1));

    let state = controller.step(state).await;
    assert!(matches!(state, PageState::Extracting { number: 1, .. }));

    // cap of one page: no next link is looked up
    let state = controller.step(state).await;
    assert!(matches!(state, PageState::Advancing { next: None, number: 1 }));

    let state = controller.step(state).await;
    assert!(matches!(state, PageState::Done));
}

#[tokio::test]
async fn test_slow_fetch_times_out() {
    let fetcher = FakeFetcher::new(Strategy::Dynamic)
        .page(PAGE_1, quotes_page(1, 1, None))
        .slow(Duration::from_secs(5));
    let mut request = request(None);
    request.timeout = 1;

    let err = PaginationController::new(&fetcher, &request)
        .with_grace(Duration::from_millis(100))
        .run(None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::Timeout);
}
