mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};
use std::sync::Arc;

use common::{quotes_page, FakeFetcher, SPA_SHELL};
use field_scraper::api::{self, AppState};
use field_scraper::export::ExportSettings;
use field_scraper::{FetchError, PageTypeDetector, PresetScorer, PresetStore, ScrapeEngine, Strategy};

const QUOTES: &str = "https://quotes.example/";
const SLOW: &str = "https://slow.example/";
const SPA: &str = "https://app.example.com/";

fn state() -> web::Data<AppState> {
    let static_fetcher = FakeFetcher::new(Strategy::Static)
        .page(QUOTES, quotes_page(1, 3, None))
        .page(SPA, SPA_SHELL)
        .failing(SLOW, FetchError::timeout(SLOW, "request timed out"));
    let engine = ScrapeEngine::with_fetchers(
        Arc::new(static_fetcher),
        Arc::new(FakeFetcher::new(Strategy::Dynamic)),
        PageTypeDetector::default(),
    );

    web::Data::new(AppState {
        engine: Arc::new(engine),
        presets: Arc::new(PresetStore::builtin().unwrap()),
        scorer: PresetScorer::default(),
        export: ExportSettings::default(),
    })
}

fn scrape_body(url: &str) -> Value {
    json!({
        "url": url,
        "scraper_type": "static",
        "container_selector": ".quote",
        "fields": [
            {"name": "text", "selector": ".text"},
            {"name": "author", "selector": ".author"}
        ]
    })
}

macro_rules! app {
    () => {
        test::init_service(App::new().app_data(state()).configure(api::configure)).await
    };
}

#[actix_web::test]
async fn test_health() {
    let app = app!();
    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "field-scraper");
}

#[actix_web::test]
async fn test_scrape_success() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/api/scrape")
        .set_json(scrape_body(QUOTES))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["result"]["total_items"], 3);
    assert_eq!(body["result"]["scraper_used"], "static");
    assert_eq!(body["result"]["data"][0]["author"], "Author 1");
    assert!(body.get("error").is_none());
}

#[actix_web::test]
async fn test_scrape_validation_is_bad_request() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/api/scrape")
        .set_json(json!({"url": "example.com", "fields": [{"name": "a", "selector": "a"}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "validation");
}

#[actix_web::test]
async fn test_malformed_json_is_bad_request() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/api/scrape")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["kind"], "validation");
}

#[actix_web::test]
async fn test_scrape_fetch_errors_map_to_gateway_statuses() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/api/scrape")
        .set_json(scrape_body("https://missing.example/"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["kind"], "http_status");

    let req = test::TestRequest::post()
        .uri("/api/scrape")
        .set_json(scrape_body(SLOW))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["kind"], "timeout");
}

#[actix_web::test]
async fn test_detect() {
    let app = app!();
    let req = test::TestRequest::get()
        .uri("/api/detect?url=https%3A%2F%2Fapp.example.com%2F")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["recommended_scraper"], "dynamic");
    assert_eq!(body["is_dynamic"], true);
    assert!(body["indicators"].as_array().unwrap().len() >= 2);

    let req = test::TestRequest::get().uri("/api/detect?url=nope").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_presets_and_categories() {
    let app = app!();

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/presets").to_request()).await;
    let all: Value = test::read_body_json(resp).await;
    assert_eq!(all.as_array().unwrap().len(), 11);
    assert!(all[0].get("fields").is_none());

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/presets?category=jobs").to_request(),
    )
    .await;
    let jobs: Value = test::read_body_json(resp).await;
    assert_eq!(jobs.as_array().unwrap().len(), 1);
    assert_eq!(jobs[0]["id"], "job_listings");

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/presets/news_articles").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let preset: Value = test::read_body_json(resp).await;
    assert!(!preset["fields"].as_array().unwrap().is_empty());

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/presets/nope").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["kind"], "not_found");

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/categories").to_request()).await;
    let categories: Value = test::read_body_json(resp).await;
    assert_eq!(categories.as_array().unwrap().len(), 11);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/categories/video/presets").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/categories/unknown/presets").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_suggest_presets() {
    let app = app!();
    let req = test::TestRequest::get()
        .uri("/api/suggest-presets?url=https%3A%2F%2Fnews.ycombinator.com%2Fnews")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["url"], "https://news.ycombinator.com/news");
    assert_eq!(body["suggestions"][0]["id"], "news_articles");
    assert!(body["suggestions"][0]["score"].as_u64().unwrap() > 0);

    let req = test::TestRequest::get().uri("/api/suggest-presets?url=").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get().uri("/api/suggest-presets").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_export_csv() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/api/export?format=csv")
        .insert_header(("content-type", "application/json"))
        .set_payload(r#"[{"title": "One", "tags": ["x", "y"]}, {"title": "Two", "price": "9.99"}]"#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("export.csv"));

    let body = test::read_body(resp).await;
    assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        "title,tags,price\nOne,x; y,\nTwo,,9.99\n"
    );
}

#[actix_web::test]
async fn test_export_defaults_to_json() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/api/export")
        .set_json(json!([{"title": "One"}]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body[0]["title"], "One");
}
