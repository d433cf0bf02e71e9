// Field Scraper Library
//
// Declarative field extraction over static or browser-rendered pages,
// with page-type detection, pagination and category presets.

pub mod api;
pub mod config;
pub mod detector;
pub mod dynamic_fetch;
pub mod engine;
pub mod error;
pub mod export;
pub mod extractor;
pub mod fetch;
pub mod models;
pub mod normalize;
pub mod pagination;
pub mod presets;
pub mod selector;
pub mod static_fetch;
pub mod suggest;
pub mod utils;
pub mod xpath;

// Re-export main types for convenience
pub use config::AppConfig;
pub use detector::{DetectorConfig, PageTypeDetector};
pub use engine::ScrapeEngine;
pub use error::{FetchError, FetchErrorKind, ScrapeError, SelectorError};
pub use extractor::{build_records, extract_field};
pub use fetch::{FetchOptions, Page, PageFetcher};
pub use models::{
    DetectionResult, ExtractionRequest, ExtractionResult, FieldSpec, FieldValue, PaginationSpec, Preset,
    Record, ScraperType, SelectorType, Strategy,
};
pub use pagination::{PageState, PaginationController, PaginationOutcome};
pub use presets::PresetStore;
pub use suggest::{PresetScorer, SuggestConfig};
pub use utils::{get_random_user_agent, USER_AGENTS};
