use actix_web::http::StatusCode;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::engine::ScrapeEngine;
use crate::error::{ErrorPayload, ExportError, ScrapeError};
use crate::export::{export, ExportFormat, ExportSettings};
use crate::models::{validate_url, DetectionResult, ExtractionRequest, ExtractionResult, Record};
use crate::presets::{PresetStore, PresetSummary};
use crate::suggest::PresetScorer;

pub struct AppState {
    pub engine: Arc<ScrapeEngine>,
    pub presets: Arc<PresetStore>,
    pub scorer: PresetScorer,
    pub export: ExportSettings,
}

/// Errors from the non-scrape endpoints
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "validation",
            ApiError::NotFound(_) => "not_found",
            ApiError::Export(_) => "export",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "success": false,
            "error": ErrorPayload {
                kind: self.kind().to_string(),
                message: self.to_string(),
            }
        }))
    }
}

#[derive(Debug, Serialize)]
pub struct ScrapeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExtractionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

fn scrape_status(error: &ScrapeError) -> StatusCode {
    match error.kind() {
        "validation" => StatusCode::BAD_REQUEST,
        "timeout" => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    #[serde(flatten)]
    pub detection: DetectionResult,
    pub is_dynamic: bool,
}

#[derive(Debug, Serialize)]
pub struct Suggestion {
    #[serde(flatten)]
    pub preset: PresetSummary,
    pub score: u32,
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub url: String,
    pub suggestions: Vec<Suggestion>,
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "field-scraper"
    }))
}

pub async fn scrape_handler(state: web::Data<AppState>, req: web::Json<ExtractionRequest>) -> HttpResponse {
    let request = req.into_inner();
    log::info!("Received scrape request for {} ({} field(s))", request.url, request.fields.len());

    match state.engine.scrape(&request).await {
        Ok(result) => HttpResponse::Ok().json(ScrapeResponse {
            success: true,
            result: Some(result),
            error: None,
        }),
        Err(e) => HttpResponse::build(scrape_status(&e)).json(ScrapeResponse {
            success: false,
            result: None,
            error: Some(e.payload()),
        }),
    }
}

pub async fn detect_handler(
    state: web::Data<AppState>,
    query: web::Query<UrlQuery>,
) -> Result<HttpResponse, ApiError> {
    let detection = state
        .engine
        .detect_page_type(&query.url)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(HttpResponse::Ok().json(DetectResponse {
        is_dynamic: detection.is_dynamic(),
        detection,
    }))
}

pub async fn list_presets(state: web::Data<AppState>, query: web::Query<CategoryQuery>) -> HttpResponse {
    let category = query.category.as_deref().filter(|c| !c.is_empty());
    HttpResponse::Ok().json(state.presets.list(category))
}

pub async fn get_preset(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    state
        .presets
        .get(&id)
        .map(|preset| HttpResponse::Ok().json(preset))
        .ok_or_else(|| ApiError::NotFound(format!("Preset '{}' not found", id)))
}

pub async fn list_categories(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.presets.categories())
}

pub async fn category_presets(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let presets = state.presets.list(Some(&id));
    if presets.is_empty() {
        return Err(ApiError::NotFound(format!(
            "Category '{}' not found or has no presets",
            id
        )));
    }
    Ok(HttpResponse::Ok().json(presets))
}

pub async fn suggest_presets(
    state: web::Data<AppState>,
    query: web::Query<UrlQuery>,
) -> Result<HttpResponse, ApiError> {
    validate_url(&query.url).map_err(ApiError::BadRequest)?;

    let suggestions = state
        .scorer
        .ranked(&query.url, state.presets.catalog())
        .into_iter()
        .map(|(preset, score)| Suggestion {
            preset: PresetSummary::from(preset),
            score,
        })
        .collect();

    Ok(HttpResponse::Ok().json(SuggestResponse {
        url: query.url.clone(),
        suggestions,
    }))
}

pub async fn export_handler(
    state: web::Data<AppState>,
    query: web::Query<ExportQuery>,
    records: web::Json<Vec<Record>>,
) -> Result<HttpResponse, ApiError> {
    let format = query.format;
    let body = export(&records, format, &state.export)?;
    log::info!("Exported {} record(s) as {:?}", records.len(), format);

    let mut response = HttpResponse::Ok();
    response.content_type(format.content_type());
    if format == ExportFormat::Csv {
        response.insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename("export.csv".to_string())],
        });
    }
    Ok(response.body(body))
}

/// Registers every `/api` route
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default()
        .limit(4 * 1024 * 1024)
        .error_handler(|err, _req| ApiError::BadRequest(format!("Invalid JSON body: {}", err)).into());
    let query_config = web::QueryConfig::default()
        .error_handler(|err, _req| ApiError::BadRequest(format!("Invalid query: {}", err)).into());

    cfg.app_data(json_config).app_data(query_config).service(
        web::scope("/api")
            .route("/health", web::get().to(health_check))
            .route("/scrape", web::post().to(scrape_handler))
            .route("/detect", web::get().to(detect_handler))
            .route("/presets", web::get().to(list_presets))
            .route("/presets/{id}", web::get().to(get_preset))
            .route("/categories", web::get().to(list_categories))
            .route("/categories/{id}/presets", web::get().to(category_presets))
            .route("/suggest-presets", web::get().to(suggest_presets))
            .route("/export", web::post().to(export_handler)),
    );
}
