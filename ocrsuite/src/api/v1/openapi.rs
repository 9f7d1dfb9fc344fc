use axum::Json;
use utoipa::OpenApi;

use super::handlers;
use super::response;
use crate::models;
use crate::ocr;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "OCR Suite API",
        version = "1.0.0",
        description = "Text and field recognition for scanned identity documents.",
    ),
    paths(
        handlers::health::health_check,
        handlers::ocr::recognize,
        handlers::samplers::reload_samplers,
        handlers::engines::reset_enhanced,
    ),
    components(schemas(
        response::ErrorCode,
        response::ApiError,
        models::OcrMode,
        models::OcrResult,
        models::TemplateInfo,
        ocr::SlotState,
        ocr::EngineSlots,
        handlers::health::HealthData,
        handlers::samplers::SamplerReloadData,
    )),
    tags(
        (name = "health", description = "Service and engine status"),
        (name = "ocr", description = "Document recognition"),
        (name = "samplers", description = "Field allow-lists"),
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
