use axum::extract::{Multipart, State};

use crate::api::state::AppState;
use crate::api::v1::response::{ApiError, ApiResponse, ErrorCode};
use crate::models::{OcrMode, OcrRequest, OcrResult};

/// `POST /api/v1/ocr`
///
/// Multipart form with a required `file` field and optional `docType`, `mode`
/// (`auto` | `fast` | `enhanced`, anything else means `auto`) and `sampler`.
/// The request is cancelled if the client goes away before it completes.
#[utoipa::path(
    post,
    path = "/api/v1/ocr",
    tag = "ocr",
    operation_id = "ocr.recognize",
    request_body(content_type = "multipart/form-data", content = String, description = "Image upload with optional docType, mode and sampler fields"),
    responses(
        (status = 200, description = "Recognition result", body = OcrResult),
        (status = 400, description = "Invalid upload or undecodable image", body = ApiError),
        (status = 503, description = "No OCR engine available", body = ApiError),
    )
)]
pub async fn recognize(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResponse<OcrResult> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut doc_type: Option<String> = None;
    let mut mode: Option<String> = None;
    let mut sampler: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return ApiResponse::error(
                    ErrorCode::InvalidRequest,
                    format!("Invalid multipart body: {e}"),
                );
            }
        };
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((file_name, bytes.to_vec())),
                    Err(e) => {
                        return ApiResponse::error(
                            ErrorCode::InvalidRequest,
                            format!("Failed to read file: {e}"),
                        );
                    }
                }
            }
            "docType" | "mode" | "sampler" => {
                let value = match field.text().await {
                    Ok(t) => t,
                    Err(e) => {
                        return ApiResponse::error(
                            ErrorCode::InvalidRequest,
                            format!("Invalid {name} value: {e}"),
                        );
                    }
                };
                match name.as_str() {
                    "docType" => doc_type = Some(value),
                    "mode" => mode = Some(value),
                    _ => sampler = Some(value),
                }
            }
            _ => {}
        }
    }

    let Some((file_name, bytes)) = file else {
        return ApiResponse::error(ErrorCode::InvalidRequest, "Missing file field");
    };

    let mut request = OcrRequest::from_bytes(bytes, file_name)
        .with_mode(OcrMode::parse_or_auto(mode.as_deref()));
    if let Some(code) = doc_type {
        request = request.with_document_type(code);
    }
    if let Some(code) = sampler {
        request = request.with_sampler(code);
    }

    // Dropping this handler future (client disconnect) cancels the request.
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    match state.coordinator.process(request, &cancel).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => e.into(),
    }
}
