use axum::extract::State;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::v1::response::{ApiError, ApiResponse};

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct SamplerReloadData {
    /// Number of samplers in the table after the reload.
    pub count: usize,
}

/// `POST /api/v1/samplers:reload`
///
/// Re-reads the sampler file. A malformed file is rejected and the current
/// table stays in effect.
#[utoipa::path(
    post,
    path = "/api/v1/samplers:reload",
    tag = "samplers",
    responses(
        (status = 200, description = "Samplers reloaded", body = SamplerReloadData),
        (status = 400, description = "Sampler file is malformed", body = ApiError),
    )
)]
pub async fn reload_samplers(State(state): State<AppState>) -> ApiResponse<SamplerReloadData> {
    let samplers = state.samplers.clone();
    let path = state.config.catalog.samplers_path.clone();

    let loaded = tokio::task::spawn_blocking(move || samplers.load_from_path(&path)).await;
    match loaded {
        Ok(Ok(count)) => ApiResponse::success(SamplerReloadData { count }),
        Ok(Err(e)) => e.into(),
        Err(e) => crate::error::OcrError::Internal(format!("Sampler reload failed: {e}")).into(),
    }
}
