use axum::extract::State;

use crate::api::state::AppState;
use crate::api::v1::response::ApiResponse;
use crate::ocr::EngineSlots;

/// `POST /api/v1/engines/enhanced:reset`
///
/// Forgets a failed (or loaded) enhanced engine so the next enhanced request
/// builds it again. Returns the slot states after the reset.
#[utoipa::path(
    post,
    path = "/api/v1/engines/enhanced:reset",
    tag = "health",
    responses(
        (status = 200, description = "Enhanced slot cleared", body = EngineSlots),
    )
)]
pub async fn reset_enhanced(State(state): State<AppState>) -> ApiResponse<EngineSlots> {
    state.factory.reset_enhanced();
    ApiResponse::success(state.factory.slot_states())
}
