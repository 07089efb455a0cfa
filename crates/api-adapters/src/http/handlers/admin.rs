use axum::extract::{Path, State};

use domains::models::BanState;

use crate::http::{ApiError, ApiSuccess, AppState, AuthUser};

pub async fn ban(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path((id, minutes)): Path<(String, String)>,
) -> Result<ApiSuccess<BanState>, ApiError> {
    let result = state.services.admin.ban(&principal, &id, &minutes).await;
    Ok(ApiSuccess::ok("User banned", state.track("user", "ban", result)?))
}
