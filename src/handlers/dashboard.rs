use axum::{extract::State, response::IntoResponse};

use super::common::{map_service_error, success_response};
use crate::errors::ApiError;
use crate::services::dashboard::DashboardSummary;
use crate::AppState;

/// Stock alerts and this month's inbound/outbound totals
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    responses(
        (status = 200, description = "Dashboard summary", body = crate::ApiResponse<DashboardSummary>),
        (status = 500, description = "Fetch failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Dashboard"
)]
pub async fn dashboard_summary(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .dashboard
        .dashboard_summary()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(summary))
}
