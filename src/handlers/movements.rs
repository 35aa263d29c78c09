use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
};

use super::common::{created_response, map_service_error, success_response};
use crate::auth::Session;
use crate::errors::ApiError;
use crate::services::movement_ledger::{
    LedgerScreen, MovementPayload, MovementQuery, RecordedMovement, MOVEMENT_RECORDED,
};
use crate::AppState;

/// Product options and the most recent movements in one response
#[utoipa::path(
    get,
    path = "/api/v1/movimentacoes",
    params(MovementQuery),
    responses(
        (status = 200, description = "Ledger screen data", body = crate::ApiResponse<LedgerScreen>),
        (status = 500, description = "Fetch failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Movimentações"
)]
pub async fn ledger_screen(
    State(state): State<AppState>,
    Query(query): Query<MovementQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let screen = state
        .services
        .movement_ledger
        .ledger_screen(query)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(screen))
}

/// Record an inbound or outbound movement for the session user
#[utoipa::path(
    post,
    path = "/api/v1/movimentacoes",
    request_body = MovementPayload,
    responses(
        (status = 201, description = "Movement recorded", body = crate::ApiResponse<RecordedMovement>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "No session", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Movimentações"
)]
pub async fn record_movement(
    session: Session,
    State(state): State<AppState>,
    Json(payload): Json<MovementPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let recorded = state
        .services
        .movement_ledger
        .record_movement(&session, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(recorded, MOVEMENT_RECORDED))
}
