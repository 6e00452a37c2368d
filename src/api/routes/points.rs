//! Point Routes
//!
//! - GET /api/v1/journeys/:journey/points - Ordered points of a journey
//! - POST /api/v1/journeys/:journey/points - Add a point (admin)
//! - PATCH /api/v1/journeys/:journey/points/:id - Edit title, url, timestamp (admin)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::auth::AdminSession;
use crate::api::dto::{CreatedResponse, PointsResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::points::{JourneyId, NewPoint, PointPatch};

fn journey_id(raw: String) -> ApiResult<JourneyId> {
    let journey = JourneyId::new(raw);
    if !journey.is_valid() {
        return Err(ApiError::Validation(format!(
            "Invalid journey id: {:?}",
            journey.as_str()
        )));
    }
    Ok(journey)
}

/// GET /api/v1/journeys/:journey/points
pub async fn list_points(
    State(state): State<Arc<AppState>>,
    Path(journey): Path<String>,
) -> ApiResult<Json<PointsResponse>> {
    let journey = journey_id(journey)?;
    let points = state.store.list(&journey).await?;

    Ok(Json(PointsResponse {
        journey: journey.to_string(),
        points,
    }))
}

/// POST /api/v1/journeys/:journey/points
///
/// The body's `timestamp` is kept as sent; the store stamps `created_at`.
pub async fn create_point(
    State(state): State<Arc<AppState>>,
    Path(journey): Path<String>,
    AdminSession(session): AdminSession,
    Json(point): Json<NewPoint>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let journey = journey_id(journey)?;
    let id = state.store.insert(&journey, point).await?;

    tracing::info!(
        journey = %journey,
        point_id = %id,
        admin = %session.email,
        "Point added"
    );

    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// PATCH /api/v1/journeys/:journey/points/:id
pub async fn update_point(
    State(state): State<Arc<AppState>>,
    Path((journey, id)): Path<(String, String)>,
    AdminSession(session): AdminSession,
    Json(patch): Json<PointPatch>,
) -> ApiResult<StatusCode> {
    let journey = journey_id(journey)?;
    if id.trim().is_empty() {
        return Err(ApiError::Validation("Point id is required".to_string()));
    }

    state.store.update(&journey, &id, patch).await?;

    tracing::info!(
        journey = %journey,
        point_id = %id,
        admin = %session.email,
        "Point updated"
    );

    Ok(StatusCode::NO_CONTENT)
}
