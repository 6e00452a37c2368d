//! Link Preview Route
//!
//! - GET /api/metadata?url=... - Title, description, image and site name of a page
//!
//! Browsers call this cross-origin, so pre-flight requests are answered and
//! every other method gets 405.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{MetadataErrorResponse, MetadataQuery};
use crate::api::state::AppState;

fn failure(status: StatusCode, error: &str, details: Option<String>) -> Response {
    (
        status,
        Json(MetadataErrorResponse {
            error: error.to_string(),
            details,
        }),
    )
        .into_response()
}

/// GET /api/metadata
pub async fn get_metadata(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MetadataQuery>,
) -> Response {
    let Some(url) = query.url.filter(|u| !u.trim().is_empty()) else {
        return failure(StatusCode::BAD_REQUEST, "URL parameter is required", None);
    };

    match state.metadata.fetch(&url).await {
        Ok(metadata) => Json(metadata).into_response(),
        Err(e) => {
            tracing::error!(url = %url, error = %e, "Error fetching metadata");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch metadata",
                Some(e.to_string()),
            )
        }
    }
}

/// OPTIONS /api/metadata
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Any other method on /api/metadata
pub async fn method_not_allowed() -> Response {
    failure(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", None)
}
