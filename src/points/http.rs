//! Point store backed by a remote Camino API server
//!
//! Reads and writes go through the REST endpoints. Live queries poll the list
//! endpoint and emit only when the snapshot changes.

use async_trait::async_trait;
use futures_util::stream::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use super::error::{StoreError, StoreResult};
use super::store::{LiveQuery, PointStore};
use super::types::{JourneyId, NewPoint, Point, PointId, PointPatch};

/// Remote store settings
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// API root, e.g. `http://localhost:8082`
    pub base_url: String,
    /// Session token sent as a bearer credential on writes
    pub token: Option<String>,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8082".to_string(),
            token: None,
            request_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(2),
        }
    }
}

#[derive(Deserialize)]
struct PointsBody {
    points: Vec<Point>,
}

#[derive(Deserialize)]
struct CreatedBody {
    id: PointId,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// HTTP client implementation of [`PointStore`]
#[derive(Clone)]
pub struct HttpPointStore {
    client: Client,
    config: HttpStoreConfig,
}

impl HttpPointStore {
    pub fn new(config: HttpStoreConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpStoreConfig {
        &self.config
    }

    fn points_url(&self, journey: &JourneyId) -> String {
        format!(
            "{}/api/v1/journeys/{}/points",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(journey.as_str())
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(request: RequestBuilder) -> StoreResult<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Transport("request timed out".to_string())
            } else if e.is_connect() {
                StoreError::Transport(format!("store unavailable: {}", e))
            } else {
                StoreError::from(e)
            }
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        Err(error_from_response(response).await)
    }

    async fn fetch(client: &Client, url: &str) -> StoreResult<Vec<Point>> {
        let response = Self::send(client.get(url)).await?;
        let body: PointsBody = response.json().await?;
        Ok(body.points)
    }
}

async fn error_from_response(response: Response) -> StoreError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&text)
        .map(|e| e.error.message)
        .unwrap_or(text);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::PermissionDenied,
        StatusCode::NOT_FOUND => StoreError::NotFound {
            journey: String::new(),
            id: message,
        },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            StoreError::InvalidData(message)
        }
        _ => StoreError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl PointStore for HttpPointStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn list(&self, journey: &JourneyId) -> StoreResult<Vec<Point>> {
        Self::fetch(&self.client, &self.points_url(journey)).await
    }

    async fn watch(&self, journey: &JourneyId) -> StoreResult<LiveQuery> {
        let client = self.client.clone();
        let url = self.points_url(journey);
        let interval = self.config.poll_interval;

        tracing::debug!(journey = %journey, interval_ms = interval.as_millis() as u64, "Polling remote journey");

        let stream = futures_util::stream::unfold(
            (client, url, None::<Vec<Point>>, true),
            move |(client, url, mut last, mut first)| async move {
                loop {
                    if !first {
                        tokio::time::sleep(interval).await;
                    }
                    first = false;

                    match Self::fetch(&client, &url).await {
                        Ok(points) if last.as_ref() == Some(&points) => continue,
                        Ok(points) => {
                            last = Some(points.clone());
                            return Some((Ok(points), (client, url, last, first)));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Remote journey poll failed");
                            return Some((Err(e), (client, url, last, first)));
                        }
                    }
                }
            },
        );

        Ok(stream.boxed())
    }

    async fn insert(&self, journey: &JourneyId, point: NewPoint) -> StoreResult<PointId> {
        point.validate()?;

        let request = self
            .authorized(self.client.post(self.points_url(journey)))
            .json(&point);
        let body: CreatedBody = Self::send(request).await?.json().await?;

        tracing::debug!(journey = %journey, point_id = %body.id, "Inserted remote point");
        Ok(body.id)
    }

    async fn update(&self, journey: &JourneyId, id: &str, patch: PointPatch) -> StoreResult<()> {
        let url = format!("{}/{}", self.points_url(journey), urlencoding::encode(id));
        let request = self.authorized(self.client.patch(url)).json(&patch);

        match Self::send(request).await {
            Err(StoreError::NotFound { .. }) => Err(StoreError::NotFound {
                journey: journey.to_string(),
                id: id.to_string(),
            }),
            other => other.map(|_| ()),
        }
    }
}
