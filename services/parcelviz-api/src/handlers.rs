//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use parcel_common::{ParcelVizError, RenderRequest, RenderResponse};
use serde_json::json;
use tracing::{error, info, warn};

use crate::state::AppState;

/// Error body shape shared by every failing route: `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl From<ParcelVizError> for ApiError {
    fn from(err: ParcelVizError) -> Self {
        if err.is_client_error() {
            warn!(error = %err, "Rejected render request");
            Self::bad_request(err.to_string())
        } else {
            error!(error = %err, "Render request failed");
            Self {
                status: StatusCode::from_u16(err.http_status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                detail: "Internal server error".to_string(),
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn render_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<Json<RenderResponse>, ApiError> {
    counter!("parcelviz_api_render_requests_total").increment(1);

    let Json(request) = payload.map_err(|rejection| {
        counter!("parcelviz_api_render_errors_total", "kind" => "client").increment(1);
        ApiError::bad_request(rejection.body_text())
    })?;

    match state.pipeline.render(request).await {
        Ok(response) => {
            info!(
                apn = %response.parcel.apn,
                images = response.images.len(),
                warnings = response.warnings.len(),
                "Render request complete"
            );
            Ok(Json(response))
        }
        Err(err) => {
            let kind = if err.is_client_error() { "client" } else { "server" };
            counter!("parcelviz_api_render_errors_total", "kind" => kind).increment(1);
            Err(err.into())
        }
    }
}

pub async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    (StatusCode::OK, handle.render())
}
