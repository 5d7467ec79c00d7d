//! The render endpoint: accepts a declarative render request and replies
//! with the finished MP4 artifact as a binary attachment.

use crate::pipeline::{RenderError, RenderRequest};
use crate::server::AppContext;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    stage: String,
}

/// POST /api/render
pub async fn render(
    State(ctx): State<AppContext>,
    Json(request): Json<RenderRequest>,
) -> Response {
    match ctx.pipeline.render(&request).await {
        Ok(artifact) => {
            tracing::info!(size = artifact.size, "Returning render artifact");
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "video/mp4"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"render.mp4\"",
                    ),
                ],
                artifact.data,
            )
                .into_response()
        }
        Err(e) => {
            let status = match &e {
                RenderError::Validation(_) => StatusCode::BAD_REQUEST,
                RenderError::Acquisition { .. } => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::error!(stage = %e.stage(), "Render failed: {}", e);
            (
                status,
                Json(ErrorBody {
                    error: e.to_string(),
                    stage: e.stage().to_string(),
                }),
            )
                .into_response()
        }
    }
}
