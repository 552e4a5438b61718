// src/error.rs
use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::message::ErrorBody;

/// Failures raised before the response stream starts. Each one maps to a
/// status code and a JSON `{ error, details? }` body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Error initializing AI service: {0}")]
    ServiceInit(String),

    #[error("Error generating AI response: {details}")]
    Upstream { details: String },

    #[error("AI service did not respond within {0:?}")]
    UpstreamTimeout(Duration),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ServiceInit(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream { .. } | AppError::UpstreamTimeout(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            AppError::BadRequest(msg) => ErrorBody { error: msg.clone(), details: None },
            // The credential problem stays in the server log.
            AppError::ServiceInit(_) => ErrorBody {
                error: "Error initializing AI service".to_string(),
                details: None,
            },
            AppError::Upstream { details } => ErrorBody {
                error: "Error generating AI response".to_string(),
                details: Some(details.clone()),
            },
            AppError::UpstreamTimeout(limit) => ErrorBody {
                error: "Error generating AI response".to_string(),
                details: Some(format!("no response from the AI service within {}s", limit.as_secs_f32())),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), "{self}");
        } else {
            warn!(status = status.as_u16(), "{self}");
        }
        (status, Json(self.body())).into_response()
    }
}

/// Failures after the headers have been flushed. They end the body stream
/// abnormally so a client can tell a truncated reply from a finished one.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("upstream stream interrupted: {0}")]
    Interrupted(String),

    #[error("upstream sent nothing for {0:?}")]
    IdleTimeout(Duration),
}
