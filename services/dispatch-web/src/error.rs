use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use dispatch_client::UploadError;
use dispatch_core::{DispatchError, ErrorCode};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("{}", .0.message)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("{0} is not configured")]
    Disabled(&'static str),
}

impl WebError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Dispatch(DispatchError::invalid_input(message))
    }
}

impl ResponseError for WebError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Dispatch(error) => match error.code {
                ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorCode::NotFound => StatusCode::NOT_FOUND,
                ErrorCode::InvalidTransition => StatusCode::CONFLICT,
                ErrorCode::Upstream => StatusCode::BAD_GATEWAY,
                ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Upload(error) => match error {
                UploadError::Empty | UploadError::UnsupportedType(_) => StatusCode::BAD_REQUEST,
                UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                UploadError::Url(_)
                | UploadError::Transport(_)
                | UploadError::Status(_)
                | UploadError::Malformed(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Disabled(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self, "request failed");
        }
        HttpResponse::build(status).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
