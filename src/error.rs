use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HUGGINGFACE_API_KEY must be set (in the environment or a .env file)")]
    MissingApiKey,
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("translation response was empty")]
    Empty,
}

/// Failures of the image proxy route, rendered as `{ "detail": ... }`.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Invalid URL scheme")]
    InvalidScheme,
    #[error("URL does not point to a valid image")]
    NotAnImage,
    #[error("Image size exceeds {limit} byte limit")]
    TooLarge { limit: usize },
    #[error("Image fetch timeout")]
    Timeout,
    #[error("Failed to fetch image: upstream returned {status}")]
    Upstream { status: u16 },
    #[error("Failed to fetch image: {0}")]
    Fetch(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidScheme | ProxyError::NotAnImage | ProxyError::TooLarge { .. } => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Upstream { status } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProxyError::Fetch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProxyError::Timeout
        } else if let Some(status) = e.status() {
            ProxyError::Upstream {
                status: status.as_u16(),
            }
        } else {
            ProxyError::Fetch(e.to_string())
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        tracing::warn!("image proxy failed: {}", self);
        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
