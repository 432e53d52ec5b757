use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::caption::CaptionResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionEntry {
    pub caption: String,
}

/// Body of every caption route reply, success or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionResponse {
    pub captions: Vec<CaptionEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<CaptionResult> for CaptionResponse {
    fn from(result: CaptionResult) -> Self {
        match result {
            CaptionResult::Caption(caption) => CaptionResponse {
                captions: vec![CaptionEntry { caption }],
                error: None,
                details: None,
            },
            CaptionResult::Failed {
                error,
                caption,
                details,
                ..
            } => CaptionResponse {
                captions: vec![CaptionEntry { caption }],
                error: Some(error),
                details,
            },
        }
    }
}

impl IntoResponse for CaptionResult {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(CaptionResponse::from(self))).into_response()
    }
}

/// Reply of the detailed-prompt routes, in the shape their page expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResponse {
    pub caption: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<CaptionResult> for PromptResponse {
    fn from(result: CaptionResult) -> Self {
        match result {
            CaptionResult::Caption(caption) => PromptResponse {
                caption,
                detail: None,
                details: None,
            },
            CaptionResult::Failed {
                error,
                caption,
                details,
                ..
            } => PromptResponse {
                caption,
                detail: Some(error),
                details,
            },
        }
    }
}

pub struct PromptReply(pub CaptionResult);

impl IntoResponse for PromptReply {
    fn into_response(self) -> Response {
        let status = self.0.status();
        (status, Json(PromptResponse::from(self.0))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CaptionParams {
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model: String,
}
