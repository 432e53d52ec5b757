//! Image captioning through a hosted BLIP endpoint.
//!
//! The provider is flaky in well-known ways (cold model, 503s, slow
//! inference), so every call goes through [`Captioner`], which retries a
//! bounded number of times and folds whatever happened into a
//! [`CaptionResult`] the browser can display as-is.

mod provider;
mod retry;

use std::time::Duration;

use axum::body::Bytes;
use axum::http::StatusCode;
use serde_json::Value;
use thiserror::Error;

pub use provider::{CaptionProvider, HuggingFaceProvider};
pub use retry::{classify, finalize, Captioner};

/// Caption text used when the provider answered but not in a shape we know.
pub const NO_CAPTION_EXTRACTED: &str = "No caption could be extracted from the response";

/// Upload formats accepted by the captioning route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Jpeg,
    Png,
    WebP,
}

impl ImageType {
    /// Parses a declared MIME type. Parameters (`; charset=...`) and case are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" => Some(ImageType::Jpeg),
            "image/png" => Some(ImageType::Png),
            "image/webp" => Some(ImageType::WebP),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ImageType::Jpeg => "image/jpeg",
            ImageType::Png => "image/png",
            ImageType::WebP => "image/webp",
        }
    }
}

/// One uploaded image, alive for a single request.
#[derive(Debug, Clone)]
pub struct CaptionRequest {
    pub bytes: Bytes,
    pub content_type: ImageType,
    pub size: usize,
}

impl CaptionRequest {
    pub fn new(bytes: Bytes, content_type: ImageType) -> Self {
        let size = bytes.len();
        Self {
            bytes,
            content_type,
            size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one.
    pub max_retries: u32,
    /// Pause after a timeout or a dropped connection.
    pub transient_delay: Duration,
    /// Pause after the provider reports the model is still warming up.
    pub warmup_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            transient_delay: Duration::from_secs(3),
            warmup_delay: Duration::from_secs(5),
        }
    }
}

/// Why a single provider attempt did not yield a caption.
#[derive(Debug, Clone, Error)]
pub enum ProviderFailure {
    /// 2xx body with an `error` saying the model is loading or starting.
    #[error("model is not ready: {message}")]
    Loading { message: String, body: Value },
    /// 2xx body with any other `error`.
    #[error("provider error: {message}")]
    Rejected { message: String, body: Value },
    #[error("request timed out: {0}")]
    Timeout(String),
    /// The request went out but no response came back.
    #[error("no response from provider: {0}")]
    Network(String),
    #[error("provider returned HTTP {status}")]
    Status { status: u16, body: Value },
    #[error("{0}")]
    Other(String),
}

impl ProviderFailure {
    /// The provider's `estimated_time` hint, if this failure is a warm-up that carries one.
    pub fn estimated_wait(&self) -> Option<String> {
        let body = match self {
            ProviderFailure::Status { status: 503, body } => body,
            ProviderFailure::Loading { body, .. } => body,
            _ => return None,
        };
        match body.get("estimated_time")? {
            Value::Number(n) => Some(format_seconds(n)),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

/// Whole seconds print without a fraction (`20.0` -> `20`).
fn format_seconds(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

impl From<reqwest::Error> for ProviderFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderFailure::Timeout(e.to_string())
        } else if let Some(status) = e.status() {
            ProviderFailure::Status {
                status: status.as_u16(),
                body: Value::Null,
            }
        } else if e.is_connect() || e.is_request() || e.is_body() {
            ProviderFailure::Network(e.to_string())
        } else {
            ProviderFailure::Other(e.to_string())
        }
    }
}

/// How one attempt ended, and therefore what the retry loop does next.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Captioned(String),
    /// Retry after the warm-up delay.
    Warming(ProviderFailure),
    /// Retry after the transient delay.
    Transient(ProviderFailure),
    /// Stop and report.
    Terminal(ProviderFailure),
}

#[derive(Debug, Clone)]
pub struct ProviderAttempt {
    /// 0-based.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    /// Pause taken before the next attempt, if there was one.
    pub wait: Option<Duration>,
}

/// What the browser gets back.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptionResult {
    /// Displayed as-is with status 200; also used for soft failures.
    Caption(String),
    Failed {
        status: StatusCode,
        error: String,
        caption: String,
        details: Option<Value>,
    },
}

impl CaptionResult {
    pub fn status(&self) -> StatusCode {
        match self {
            CaptionResult::Caption(_) => StatusCode::OK,
            CaptionResult::Failed { status, .. } => *status,
        }
    }

    pub fn caption(&self) -> &str {
        match self {
            CaptionResult::Caption(text) => text,
            CaptionResult::Failed { caption, .. } => caption,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptionReport {
    pub result: CaptionResult,
    pub attempts: Vec<ProviderAttempt>,
}

impl CaptionReport {
    /// The model's own caption. `None` for failures, warm-up guidance and
    /// replies nothing could be extracted from.
    pub fn generated_caption(&self) -> Option<&str> {
        let last = self.attempts.last()?;
        match (&self.result, &last.outcome) {
            (CaptionResult::Caption(text), AttemptOutcome::Captioned(_))
                if text != NO_CAPTION_EXTRACTED =>
            {
                Some(text)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn allow_list_is_jpeg_png_webp() {
        assert_eq!(ImageType::from_mime("image/jpeg"), Some(ImageType::Jpeg));
        assert_eq!(ImageType::from_mime("IMAGE/PNG"), Some(ImageType::Png));
        assert_eq!(
            ImageType::from_mime("image/webp; q=0.9"),
            Some(ImageType::WebP)
        );

        for rejected in ["image/gif", "image/bmp", "image/svg+xml", "text/plain", ""] {
            assert_eq!(ImageType::from_mime(rejected), None, "{rejected}");
        }
    }

    #[test]
    fn request_records_size() {
        let request = CaptionRequest::new(Bytes::from_static(b"\xff\xd8\xff"), ImageType::Jpeg);
        assert_eq!(request.size, 3);
        assert_eq!(request.content_type.mime(), "image/jpeg");
    }

    fn report(result: CaptionResult, outcome: AttemptOutcome) -> CaptionReport {
        CaptionReport {
            result,
            attempts: vec![ProviderAttempt {
                attempt: 0,
                outcome,
                wait: None,
            }],
        }
    }

    #[test]
    fn generated_caption_ignores_guidance_and_failures() {
        let real = report(
            CaptionResult::Caption("a cat".into()),
            AttemptOutcome::Captioned("a cat".into()),
        );
        assert_eq!(real.generated_caption(), Some("a cat"));

        let nothing = report(
            CaptionResult::Caption(NO_CAPTION_EXTRACTED.into()),
            AttemptOutcome::Captioned(NO_CAPTION_EXTRACTED.into()),
        );
        assert_eq!(nothing.generated_caption(), None);

        let warm = ProviderFailure::Status {
            status: 503,
            body: json!({ "estimated_time": 20 }),
        };
        let guidance = report(
            CaptionResult::Caption("The model is loading".into()),
            AttemptOutcome::Warming(warm),
        );
        assert_eq!(guidance.generated_caption(), None);
    }

    #[test]
    fn estimated_wait_only_for_warm_up_failures() {
        let warming = ProviderFailure::Status {
            status: 503,
            body: json!({ "error": "Model is loading", "estimated_time": 20.5 }),
        };
        assert_eq!(warming.estimated_wait().as_deref(), Some("20.5"));

        let loading = ProviderFailure::Loading {
            message: "loading".into(),
            body: json!({ "estimated_time": 42 }),
        };
        assert_eq!(loading.estimated_wait().as_deref(), Some("42"));

        let other_status = ProviderFailure::Status {
            status: 500,
            body: json!({ "estimated_time": 20 }),
        };
        assert_eq!(other_status.estimated_wait(), None);

        let whole = ProviderFailure::Status {
            status: 503,
            body: json!({ "estimated_time": 20.0 }),
        };
        assert_eq!(whole.estimated_wait().as_deref(), Some("20"));

        let no_hint = ProviderFailure::Status {
            status: 503,
            body: json!({ "error": "Service Unavailable" }),
        };
        assert_eq!(no_hint.estimated_wait(), None);
    }
}
