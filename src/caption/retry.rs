use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::Value;
use tracing::{error, info, warn};

use super::{
    AttemptOutcome, CaptionProvider, CaptionReport, CaptionRequest, CaptionResult,
    ProviderAttempt, ProviderFailure, RetryPolicy, NO_CAPTION_EXTRACTED,
};

/// Runs the bounded retry loop against one provider.
#[derive(Clone)]
pub struct Captioner {
    provider: Arc<dyn CaptionProvider>,
    policy: RetryPolicy,
}

impl Captioner {
    pub fn new(provider: Arc<dyn CaptionProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Makes at most `max_retries + 1` sequential attempts. The last failure
    /// seen decides the reported error.
    pub async fn caption(&self, request: &CaptionRequest) -> CaptionReport {
        let max_retries = self.policy.max_retries;
        let mut attempts = Vec::new();
        let mut last_failure = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                info!("retry {} of {}", attempt, max_retries);
            }

            let outcome = classify(self.provider.caption(request.bytes.clone()).await);

            let has_next = attempt < max_retries;
            let wait = match &outcome {
                AttemptOutcome::Warming(_) if has_next => Some(self.policy.warmup_delay),
                AttemptOutcome::Transient(_) if has_next => Some(self.policy.transient_delay),
                _ => None,
            };

            attempts.push(ProviderAttempt {
                attempt,
                outcome: outcome.clone(),
                wait,
            });

            match outcome {
                AttemptOutcome::Captioned(caption) => {
                    info!("caption generated on attempt {}: {}", attempt, caption);
                    return CaptionReport {
                        result: CaptionResult::Caption(caption),
                        attempts,
                    };
                }
                AttemptOutcome::Terminal(failure) => {
                    error!("attempt {} failed, not retrying: {}", attempt, failure);
                    last_failure = Some(failure);
                    break;
                }
                AttemptOutcome::Warming(failure) | AttemptOutcome::Transient(failure) => {
                    warn!("attempt {} failed: {}", attempt, failure);
                    last_failure = Some(failure);
                }
            }

            if let Some(wait) = wait {
                tokio::time::sleep(wait).await;
            }
        }

        CaptionReport {
            result: finalize(last_failure),
            attempts,
        }
    }
}

/// Decides what one provider reply means for the retry loop.
pub fn classify(reply: Result<Value, ProviderFailure>) -> AttemptOutcome {
    match reply {
        Ok(body) => classify_body(body),
        Err(failure @ (ProviderFailure::Timeout(_) | ProviderFailure::Network(_))) => {
            AttemptOutcome::Transient(failure)
        }
        Err(failure @ ProviderFailure::Status { status: 503, .. })
        | Err(failure @ ProviderFailure::Loading { .. }) => AttemptOutcome::Warming(failure),
        Err(failure) => AttemptOutcome::Terminal(failure),
    }
}

fn classify_body(body: Value) -> AttemptOutcome {
    let generated = body
        .as_array()
        .and_then(|items| items.first())
        .and_then(|first| first.get("generated_text"))
        .and_then(Value::as_str);
    if let Some(caption) = generated {
        return AttemptOutcome::Captioned(caption.to_string());
    }

    let message = body.as_object().and_then(|o| o.get("error")).map(|e| match e {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });

    match message {
        Some(message) if is_warming_up(&message) => {
            AttemptOutcome::Warming(ProviderFailure::Loading { message, body })
        }
        Some(message) => AttemptOutcome::Terminal(ProviderFailure::Rejected { message, body }),
        None => {
            warn!("could not extract a caption from provider body: {}", body);
            AttemptOutcome::Captioned(NO_CAPTION_EXTRACTED.to_string())
        }
    }
}

fn is_warming_up(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("loading") || message.contains("starting")
}

/// Turns the last failure of an unsuccessful run into the reply for the browser.
pub fn finalize(last_failure: Option<ProviderFailure>) -> CaptionResult {
    let Some(failure) = last_failure else {
        return CaptionResult::Failed {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Unknown error".into(),
            caption: "Caption generation failed: unknown error, please try again".into(),
            details: None,
        };
    };

    // A known wait is guidance for the user, not a failure.
    if let Some(wait) = failure.estimated_wait() {
        return CaptionResult::Caption(format!(
            "The model is loading, estimated wait time: {wait} seconds. Please try again shortly."
        ));
    }

    match failure {
        ProviderFailure::Timeout(_) => CaptionResult::Failed {
            status: StatusCode::REQUEST_TIMEOUT,
            error: "Request timed out".into(),
            caption: "Caption generation failed: the model timed out. Try a smaller image or retry later."
                .into(),
            details: None,
        },
        ProviderFailure::Loading { message, body } | ProviderFailure::Rejected { message, body } => {
            CaptionResult::Failed {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: format!("Hugging Face API error: {message}"),
                caption: format!("Caption generation failed: {message}"),
                details: Some(body),
            }
        }
        ProviderFailure::Status { status, body } => CaptionResult::Failed {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            error: format!("API error: {status}"),
            caption: format!("Caption generation failed: API error {status}"),
            details: Some(body),
        },
        ProviderFailure::Network(message) | ProviderFailure::Other(message) => {
            CaptionResult::Failed {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: format!("Failed to call captioning API: {message}"),
                caption: format!("Caption generation failed: {message}"),
                details: None,
            }
        }
    }
}
