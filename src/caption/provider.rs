use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::debug;

use super::ProviderFailure;

/// A hosted captioning model.
///
/// `caption` returns the decoded body of a 2xx answer untouched; reading it is
/// left to [`super::classify`]. Non-2xx answers and transport problems come
/// back as [`ProviderFailure`].
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    fn model(&self) -> &str;

    async fn caption(&self, image: Bytes) -> Result<Value, ProviderFailure>;
}

/// Hugging Face inference API, raw bytes in, `[{ "generated_text": ... }]` out.
pub struct HuggingFaceProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl HuggingFaceProvider {
    pub fn new(client: reqwest::Client, url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CaptionProvider for HuggingFaceProvider {
    fn model(&self) -> &str {
        &self.url
    }

    async fn caption(&self, image: Bytes) -> Result<Value, ProviderFailure> {
        debug!("sending {} bytes to {}", image.len(), self.url);

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .body(image)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        debug!(
            "provider answered {}: {}",
            status,
            text.chars().take(500).collect::<String>()
        );

        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        if !status.is_success() {
            return Err(ProviderFailure::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}
