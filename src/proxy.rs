//! Fetches remote images on behalf of the browser, which cannot read them
//! directly because of CORS, and diagnoses URLs that fail to load.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::body::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ProxyError;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];

#[derive(Debug, Clone)]
pub struct ProxiedImage {
    pub content_type: String,
    pub bytes: Bytes,
}

/// Diagnostic report for an image URL. Failures are reported in `error`,
/// never as an HTTP error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageInspection {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_detected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct ImageProxy {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl ImageProxy {
    pub fn new(client: reqwest::Client, timeout: Duration, max_bytes: usize) -> Self {
        Self {
            client,
            timeout,
            max_bytes,
        }
    }

    pub async fn fetch(&self, raw_url: &str) -> Result<ProxiedImage, ProxyError> {
        let url = normalize_url(raw_url)?;
        info!("proxying image {}", url);

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let content_type = resolve_content_type(declared.as_deref(), url)?;

        if let Some(len) = response.content_length() {
            if len > self.max_bytes as u64 {
                return Err(ProxyError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let bytes = response.bytes().await?;
        if bytes.len() > self.max_bytes {
            return Err(ProxyError::TooLarge {
                limit: self.max_bytes,
            });
        }

        Ok(ProxiedImage {
            content_type,
            bytes,
        })
    }

    /// Fetches `raw_url` and reports what came back, without relaying the body.
    pub async fn inspect(&self, raw_url: &str) -> ImageInspection {
        let url = match normalize_url(raw_url) {
            Ok(url) => url,
            Err(e) => {
                return ImageInspection {
                    url: raw_url.trim().trim_start_matches('@').to_string(),
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        };

        let response = match self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return ImageInspection {
                    url: url.to_string(),
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        };

        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let header = |name: &str| {
            headers
                .get(name)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string())
        };
        let content_type = header(CONTENT_TYPE.as_str());
        let content_length = header(CONTENT_LENGTH.as_str());

        let declared = headers.get(CONTENT_TYPE.as_str()).map(String::as_str);
        let (image_detected, image_format, error) = match resolve_content_type(declared, url) {
            Ok(mime) => {
                let format = mime.trim_start_matches("image/").to_ascii_uppercase();
                (true, format, None)
            }
            Err(e) => (false, "unknown".to_string(), Some(e.to_string())),
        };

        ImageInspection {
            url: url.to_string(),
            status_code: Some(response.status().as_u16()),
            headers: Some(headers),
            content_type: Some(content_type),
            content_length: Some(content_length),
            image_detected: Some(image_detected),
            image_format: Some(image_format),
            error,
        }
    }
}

/// Strips a stray leading `@` (pasted from chat apps) and insists on http(s).
fn normalize_url(raw: &str) -> Result<&str, ProxyError> {
    let url = raw.trim();
    let url = url.strip_prefix('@').unwrap_or(url);
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url)
    } else {
        Err(ProxyError::InvalidScheme)
    }
}

/// Trusts an `image/*` header, otherwise falls back to the URL's extension.
fn resolve_content_type(declared: Option<&str>, url: &str) -> Result<String, ProxyError> {
    if let Some(declared) = declared {
        let essence = declared.split(';').next().unwrap_or_default().trim();
        if essence.to_ascii_lowercase().starts_with("image/") {
            return Ok(essence.to_string());
        }
    }

    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .ok_or(ProxyError::NotAnImage)?;

    Ok(match ext.as_str() {
        "jpg" => "image/jpeg".to_string(),
        other => format!("image/{other}"),
    })
}
