//! Optional English -> Chinese translation of generated captions.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::TranslateError;

/// Caption language requested by the client. Only `zh` triggers translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    Chinese,
}

impl Language {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("zh") {
            Language::Chinese
        } else {
            Language::English
        }
    }
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

/// Helsinki-NLP `opus-mt-en-zh` on the Hugging Face inference API.
pub struct HuggingFaceTranslator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl HuggingFaceTranslator {
    pub fn new(client: reqwest::Client, url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Translation {
    translation_text: String,
}

#[async_trait]
impl Translator for HuggingFaceTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let translations: Vec<Translation> = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&json!({ "inputs": text }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        translations
            .into_iter()
            .next()
            .map(|t| t.translation_text)
            .ok_or(TranslateError::Empty)
    }
}

/// Translates `caption` when asked to. Any failure keeps the original text.
pub async fn localize(translator: &dyn Translator, caption: &str, language: Language) -> String {
    if language != Language::Chinese {
        return caption.to_string();
    }

    match translator.translate(caption).await {
        Ok(translated) => {
            info!("translated caption: {}", translated);
            translated
        }
        Err(e) => {
            warn!("translation failed, keeping original caption: {}", e);
            caption.to_string()
        }
    }
}
