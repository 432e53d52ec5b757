use std::path::PathBuf;
use std::sync::Arc;

use crate::caption::{CaptionProvider, Captioner, HuggingFaceProvider};
use crate::config::Config;
use crate::proxy::ImageProxy;
use crate::translate::{HuggingFaceTranslator, Translator};

pub struct AppState {
    /// BLIP base, behind the quick caption route.
    pub captioner: Captioner,
    /// BLIP large, behind the detailed-prompt routes.
    pub large_captioner: Captioner,
    pub translator: Arc<dyn Translator>,
    pub proxy: ImageProxy,
    pub scratch_root: PathBuf,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;

        let hosted = |url: &str| -> Arc<dyn CaptionProvider> {
            Arc::new(HuggingFaceProvider::new(
                client.clone(),
                url,
                &config.api_key,
                config.request_timeout,
            ))
        };
        let base = hosted(&config.api_url);
        let large = hosted(&config.large_api_url);

        let mut state = Self::with_provider(config, base, client.clone());
        state.large_captioner = Captioner::new(large, config.retry);
        Ok(state)
    }

    /// Both captioners share `provider`; translation and proxying use `client`.
    pub fn with_provider(
        config: &Config,
        provider: Arc<dyn CaptionProvider>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            captioner: Captioner::new(provider.clone(), config.retry),
            large_captioner: Captioner::new(provider, config.retry),
            translator: Arc::new(HuggingFaceTranslator::new(
                client.clone(),
                &config.translate_api_url,
                &config.api_key,
                config.request_timeout,
            )),
            proxy: ImageProxy::new(client, config.proxy_timeout, config.proxy_max_bytes),
            scratch_root: config.scratch_root.clone(),
        }
    }
}
