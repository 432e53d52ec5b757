use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::caption::RetryPolicy;
use crate::error::ConfigError;

pub const DEFAULT_BLIP_API_URL: &str =
    "https://api-inference.huggingface.co/models/Salesforce/blip-image-captioning-base";

pub const DEFAULT_BLIP_LARGE_API_URL: &str =
    "https://api-inference.huggingface.co/models/Salesforce/blip-image-captioning-large";

pub const DEFAULT_TRANSLATE_API_URL: &str =
    "https://api-inference.huggingface.co/models/Helsinki-NLP/opus-mt-en-zh";

const TEN_MIB: usize = 10 * 1024 * 1024;

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_url: String,
    /// Model behind the detailed-prompt routes.
    pub large_api_url: String,
    pub translate_api_url: String,
    pub bind_addr: SocketAddr,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub upload_limit: usize,
    pub proxy_timeout: Duration,
    pub proxy_max_bytes: usize,
    pub cors_origins: Vec<String>,
    pub static_dir: Option<PathBuf>,
    pub scratch_root: PathBuf,
}

impl Config {
    /// Reads the process environment. Load `.env` before calling this.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("HUGGINGFACE_API_KEY").ok_or(ConfigError::MissingApiKey)?;

        let api_url = get("BLIP_API_URL").unwrap_or_else(|| DEFAULT_BLIP_API_URL.to_string());

        let large_api_url = get("BLIP_LARGE_API_URL")
            .unwrap_or_else(|| DEFAULT_BLIP_LARGE_API_URL.to_string());

        let translate_api_url = get("TRANSLATE_API_URL")
            .unwrap_or_else(|| DEFAULT_TRANSLATE_API_URL.to_string());

        let bind_addr = parse_or(
            "BIND_ADDR",
            get("BIND_ADDR"),
            SocketAddr::from(([0, 0, 0, 0], 3000)),
        )?;

        let retry = RetryPolicy {
            max_retries: parse_or("MAX_RETRIES", get("MAX_RETRIES"), 2u32)?,
            transient_delay: Duration::from_millis(parse_or(
                "TRANSIENT_RETRY_DELAY_MS",
                get("TRANSIENT_RETRY_DELAY_MS"),
                3000u64,
            )?),
            warmup_delay: Duration::from_millis(parse_or(
                "WARMUP_RETRY_DELAY_MS",
                get("WARMUP_RETRY_DELAY_MS"),
                5000u64,
            )?),
        };

        let request_timeout = Duration::from_secs(parse_or(
            "REQUEST_TIMEOUT_SECS",
            get("REQUEST_TIMEOUT_SECS"),
            60u64,
        )?);

        let proxy_timeout = Duration::from_secs(parse_or(
            "PROXY_TIMEOUT_SECS",
            get("PROXY_TIMEOUT_SECS"),
            15u64,
        )?);

        let cors_origins = get("CORS_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            api_key,
            api_url,
            large_api_url,
            translate_api_url,
            bind_addr,
            retry,
            request_timeout,
            upload_limit: parse_or("UPLOAD_LIMIT_BYTES", get("UPLOAD_LIMIT_BYTES"), TEN_MIB)?,
            proxy_timeout,
            proxy_max_bytes: parse_or("PROXY_MAX_BYTES", get("PROXY_MAX_BYTES"), TEN_MIB)?,
            cors_origins,
            static_dir: get("STATIC_DIR").map(PathBuf::from),
            scratch_root: get("SCRATCH_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
        })
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: format!("{value:?}: {e}"),
        }),
        None => Ok(default),
    }
}
