use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::warn;

use crate::api::handlers::{health, index, inspect_image, prompt_upload, proxy_image, upload};
use crate::config::Config;
use crate::AppState;

pub fn create_router(state: Arc<AppState>, config: &Config) -> Router {
    let router = Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/blip/upload", post(upload))
        .route("/api/joycaption/upload", post(prompt_upload))
        .route("/api/interrogator/upload", post(prompt_upload))
        .route("/api/proxy/image", get(proxy_image))
        .route("/api/test/image", get(inspect_image))
        .layer(DefaultBodyLimit::max(config.upload_limit));

    let router = match &config.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("ignoring CORS origin {:?}: {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
