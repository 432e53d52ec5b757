use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use tracing::{error, info};

use crate::api::models::{CaptionParams, HealthResponse, PromptReply, ProxyQuery};
use crate::app_state::AppState;
use crate::caption::{CaptionRequest, CaptionResult, Captioner, ImageType};
use crate::error::ProxyError;
use crate::proxy::ImageInspection;
use crate::scratch::ScratchDir;
use crate::translate::{localize, Language, Translator};

/// Multipart field carrying the image.
pub const UPLOAD_FIELD: &str = "files";

/// Optional multipart field carrying the caption language.
pub const LANGUAGE_FIELD: &str = "language";

const INDEX_HTML: &str = include_str!("index.html");

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.captioner.model().to_string(),
    })
}

/// Quick caption with the base model, `{ captions: [{ caption }] }` reply.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CaptionParams>,
    multipart: Multipart,
) -> CaptionResult {
    info!("caption request received");
    run_caption(&state, &state.captioner, params, multipart).await
}

/// Detailed prompt with the large model, `{ caption }` reply.
pub async fn prompt_upload(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CaptionParams>,
    multipart: Multipart,
) -> PromptReply {
    info!("prompt request received");
    PromptReply(run_caption(&state, &state.large_captioner, params, multipart).await)
}

/// Owns the scratch directory for the whole request; it is removed on every path.
async fn run_caption(
    state: &AppState,
    captioner: &Captioner,
    params: CaptionParams,
    multipart: Multipart,
) -> CaptionResult {
    let scratch = match ScratchDir::create(&state.scratch_root).await {
        Ok(scratch) => scratch,
        Err(e) => {
            error!("could not create scratch dir: {}", e);
            return CaptionResult::Failed {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: "Internal server error".into(),
                caption: "The server failed to process the request, please try again".into(),
                details: None,
            };
        }
    };

    let result = caption_upload(captioner, &*state.translator, params, multipart).await;

    scratch.cleanup().await;

    if let CaptionResult::Failed { status, error, .. } = &result {
        error!("caption request failed with {}: {}", status, error);
    }
    result
}

async fn caption_upload(
    captioner: &Captioner,
    translator: &dyn Translator,
    params: CaptionParams,
    mut multipart: Multipart,
) -> CaptionResult {
    let upload = match read_upload(&mut multipart).await {
        Ok(upload) => upload,
        Err(e) => return client_error(e.status(), &format!("Invalid upload: {}", e.body_text())),
    };

    let Some(file) = upload.file else {
        return client_error(StatusCode::BAD_REQUEST, "No file uploaded");
    };

    info!(
        "received file {:?}, type {:?}, {} bytes",
        file.file_name,
        file.content_type,
        file.bytes.len()
    );

    let Some(image_type) = file.content_type.as_deref().and_then(ImageType::from_mime) else {
        return client_error(StatusCode::BAD_REQUEST, "Unsupported file format");
    };

    let language = params
        .language
        .or(upload.language)
        .as_deref()
        .map(Language::parse)
        .unwrap_or_default();

    let request = CaptionRequest::new(file.bytes, image_type);
    let report = captioner.caption(&request).await;

    if language == Language::Chinese {
        if let Some(caption) = report.generated_caption() {
            return CaptionResult::Caption(localize(translator, caption, language).await);
        }
    }
    report.result
}

struct UploadedFile {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Bytes,
}

#[derive(Default)]
struct Upload {
    file: Option<UploadedFile>,
    language: Option<String>,
}

async fn read_upload(multipart: &mut Multipart) -> Result<Upload, MultipartError> {
    let mut upload = Upload::default();

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some(UPLOAD_FIELD) if upload.file.is_none() => {
                let file_name = field.file_name().map(String::from);
                let content_type = field.content_type().map(String::from);
                let bytes = field.bytes().await?;
                upload.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            Some(LANGUAGE_FIELD) => upload.language = Some(field.text().await?),
            _ => {}
        }
    }

    Ok(upload)
}

fn client_error(status: StatusCode, message: &str) -> CaptionResult {
    info!("rejected upload: {}", message);
    CaptionResult::Failed {
        status,
        error: message.to_string(),
        caption: message.to_string(),
        details: None,
    }
}

pub async fn proxy_image(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, ProxyError> {
    let image = state.proxy.fetch(&query.url).await?;

    Ok((
        [
            (header::CONTENT_TYPE, image.content_type),
            (
                header::CACHE_CONTROL,
                "public, max-age=31536000".to_string(),
            ),
        ],
        image.bytes,
    )
        .into_response())
}

pub async fn inspect_image(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProxyQuery>,
) -> Json<ImageInspection> {
    Json(state.proxy.inspect(&query.url).await)
}
