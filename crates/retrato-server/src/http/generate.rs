use std::time::Instant;

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use retrato_core::{sha256_hex, GenerationId};
use retrato_model::{Generation, GenerationStatus, PortraitStyle};
use retrato_store::Bucket;
use serde_json::json;
use tracing::{error, info, warn};

use super::support::{finish, propagated_request_id};
use crate::error::{ApiError, ApiErrorCode};
use crate::{watermark, AppState};

const ROUTE: &str = "/v1/generate";
const PREVIEW_ROUTE: &str = "/v1/preview";

const ACCEPTED_MIME: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

pub(crate) async fn generate_handler(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    multipart: Multipart,
) -> Response {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let outcome = tokio::time::timeout(
        state.api.request_timeout,
        run_generate(&state, multipart, &request_id),
    )
    .await
    .unwrap_or_else(|_| {
        Err(ApiError::upstream(
            "portrait generation timed out",
            &request_id,
        ))
    });
    let response = match outcome {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    };
    finish(&state, ROUTE, started, &request_id, response).await
}

struct Upload {
    bytes: Vec<u8>,
    mime: String,
    style: PortraitStyle,
}

async fn read_upload(
    mut multipart: Multipart,
    request_id: &str,
) -> Result<Upload, ApiError> {
    let mut image: Option<(Vec<u8>, String)> = None;
    let mut style_input = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid(format!("malformed multipart body: {e}"), request_id))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let mime = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::new(
                        ApiErrorCode::PayloadTooLarge,
                        format!("image upload failed: {e}"),
                        request_id,
                    )
                })?;
                image = Some((bytes.to_vec(), mime));
            }
            Some("style") => {
                style_input = field.text().await.unwrap_or_default();
            }
            _ => {}
        }
    }

    let (bytes, mime) =
        image.ok_or_else(|| ApiError::invalid("no image provided", request_id))?;
    if !ACCEPTED_MIME.contains(&mime.as_str()) {
        return Err(ApiError::invalid(
            "unsupported image format; use JPEG, PNG or WebP",
            request_id,
        ));
    }
    Ok(Upload {
        bytes,
        mime,
        style: PortraitStyle::from_input(&style_input),
    })
}

async fn run_generate(
    state: &AppState,
    multipart: Multipart,
    request_id: &str,
) -> Result<serde_json::Value, ApiError> {
    let upload = read_upload(multipart, request_id).await?;
    if upload.bytes.len() > state.api.max_upload_bytes {
        return Err(ApiError::new(
            ApiErrorCode::PayloadTooLarge,
            "image exceeds the upload limit",
            request_id,
        ));
    }

    let id = GenerationId::generate();
    let extension = if upload.mime == "image/png" { "png" } else { "jpg" };
    let original_key = format!("{id}/original.{extension}");

    state
        .media
        .put(Bucket::Originals, &original_key, &upload.bytes)
        .map_err(|e| ApiError::internal(format!("failed to store original: {e}"), request_id))?;

    let generation = Generation {
        id,
        style: upload.style,
        status: GenerationStatus::Generating,
        original_path: original_key,
        generated_path: None,
        watermarked_path: None,
        created_at: Utc::now(),
    };
    state
        .db
        .insert_generation(&generation)
        .map_err(|e| ApiError::internal(format!("failed to record generation: {e}"), request_id))?;

    info!(generation = %id, style = %upload.style, "portrait render start");
    let rendered = match state
        .engine
        .render(&upload.bytes, &upload.mime, upload.style)
        .await
    {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(generation = %id, "portrait render failed: {err}");
            if let Err(store_err) = state.db.set_generation_status(id, GenerationStatus::Failed) {
                warn!(generation = %id, "failed to mark generation failed: {store_err}");
            }
            return Err(ApiError::upstream(
                format!("portrait generation failed: {err}"),
                request_id,
            ));
        }
    };

    let watermark_text = state.api.watermark_text.clone();
    let rendered_for_overlay = rendered.clone();
    let watermarked = tokio::task::spawn_blocking(move || {
        watermark::apply_watermark(&rendered_for_overlay, &watermark_text)
    })
    .await
    .map_err(|e| ApiError::internal(format!("watermark task failed: {e}"), request_id))?
    .map_err(|e| {
        if let Err(store_err) = state.db.set_generation_status(id, GenerationStatus::Failed) {
            warn!(generation = %id, "failed to mark generation failed: {store_err}");
        }
        ApiError::internal(format!("watermarking failed: {e}"), request_id)
    })?;

    let clean_key = format!("{id}/clean.jpg");
    let preview_key = format!("{id}/preview.jpg");
    state
        .media
        .put(Bucket::Generated, &clean_key, &rendered)
        .map_err(|e| ApiError::internal(format!("failed to store portrait: {e}"), request_id))?;
    state
        .media
        .put(Bucket::Watermarked, &preview_key, &watermarked)
        .map_err(|e| ApiError::internal(format!("failed to store preview: {e}"), request_id))?;

    state
        .db
        .complete_generation(id, &clean_key, &preview_key)
        .map_err(|e| ApiError::internal(format!("failed to finish generation: {e}"), request_id))?;
    info!(generation = %id, "portrait render complete");

    let preview_url = format!(
        "{}{}/{id}",
        state.api.public_base_url.trim_end_matches('/'),
        PREVIEW_ROUTE
    );
    Ok(json!({
        "generation_id": id,
        "preview_url": preview_url,
    }))
}

/// Public preview of a completed generation; the watermarked copy is the
/// only one served without a signature.
pub(crate) async fn preview_handler(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let response = match run_preview(&state, &id, &request_id) {
        Ok(bytes) => {
            let etag = format!("\"{}\"", sha256_hex(&bytes));
            let if_none_match = headers
                .get("if-none-match")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let mut response = if if_none_match.as_deref() == Some(etag.as_str()) {
                StatusCode::NOT_MODIFIED.into_response()
            } else {
                let mut response = (StatusCode::OK, bytes).into_response();
                response
                    .headers_mut()
                    .insert("content-type", HeaderValue::from_static("image/jpeg"));
                response
            };
            if let Ok(value) = HeaderValue::from_str(&etag) {
                response.headers_mut().insert("etag", value);
            }
            if let Ok(value) = HeaderValue::from_str("public, max-age=86400") {
                response.headers_mut().insert("cache-control", value);
            }
            response
        }
        Err(err) => err.into_response(),
    };
    finish(&state, PREVIEW_ROUTE, started, &request_id, response).await
}

fn run_preview(state: &AppState, id: &str, request_id: &str) -> Result<Vec<u8>, ApiError> {
    let id = GenerationId::parse(id)
        .map_err(|e| ApiError::invalid(e.to_string(), request_id))?;
    let generation = state
        .db
        .generation(id)
        .map_err(|e| ApiError::internal(e.to_string(), request_id))?
        .ok_or_else(|| ApiError::not_found("generation", request_id))?;
    let preview_key = generation
        .watermarked_path
        .ok_or_else(|| ApiError::not_found("preview", request_id))?;
    state
        .media
        .get(Bucket::Watermarked, &preview_key)
        .map_err(|_| ApiError::not_found("preview", request_id))
}
