use axum::extract::{Multipart, Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::app::AppState;
use crate::auth::models::Caller;
use crate::error::AppError;
use crate::storage::client::{IMAGE_KEY_PREFIX, IMAGE_URL_PREFIX};

/// Response from a successful image upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Path the image is served from; store it as the recipe's `imageUrl`.
    pub url: String,
}

/// Reduce an uploaded file name to characters safe in a storage key and a URL.
fn sanitize_file_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".svg") {
        "image/svg+xml"
    } else {
        "application/octet-stream"
    }
}

/// Axum handler for `POST /api/v1/images`.
///
/// Accepts a multipart form with a single image field named "file".
pub async fn upload_image_handler(
    State(state): State<AppState>,
    caller: Caller,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let user = caller.require_user()?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = sanitize_file_name(field.file_name().unwrap_or("upload.bin"));
        let content_type = field.content_type().unwrap_or("application/octet-stream");
        if !content_type.starts_with("image/") {
            return Err(AppError::BadRequest("Only image files are allowed".into()));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;

        let stored_name = format!("{}_{}", uuid::Uuid::new_v4().simple(), file_name);
        let key = format!("{IMAGE_KEY_PREFIX}{stored_name}");
        state.storage_client.put_object(&key, data.to_vec()).await?;

        tracing::info!(user = %user.user_id, "Stored recipe image '{}'", key);
        return Ok(Json(UploadResponse {
            url: format!("{IMAGE_URL_PREFIX}{stored_name}"),
        }));
    }

    Err(AppError::BadRequest("No file field found in request".into()))
}

/// Axum handler for `GET /api/v1/images/{filename}`.
pub async fn serve_image_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let key = format!("{IMAGE_KEY_PREFIX}{filename}");

    let data = state
        .storage_client
        .get_object(&key)
        .await?
        .ok_or_else(|| AppError::NotFound("Image not found".into()))?;

    Ok(([(CONTENT_TYPE, content_type_for(&filename))], data).into_response())
}
