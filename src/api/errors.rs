use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::AppError;

/// Machine-readable code for a cursor that points at a deleted recipe.
pub const UNRESOLVABLE_CURSOR_CODE: &str = "unresolvable_cursor";

/// Converts AppError into an HTTP response with a `{"error": ...}` body.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match &self {
            AppError::Validation { missing } => serde_json::json!({
                "error": self.to_string(),
                "missing": missing,
            }),
            AppError::UnresolvableCursor(cursor) => serde_json::json!({
                "error": format!("Cursor '{}' no longer points at a recipe", cursor),
                "code": UNRESOLVABLE_CURSOR_CODE,
            }),
            AppError::NotFound(msg) | AppError::BadRequest(msg) | AppError::Auth(msg) => {
                serde_json::json!({ "error": msg })
            }
            AppError::Database(msg) => serde_json::json!({
                "error": format!("Database error: {}", msg)
            }),
            AppError::Storage(msg) => serde_json::json!({
                "error": format!("Storage error: {}", msg)
            }),
            AppError::Internal(msg) => serde_json::json!({ "error": msg }),
        };

        if status_of(&self).is_server_error() {
            tracing::error!("Request failed: {self}");
        }

        (status_of(&self), axum::Json(body)).into_response()
    }
}

fn status_of(error: &AppError) -> StatusCode {
    match error {
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::BadRequest(_) | AppError::Validation { .. } | AppError::UnresolvableCursor(_) => {
            StatusCode::BAD_REQUEST
        }
        AppError::Auth(_) => StatusCode::UNAUTHORIZED,
        AppError::Database(_) | AppError::Storage(_) | AppError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
