//! services/api/src/web/upload_proxy.rs
//!
//! Development-only upload proxy: accepts a multipart file + destination path
//! + content type and uploads through an elevated-privilege storage handle,
//! working around browser CORS restrictions against the storage collaborator.
//! Not mounted in production.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::web::error_response;
use crate::web::state::AppState;

/// POST /api/upload - multipart `file`, `path`, and optional `contentType`.
pub async fn upload_proxy_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !state.config.enable_upload_proxy {
        return Err((StatusCode::NOT_FOUND, "Not found".to_string()));
    }

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut path: Option<String> = None;
    let mut content_type: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read multipart data: {e}"),
        )
    })? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let declared = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Failed to read file bytes: {e}"),
                    )
                })?;
                file = Some((declared.unwrap_or_else(|| "application/octet-stream".to_string()), data.to_vec()));
            }
            Some("path") => {
                path = Some(field.text().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Invalid path field: {e}"))
                })?);
            }
            Some("contentType") => {
                content_type = Some(field.text().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Invalid contentType field: {e}"),
                    )
                })?);
            }
            _ => {}
        }
    }

    let (declared_type, bytes) =
        file.ok_or((StatusCode::BAD_REQUEST, "No file provided".to_string()))?;
    let path = path.ok_or((StatusCode::BAD_REQUEST, "No path provided".to_string()))?;
    let content_type = content_type.unwrap_or(declared_type);

    let stored = state
        .assets
        .upload(&path, bytes, &content_type, None)
        .await
        .map_err(error_response)?;

    info!(path = stored.path.as_str(), "Upload proxy stored object");
    Ok(Json(json!({
        "success": true,
        "url": stored.url,
        "path": stored.path,
    })))
}
