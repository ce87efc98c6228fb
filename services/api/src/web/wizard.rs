//! services/api/src/web/wizard.rs
//!
//! HTTP surface of the create-project wizard. Each browser tab holds one
//! registered wizard session; every mutation schedules a debounced save into
//! the bounded per-tab cache.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storyincolor_core::domain::{ArtStyle, ProductType};
use storyincolor_core::wizard::{Ingest, MoveDirection, WizardSession};
use tracing::warn;
use utoipa::ToSchema;

use crate::media;
use crate::web::error_response;
use crate::web::middleware::CurrentUser;
use crate::web::state::AppState;
use crate::web::submit_task;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWizardRequest {
    /// Resume editing an existing project under its stable id.
    pub project_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WizardPageView {
    pub id: String,
    pub page_number: u32,
    pub has_photo: bool,
    pub photo_name: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WizardView {
    pub wizard_id: String,
    pub project_id: String,
    pub step: String,
    pub title: String,
    pub product_type: String,
    pub art_style: String,
    pub upload_progress: f64,
    pub photo_count: usize,
    pub required_photos: usize,
    pub max_pages: usize,
    pub pages: Vec<WizardPageView>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WizardOptionsRequest {
    pub title: Option<String>,
    pub product_type: Option<String>,
    pub art_style: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub accepted: usize,
    pub skipped: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct MovePageRequest {
    pub direction: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub project_id: String,
    pub page_count: usize,
    pub failed_uploads: usize,
}

fn wizard_view(wizard_id: &str, session: &WizardSession) -> WizardView {
    WizardView {
        wizard_id: wizard_id.to_string(),
        project_id: session.project_id.clone(),
        step: session.step.as_str().to_string(),
        title: session.title.clone(),
        product_type: session.product_type.as_str().to_string(),
        art_style: session.art_style.as_str().to_string(),
        upload_progress: session.upload_progress,
        photo_count: session.photo_count(),
        required_photos: session.product_type.required_photos(),
        max_pages: session.product_type.max_pages(),
        pages: session
            .pages
            .iter()
            .map(|page| WizardPageView {
                id: page.id.clone(),
                page_number: page.page_number,
                has_photo: page.photo.is_some(),
                photo_name: page.photo.as_ref().map(|photo| photo.name.clone()),
            })
            .collect(),
    }
}

fn wizard_not_found() -> (StatusCode, String) {
    (
        StatusCode::NOT_FOUND,
        "Wizard session not found".to_string(),
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /wizard - Start (or resume) a wizard session.
pub async fn create_wizard_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateWizardRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = match req.project_id {
        Some(project_id) => WizardSession::for_project(&project_id),
        None => WizardSession::new(),
    };
    let wizard_id = state.wizards.create(session.clone());
    state.wizard_cache.save(&wizard_id, &session);
    Ok((StatusCode::CREATED, Json(wizard_view(&wizard_id, &session))))
}

/// GET /wizard/{id} - Current wizard state.
///
/// A tab reload loses the live session; the persisted metadata is restored
/// from the cache when available. Photo bytes are gone at that point and
/// must be re-uploaded.
pub async fn get_wizard_handler(
    State(state): State<Arc<AppState>>,
    Path(wizard_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = match state.wizards.get(&wizard_id) {
        Some(session) => session,
        None => {
            let restored = state
                .wizard_cache
                .restore(&wizard_id)
                .ok_or_else(wizard_not_found)?;
            state.wizards.insert(&wizard_id, restored)
        }
    };
    let snapshot = session.lock().await;
    Ok(Json(wizard_view(&wizard_id, &snapshot)))
}

/// PATCH /wizard/{id}/options - Set title, product type, and/or art style.
pub async fn set_options_handler(
    State(state): State<Arc<AppState>>,
    Path(wizard_id): Path<String>,
    Json(req): Json<WizardOptionsRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state.wizards.get(&wizard_id).ok_or_else(wizard_not_found)?;
    {
        let mut guard = session.lock().await;
        if let Some(title) = req.title {
            guard.title = title;
        }
        if let Some(product_type) = req.product_type {
            guard.product_type = ProductType::parse(&product_type);
        }
        if let Some(art_style) = req.art_style {
            guard.art_style = ArtStyle::parse(&art_style);
        }
    }
    state.wizard_cache.save_debounced(&wizard_id, &session);
    let snapshot = session.lock().await;
    Ok(Json(wizard_view(&wizard_id, &snapshot)))
}

/// POST /wizard/{id}/photos - Ingest photos (multipart).
///
/// Non-image parts are silently skipped. Each accepted photo is converted to
/// a bounded-resolution preview for in-session display; the preview is what
/// gets uploaded at submission time.
pub async fn add_photos_handler(
    State(state): State<Arc<AppState>>,
    Path(wizard_id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state.wizards.get(&wizard_id).ok_or_else(wizard_not_found)?;

    let mut accepted = 0;
    let mut skipped = 0;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read multipart data: {e}"),
        )
    })? {
        let name = field.file_name().unwrap_or("untitled.jpg").to_string();
        let content_type = field.content_type().unwrap_or("").to_string();
        let data = field.bytes().await.map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to read file bytes: {e}"),
            )
        })?;

        if !WizardSession::accepts_content_type(&content_type) {
            skipped += 1;
            continue;
        }

        // Preview generation failure falls back to the raw bytes rather than
        // rejecting the photo.
        let preview = match media::preview_thumbnail(&data) {
            Ok(preview) => preview,
            Err(err) => {
                warn!(file = name.as_str(), error = %err, "Error creating preview");
                data.to_vec()
            }
        };

        let mut guard = session.lock().await;
        match guard.ingest_photo(&name, &content_type, preview) {
            Ingest::Accepted { .. } => accepted += 1,
            Ingest::Skipped => skipped += 1,
        }
    }

    state.wizard_cache.save_debounced(&wizard_id, &session);
    Ok(Json(IngestResponse { accepted, skipped }))
}

/// DELETE /wizard/{id}/photos/{photo_id} - Remove a photo and its page.
pub async fn remove_photo_handler(
    State(state): State<Arc<AppState>>,
    Path((wizard_id, photo_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state.wizards.get(&wizard_id).ok_or_else(wizard_not_found)?;
    let removed = session.lock().await.remove_photo(&photo_id);
    if !removed {
        return Err((StatusCode::NOT_FOUND, "Photo not found".to_string()));
    }
    state.wizard_cache.save_debounced(&wizard_id, &session);
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /wizard/{id}/pages/{page_id} - Remove a page.
pub async fn remove_page_handler(
    State(state): State<Arc<AppState>>,
    Path((wizard_id, page_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state.wizards.get(&wizard_id).ok_or_else(wizard_not_found)?;
    let removed = session.lock().await.remove_page(&page_id);
    if !removed {
        return Err((StatusCode::NOT_FOUND, "Page not found".to_string()));
    }
    state.wizard_cache.save_debounced(&wizard_id, &session);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /wizard/{id}/pages/{page_id}/move - Swap a page with its neighbor.
pub async fn move_page_handler(
    State(state): State<Arc<AppState>>,
    Path((wizard_id, page_id)): Path<(String, String)>,
    Json(req): Json<MovePageRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let direction = match req.direction.as_str() {
        "left" => MoveDirection::Left,
        "right" => MoveDirection::Right,
        other => {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unknown direction '{other}'"),
            ))
        }
    };
    let session = state.wizards.get(&wizard_id).ok_or_else(wizard_not_found)?;
    session.lock().await.move_page(&page_id, direction);
    state.wizard_cache.save_debounced(&wizard_id, &session);
    let snapshot = session.lock().await;
    Ok(Json(wizard_view(&wizard_id, &snapshot)))
}

/// POST /wizard/{id}/next - Advance one step; guard failures surface inline.
pub async fn advance_handler(
    State(state): State<Arc<AppState>>,
    Path(wizard_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state.wizards.get(&wizard_id).ok_or_else(wizard_not_found)?;
    session.lock().await.advance().map_err(error_response)?;
    state.wizard_cache.save_debounced(&wizard_id, &session);
    let snapshot = session.lock().await;
    Ok(Json(wizard_view(&wizard_id, &snapshot)))
}

/// POST /wizard/{id}/back - Go back one step (unguarded).
pub async fn back_handler(
    State(state): State<Arc<AppState>>,
    Path(wizard_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state.wizards.get(&wizard_id).ok_or_else(wizard_not_found)?;
    session.lock().await.back();
    state.wizard_cache.save_debounced(&wizard_id, &session);
    let snapshot = session.lock().await;
    Ok(Json(wizard_view(&wizard_id, &snapshot)))
}

/// POST /wizard/{id}/submit - Flush the wizard into a project record.
#[utoipa::path(
    post,
    path = "/wizard/{id}/submit",
    params(("id" = String, Path, description = "The wizard session id")),
    responses(
        (status = 200, description = "Project submitted for preview", body = SubmitResponse),
        (status = 400, description = "Submission guard failed"),
        (status = 404, description = "Wizard session not found")
    )
)]
pub async fn submit_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(wizard_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state.wizards.get(&wizard_id).ok_or_else(wizard_not_found)?;
    let outcome = {
        let mut guard = session.lock().await;
        submit_task::submit_project(&state, &user, &mut guard)
            .await
            .map_err(error_response)?
    };

    // The staging state has been flushed into the project record.
    state.wizards.remove(&wizard_id);
    state.wizard_cache.forget(&wizard_id);

    Ok(Json(SubmitResponse {
        project_id: outcome.project_id,
        page_count: outcome.page_count,
        failed_uploads: outcome.failed_uploads,
    }))
}
