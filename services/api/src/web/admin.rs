//! services/api/src/web/admin.rs
//!
//! The admin fulfillment endpoints. Access is gated by the injected
//! `AdminPolicy`: non-members and anonymous callers get an explicit
//! access-denied response, never the data.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::web::error_response;
use crate::web::fulfillment_task::{self, AdminUserGroup};
use crate::web::middleware::CurrentUser;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminProjectResponse {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub product_type: String,
    pub art_style: String,
    pub status: String,
    pub first_page_id: Option<String>,
    pub first_page_path: Option<String>,
    pub first_page_url: Option<String>,
    pub processed_image_path: Option<String>,
    pub processed_image_url: Option<String>,
    pub has_processed_image: bool,
    pub notification_sent: bool,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminGroupResponse {
    pub user_id: String,
    pub user_email: String,
    pub projects: Vec<AdminProjectResponse>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttachResponse {
    pub processed_image_path: String,
    pub processed_image_url: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    pub user_email: String,
    /// The send is an irreversible external side effect; the operator must
    /// confirm it explicitly.
    pub confirm: bool,
}

fn to_group_response(group: AdminUserGroup) -> AdminGroupResponse {
    AdminGroupResponse {
        user_id: group.user_id,
        user_email: group.user_email,
        projects: group
            .projects
            .into_iter()
            .map(|view| AdminProjectResponse {
                id: view.id,
                user_id: view.user_id,
                title: view.title,
                product_type: view.product_type,
                art_style: view.art_style,
                status: view.status,
                first_page_id: view.first_page_id,
                first_page_path: view.first_page_path,
                first_page_url: view.first_page_url,
                processed_image_path: view.processed_image_path,
                processed_image_url: view.processed_image_url,
                has_processed_image: view.has_processed_image,
                notification_sent: view.notification_sent,
            })
            .collect(),
    }
}

fn require_admin(state: &AppState, user: &CurrentUser) -> Result<(), (StatusCode, String)> {
    if state.admin_policy.is_admin(user.email.as_deref()) {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            "You don't have permission to access this page.".to_string(),
        ))
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /admin/projects - Cross-user project listing, grouped by owner.
#[utoipa::path(
    get,
    path = "/admin/projects",
    responses(
        (status = 200, description = "Projects grouped by owning user"),
        (status = 403, description = "Caller is not an administrator")
    )
)]
pub async fn list_projects_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&state, &user)?;
    let groups = fulfillment_task::list_fulfillment(&state)
        .await
        .map_err(error_response)?;
    Ok(Json(
        groups.into_iter().map(to_group_response).collect::<Vec<_>>(),
    ))
}

/// POST /admin/projects/{user_id}/{project_id}/processed - Attach a manually
/// processed image (multipart file upload, optional `pageId` field; the
/// project's first page is the default target).
pub async fn attach_processed_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path((user_id, project_id)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&state, &user)?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut page_id: Option<String> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read multipart data: {e}"),
        )
    })? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("pageId") => {
                page_id = Some(field.text().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Invalid pageId field: {e}"))
                })?);
            }
            _ if file.is_none() => {
                let name = field.file_name().unwrap_or("processed.jpg").to_string();
                let data = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Failed to read file bytes: {e}"),
                    )
                })?;
                file = Some((name, data.to_vec()));
            }
            _ => {}
        }
    }
    let (file_name, bytes) = file.ok_or((
        StatusCode::BAD_REQUEST,
        "Multipart form must include a file".to_string(),
    ))?;

    let outcome = fulfillment_task::attach_processed_image(
        &state,
        &user_id,
        &project_id,
        page_id.as_deref(),
        &file_name,
        bytes,
    )
    .await
    .map_err(error_response)?;

    Ok(Json(AttachResponse {
        processed_image_path: outcome.processed_image_path,
        processed_image_url: outcome.processed_image_url,
    }))
}

/// POST /admin/projects/{user_id}/{project_id}/notify - Send the
/// processing-complete notification to the customer.
pub async fn notify_customer_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path((user_id, project_id)): Path<(String, String)>,
    Json(req): Json<NotifyRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&state, &user)?;
    fulfillment_task::notify_customer(&state, &user_id, &project_id, &req.user_email, req.confirm)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::OK)
}
