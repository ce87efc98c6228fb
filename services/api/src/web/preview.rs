//! services/api/src/web/preview.rs
//!
//! The single-project preview/checkout/delete endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::web::error_response;
use crate::web::middleware::CurrentUser;
use crate::web::preview_task::{self, DeleteOutcome, PreviewOutcome};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub id: String,
    pub title: String,
    pub product_type: String,
    pub product_name: String,
    pub price: String,
    pub created_at: Option<DateTime<Utc>>,
    pub page_id: Option<String>,
    pub processed: bool,
    pub processed_image_url: Option<String>,
    /// Set when the stored status already advanced past checkout; the client
    /// should navigate there instead of re-offering payment.
    pub redirect_to: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub redirect_url: String,
}

#[derive(Deserialize, ToSchema)]
pub struct DeleteQuery {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub deleted: bool,
    pub already_deleted: bool,
    pub files_removed: usize,
    pub redirect_to: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /projects/{id}/preview - Preview status, price, and recovery check.
#[utoipa::path(
    get,
    path = "/projects/{id}/preview",
    params(("id" = String, Path, description = "The project id")),
    responses(
        (status = 200, description = "Preview data", body = PreviewResponse),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get_preview_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(project_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = preview_task::load_preview(&state, &user, &project_id)
        .await
        .map_err(error_response)?;

    let response = match outcome {
        PreviewOutcome::RedirectToOrderSuccess { payment_id } => PreviewResponse {
            id: project_id,
            title: String::new(),
            product_type: String::new(),
            product_name: String::new(),
            price: String::new(),
            created_at: None,
            page_id: None,
            processed: false,
            processed_image_url: None,
            redirect_to: Some(format!("/order-success?session_id={payment_id}")),
        },
        PreviewOutcome::View(data) => PreviewResponse {
            id: data.id,
            title: data.title,
            product_type: data.product_type,
            product_name: data.product_name,
            price: data.price,
            created_at: data.created_at,
            page_id: data.page_id,
            processed: data.processed,
            processed_image_url: data.processed_image_url,
            redirect_to: None,
        },
    };
    Ok(Json(response))
}

/// POST /projects/{id}/checkout - Create a checkout session and hand back the
/// hosted payment page URL.
#[utoipa::path(
    post,
    path = "/projects/{id}/checkout",
    params(("id" = String, Path, description = "The project id")),
    responses(
        (status = 200, description = "Checkout session created", body = CheckoutResponse),
        (status = 401, description = "The payment collaborator rejected the ID token"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn checkout_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(project_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let started = preview_task::start_checkout(&state, &user, &project_id)
        .await
        .map_err(error_response)?;
    Ok(Json(CheckoutResponse {
        session_id: started.session_id,
        redirect_url: started.redirect_url,
    }))
}

/// DELETE /projects/{id} - Idempotent soft delete with storage cleanup.
#[utoipa::path(
    delete,
    path = "/projects/{id}",
    params(
        ("id" = String, Path, description = "The project id"),
        ("confirm" = bool, Query, description = "Explicit confirmation flag")
    ),
    responses(
        (status = 200, description = "Project deleted (or already was)", body = DeleteResponse),
        (status = 400, description = "Missing confirmation"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn delete_project_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(project_id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = preview_task::delete_project(&state, &user, &project_id, query.confirm)
        .await
        .map_err(error_response)?;

    let response = match outcome {
        DeleteOutcome::Deleted { files_removed } => DeleteResponse {
            deleted: true,
            already_deleted: false,
            files_removed,
            redirect_to: "/dashboard".to_string(),
        },
        DeleteOutcome::AlreadyDeleted => DeleteResponse {
            deleted: true,
            already_deleted: true,
            files_removed: 0,
            redirect_to: "/dashboard".to_string(),
        },
    };
    Ok(Json(response))
}
