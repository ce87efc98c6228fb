//! services/api/src/web/rest.rs
//!
//! Contains the Axum handler for the project dashboard listing and the
//! master definition for the OpenAPI specification.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storyincolor_core::domain::ProjectStatus;
use utoipa::{OpenApi, ToSchema};

use crate::web::auth::{AuthResponse, LoginRequest, SignupRequest};
use crate::web::error_response;
use crate::web::middleware::CurrentUser;
use crate::web::preview::{CheckoutResponse, DeleteResponse, PreviewResponse};
use crate::web::state::AppState;
use crate::web::wizard::SubmitResponse;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        list_projects_handler,
        crate::web::wizard::submit_handler,
        crate::web::preview::get_preview_handler,
        crate::web::preview::checkout_handler,
        crate::web::preview::delete_project_handler,
        crate::web::admin::list_projects_handler,
    ),
    components(
        schemas(
            SignupRequest,
            LoginRequest,
            AuthResponse,
            ProjectSummary,
            SubmitResponse,
            PreviewResponse,
            CheckoutResponse,
            DeleteResponse,
        )
    ),
    tags(
        (name = "StoryInColor API", description = "API endpoints for the coloring-book storefront.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct ListProjectsQuery {
    /// Project status to list; defaults to `preview`.
    pub status: Option<String>,
}

/// One project row on the dashboard.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    pub title: String,
    pub product_type: String,
    pub art_style: String,
    pub status: String,
    pub thumbnail_path: Option<String>,
    pub has_processed_image: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List the caller's projects with the given status.
///
/// Soft-deleted projects are excluded and results are ordered by last
/// update, newest first.
#[utoipa::path(
    get,
    path = "/projects",
    params(("status" = Option<String>, Query, description = "Project status filter")),
    responses(
        (status = 200, description = "The caller's projects", body = [ProjectSummary]),
        (status = 401, description = "Not signed in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_projects_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ListProjectsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let status = ProjectStatus::parse(query.status.as_deref().unwrap_or("preview"));
    let projects = state
        .projects
        .list_projects_by_status(&user.id, status)
        .await
        .map_err(error_response)?;

    let summaries: Vec<ProjectSummary> = projects
        .into_iter()
        .map(|project| ProjectSummary {
            id: project.id,
            title: project.title,
            product_type: project.product_type.as_str().to_string(),
            art_style: project.art_style.as_str().to_string(),
            status: project.status.as_str().to_string(),
            thumbnail_path: project.thumbnail_path,
            has_processed_image: project.has_processed_image,
            updated_at: project.updated_at,
        })
        .collect();
    Ok(Json(summaries))
}
