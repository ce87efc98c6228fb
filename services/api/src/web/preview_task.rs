//! services/api/src/web/preview_task.rs
//!
//! The preview/checkout/delete workers for a single project: preview
//! assembly (resilient to a project whose first page does not exist yet),
//! stuck-session recovery, checkout-session creation with a forced token
//! refresh, and the idempotent soft delete.

use crate::web::middleware::CurrentUser;
use crate::web::state::AppState;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use storyincolor_core::domain::{CheckoutRequest, ProjectStatus};
use storyincolor_core::ports::{PortError, PortResult};
use tracing::{info, warn};

//=========================================================================================
// Preview
//=========================================================================================

#[derive(Debug, Clone)]
pub struct PreviewData {
    pub id: String,
    pub title: String,
    pub product_type: String,
    pub product_name: String,
    pub price: String,
    pub created_at: Option<DateTime<Utc>>,
    pub page_id: Option<String>,
    pub processed: bool,
    pub processed_image_url: Option<String>,
}

/// What the preview screen should do on load.
#[derive(Debug, Clone)]
pub enum PreviewOutcome {
    /// The stored status already advanced past checkout (set by the payment
    /// webhook the browser raced past); go straight to order confirmation.
    RedirectToOrderSuccess { payment_id: String },
    View(PreviewData),
}

pub async fn load_preview(
    state: &Arc<AppState>,
    user: &CurrentUser,
    project_id: &str,
) -> PortResult<PreviewOutcome> {
    let project = state.projects.get_project(&user.id, project_id).await?;

    // Stuck-session recovery check.
    if matches!(
        project.status,
        ProjectStatus::Ordered | ProjectStatus::PaymentPending
    ) {
        info!(project_id, "Payment already completed for this project");
        return Ok(PreviewOutcome::RedirectToOrderSuccess {
            payment_id: project.payment_id.clone().unwrap_or_default(),
        });
    }

    let title = if project.title.is_empty() {
        "Untitled Project".to_string()
    } else {
        project.title.clone()
    };
    let product_type = project.product_type;

    let pages = state.projects.list_pages(&user.id, project_id).await?;
    let first = pages
        .iter()
        .find(|page| page.page_number == 1)
        .or_else(|| pages.first());

    // A newly created project may have no pages yet; synthesize a
    // "not yet processed" preview instead of erroring.
    let Some(first) = first else {
        return Ok(PreviewOutcome::View(PreviewData {
            id: project_id.to_string(),
            title,
            product_type: product_type.as_str().to_string(),
            product_name: product_type.display_name().to_string(),
            price: product_type.price().to_string(),
            created_at: project.created_at,
            page_id: None,
            processed: false,
            processed_image_url: None,
        }));
    };

    let mut processed_image_url = None;
    if first.processed {
        if let Some(path) = &first.processed_image_path {
            match state.assets.download_url(path).await {
                Ok(url) => processed_image_url = Some(url),
                // Continue without the image; the page still renders.
                Err(err) => warn!(path = path.as_str(), error = %err, "Failed to load processed image"),
            }
        }
    }

    Ok(PreviewOutcome::View(PreviewData {
        id: project_id.to_string(),
        title,
        product_type: product_type.as_str().to_string(),
        product_name: product_type.display_name().to_string(),
        price: product_type.price().to_string(),
        created_at: project.created_at,
        page_id: Some(first.id.clone()),
        processed: first.processed,
        processed_image_url,
    }))
}

//=========================================================================================
// Checkout
//=========================================================================================

#[derive(Debug, Clone)]
pub struct CheckoutStarted {
    pub session_id: String,
    pub redirect_url: String,
}

pub async fn start_checkout(
    state: &Arc<AppState>,
    user: &CurrentUser,
    project_id: &str,
) -> PortResult<CheckoutStarted> {
    let project = state.projects.get_project(&user.id, project_id).await?;

    // A fresh ID token is required: stale tokens cause authorization
    // failures at the session-creation boundary.
    let id_token = state.identity.fresh_id_token(&user.id).await?;

    let request = CheckoutRequest {
        project_id: project_id.to_string(),
        product_type: project.product_type,
        title: if project.title.is_empty() {
            "Coloring Book".to_string()
        } else {
            project.title.clone()
        },
    };
    let session = state
        .payments
        .create_checkout_session(&id_token, &request)
        .await?;

    info!(project_id, session_id = session.session_id.as_str(), "Checkout session created");
    Ok(CheckoutStarted {
        redirect_url: state.payments.redirect_url(&session.session_id),
        session_id: session.session_id,
    })
}

//=========================================================================================
// Delete
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted { files_removed: usize },
    /// The record was already marked deleted; no storage calls are repeated.
    AlreadyDeleted,
}

/// Soft-deletes a project: best-effort storage cleanup first, then the
/// authoritative deleted mark, which must succeed for the operation to count.
pub async fn delete_project(
    state: &Arc<AppState>,
    user: &CurrentUser,
    project_id: &str,
    confirmed: bool,
) -> PortResult<DeleteOutcome> {
    if !confirmed {
        return Err(PortError::Validation(
            "Deletion requires explicit confirmation".to_string(),
        ));
    }

    let project = match state.projects.get_project(&user.id, project_id).await {
        Ok(project) => project,
        Err(PortError::NotFound(_)) => {
            return Err(PortError::NotFound(
                "Project not found. It may have been already deleted.".to_string(),
            ))
        }
        Err(other) => return Err(other),
    };

    if project.deleted {
        info!(project_id, "Project already marked as deleted");
        return Ok(DeleteOutcome::AlreadyDeleted);
    }

    // Collect every storage path the project owns: page originals, processed
    // images, and the thumbnail.
    let pages = state.projects.list_pages(&user.id, project_id).await?;
    let mut files_to_delete = Vec::new();
    for page in &pages {
        if let Some(path) = &page.photo_path {
            files_to_delete.push(path.clone());
        }
        if let Some(path) = &page.processed_image_path {
            files_to_delete.push(path.clone());
        }
    }
    if let Some(path) = &project.thumbnail_path {
        files_to_delete.push(path.clone());
    }

    // Best-effort cleanup: individual failures are logged, not blocking.
    info!(project_id, files = files_to_delete.len(), "Deleting project storage files");
    let files_removed = state.assets.delete_many(&files_to_delete).await;

    // The authoritative "is this gone" signal; this write must succeed.
    state
        .projects
        .soft_delete_project(&user.id, project_id)
        .await?;

    info!(project_id, files_removed, "Project marked as deleted");
    Ok(DeleteOutcome::Deleted { files_removed })
}
