//! services/api/src/web/fulfillment_task.rs
//!
//! The admin fulfillment workers: the cross-user aggregate listing, the
//! attach-processed-image operation, and the customer notification with its
//! primary/fallback function chain.

use crate::media::{self, CompressionOutcome};
use crate::web::state::AppState;
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use storyincolor_core::domain::{paths, Page, Project, ProjectPatch, StoredObject};
use storyincolor_core::notify::NotificationKind;
use storyincolor_core::ports::{PortError, PortResult};
use tracing::{error, info, warn};

/// Bounded retry for the processed-image upload.
const UPLOAD_ATTEMPTS: u32 = 3;
const UPLOAD_BACKOFF_BASE: Duration = Duration::from_secs(1);

//=========================================================================================
// Aggregate listing
//=========================================================================================

#[derive(Debug, Clone)]
pub struct AdminProjectView {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub product_type: String,
    pub art_style: String,
    pub status: String,
    pub created_at: Option<chrono::DateTime<Utc>>,
    pub first_page_id: Option<String>,
    pub first_page_path: Option<String>,
    pub first_page_url: Option<String>,
    pub processed_image_path: Option<String>,
    pub processed_image_url: Option<String>,
    pub has_processed_image: bool,
    pub notification_sent: bool,
}

#[derive(Debug, Clone)]
pub struct AdminUserGroup {
    pub user_id: String,
    /// Falls back to the raw user id when the profile lookup fails.
    pub user_email: String,
    pub projects: Vec<AdminProjectView>,
}

fn first_page(pages: &[Page]) -> Option<&Page> {
    pages
        .iter()
        .find(|page| page.page_number == 1)
        .or_else(|| pages.first())
}

/// Reads projects across all users, grouped by owner, resolving each
/// project's first-page and processed-image locations plus the owner's email.
pub async fn list_fulfillment(state: &Arc<AppState>) -> PortResult<Vec<AdminUserGroup>> {
    let projects = state.projects.list_all_projects().await?;
    info!(count = projects.len(), "Loaded projects for fulfillment");

    let mut groups: BTreeMap<String, Vec<AdminProjectView>> = BTreeMap::new();
    for project in projects {
        let view = resolve_project_view(state, &project).await;
        groups.entry(project.user_id.clone()).or_default().push(view);
    }

    let mut result = Vec::with_capacity(groups.len());
    for (user_id, projects) in groups {
        // Tolerate profile-lookup failure; show the raw user id instead.
        let user_email = match state.projects.get_user_profile(&user_id).await {
            Ok(profile) => profile.email.unwrap_or_else(|| user_id.clone()),
            Err(err) => {
                warn!(user_id = user_id.as_str(), error = %err, "Error fetching user email");
                user_id.clone()
            }
        };
        result.push(AdminUserGroup {
            user_id,
            user_email,
            projects,
        });
    }
    Ok(result)
}

async fn resolve_project_view(state: &Arc<AppState>, project: &Project) -> AdminProjectView {
    // Both page representations resolve through the store.
    let pages = match state.projects.list_pages(&project.user_id, &project.id).await {
        Ok(pages) => pages,
        Err(err) => {
            warn!(project_id = project.id.as_str(), error = %err, "Error loading pages");
            Vec::new()
        }
    };
    let first = first_page(&pages);

    let first_page_id = first.map(|page| page.id.clone());
    let first_page_path = first.and_then(|page| page.photo_path.clone());
    let mut first_page_url = first.and_then(|page| page.photo_url.clone());
    let processed_image_path = first
        .and_then(|page| page.processed_image_path.clone())
        .or_else(|| project.processed_image_path.clone());

    if first_page_url.is_none() {
        if let Some(path) = &first_page_path {
            match state.assets.download_url(path).await {
                Ok(url) => first_page_url = Some(url),
                Err(err) => {
                    warn!(path = path.as_str(), error = %err, "Error getting first page image URL")
                }
            }
        }
    }

    let mut has_processed_image = project.has_processed_image;
    let mut processed_image_url = first.and_then(|page| page.processed_image_url.clone());
    if processed_image_url.is_none() {
        if let Some(path) = &processed_image_path {
            match state.assets.download_url(path).await {
                Ok(url) => {
                    processed_image_url = Some(url);
                    has_processed_image = true;
                }
                Err(err) => {
                    warn!(path = path.as_str(), error = %err, "Error getting processed image URL");
                    has_processed_image = false;
                }
            }
        }
    }

    AdminProjectView {
        id: project.id.clone(),
        user_id: project.user_id.clone(),
        title: if project.title.is_empty() {
            "Untitled Project".to_string()
        } else {
            project.title.clone()
        },
        product_type: project.product_type.as_str().to_string(),
        art_style: project.art_style.as_str().to_string(),
        status: project.status.as_str().to_string(),
        created_at: project.created_at,
        first_page_id,
        first_page_path,
        first_page_url,
        processed_image_path,
        processed_image_url,
        has_processed_image,
        notification_sent: project.notification_sent,
    }
}

//=========================================================================================
// Attach processed image
//=========================================================================================

#[derive(Debug, Clone)]
pub struct AttachOutcome {
    pub processed_image_path: String,
    pub processed_image_url: String,
}

/// Attaches a manually processed image to one of a project's pages (the
/// first page unless `target_page_id` names another).
///
/// Compresses to the storage size ceiling, uploads with bounded retry,
/// re-reads the project to avoid clobbering concurrent edits, locates the
/// target page (by id, then by path-substring fallback), and writes back the
/// page list plus the project-level processed flag. A missing match is a
/// data-integrity condition the operator must see, not a silent no-op.
pub async fn attach_processed_image(
    state: &Arc<AppState>,
    user_id: &str,
    project_id: &str,
    target_page_id: Option<&str>,
    original_file_name: &str,
    bytes: Vec<u8>,
) -> PortResult<AttachOutcome> {
    info!(
        project_id,
        file = original_file_name,
        size = bytes.len(),
        "Starting processed-image upload"
    );

    // (a) Compress under the storage ceiling.
    let budget = state.config.storage_max_object_bytes;
    let (compressed, outcome) = media::compress_to_size_limit(&bytes, budget, 85)?;
    if outcome == CompressionOutcome::AtQualityFloor && compressed.len() > budget {
        return Err(PortError::Quota(format!(
            "Image is {} bytes even at the quality floor; the ceiling is {budget}",
            compressed.len()
        )));
    }
    info!(
        original = bytes.len(),
        compressed = compressed.len(),
        "Compression complete"
    );

    // Resolve the target page (first page by default). An operator-named
    // page that no longer exists still flows through the re-read match below
    // and surfaces as an integrity failure.
    let pages = state.projects.list_pages(user_id, project_id).await?;
    let target = match target_page_id {
        Some(page_id) => pages.iter().find(|page| page.id == page_id),
        None => first_page(&pages),
    };
    let (target_id, target_path) = match target {
        Some(page) => (page.id.clone(), page.photo_path.clone().unwrap_or_default()),
        None => match target_page_id {
            Some(page_id) => (page_id.to_string(), String::new()),
            None => {
                return Err(PortError::Integrity(
                    "Project has no pages to attach to".to_string(),
                ))
            }
        },
    };

    // The photo id is derived from the original photo's filename stem,
    // falling back to the page id.
    let photo_id = target_path
        .rsplit('/')
        .next()
        .and_then(|name| name.split('.').next())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| target_id.clone());

    let processed_path = paths::processed(user_id, project_id, &photo_id);

    // (b) Upload with bounded retry and exponential backoff.
    let stored = upload_with_retry(state, &processed_path, compressed).await?;

    // (c) Re-read the current page list to avoid clobbering concurrent edits.
    let mut current_pages = state.projects.list_pages(user_id, project_id).await?;

    // (d) Locate the target page: exact id first, then the path-containment
    // fallback (the identifying field is not always reliable).
    let index = current_pages.iter().position(|page| {
        page.id == target_id
            || page
                .photo_path
                .as_deref()
                .map(|p| !p.is_empty() && target_path.contains(p))
                .unwrap_or(false)
            || page
                .photo_id
                .as_deref()
                .map(|p| !p.is_empty() && target_path.contains(p))
                .unwrap_or(false)
    });

    // (e) Fail visibly when nothing matches; the document is left unmodified.
    let Some(index) = index else {
        error!(
            project_id,
            %target_id, %target_path, "Couldn't find matching page in project"
        );
        return Err(PortError::Integrity(
            "No page matches the processed upload; the project was not modified".to_string(),
        ));
    };

    // (f) Write back the updated page list plus the project-level flag.
    let page = &mut current_pages[index];
    page.processed = true;
    page.processed_image_path = Some(stored.path.clone());
    page.processed_image_url = Some(stored.url.clone());
    page.processed_at = Some(Utc::now());

    state
        .projects
        .write_pages(user_id, project_id, current_pages)
        .await?;
    state
        .projects
        .update_project(
            user_id,
            project_id,
            ProjectPatch {
                has_processed_image: Some(true),
                processed_image_path: Some(stored.path.clone()),
                processed_image_url: Some(stored.url.clone()),
                ..ProjectPatch::default()
            },
        )
        .await?;

    info!(project_id, path = stored.path.as_str(), "Successfully attached processed image");
    Ok(AttachOutcome {
        processed_image_path: stored.path,
        processed_image_url: stored.url,
    })
}

async fn upload_with_retry(
    state: &Arc<AppState>,
    path: &str,
    bytes: Vec<u8>,
) -> PortResult<StoredObject> {
    let mut last_error = None;
    for attempt in 1..=UPLOAD_ATTEMPTS {
        match state
            .assets
            .upload(path, bytes.clone(), "image/jpeg", None)
            .await
        {
            Ok(stored) => return Ok(stored),
            Err(err) => {
                warn!(path, attempt, error = %err, "Upload attempt failed");
                last_error = Some(err);
                if attempt < UPLOAD_ATTEMPTS {
                    tokio::time::sleep(UPLOAD_BACKOFF_BASE * 2u32.pow(attempt - 1)).await;
                }
            }
        }
    }
    Err(last_error.unwrap_or_else(|| {
        PortError::Unexpected("Failed to upload after multiple attempts".to_string())
    }))
}

//=========================================================================================
// Customer notification
//=========================================================================================

/// Sends the processing-complete notification through the primary/fallback
/// function chain and stamps the project as notified. Requires the target
/// email and an explicit operator confirmation (the send is irreversible);
/// re-notification stays allowed; that is the operator's call.
pub async fn notify_customer(
    state: &Arc<AppState>,
    user_id: &str,
    project_id: &str,
    user_email: &str,
    confirmed: bool,
) -> PortResult<()> {
    if user_email.trim().is_empty() {
        return Err(PortError::Validation(
            "Cannot send notification: missing user email".to_string(),
        ));
    }
    if !confirmed {
        return Err(PortError::Validation(
            "Notification requires explicit confirmation".to_string(),
        ));
    }

    let project = state.projects.get_project(user_id, project_id).await?;
    let payload = json!({
        "projectId": project_id,
        "userId": user_id,
        "userEmail": user_email,
        "projectTitle": if project.title.is_empty() { "Your Coloring Book".to_string() } else { project.title.clone() },
        "productType": project.product_type.as_str(),
        "artStyle": project.art_style.as_str(),
    });

    state
        .notifier
        .dispatch(NotificationKind::ProcessingComplete, payload)
        .await?;

    state
        .projects
        .update_project(
            user_id,
            project_id,
            ProjectPatch {
                notification_sent: Some(true),
                notification_sent_at: Some(Utc::now()),
                ..ProjectPatch::default()
            },
        )
        .await?;

    info!(project_id, user_email, "Notification email sent");
    Ok(())
}
