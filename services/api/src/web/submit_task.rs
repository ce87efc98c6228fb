//! services/api/src/web/submit_task.rs
//!
//! The wizard submission "worker": flushes the in-memory wizard state into a
//! Project + Page write, uploading each page's preview bytes to permanent
//! storage along the way. Partial success is acceptable: a page whose upload
//! fails is retained and flagged rather than aborting the submission.

use crate::web::middleware::CurrentUser;
use crate::web::state::AppState;
use serde_json::json;
use std::sync::Arc;
use storyincolor_core::domain::{paths, Page, Project, ProjectPatch, ProjectStatus};
use storyincolor_core::notify::NotificationKind;
use storyincolor_core::ports::{PortError, PortResult};
use storyincolor_core::wizard::WizardSession;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub project_id: String,
    pub page_count: usize,
    pub failed_uploads: usize,
}

/// The main asynchronous task for submitting a wizard session.
pub async fn submit_project(
    state: &Arc<AppState>,
    user: &CurrentUser,
    wizard: &mut WizardSession,
) -> PortResult<SubmitOutcome> {
    if !wizard.can_submit() {
        return Err(PortError::Validation(
            "Submission is only available from the arrange step with at least one page".to_string(),
        ));
    }

    let project_id = wizard.project_id.clone();
    let submission_pages: Vec<_> = wizard.pages_for_submission().to_vec();
    let total = submission_pages.len();
    info!(%project_id, pages = total, "Submitting project for preview");

    // 1. Upload each non-blank page's preview bytes to its deterministic path.
    let mut pages_data = Vec::with_capacity(total);
    let mut failed_uploads = 0;
    wizard.upload_progress = 0.0;

    for (index, page) in submission_pages.iter().enumerate() {
        let entry = match &page.photo {
            // A restored session has the photo's metadata but not its bytes;
            // there is nothing to upload until the user re-adds it.
            Some(photo) if photo.preview.is_empty() => {
                warn!(photo_id = photo.id.as_str(), "Photo has no preview bytes; marking upload failed");
                failed_uploads += 1;
                Page {
                    id: page.id.clone(),
                    page_number: page.page_number,
                    photo_id: Some(photo.id.clone()),
                    photo_name: Some(photo.name.clone()),
                    upload_error: true,
                    ..Page::default()
                }
            }
            Some(photo) => {
                let photo_path = paths::photo(&user.id, &project_id, &photo.id);
                match state
                    .assets
                    .upload(&photo_path, photo.preview.clone(), "image/jpeg", None)
                    .await
                {
                    Ok(stored) => Page {
                        id: page.id.clone(),
                        page_number: page.page_number,
                        photo_id: Some(photo.id.clone()),
                        photo_path: Some(stored.path),
                        photo_url: Some(stored.url),
                        photo_name: Some(photo.name.clone()),
                        ..Page::default()
                    },
                    Err(err) => {
                        // Keep the page; the user sees and can retry it later.
                        warn!(%photo_path, error = %err, "Error uploading image");
                        failed_uploads += 1;
                        Page {
                            id: page.id.clone(),
                            page_number: page.page_number,
                            photo_id: Some(photo.id.clone()),
                            photo_name: Some(photo.name.clone()),
                            upload_error: true,
                            ..Page::default()
                        }
                    }
                }
            }
            None => Page {
                id: page.id.clone(),
                page_number: page.page_number,
                is_blank: true,
                ..Page::default()
            },
        };
        pages_data.push(entry);
        wizard.upload_progress = (index + 1) as f64 / total as f64 * 100.0;
    }

    // 2. The first successfully uploaded page becomes the project thumbnail.
    let thumbnail_path = pages_data
        .iter()
        .find_map(|page| page.photo_path.clone());

    // 3. Create or update the project record with status `preview`.
    let existing = match state.projects.get_project(&user.id, &project_id).await {
        Ok(_) => true,
        Err(PortError::NotFound(_)) => false,
        Err(other) => return Err(other),
    };

    if existing {
        state
            .projects
            .update_project(
                &user.id,
                &project_id,
                ProjectPatch {
                    title: Some(wizard.title.clone()),
                    product_type: Some(wizard.product_type),
                    art_style: Some(wizard.art_style),
                    status: Some(ProjectStatus::Preview),
                    pages: Some(pages_data.clone()),
                    thumbnail_path: thumbnail_path.clone(),
                    ..ProjectPatch::default()
                },
            )
            .await?;
    } else {
        let mut project = Project::new(&user.id, &wizard.title, wizard.product_type, wizard.art_style);
        project.id = project_id.clone();
        project.status = ProjectStatus::Preview;
        project.pages = pages_data.clone();
        project.thumbnail_path = thumbnail_path.clone();
        state.projects.create_project(&user.id, &project).await?;
    }

    // 4. Fire-and-forget submission notification; its failure never rolls
    //    back the submission.
    let notifier = state.notifier.clone();
    let payload = json!({
        "projectId": project_id.clone(),
        "title": wizard.title.clone(),
        "productType": wizard.product_type.as_str(),
        "artStyle": wizard.art_style.as_str(),
        "pageCount": pages_data.len(),
    });
    tokio::spawn(async move {
        if let Err(err) = notifier
            .dispatch(NotificationKind::ProjectSubmission, payload)
            .await
        {
            error!(error = %err, "Error sending project submission notification");
        }
    });

    info!(%project_id, failed_uploads, "Project submitted for preview");
    Ok(SubmitOutcome {
        project_id,
        page_count: pages_data.len(),
        failed_uploads,
    })
}
