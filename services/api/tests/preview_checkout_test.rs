//! Preview assembly, checkout-session creation, and the idempotent delete.

mod common;

use api_lib::web::preview_task::{
    delete_project, load_preview, start_checkout, DeleteOutcome, PreviewOutcome,
};
use common::{customer, harness, seed_project};
use storyincolor_core::domain::{paths, ProjectPatch, ProjectStatus};
use storyincolor_core::ports::{ObjectStore, PortError, ProjectStore};

#[tokio::test]
async fn preview_synthesizes_a_record_for_a_pageless_project() {
    let h = harness();
    let user = customer();
    let project = seed_project(&h, &user.id, "Fresh", 0).await;

    let outcome = load_preview(&h.state, &user, &project.id).await.unwrap();
    let PreviewOutcome::View(data) = outcome else {
        panic!("expected a preview view");
    };
    assert_eq!(data.title, "Fresh");
    assert!(!data.processed);
    assert!(data.page_id.is_none());
    assert!(data.processed_image_url.is_none());
    // Unknown/missing product details price as standard.
    assert_eq!(data.price, "$24.90");
    assert_eq!(data.product_name, "Standard Coloring Book");
}

#[tokio::test]
async fn preview_reports_the_processed_first_page() {
    let h = harness();
    let user = customer();
    let project = seed_project(&h, &user.id, "Processed", 2).await;

    // Mark page 1 processed with a stored processed image.
    let processed_path = paths::processed(&user.id, &project.id, "photo-0");
    h.storage
        .upload(&processed_path, vec![9; 32], "image/jpeg", None)
        .await
        .unwrap();
    let mut pages = project.pages.clone();
    pages[0].processed = true;
    pages[0].processed_image_path = Some(processed_path.clone());
    h.projects
        .write_pages(&user.id, &project.id, pages)
        .await
        .unwrap();

    let outcome = load_preview(&h.state, &user, &project.id).await.unwrap();
    let PreviewOutcome::View(data) = outcome else {
        panic!("expected a preview view");
    };
    assert!(data.processed);
    assert_eq!(data.page_id.as_deref(), Some("page-0"));
    assert!(data
        .processed_image_url
        .as_deref()
        .unwrap()
        .contains(&processed_path));
}

#[tokio::test]
async fn an_already_ordered_project_redirects_to_order_success() {
    let h = harness();
    let user = customer();
    let project = seed_project(&h, &user.id, "Raced", 1).await;
    h.projects
        .update_project(
            &user.id,
            &project.id,
            ProjectPatch {
                status: Some(ProjectStatus::Ordered),
                ..ProjectPatch::default()
            },
        )
        .await
        .unwrap();

    let outcome = load_preview(&h.state, &user, &project.id).await.unwrap();
    assert!(matches!(
        outcome,
        PreviewOutcome::RedirectToOrderSuccess { .. }
    ));
}

#[tokio::test]
async fn checkout_uses_a_freshly_refreshed_token() {
    let h = harness();
    let user = customer();
    let project = seed_project(&h, &user.id, "Buy Me", 1).await;

    let first = start_checkout(&h.state, &user, &project.id).await.unwrap();
    let second = start_checkout(&h.state, &user, &project.id).await.unwrap();
    assert_ne!(first.session_id, second.session_id);
    assert!(first.redirect_url.contains(&first.session_id));

    let sessions = h.payments.sessions();
    assert_eq!(sessions.len(), 2);
    // Each attempt carried a fresh (distinct) forced-refresh token.
    assert!(sessions[0].0.starts_with(&format!("dev-token-{}", user.id)));
    assert_ne!(sessions[0].0, sessions[1].0);
    assert_eq!(sessions[0].1.project_id, project.id);
    assert_eq!(sessions[0].1.title, "Buy Me");
}

#[tokio::test]
async fn checkout_for_a_missing_project_is_not_found() {
    let h = harness();
    let user = customer();
    let err = start_checkout(&h.state, &user, "nope").await.unwrap_err();
    assert!(matches!(err, PortError::NotFound(_)));
}

#[tokio::test]
async fn delete_removes_storage_then_marks_the_record() {
    let h = harness();
    let user = customer();
    let project = seed_project(&h, &user.id, "Doomed", 2).await;

    // Add a processed image so the cleanup spans originals + processed +
    // thumbnail (the thumbnail aliases page 1's original).
    let processed_path = paths::processed(&user.id, &project.id, "photo-1");
    h.storage
        .upload(&processed_path, vec![3; 16], "image/jpeg", None)
        .await
        .unwrap();
    let mut pages = project.pages.clone();
    pages[1].processed = true;
    pages[1].processed_image_path = Some(processed_path.clone());
    h.projects
        .write_pages(&user.id, &project.id, pages)
        .await
        .unwrap();

    let outcome = delete_project(&h.state, &user, &project.id, true)
        .await
        .unwrap();
    let DeleteOutcome::Deleted { files_removed } = outcome else {
        panic!("expected a fresh deletion");
    };
    // Two originals and one processed image existed; the thumbnail alias had
    // already been removed by the time its deletion was attempted.
    assert_eq!(files_removed, 3);
    assert_eq!(h.storage.object_count(), 0);

    let stored = h.projects.get_project(&user.id, &project.id).await.unwrap();
    assert!(stored.deleted);
    assert!(stored.deleted_at.is_some());
}

#[tokio::test]
async fn redelete_short_circuits_without_storage_calls() {
    let h = harness();
    let user = customer();
    let project = seed_project(&h, &user.id, "Twice", 2).await;

    let first = delete_project(&h.state, &user, &project.id, true)
        .await
        .unwrap();
    assert!(matches!(first, DeleteOutcome::Deleted { .. }));
    let calls_after_first = h.storage.delete_call_count();
    assert!(calls_after_first > 0);

    let second = delete_project(&h.state, &user, &project.id, true)
        .await
        .unwrap();
    assert_eq!(second, DeleteOutcome::AlreadyDeleted);
    // No additional storage-delete calls were issued.
    assert_eq!(h.storage.delete_call_count(), calls_after_first);

    let stored = h.projects.get_project(&user.id, &project.id).await.unwrap();
    assert!(stored.deleted);
}

#[tokio::test]
async fn delete_requires_confirmation() {
    let h = harness();
    let user = customer();
    let project = seed_project(&h, &user.id, "Careful", 1).await;

    let err = delete_project(&h.state, &user, &project.id, false)
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Validation(_)));

    let stored = h.projects.get_project(&user.id, &project.id).await.unwrap();
    assert!(!stored.deleted);
    assert_eq!(h.storage.delete_call_count(), 0);
}

#[tokio::test]
async fn listing_excludes_deleted_projects_and_orders_by_recency() {
    let h = harness();
    let user = customer();
    let older = seed_project(&h, &user.id, "Older", 1).await;
    let newer = seed_project(&h, &user.id, "Newer", 1).await;
    let doomed = seed_project(&h, &user.id, "Doomed", 1).await;

    // Touch the older project so it becomes the most recently updated.
    h.projects
        .update_project(
            &user.id,
            &older.id,
            ProjectPatch {
                title: Some("Older (edited)".to_string()),
                ..ProjectPatch::default()
            },
        )
        .await
        .unwrap();
    delete_project(&h.state, &user, &doomed.id, true).await.unwrap();

    let listed = h
        .projects
        .list_projects_by_status(&user.id, ProjectStatus::Preview)
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, older.id);
    assert_eq!(listed[1].id, newer.id);
}
