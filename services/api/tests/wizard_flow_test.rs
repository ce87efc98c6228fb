//! End-to-end wizard submission flows against the in-memory collaborators.

mod common;

use api_lib::web::submit_task::submit_project;
use common::{arranged_wizard, customer, harness};
use std::time::Duration;
use storyincolor_core::domain::{ProductType, ProjectStatus};
use storyincolor_core::ports::{PortError, ProjectStore};
use storyincolor_core::wizard::WizardSession;

#[tokio::test]
async fn ten_photo_standard_submission_reaches_preview() {
    let h = harness();
    let user = customer();
    let mut wizard = arranged_wizard("Beach Trip", 10);

    let outcome = submit_project(&h.state, &user, &mut wizard).await.unwrap();
    assert_eq!(outcome.page_count, 10);
    assert_eq!(outcome.failed_uploads, 0);

    let project = h
        .projects
        .get_project(&user.id, &outcome.project_id)
        .await
        .unwrap();
    assert_eq!(project.title, "Beach Trip");
    assert_eq!(project.status, ProjectStatus::Preview);
    assert_eq!(project.pages.len(), 10);

    // Pages numbered 1..=10, each with a stored original.
    for (index, page) in project.pages.iter().enumerate() {
        assert_eq!(page.page_number as usize, index + 1);
        let path = page.photo_path.as_ref().expect("uploaded path");
        assert!(h.storage.contains(path), "missing object for {path}");
        assert!(path.starts_with(&format!(
            "users/{}/projects/{}/photos/",
            user.id, outcome.project_id
        )));
        assert!(path.ends_with(".jpg"));
    }

    // The thumbnail is page 1's photo path.
    assert_eq!(project.thumbnail_path, project.pages[0].photo_path);

    // The submission notification is fired best-effort in the background.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h
        .invoker
        .called_names()
        .contains(&"sendProjectSubmissionNotification".to_string()));
}

#[tokio::test]
async fn five_photos_cannot_leave_the_upload_step() {
    let h = harness();
    let user = customer();

    let mut wizard = WizardSession::new();
    wizard.title = "Too Short".to_string();
    for i in 0..5 {
        wizard.ingest_photo(&format!("p{i}.jpg"), "image/jpeg", vec![1]);
    }
    wizard.advance().unwrap();
    wizard.advance().unwrap();

    // Standard requires 10 photos; the transition is blocked.
    let err = wizard.advance().unwrap_err();
    assert!(matches!(err, PortError::Validation(_)));

    // Submission is not available either, and nothing was written.
    let project_id = wizard.project_id.clone();
    let err = submit_project(&h.state, &user, &mut wizard).await.unwrap_err();
    assert!(matches!(err, PortError::Validation(_)));
    assert!(matches!(
        h.projects.get_project(&user.id, &project_id).await,
        Err(PortError::NotFound(_))
    ));
    assert_eq!(h.storage.object_count(), 0);
}

#[tokio::test]
async fn submission_truncates_to_the_product_maximum() {
    let h = harness();
    let user = customer();

    // Reach the arrange step as premium with 30 photos, then switch the
    // product down to standard; submission truncates instead of rejecting.
    let mut wizard = WizardSession::new();
    wizard.title = "Big Album".to_string();
    wizard.product_type = ProductType::Premium;
    for i in 0..30 {
        wizard.ingest_photo(&format!("p{i}.jpg"), "image/jpeg", vec![1]);
    }
    wizard.advance().unwrap();
    wizard.advance().unwrap();
    wizard.advance().unwrap();
    wizard.product_type = ProductType::Standard;

    let outcome = submit_project(&h.state, &user, &mut wizard).await.unwrap();
    assert_eq!(outcome.page_count, 10);

    let project = h
        .projects
        .get_project(&user.id, &outcome.project_id)
        .await
        .unwrap();
    assert_eq!(project.pages.len(), 10);
    assert_eq!(project.pages.last().unwrap().page_number, 10);
}

#[tokio::test]
async fn a_failed_upload_keeps_the_page_and_the_submission() {
    let h = harness();
    let user = customer();
    let mut wizard = arranged_wizard("Partial", 10);

    // The first upload fails; the page is retained and flagged.
    h.storage.fail_next_uploads(1);
    let outcome = submit_project(&h.state, &user, &mut wizard).await.unwrap();
    assert_eq!(outcome.page_count, 10);
    assert_eq!(outcome.failed_uploads, 1);

    let project = h
        .projects
        .get_project(&user.id, &outcome.project_id)
        .await
        .unwrap();
    assert!(project.pages[0].upload_error);
    assert!(project.pages[0].photo_path.is_none());
    assert!(!project.pages[1].upload_error);

    // The thumbnail falls to the first page that did upload.
    assert_eq!(project.thumbnail_path, project.pages[1].photo_path);
}

#[tokio::test]
async fn upload_progress_brackets_zero_and_one_hundred() {
    use std::sync::{Arc, Mutex};

    let h = harness();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let observed_cb = Arc::clone(&observed);
    let progress = move |fraction: f64| observed_cb.lock().unwrap().push(fraction);

    h.state
        .assets
        .upload("users/u/projects/p/photos/x.jpg", vec![1, 2, 3], "image/jpeg", Some(&progress))
        .await
        .unwrap();

    let observed = observed.lock().unwrap();
    assert_eq!(observed.first(), Some(&0.0));
    assert_eq!(observed.last(), Some(&100.0));
}
