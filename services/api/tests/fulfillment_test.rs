//! The admin fulfillment workflow: aggregate listing, attach-processed-image,
//! and customer notification.

mod common;

use api_lib::web::fulfillment_task::{attach_processed_image, list_fulfillment, notify_customer};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use common::{admin, customer, harness, jpeg_fixture, seed_project};
use storyincolor_core::domain::UserProfile;
use storyincolor_core::ports::{PortError, ProjectStore};

#[tokio::test]
async fn attach_marks_page_three_of_an_embedded_array() {
    let h = harness();
    let user = customer();
    let project = seed_project(&h, &user.id, "Embedded", 5).await;

    let outcome = attach_processed_image(
        &h.state,
        &user.id,
        &project.id,
        Some("page-2"), // page number 3
        "photo-2-processed.png",
        jpeg_fixture(64, 64),
    )
    .await
    .unwrap();

    // The processed path is derived from the original photo's filename stem.
    assert_eq!(
        outcome.processed_image_path,
        format!("users/{}/projects/{}/processed/photo-2.jpg", user.id, project.id)
    );
    assert!(h.storage.contains(&outcome.processed_image_path));

    let updated = h.projects.get_project(&user.id, &project.id).await.unwrap();
    assert!(updated.has_processed_image);
    assert_eq!(
        updated.processed_image_path.as_deref(),
        Some(outcome.processed_image_path.as_str())
    );

    // pages[2] gained the processed markers; its neighbors did not.
    let page = &updated.pages[2];
    assert!(page.processed);
    assert!(page.processed_at.is_some());
    assert_eq!(
        page.processed_image_path.as_deref(),
        Some(outcome.processed_image_path.as_str())
    );
    assert!(!updated.pages[1].processed);
    assert!(!updated.pages[3].processed);
}

#[tokio::test]
async fn attach_defaults_to_the_first_page() {
    let h = harness();
    let user = customer();
    let project = seed_project(&h, &user.id, "First", 3).await;

    attach_processed_image(
        &h.state,
        &user.id,
        &project.id,
        None,
        "processed.jpg",
        jpeg_fixture(64, 64),
    )
    .await
    .unwrap();

    let updated = h.projects.get_project(&user.id, &project.id).await.unwrap();
    assert!(updated.pages[0].processed);
    assert!(!updated.pages[1].processed);
}

#[tokio::test]
async fn attach_with_no_matching_page_fails_and_leaves_the_project_alone() {
    let h = harness();
    let user = customer();
    let project = seed_project(&h, &user.id, "Mismatch", 2).await;
    let before = h.projects.get_project(&user.id, &project.id).await.unwrap();

    let err = attach_processed_image(
        &h.state,
        &user.id,
        &project.id,
        Some("no-such-page"),
        "processed.jpg",
        jpeg_fixture(64, 64),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PortError::Integrity(_)));

    // The project document was not modified.
    let after = h.projects.get_project(&user.id, &project.id).await.unwrap();
    assert!(!after.has_processed_image);
    assert!(after.processed_image_path.is_none());
    assert_eq!(after.pages.len(), before.pages.len());
    assert!(after.pages.iter().all(|page| !page.processed));
}

#[tokio::test]
async fn attach_retries_transient_upload_failures() {
    let h = harness();
    let user = customer();
    let project = seed_project(&h, &user.id, "Retry", 1).await;

    // Two transient failures, then success within the three-attempt budget.
    h.storage.fail_next_uploads(2);
    attach_processed_image(
        &h.state,
        &user.id,
        &project.id,
        None,
        "processed.jpg",
        jpeg_fixture(32, 32),
    )
    .await
    .unwrap();

    let updated = h.projects.get_project(&user.id, &project.id).await.unwrap();
    assert!(updated.has_processed_image);
}

#[tokio::test]
async fn notification_uses_the_fallback_function_and_stamps_the_project() {
    let h = harness();
    let user = customer();
    let project = seed_project(&h, &user.id, "Notify", 1).await;

    h.invoker.fail("sendProcessingCompleteNotification");
    notify_customer(
        &h.state,
        &user.id,
        &project.id,
        "customer@example.com",
        true,
    )
    .await
    .unwrap();

    assert_eq!(
        h.invoker.called_names(),
        vec![
            "sendProcessingCompleteNotification".to_string(),
            "sendProcessedNotification".to_string(),
        ]
    );

    let updated = h.projects.get_project(&user.id, &project.id).await.unwrap();
    assert!(updated.notification_sent);
    assert!(updated.notification_sent_at.is_some());
}

#[tokio::test]
async fn notification_requires_confirmation_and_an_address() {
    let h = harness();
    let user = customer();
    let project = seed_project(&h, &user.id, "Guarded", 1).await;

    let err = notify_customer(&h.state, &user.id, &project.id, "", true)
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Validation(_)));

    let err = notify_customer(
        &h.state,
        &user.id,
        &project.id,
        "customer@example.com",
        false,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PortError::Validation(_)));

    // Nothing was sent and nothing was stamped.
    assert!(h.invoker.calls().is_empty());
    let project = h.projects.get_project(&user.id, &project.id).await.unwrap();
    assert!(!project.notification_sent);
}

#[tokio::test]
async fn non_admins_never_see_the_cross_user_listing() {
    let h = harness();
    seed_project(&h, "someone", "Private", 1).await;

    // A signed-in non-member is denied.
    let denied = api_lib::web::admin::list_projects_handler(
        State(h.state.clone()),
        Extension(customer()),
    )
    .await;
    let (status, _) = denied.err().expect("expected an access-denied error");
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A policy member gets the data.
    let allowed =
        api_lib::web::admin::list_projects_handler(State(h.state.clone()), Extension(admin()))
            .await;
    assert!(allowed.is_ok());
}

#[tokio::test]
async fn listing_groups_by_owner_and_tolerates_both_page_shapes() {
    let h = harness();
    let alice = seed_project(&h, "alice", "Alice Book", 2).await;
    let bob = seed_project(&h, "bob", "Bob Book", 2).await;

    // Bob's pages live in a subcollection; Alice has a profile document.
    h.projects.seed_subcollection_pages("bob", &bob.id);
    h.projects
        .upsert_user_profile(&UserProfile {
            user_id: "alice".to_string(),
            email: Some("alice@example.com".to_string()),
            ..UserProfile::default()
        })
        .await
        .unwrap();

    let groups = list_fulfillment(&h.state).await.unwrap();
    assert_eq!(groups.len(), 2);

    let alice_group = groups.iter().find(|g| g.user_id == "alice").unwrap();
    assert_eq!(alice_group.user_email, "alice@example.com");
    assert_eq!(alice_group.projects.len(), 1);
    assert_eq!(
        alice_group.projects[0].first_page_path,
        alice.pages.first().and_then(|p| p.photo_path.clone())
    );

    // Bob has no profile document: the raw user id stands in for the email,
    // and the subcollection pages still resolve.
    let bob_group = groups.iter().find(|g| g.user_id == "bob").unwrap();
    assert_eq!(bob_group.user_email, "bob");
    assert_eq!(bob_group.projects[0].first_page_id.as_deref(), Some("page-0"));
    assert!(bob_group.projects[0].first_page_url.is_some());
}
