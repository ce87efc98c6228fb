#![allow(dead_code)] // not every test binary uses every helper

//! Common test utilities for the workflow integration tests.
//!
//! Every test runs against the in-memory collaborator adapters, wired into
//! the same `AppState` the binary builds in development mode.

use api_lib::adapters::{
    InMemoryIdentityProvider, InMemoryObjectStore, InMemoryProjectStore, RecordingFunctionInvoker,
    StaticPaymentGateway,
};
use api_lib::assets::AssetService;
use api_lib::config::Config;
use api_lib::web::middleware::CurrentUser;
use api_lib::web::state::{AppState, AuthSessions, WizardRegistry};
use api_lib::web::wizard_cache::WizardCache;
use std::sync::Arc;
use std::time::Duration;
use storyincolor_core::domain::{paths, AdminPolicy, ArtStyle, Page, ProductType, Project, ProjectStatus};
use storyincolor_core::notify::Notifier;
use storyincolor_core::wizard::{Ingest, WizardSession};

pub const ADMIN_EMAIL: &str = "ops@example.com";

pub struct TestHarness {
    pub state: Arc<AppState>,
    pub projects: Arc<InMemoryProjectStore>,
    pub storage: Arc<InMemoryObjectStore>,
    pub invoker: Arc<RecordingFunctionInvoker>,
    pub payments: Arc<StaticPaymentGateway>,
    pub identity: Arc<InMemoryIdentityProvider>,
}

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        log_level: tracing::Level::INFO,
        identity_api_url: None,
        document_api_url: None,
        storage_api_url: None,
        functions_api_url: None,
        checkout_session_url: None,
        checkout_redirect_base: "https://checkout.example.com/pay".to_string(),
        admin_emails: vec![ADMIN_EMAIL.to_string()],
        processing_notification_functions: vec![
            "sendProcessingCompleteNotification".to_string(),
            "sendProcessedNotification".to_string(),
        ],
        storage_max_object_bytes: 5 * 1024 * 1024,
        wizard_cache_quota_bytes: 256 * 1024,
        enable_upload_proxy: false,
    }
}

pub fn harness() -> TestHarness {
    let projects = Arc::new(InMemoryProjectStore::new());
    let storage = Arc::new(InMemoryObjectStore::new());
    let invoker = Arc::new(RecordingFunctionInvoker::new());
    let payments = Arc::new(StaticPaymentGateway::new("https://checkout.example.com/pay"));
    let identity = Arc::new(InMemoryIdentityProvider::new());
    let config = Arc::new(test_config());

    let state = Arc::new(AppState {
        config: config.clone(),
        identity: identity.clone(),
        projects: projects.clone(),
        // Short backoff keeps retry tests fast.
        assets: AssetService::new(storage.clone()).with_retry(3, Duration::from_millis(5)),
        notifier: Arc::new(Notifier::new(invoker.clone())),
        payments: payments.clone(),
        admin_policy: AdminPolicy::new(&config.admin_emails),
        auth_sessions: AuthSessions::new(),
        wizards: WizardRegistry::new(),
        wizard_cache: Arc::new(WizardCache::new(config.wizard_cache_quota_bytes)),
    });

    TestHarness {
        state,
        projects,
        storage,
        invoker,
        payments,
        identity,
    }
}

pub fn customer() -> CurrentUser {
    CurrentUser {
        id: "user-1".to_string(),
        email: Some("customer@example.com".to_string()),
    }
}

pub fn admin() -> CurrentUser {
    CurrentUser {
        id: "admin-1".to_string(),
        email: Some(ADMIN_EMAIL.to_string()),
    }
}

/// A wizard session at the arrange step, carrying `count` accepted photos.
pub fn arranged_wizard(title: &str, count: usize) -> WizardSession {
    let mut wizard = WizardSession::new();
    wizard.title = title.to_string();
    for i in 0..count {
        let ingested = wizard.ingest_photo(
            &format!("photo-{i}.jpg"),
            "image/jpeg",
            vec![i as u8; 128],
        );
        assert!(matches!(ingested, Ingest::Accepted { .. }));
    }
    wizard.advance().expect("options -> style");
    wizard.advance().expect("style -> upload");
    wizard.advance().expect("upload -> arrange");
    wizard
}

/// Seed a project with `page_count` embedded pages whose originals exist in
/// the object store.
pub async fn seed_project(
    harness: &TestHarness,
    user_id: &str,
    title: &str,
    page_count: usize,
) -> Project {
    use storyincolor_core::ports::{ObjectStore, ProjectStore};

    let mut project = Project::new(user_id, title, ProductType::Standard, ArtStyle::Classic);
    project.status = ProjectStatus::Preview;
    let project_id = project.id.clone();

    for i in 0..page_count {
        let photo_id = format!("photo-{i}");
        let path = paths::photo(user_id, &project_id, &photo_id);
        harness
            .storage
            .upload(&path, vec![i as u8; 64], "image/jpeg", None)
            .await
            .expect("seed upload");
        project.pages.push(Page {
            id: format!("page-{i}"),
            page_number: i as u32 + 1,
            photo_id: Some(photo_id),
            photo_path: Some(path.clone()),
            photo_url: Some(format!("memory://storage/{path}")),
            photo_name: Some(format!("photo-{i}.jpg")),
            ..Page::default()
        });
    }
    project.thumbnail_path = project.pages.first().and_then(|p| p.photo_path.clone());

    harness
        .projects
        .create_project(user_id, &project)
        .await
        .expect("seed project");
    harness
        .projects
        .get_project(user_id, &project_id)
        .await
        .expect("seeded project readable")
}

/// A small real JPEG, for code paths that decode their input.
pub fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
    use image::{DynamicImage, ImageBuffer, Rgb};
    let img = DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }));
    let mut out = Vec::new();
    img.write_with_encoder(image::codecs::jpeg::JpegEncoder::new_with_quality(
        &mut std::io::Cursor::new(&mut out),
        90,
    ))
    .expect("encode fixture");
    out
}
