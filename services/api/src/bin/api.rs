//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        HttpDocumentStore, HttpFunctionInvoker, HttpIdentityProvider, HttpObjectStore,
        HttpPaymentGateway, InMemoryIdentityProvider, InMemoryObjectStore, InMemoryProjectStore,
        RecordingFunctionInvoker, StaticPaymentGateway,
    },
    assets::AssetService,
    config::Config,
    error::ApiError,
    web::{
        admin, auth, preview, require_auth,
        rest::{list_projects_handler, ApiDoc},
        state::{AppState, AuthSessions, WizardRegistry},
        upload_proxy, wizard,
        wizard_cache::WizardCache,
    },
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use storyincolor_core::domain::AdminPolicy;
use storyincolor_core::notify::{NotificationKind, Notifier};
use storyincolor_core::ports::{
    FunctionInvoker, IdentityProvider, ObjectStore, PaymentGateway, ProjectStore,
};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Collaborator Adapters ---
    // Each collaborator falls back to its in-memory twin when no endpoint is
    // configured; that is the local development mode.
    let http = reqwest::Client::new();

    let identity: Arc<dyn IdentityProvider> = match &config.identity_api_url {
        Some(url) => Arc::new(HttpIdentityProvider::new(http.clone(), url)),
        None => {
            warn!("IDENTITY_API_URL not set; using the in-memory identity provider");
            Arc::new(InMemoryIdentityProvider::new())
        }
    };

    let projects: Arc<dyn ProjectStore> = match &config.document_api_url {
        Some(url) => Arc::new(HttpDocumentStore::new(http.clone(), url)),
        None => {
            warn!("DOCUMENT_API_URL not set; using the in-memory project store");
            Arc::new(InMemoryProjectStore::new())
        }
    };

    let storage: Arc<dyn ObjectStore> = match &config.storage_api_url {
        Some(url) => Arc::new(HttpObjectStore::new(http.clone(), url)),
        None => {
            warn!("STORAGE_API_URL not set; using the in-memory object store");
            Arc::new(InMemoryObjectStore::new())
        }
    };

    let invoker: Arc<dyn FunctionInvoker> = match &config.functions_api_url {
        Some(url) => Arc::new(HttpFunctionInvoker::new(http.clone(), url)),
        None => {
            warn!("FUNCTIONS_API_URL not set; notifications will only be recorded");
            Arc::new(RecordingFunctionInvoker::new())
        }
    };

    let payments: Arc<dyn PaymentGateway> = match &config.checkout_session_url {
        Some(url) => Arc::new(HttpPaymentGateway::new(
            http.clone(),
            url,
            &config.checkout_redirect_base,
        )),
        None => {
            warn!("CHECKOUT_SESSION_URL not set; using the static payment gateway");
            Arc::new(StaticPaymentGateway::new(&config.checkout_redirect_base))
        }
    };

    let notifier = Arc::new(Notifier::new(invoker).with_candidates(
        NotificationKind::ProcessingComplete,
        config.processing_notification_functions.clone(),
    ));

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        identity,
        projects,
        assets: AssetService::new(storage),
        notifier,
        payments,
        admin_policy: AdminPolicy::new(&config.admin_emails),
        auth_sessions: AuthSessions::new(),
        wizards: WizardRegistry::new(),
        wizard_cache: Arc::new(WizardCache::new(config.wizard_cache_quota_bytes)),
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/provider", post(auth::provider_sign_in_handler))
        .route("/auth/reset-password", post(auth::reset_password_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/api/upload", post(upload_proxy::upload_proxy_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/account", delete(auth::delete_account_handler))
        .route("/projects", get(list_projects_handler))
        .route("/projects/{id}/preview", get(preview::get_preview_handler))
        .route("/projects/{id}/checkout", post(preview::checkout_handler))
        .route("/projects/{id}", delete(preview::delete_project_handler))
        .route("/wizard", post(wizard::create_wizard_handler))
        .route("/wizard/{id}", get(wizard::get_wizard_handler))
        .route("/wizard/{id}/options", patch(wizard::set_options_handler))
        .route("/wizard/{id}/photos", post(wizard::add_photos_handler))
        .route(
            "/wizard/{id}/photos/{photo_id}",
            delete(wizard::remove_photo_handler),
        )
        .route(
            "/wizard/{id}/pages/{page_id}",
            delete(wizard::remove_page_handler),
        )
        .route(
            "/wizard/{id}/pages/{page_id}/move",
            post(wizard::move_page_handler),
        )
        .route("/wizard/{id}/next", post(wizard::advance_handler))
        .route("/wizard/{id}/back", post(wizard::back_handler))
        .route("/wizard/{id}/submit", post(wizard::submit_handler))
        .route("/admin/projects", get(admin::list_projects_handler))
        .route(
            "/admin/projects/{user_id}/{project_id}/processed",
            post(admin::attach_processed_handler),
        )
        .route(
            "/admin/projects/{user_id}/{project_id}/notify",
            post(admin::notify_customer_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
