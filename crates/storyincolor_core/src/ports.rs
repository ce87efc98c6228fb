//! crates/storyincolor_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the external platforms (identity provider, document
//! store, object storage, serverless functions, payment gateway).

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{
    AuthUser, CheckoutRequest, CheckoutSession, Page, Project, ProjectPatch, ProjectStatus,
    StoredObject, UserProfile,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services and carries
/// the failure taxonomy the workflows dispatch on.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Unauthenticated or unauthorized.
    #[error("Authentication failed: {0}")]
    Auth(String),
    /// Record or object absent. Terminal; retrying cannot help.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Retryable I/O failure (network, transient authorization/CORS class).
    #[error("Transient failure: {0}")]
    Transient(String),
    /// Size/limit exceeded even after mitigation.
    #[error("Quota exceeded: {0}")]
    Quota(String),
    /// A guard failed (e.g. photo count out of range). Non-fatal, surfaced inline.
    #[error("Validation failed: {0}")]
    Validation(String),
    /// An expected association was not found (e.g. no page matches an upload).
    #[error("Integrity violation: {0}")]
    Integrity(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, PortError::Transient(_))
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Outcome of a third-party-provider sign-in. The welcome notification is
/// only fired for users the provider reports as new.
#[derive(Debug, Clone)]
pub struct ProviderSignIn {
    pub user: AuthUser,
    pub is_new_user: bool,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<AuthUser>;

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthUser>;

    /// Sign in via the federated provider, exchanging its token.
    async fn sign_in_with_provider(&self, provider_token: &str) -> PortResult<ProviderSignIn>;

    async fn reset_password(&self, email: &str) -> PortResult<()>;

    /// Force-refresh the user's ID token. Stale tokens cause authorization
    /// failures at the checkout-session boundary.
    async fn fresh_id_token(&self, user_id: &str) -> PortResult<String>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    // --- Project CRUD (always scoped under the owning user id) ---
    async fn create_project(&self, user_id: &str, project: &Project) -> PortResult<()>;

    async fn get_project(&self, user_id: &str, project_id: &str) -> PortResult<Project>;

    async fn update_project(
        &self,
        user_id: &str,
        project_id: &str,
        patch: ProjectPatch,
    ) -> PortResult<()>;

    /// Excludes soft-deleted projects, newest-updated first.
    async fn list_projects_by_status(
        &self,
        user_id: &str,
        status: ProjectStatus,
    ) -> PortResult<Vec<Project>>;

    /// Idempotent: deleting an already-deleted project is a no-op success.
    async fn soft_delete_project(&self, user_id: &str, project_id: &str) -> PortResult<()>;

    // --- Admin (the only cross-user read path) ---
    async fn list_all_projects(&self) -> PortResult<Vec<Project>>;

    // --- Pages ---
    /// Resolves both stored representations: probes the pages subcollection
    /// first and falls back to the array embedded in the project document.
    async fn list_pages(&self, user_id: &str, project_id: &str) -> PortResult<Vec<Page>>;

    /// Writes the page list back to whichever representation the project uses.
    async fn write_pages(
        &self,
        user_id: &str,
        project_id: &str,
        pages: Vec<Page>,
    ) -> PortResult<()>;

    // --- User profile mirror ---
    async fn get_user_profile(&self, user_id: &str) -> PortResult<UserProfile>;

    async fn upsert_user_profile(&self, profile: &UserProfile) -> PortResult<()>;

    /// Account deletion is a soft delete: flag + timestamp, never removal.
    async fn soft_delete_user(&self, user_id: &str) -> PortResult<()>;
}

/// Upload progress is reported as a fraction in [0, 100]; 0 and 100 are
/// always observed by the caller for a completed upload.
pub type ProgressFn = dyn Fn(f64) + Send + Sync;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        on_progress: Option<&ProgressFn>,
    ) -> PortResult<StoredObject>;

    /// Single attempt. Retry policy lives above the port.
    async fn download_url(&self, path: &str) -> PortResult<String>;

    async fn delete(&self, path: &str) -> PortResult<()>;

    async fn list(&self, prefix: &str) -> PortResult<Vec<String>>;
}

#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    /// Invokes a named remote procedure with a JSON payload. The remote
    /// result carries a `success` flag; `success = false` is an error.
    async fn invoke(&self, name: &str, payload: Value) -> PortResult<Value>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        id_token: &str,
        request: &CheckoutRequest,
    ) -> PortResult<CheckoutSession>;

    /// The hosted checkout page the browser is sent to.
    fn redirect_url(&self, session_id: &str) -> String;
}
