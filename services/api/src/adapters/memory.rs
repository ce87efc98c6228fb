//! services/api/src/adapters/memory.rs
//!
//! In-memory implementations of every collaborator port. These back the
//! local development mode (no external platforms required) and the test
//! suite, which also uses their fault-injection hooks.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use storyincolor_core::domain::{
    AuthUser, CheckoutRequest, CheckoutSession, Page, Project, ProjectPatch, ProjectStatus,
    StoredObject, UserProfile,
};
use storyincolor_core::ports::{
    FunctionInvoker, IdentityProvider, ObjectStore, PaymentGateway, PortError, PortResult,
    ProgressFn, ProjectStore, ProviderSignIn,
};
use uuid::Uuid;

//=========================================================================================
// Project store
//=========================================================================================

/// A stored project plus its optional pages subcollection. Projects written
/// by this service embed their pages; older documents keep them in a
/// subcollection, and both shapes must be readable.
struct ProjectEntry {
    project: Project,
    subcollection: Option<Vec<Page>>,
}

#[derive(Default)]
pub struct InMemoryProjectStore {
    projects: RwLock<HashMap<(String, String), ProjectEntry>>,
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/dev seeding helper: move a project's pages into the subcollection
    /// representation.
    pub fn seed_subcollection_pages(&self, user_id: &str, project_id: &str) {
        let mut projects = self.projects.write().unwrap();
        if let Some(entry) = projects.get_mut(&(user_id.to_string(), project_id.to_string())) {
            let pages = std::mem::take(&mut entry.project.pages);
            entry.subcollection = Some(pages);
        }
    }

    fn key(user_id: &str, project_id: &str) -> (String, String) {
        (user_id.to_string(), project_id.to_string())
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn create_project(&self, user_id: &str, project: &Project) -> PortResult<()> {
        let mut stored = project.clone();
        let now = Utc::now();
        stored.user_id = user_id.to_string();
        stored.created_at = Some(now);
        stored.updated_at = Some(now);
        self.projects.write().unwrap().insert(
            Self::key(user_id, &project.id),
            ProjectEntry {
                project: stored,
                subcollection: None,
            },
        );
        Ok(())
    }

    async fn get_project(&self, user_id: &str, project_id: &str) -> PortResult<Project> {
        self.projects
            .read()
            .unwrap()
            .get(&Self::key(user_id, project_id))
            .map(|entry| entry.project.clone())
            .ok_or_else(|| PortError::NotFound(format!("Project {project_id} not found")))
    }

    async fn update_project(
        &self,
        user_id: &str,
        project_id: &str,
        patch: ProjectPatch,
    ) -> PortResult<()> {
        let mut projects = self.projects.write().unwrap();
        let entry = projects
            .get_mut(&Self::key(user_id, project_id))
            .ok_or_else(|| PortError::NotFound(format!("Project {project_id} not found")))?;

        let project = &mut entry.project;
        if let Some(title) = patch.title {
            project.title = title;
        }
        if let Some(product_type) = patch.product_type {
            project.product_type = product_type;
        }
        if let Some(art_style) = patch.art_style {
            project.art_style = art_style;
        }
        if let Some(status) = patch.status {
            project.status = status;
        }
        if let Some(thumbnail_path) = patch.thumbnail_path {
            project.thumbnail_path = Some(thumbnail_path);
        }
        if let Some(pages) = patch.pages {
            project.pages = pages;
        }
        if let Some(flag) = patch.has_processed_image {
            project.has_processed_image = flag;
        }
        if let Some(path) = patch.processed_image_path {
            project.processed_image_path = Some(path);
        }
        if let Some(url) = patch.processed_image_url {
            project.processed_image_url = Some(url);
        }
        if let Some(sent) = patch.notification_sent {
            project.notification_sent = sent;
        }
        if let Some(sent_at) = patch.notification_sent_at {
            project.notification_sent_at = Some(sent_at);
        }
        // `created_at` is stamped once at creation and never overwritten.
        project.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn list_projects_by_status(
        &self,
        user_id: &str,
        status: ProjectStatus,
    ) -> PortResult<Vec<Project>> {
        let mut matching: Vec<Project> = self
            .projects
            .read()
            .unwrap()
            .values()
            .filter(|entry| {
                entry.project.user_id == user_id
                    && entry.project.status == status
                    && !entry.project.deleted
            })
            .map(|entry| entry.project.clone())
            .collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(matching)
    }

    async fn soft_delete_project(&self, user_id: &str, project_id: &str) -> PortResult<()> {
        let mut projects = self.projects.write().unwrap();
        let entry = projects
            .get_mut(&Self::key(user_id, project_id))
            .ok_or_else(|| PortError::NotFound(format!("Project {project_id} not found")))?;
        if entry.project.deleted {
            // Re-deleting is a no-op success.
            return Ok(());
        }
        let now = Utc::now();
        entry.project.deleted = true;
        entry.project.deleted_at = Some(now);
        entry.project.updated_at = Some(now);
        Ok(())
    }

    async fn list_all_projects(&self) -> PortResult<Vec<Project>> {
        Ok(self
            .projects
            .read()
            .unwrap()
            .values()
            .map(|entry| entry.project.clone())
            .collect())
    }

    async fn list_pages(&self, user_id: &str, project_id: &str) -> PortResult<Vec<Page>> {
        let projects = self.projects.read().unwrap();
        let entry = projects
            .get(&Self::key(user_id, project_id))
            .ok_or_else(|| PortError::NotFound(format!("Project {project_id} not found")))?;
        // Probe the subcollection first, then fall back to the embedded array.
        match &entry.subcollection {
            Some(pages) if !pages.is_empty() => Ok(pages.clone()),
            _ => Ok(entry.project.pages.clone()),
        }
    }

    async fn write_pages(
        &self,
        user_id: &str,
        project_id: &str,
        pages: Vec<Page>,
    ) -> PortResult<()> {
        let mut projects = self.projects.write().unwrap();
        let entry = projects
            .get_mut(&Self::key(user_id, project_id))
            .ok_or_else(|| PortError::NotFound(format!("Project {project_id} not found")))?;
        match &mut entry.subcollection {
            Some(existing) if !existing.is_empty() => *existing = pages,
            _ => entry.project.pages = pages,
        }
        entry.project.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn get_user_profile(&self, user_id: &str) -> PortResult<UserProfile> {
        self.profiles
            .read()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {user_id} not found")))
    }

    async fn upsert_user_profile(&self, profile: &UserProfile) -> PortResult<()> {
        self.profiles
            .write()
            .unwrap()
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn soft_delete_user(&self, user_id: &str) -> PortResult<()> {
        let mut profiles = self.profiles.write().unwrap();
        if let Some(profile) = profiles.get_mut(user_id) {
            if !profile.deleted {
                profile.deleted = true;
                profile.deleted_at = Some(Utc::now());
            }
        }
        // No profile document means there is nothing to mark.
        Ok(())
    }
}

//=========================================================================================
// Object store
//=========================================================================================

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, (Vec<u8>, String)>>,
    /// Fail the next N `download_url` calls with a transient error.
    transient_url_failures: AtomicU32,
    /// Fail the next N `upload` calls with a transient error.
    transient_upload_failures: AtomicU32,
    delete_calls: AtomicU32,
    url_calls: AtomicU32,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_url_requests(&self, count: u32) {
        self.transient_url_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_uploads(&self, count: u32) {
        self.transient_upload_failures.store(count, Ordering::SeqCst);
    }

    pub fn delete_call_count(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn url_call_count(&self) -> u32 {
        self.url_calls.load(Ordering::SeqCst)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.read().unwrap().contains_key(path)
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current > 0).then(|| current - 1)
            })
            .is_ok()
    }

    fn url_for(path: &str) -> String {
        format!("memory://storage/{path}")
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        on_progress: Option<&ProgressFn>,
    ) -> PortResult<StoredObject> {
        if let Some(progress) = on_progress {
            progress(0.0);
        }
        if Self::take_failure(&self.transient_upload_failures) {
            return Err(PortError::Transient("Simulated upload failure".to_string()));
        }
        self.objects
            .write()
            .unwrap()
            .insert(path.to_string(), (bytes, content_type.to_string()));
        if let Some(progress) = on_progress {
            progress(100.0);
        }
        Ok(StoredObject {
            url: Self::url_for(path),
            path: path.to_string(),
        })
    }

    async fn download_url(&self, path: &str) -> PortResult<String> {
        self.url_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.transient_url_failures) {
            return Err(PortError::Transient(
                "Simulated authorization failure".to_string(),
            ));
        }
        if self.objects.read().unwrap().contains_key(path) {
            Ok(Self::url_for(path))
        } else {
            Err(PortError::NotFound(format!("Object {path} does not exist")))
        }
    }

    async fn delete(&self, path: &str) -> PortResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.objects.write().unwrap().remove(path).is_some() {
            Ok(())
        } else {
            Err(PortError::NotFound(format!("Object {path} does not exist")))
        }
    }

    async fn list(&self, prefix: &str) -> PortResult<Vec<String>> {
        Ok(self
            .objects
            .read()
            .unwrap()
            .keys()
            .filter(|path| path.starts_with(prefix))
            .cloned()
            .collect())
    }
}

//=========================================================================================
// Identity provider
//=========================================================================================

struct Credential {
    user: AuthUser,
    password_hash: String,
}

#[derive(Default)]
pub struct InMemoryIdentityProvider {
    accounts: RwLock<HashMap<String, Credential>>,
    token_counter: AtomicU64,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn hash_password(password: &str) -> PortResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PortError::Unexpected(format!("Failed to hash password: {e}")))?
            .to_string())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<AuthUser> {
        let normalized = email.trim().to_lowercase();
        let mut accounts = self.accounts.write().unwrap();
        if accounts.contains_key(&normalized) {
            return Err(PortError::Auth(format!("Account {normalized} already exists")));
        }
        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: Some(normalized.clone()),
            display_name: None,
            created_at: Some(Utc::now()),
        };
        accounts.insert(
            normalized,
            Credential {
                user: user.clone(),
                password_hash: Self::hash_password(password)?,
            },
        );
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthUser> {
        let normalized = email.trim().to_lowercase();
        let accounts = self.accounts.read().unwrap();
        let credential = accounts
            .get(&normalized)
            .ok_or_else(|| PortError::Auth("Invalid email or password".to_string()))?;

        let parsed = PasswordHash::new(&credential.password_hash)
            .map_err(|e| PortError::Unexpected(format!("Failed to parse password hash: {e}")))?;
        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            return Err(PortError::Auth("Invalid email or password".to_string()));
        }
        Ok(credential.user.clone())
    }

    async fn sign_in_with_provider(&self, provider_token: &str) -> PortResult<ProviderSignIn> {
        // The development provider token is simply the federated account's
        // email address.
        let email = provider_token.trim().to_lowercase();
        if email.is_empty() {
            return Err(PortError::Auth("Empty provider token".to_string()));
        }
        let mut accounts = self.accounts.write().unwrap();
        if let Some(credential) = accounts.get(&email) {
            return Ok(ProviderSignIn {
                user: credential.user.clone(),
                is_new_user: false,
            });
        }
        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: Some(email.clone()),
            display_name: None,
            created_at: Some(Utc::now()),
        };
        accounts.insert(
            email,
            Credential {
                user: user.clone(),
                password_hash: String::new(), // federated accounts carry no local password
            },
        );
        Ok(ProviderSignIn {
            user,
            is_new_user: true,
        })
    }

    async fn reset_password(&self, email: &str) -> PortResult<()> {
        let normalized = email.trim().to_lowercase();
        if self.accounts.read().unwrap().contains_key(&normalized) {
            Ok(())
        } else {
            Err(PortError::Auth(format!("No account for {normalized}")))
        }
    }

    async fn fresh_id_token(&self, user_id: &str) -> PortResult<String> {
        let n = self.token_counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("dev-token-{user_id}-{n}"))
    }
}

//=========================================================================================
// Function invoker
//=========================================================================================

/// Records every invocation; names registered via `fail` return an error.
#[derive(Default)]
pub struct RecordingFunctionInvoker {
    calls: Mutex<Vec<(String, Value)>>,
    failing: RwLock<HashSet<String>>,
}

impl RecordingFunctionInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, name: &str) {
        self.failing.write().unwrap().insert(name.to_string());
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called_names(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl FunctionInvoker for RecordingFunctionInvoker {
    async fn invoke(&self, name: &str, payload: Value) -> PortResult<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), payload));
        if self.failing.read().unwrap().contains(name) {
            return Err(PortError::Unexpected(format!("Function {name} unavailable")));
        }
        Ok(json!({ "success": true }))
    }
}

//=========================================================================================
// Payment gateway
//=========================================================================================

#[derive(Default)]
pub struct StaticPaymentGateway {
    redirect_base: String,
    sessions: Mutex<Vec<(String, CheckoutRequest)>>,
}

impl StaticPaymentGateway {
    pub fn new(redirect_base: &str) -> Self {
        Self {
            redirect_base: redirect_base.to_string(),
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// The `(id_token, request)` pairs seen so far, for assertions.
    pub fn sessions(&self) -> Vec<(String, CheckoutRequest)> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for StaticPaymentGateway {
    async fn create_checkout_session(
        &self,
        id_token: &str,
        request: &CheckoutRequest,
    ) -> PortResult<CheckoutSession> {
        if id_token.is_empty() {
            return Err(PortError::Auth("Missing ID token".to_string()));
        }
        let session_id = format!("cs_test_{}", Uuid::new_v4().simple());
        self.sessions
            .lock()
            .unwrap()
            .push((id_token.to_string(), request.clone()));
        Ok(CheckoutSession { session_id })
    }

    fn redirect_url(&self, session_id: &str) -> String {
        format!("{}?session_id={}", self.redirect_base, session_id)
    }
}
