//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-tab wizard registry.

use crate::assets::AssetService;
use crate::config::Config;
use crate::web::wizard_cache::WizardCache;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use storyincolor_core::domain::AdminPolicy;
use storyincolor_core::notify::Notifier;
use storyincolor_core::ports::{IdentityProvider, PaymentGateway, ProjectStore};
use storyincolor_core::wizard::WizardSession;
use tokio::sync::Mutex;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub identity: Arc<dyn IdentityProvider>,
    pub projects: Arc<dyn ProjectStore>,
    pub assets: AssetService,
    pub notifier: Arc<Notifier>,
    pub payments: Arc<dyn PaymentGateway>,
    pub admin_policy: AdminPolicy,
    pub auth_sessions: AuthSessions,
    pub wizards: WizardRegistry,
    pub wizard_cache: Arc<WizardCache>,
}

//=========================================================================================
// Browser login sessions (auth cookie)
//=========================================================================================

#[derive(Debug, Clone)]
pub struct AuthSessionEntry {
    pub user_id: String,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Cookie-token login sessions, held in process memory for their 30-day
/// lifetime.
#[derive(Default)]
pub struct AuthSessions {
    sessions: RwLock<HashMap<String, AuthSessionEntry>>,
}

pub const AUTH_SESSION_DAYS: i64 = 30;

impl AuthSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session and returns its cookie token.
    pub fn create(&self, user_id: &str, email: Option<&str>) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions.write().unwrap().insert(
            token.clone(),
            AuthSessionEntry {
                user_id: user_id.to_string(),
                email: email.map(str::to_string),
                expires_at: Utc::now() + Duration::days(AUTH_SESSION_DAYS),
            },
        );
        token
    }

    pub fn validate(&self, token: &str) -> Option<AuthSessionEntry> {
        let sessions = self.sessions.read().unwrap();
        let entry = sessions.get(token)?;
        if entry.expires_at < Utc::now() {
            return None;
        }
        Some(entry.clone())
    }

    pub fn remove(&self, token: &str) {
        self.sessions.write().unwrap().remove(token);
    }
}

//=========================================================================================
// Wizard registry (one live session per browser tab)
//=========================================================================================

#[derive(Default)]
pub struct WizardRegistry {
    sessions: RwLock<HashMap<String, Arc<Mutex<WizardSession>>>>,
}

impl WizardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh wizard session and returns its id.
    pub fn create(&self, session: WizardSession) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .unwrap()
            .insert(id.clone(), Arc::new(Mutex::new(session)));
        id
    }

    pub fn get(&self, id: &str) -> Option<Arc<Mutex<WizardSession>>> {
        self.sessions.read().unwrap().get(id).cloned()
    }

    /// Re-register a session under a known id (restoring a cached tab).
    pub fn insert(&self, id: &str, session: WizardSession) -> Arc<Mutex<WizardSession>> {
        let session = Arc::new(Mutex::new(session));
        self.sessions
            .write()
            .unwrap()
            .insert(id.to_string(), session.clone());
        session
    }

    pub fn remove(&self, id: &str) {
        self.sessions.write().unwrap().remove(id);
    }
}
