//! crates/storyincolor_core/src/session.rs
//!
//! Wraps the identity provider in the session lifecycle the rest of the app
//! observes: `Uninitialized -> Initializing -> {Authenticated, Anonymous}`,
//! with sign-out returning to `Anonymous`. Distinguishes "still starting up"
//! from "checked, no user".

use std::sync::Arc;

use crate::domain::AuthUser;
use crate::ports::{IdentityProvider, PortError, PortResult, ProviderSignIn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    Authenticated,
    Anonymous,
}

pub struct IdentitySession {
    provider: Arc<dyn IdentityProvider>,
    phase: SessionPhase,
    current_user: Option<AuthUser>,
}

impl IdentitySession {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            phase: SessionPhase::Uninitialized,
            current_user: None,
        }
    }

    pub fn begin_initializing(&mut self) {
        if self.phase == SessionPhase::Uninitialized {
            self.phase = SessionPhase::Initializing;
        }
    }

    /// The provider callback: either a restored user or a confirmed
    /// signed-out state.
    pub fn initialized(&mut self, restored: Option<AuthUser>) {
        self.phase = match restored {
            Some(_) => SessionPhase::Authenticated,
            None => SessionPhase::Anonymous,
        };
        self.current_user = restored;
    }

    /// True once the provider has reported either way.
    pub fn is_initialized(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Authenticated | SessionPhase::Anonymous
        )
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn current_user(&self) -> Option<&AuthUser> {
        self.current_user.as_ref()
    }

    fn require_initialized(&self) -> PortResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(PortError::Auth("Session is not yet initialized".to_string()))
        }
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> PortResult<AuthUser> {
        self.require_initialized()?;
        let user = self.provider.sign_in(email, password).await?;
        self.phase = SessionPhase::Authenticated;
        self.current_user = Some(user.clone());
        Ok(user)
    }

    pub async fn sign_up(&mut self, email: &str, password: &str) -> PortResult<AuthUser> {
        self.require_initialized()?;
        let user = self.provider.sign_up(email, password).await?;
        self.phase = SessionPhase::Authenticated;
        self.current_user = Some(user.clone());
        Ok(user)
    }

    pub async fn sign_in_with_provider(&mut self, token: &str) -> PortResult<ProviderSignIn> {
        self.require_initialized()?;
        let outcome = self.provider.sign_in_with_provider(token).await?;
        self.phase = SessionPhase::Authenticated;
        self.current_user = Some(outcome.user.clone());
        Ok(outcome)
    }

    pub async fn reset_password(&self, email: &str) -> PortResult<()> {
        self.require_initialized()?;
        self.provider.reset_password(email).await
    }

    pub fn sign_out(&mut self) {
        if self.phase == SessionPhase::Authenticated {
            self.phase = SessionPhase::Anonymous;
        }
        self.current_user = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::executor::block_on;

    struct StubProvider;

    #[async_trait]
    impl IdentityProvider for StubProvider {
        async fn sign_up(&self, email: &str, _password: &str) -> PortResult<AuthUser> {
            Ok(AuthUser {
                id: "u1".to_string(),
                email: Some(email.to_string()),
                display_name: None,
                created_at: None,
            })
        }

        async fn sign_in(&self, email: &str, _password: &str) -> PortResult<AuthUser> {
            self.sign_up(email, "").await
        }

        async fn sign_in_with_provider(&self, _token: &str) -> PortResult<ProviderSignIn> {
            Ok(ProviderSignIn {
                user: AuthUser {
                    id: "u1".to_string(),
                    email: None,
                    display_name: None,
                    created_at: None,
                },
                is_new_user: true,
            })
        }

        async fn reset_password(&self, _email: &str) -> PortResult<()> {
            Ok(())
        }

        async fn fresh_id_token(&self, _user_id: &str) -> PortResult<String> {
            Ok("token".to_string())
        }
    }

    #[test]
    fn operations_fail_before_initialization() {
        let mut session = IdentitySession::new(Arc::new(StubProvider));
        assert_eq!(session.phase(), SessionPhase::Uninitialized);
        assert!(!session.is_initialized());

        let err = block_on(session.sign_in("a@b.c", "pw")).unwrap_err();
        assert!(matches!(err, PortError::Auth(_)));

        session.begin_initializing();
        assert_eq!(session.phase(), SessionPhase::Initializing);
        assert!(block_on(session.sign_in("a@b.c", "pw")).is_err());
    }

    #[test]
    fn lifecycle_transitions() {
        let mut session = IdentitySession::new(Arc::new(StubProvider));
        session.begin_initializing();
        session.initialized(None);
        assert_eq!(session.phase(), SessionPhase::Anonymous);
        assert!(session.is_initialized());
        assert!(session.current_user().is_none());

        block_on(session.sign_in("a@b.c", "pw")).unwrap();
        assert_eq!(session.phase(), SessionPhase::Authenticated);
        assert!(session.current_user().is_some());

        session.sign_out();
        assert_eq!(session.phase(), SessionPhase::Anonymous);
        assert!(session.current_user().is_none());
    }
}
