//! services/api/src/adapters/identity.rs
//!
//! Adapter for the external authentication provider. Credentials never live
//! in this service; sign-in/sign-up are delegated and the provider hands back
//! the user identity plus force-refreshable ID tokens.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use storyincolor_core::domain::AuthUser;
use storyincolor_core::ports::{IdentityProvider, PortError, PortResult, ProviderSignIn};

#[derive(Clone)]
pub struct HttpIdentityProvider {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    id: String,
    email: Option<String>,
    display_name: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl AccountResponse {
    fn to_domain(self) -> AuthUser {
        AuthUser {
            id: self.id,
            email: self.email,
            display_name: self.display_name,
            created_at: self.created_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderResponse {
    user: AccountResponse,
    is_new_user: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    id_token: String,
}

impl HttpIdentityProvider {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn check(
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> PortResult<reqwest::Response> {
        let response = response.map_err(|e| PortError::Transient(e.to_string()))?;
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                PortError::Auth("The identity provider rejected the request".to_string()),
            ),
            StatusCode::NOT_FOUND => Err(PortError::Auth("Unknown account".to_string())),
            status if status.is_server_error() => Err(PortError::Transient(format!(
                "Identity provider returned {status}"
            ))),
            status => Err(PortError::Unexpected(format!(
                "Identity provider returned {status}"
            ))),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<AuthUser> {
        let response = Self::check(
            self.client
                .post(format!("{}/accounts/sign-up", self.base_url))
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await,
        )
        .await?;
        Ok(response
            .json::<AccountResponse>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .to_domain())
    }

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthUser> {
        let response = Self::check(
            self.client
                .post(format!("{}/accounts/sign-in", self.base_url))
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await,
        )
        .await?;
        Ok(response
            .json::<AccountResponse>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .to_domain())
    }

    async fn sign_in_with_provider(&self, provider_token: &str) -> PortResult<ProviderSignIn> {
        let response = Self::check(
            self.client
                .post(format!("{}/accounts/provider-sign-in", self.base_url))
                .json(&json!({ "token": provider_token }))
                .send()
                .await,
        )
        .await?;
        let parsed = response
            .json::<ProviderResponse>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(ProviderSignIn {
            user: parsed.user.to_domain(),
            is_new_user: parsed.is_new_user,
        })
    }

    async fn reset_password(&self, email: &str) -> PortResult<()> {
        Self::check(
            self.client
                .post(format!("{}/accounts/reset-password", self.base_url))
                .json(&json!({ "email": email }))
                .send()
                .await,
        )
        .await?;
        Ok(())
    }

    async fn fresh_id_token(&self, user_id: &str) -> PortResult<String> {
        let response = Self::check(
            self.client
                .post(format!("{}/tokens", self.base_url))
                .json(&json!({ "userId": user_id, "forceRefresh": true }))
                .send()
                .await,
        )
        .await?;
        Ok(response
            .json::<TokenResponse>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .id_token)
    }
}
