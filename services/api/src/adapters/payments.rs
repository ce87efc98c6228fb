//! services/api/src/adapters/payments.rs
//!
//! Checkout-session creation against the payment collaborator. The session is
//! created with a freshly refreshed bearer ID token (stale tokens are
//! rejected at this boundary) and the browser is then redirected to the
//! hosted checkout page.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use storyincolor_core::domain::{CheckoutRequest, CheckoutSession};
use storyincolor_core::ports::{PaymentGateway, PortError, PortResult};

#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    session_url: String,
    redirect_base: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    session_id: String,
}

impl HttpPaymentGateway {
    pub fn new(client: Client, session_url: &str, redirect_base: &str) -> Self {
        Self {
            client,
            session_url: session_url.to_string(),
            redirect_base: redirect_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_checkout_session(
        &self,
        id_token: &str,
        request: &CheckoutRequest,
    ) -> PortResult<CheckoutSession> {
        let response = self
            .client
            .post(&self.session_url)
            .bearer_auth(id_token)
            .json(&json!({
                "projectId": request.project_id,
                "productType": request.product_type.as_str(),
                "title": request.title,
            }))
            .send()
            .await
            .map_err(|e| PortError::Transient(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED => {
                return Err(PortError::Auth(
                    "Checkout session creation rejected the ID token".to_string(),
                ))
            }
            status if status.is_server_error() => {
                return Err(PortError::Transient(format!("Checkout returned {status}")))
            }
            status => {
                return Err(PortError::Unexpected(format!("Checkout returned {status}")))
            }
        }

        let parsed = response
            .json::<SessionResponse>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(CheckoutSession {
            session_id: parsed.session_id,
        })
    }

    fn redirect_url(&self, session_id: &str) -> String {
        format!("{}?session_id={}", self.redirect_base, session_id)
    }
}
