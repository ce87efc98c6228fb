//! services/api/src/adapters/functions.rs
//!
//! Invoker for the named serverless functions collaborator. Every function is
//! called with a JSON payload wrapped in a `data` envelope and answers with a
//! JSON result carrying a `success` flag.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use storyincolor_core::ports::{FunctionInvoker, PortError, PortResult};

#[derive(Clone)]
pub struct HttpFunctionInvoker {
    client: Client,
    base_url: String,
}

impl HttpFunctionInvoker {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FunctionInvoker for HttpFunctionInvoker {
    async fn invoke(&self, name: &str, payload: Value) -> PortResult<Value> {
        let response = self
            .client
            .post(format!("{}/{name}", self.base_url))
            .json(&json!({ "data": payload }))
            .send()
            .await
            .map_err(|e| PortError::Transient(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(PortError::NotFound(format!("Function {name} not found")))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(PortError::Auth(format!("Function {name} rejected the call")))
            }
            status if status.is_server_error() => {
                return Err(PortError::Transient(format!(
                    "Function {name} returned {status}"
                )))
            }
            status => {
                return Err(PortError::Unexpected(format!(
                    "Function {name} returned {status}"
                )))
            }
        }

        let result = response
            .json::<Value>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.get("success").and_then(Value::as_bool) == Some(true) {
            Ok(result)
        } else {
            let message = result
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("reported failure");
            Err(PortError::Unexpected(format!("Function {name}: {message}")))
        }
    }
}
