//! services/api/src/adapters/storage.rs
//!
//! Object-storage adapter: path-addressed blob upload/download-URL/delete/list
//! against the storage collaborator. URL retrieval is subject to transient
//! authorization/CORS-class failures, which map to the retryable error class;
//! a missing object is terminal.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use storyincolor_core::domain::StoredObject;
use storyincolor_core::ports::{ObjectStore, PortError, PortResult, ProgressFn};

#[derive(Clone)]
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct UrlResponse {
    url: String,
}

#[derive(Deserialize)]
struct ListResponse {
    paths: Vec<String>,
}

impl HttpObjectStore {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/o/{path}", self.base_url)
    }

    async fn check(
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> PortResult<reqwest::Response> {
        let response = response.map_err(|e| PortError::Transient(e.to_string()))?;
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => {
                Err(PortError::NotFound("Object does not exist".to_string()))
            }
            // The authorization/CORS failure class clears on retry.
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PortError::Transient(
                "Storage authorization failure".to_string(),
            )),
            StatusCode::PAYLOAD_TOO_LARGE => Err(PortError::Quota(
                "Object exceeds the storage size ceiling".to_string(),
            )),
            status if status.is_server_error() => {
                Err(PortError::Transient(format!("Storage returned {status}")))
            }
            status => Err(PortError::Unexpected(format!("Storage returned {status}"))),
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        on_progress: Option<&ProgressFn>,
    ) -> PortResult<StoredObject> {
        // The HTTP client exposes no byte-level progress; the contract only
        // guarantees that 0 and 100 are observed for a completed upload.
        if let Some(progress) = on_progress {
            progress(0.0);
        }
        let response = Self::check(
            self.client
                .put(self.object_url(path))
                .header(reqwest::header::CONTENT_TYPE, content_type.to_string())
                .body(bytes)
                .send()
                .await,
        )
        .await?;
        let url = response
            .json::<UrlResponse>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .url;
        if let Some(progress) = on_progress {
            progress(100.0);
        }
        Ok(StoredObject {
            url,
            path: path.to_string(),
        })
    }

    async fn download_url(&self, path: &str) -> PortResult<String> {
        let response = Self::check(
            self.client
                .get(format!("{}/url", self.object_url(path)))
                .send()
                .await,
        )
        .await?;
        Ok(response
            .json::<UrlResponse>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .url)
    }

    async fn delete(&self, path: &str) -> PortResult<()> {
        Self::check(self.client.delete(self.object_url(path)).send().await).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> PortResult<Vec<String>> {
        let response = Self::check(
            self.client
                .get(format!("{}/objects", self.base_url))
                .query(&[("prefix", prefix)])
                .send()
                .await,
        )
        .await?;
        Ok(response
            .json::<ListResponse>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .paths)
    }
}
