//! services/api/src/adapters/documents.rs
//!
//! This module contains the document-store adapter, the concrete
//! implementation of the `ProjectStore` port. It speaks to the hierarchical
//! document database collaborator over HTTP
//! (`users/{uid}/projects/{pid}/pages` plus the admin-only cross-user
//! listing) using `reqwest`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use storyincolor_core::domain::{
    ArtStyle, Page, ProductType, Project, ProjectPatch, ProjectStatus, UserProfile,
};
use storyincolor_core::ports::{PortError, PortResult, ProjectStore};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A document-store adapter that implements the `ProjectStore` port.
#[derive(Clone)]
pub struct HttpDocumentStore {
    client: Client,
    base_url: String,
}

impl HttpDocumentStore {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn project_url(&self, user_id: &str, project_id: &str) -> String {
        format!("{}/users/{user_id}/projects/{project_id}", self.base_url)
    }

    fn pages_url(&self, user_id: &str, project_id: &str) -> String {
        format!("{}/pages", self.project_url(user_id, project_id))
    }

    async fn check(response: Result<reqwest::Response, reqwest::Error>) -> PortResult<reqwest::Response> {
        let response = response.map_err(|e| PortError::Transient(e.to_string()))?;
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(PortError::NotFound("Document not found".to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(PortError::Auth("Document store rejected the request".to_string()))
            }
            status if status.is_server_error() => {
                Err(PortError::Transient(format!("Document store returned {status}")))
            }
            status => Err(PortError::Unexpected(format!(
                "Document store returned {status}"
            ))),
        }
    }

    async fn fetch_project_record(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> PortResult<ProjectRecord> {
        let response = Self::check(
            self.client
                .get(self.project_url(user_id, project_id))
                .send()
                .await,
        )
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => PortError::NotFound(format!("Project {project_id} not found")),
            other => other,
        })?;
        response
            .json::<ProjectRecord>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn fetch_subcollection_pages(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> PortResult<Vec<PageRecord>> {
        match Self::check(
            self.client
                .get(self.pages_url(user_id, project_id))
                .send()
                .await,
        )
        .await
        {
            Ok(response) => response
                .json::<Vec<PageRecord>>()
                .await
                .map_err(|e| PortError::Unexpected(e.to_string())),
            // A project without a pages subcollection is the common case.
            Err(PortError::NotFound(_)) => Ok(Vec::new()),
            Err(other) => Err(other),
        }
    }

    async fn patch_project(
        &self,
        user_id: &str,
        project_id: &str,
        mut fields: Map<String, Value>,
    ) -> PortResult<()> {
        // Writes always stamp updated-at; created-at is never touched here.
        fields.insert("updatedAt".to_string(), json!(Utc::now()));
        Self::check(
            self.client
                .patch(self.project_url(user_id, project_id))
                .json(&Value::Object(fields))
                .send()
                .await,
        )
        .await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Document Record Structs
//=========================================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PageRecord {
    id: String,
    page_number: u32,
    photo_id: Option<String>,
    /// Older documents stored this under `imagePath`.
    #[serde(alias = "imagePath")]
    photo_path: Option<String>,
    photo_url: Option<String>,
    photo_name: Option<String>,
    upload_error: bool,
    is_blank: bool,
    processed: bool,
    processed_image_path: Option<String>,
    processed_image_url: Option<String>,
    processed_at: Option<DateTime<Utc>>,
}

impl PageRecord {
    fn to_domain(self) -> Page {
        Page {
            id: self.id,
            page_number: self.page_number,
            photo_id: self.photo_id,
            photo_path: self.photo_path,
            photo_url: self.photo_url,
            photo_name: self.photo_name,
            upload_error: self.upload_error,
            is_blank: self.is_blank,
            processed: self.processed,
            processed_image_path: self.processed_image_path,
            processed_image_url: self.processed_image_url,
            processed_at: self.processed_at,
        }
    }

    fn from_domain(page: &Page) -> Self {
        Self {
            id: page.id.clone(),
            page_number: page.page_number,
            photo_id: page.photo_id.clone(),
            photo_path: page.photo_path.clone(),
            photo_url: page.photo_url.clone(),
            photo_name: page.photo_name.clone(),
            upload_error: page.upload_error,
            is_blank: page.is_blank,
            processed: page.processed,
            processed_image_path: page.processed_image_path.clone(),
            processed_image_url: page.processed_image_url.clone(),
            processed_at: page.processed_at,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProjectRecord {
    id: String,
    user_id: String,
    title: String,
    product_type: String,
    art_style: String,
    status: String,
    thumbnail_path: Option<String>,
    pages: Vec<PageRecord>,
    has_processed_image: bool,
    processed_image_path: Option<String>,
    processed_image_url: Option<String>,
    notification_sent: bool,
    notification_sent_at: Option<DateTime<Utc>>,
    deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    order_number: Option<String>,
    order_date: Option<DateTime<Utc>>,
    estimated_delivery: Option<String>,
    payment_id: Option<String>,
}

impl ProjectRecord {
    fn to_domain(self) -> Project {
        Project {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            // Stored documents are loosely typed; parse leniently.
            product_type: ProductType::parse(&self.product_type),
            art_style: ArtStyle::parse(&self.art_style),
            status: ProjectStatus::parse(&self.status),
            thumbnail_path: self.thumbnail_path,
            pages: self.pages.into_iter().map(PageRecord::to_domain).collect(),
            has_processed_image: self.has_processed_image,
            processed_image_path: self.processed_image_path,
            processed_image_url: self.processed_image_url,
            notification_sent: self.notification_sent,
            notification_sent_at: self.notification_sent_at,
            deleted: self.deleted,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            order_number: self.order_number,
            order_date: self.order_date,
            estimated_delivery: self.estimated_delivery,
            payment_id: self.payment_id,
        }
    }

    fn from_domain(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            user_id: project.user_id.clone(),
            title: project.title.clone(),
            product_type: project.product_type.as_str().to_string(),
            art_style: project.art_style.as_str().to_string(),
            status: project.status.as_str().to_string(),
            thumbnail_path: project.thumbnail_path.clone(),
            pages: project.pages.iter().map(PageRecord::from_domain).collect(),
            has_processed_image: project.has_processed_image,
            processed_image_path: project.processed_image_path.clone(),
            processed_image_url: project.processed_image_url.clone(),
            notification_sent: project.notification_sent,
            notification_sent_at: project.notification_sent_at,
            deleted: project.deleted,
            deleted_at: project.deleted_at,
            created_at: project.created_at,
            updated_at: project.updated_at,
            order_number: project.order_number.clone(),
            order_date: project.order_date,
            estimated_delivery: project.estimated_delivery.clone(),
            payment_id: project.payment_id.clone(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserRecord {
    user_id: String,
    email: Option<String>,
    display_name: Option<String>,
    deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
}

//=========================================================================================
// `ProjectStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProjectStore for HttpDocumentStore {
    async fn create_project(&self, user_id: &str, project: &Project) -> PortResult<()> {
        let mut record = ProjectRecord::from_domain(project);
        record.user_id = user_id.to_string();
        let now = Utc::now();
        record.created_at = Some(now);
        record.updated_at = Some(now);
        Self::check(
            self.client
                .put(self.project_url(user_id, &project.id))
                .json(&record)
                .send()
                .await,
        )
        .await?;
        Ok(())
    }

    async fn get_project(&self, user_id: &str, project_id: &str) -> PortResult<Project> {
        Ok(self.fetch_project_record(user_id, project_id).await?.to_domain())
    }

    async fn update_project(
        &self,
        user_id: &str,
        project_id: &str,
        patch: ProjectPatch,
    ) -> PortResult<()> {
        let mut fields = Map::new();
        if let Some(title) = patch.title {
            fields.insert("title".to_string(), json!(title));
        }
        if let Some(product_type) = patch.product_type {
            fields.insert("productType".to_string(), json!(product_type.as_str()));
        }
        if let Some(art_style) = patch.art_style {
            fields.insert("artStyle".to_string(), json!(art_style.as_str()));
        }
        if let Some(status) = patch.status {
            fields.insert("status".to_string(), json!(status.as_str()));
        }
        if let Some(thumbnail_path) = patch.thumbnail_path {
            fields.insert("thumbnailPath".to_string(), json!(thumbnail_path));
        }
        if let Some(pages) = patch.pages {
            let records: Vec<PageRecord> = pages.iter().map(PageRecord::from_domain).collect();
            fields.insert(
                "pages".to_string(),
                serde_json::to_value(records).map_err(|e| PortError::Unexpected(e.to_string()))?,
            );
        }
        if let Some(flag) = patch.has_processed_image {
            fields.insert("hasProcessedImage".to_string(), json!(flag));
        }
        if let Some(path) = patch.processed_image_path {
            fields.insert("processedImagePath".to_string(), json!(path));
        }
        if let Some(url) = patch.processed_image_url {
            fields.insert("processedImageUrl".to_string(), json!(url));
        }
        if let Some(sent) = patch.notification_sent {
            fields.insert("notificationSent".to_string(), json!(sent));
        }
        if let Some(sent_at) = patch.notification_sent_at {
            fields.insert("notificationSentAt".to_string(), json!(sent_at));
        }
        self.patch_project(user_id, project_id, fields).await
    }

    async fn list_projects_by_status(
        &self,
        user_id: &str,
        status: ProjectStatus,
    ) -> PortResult<Vec<Project>> {
        let response = Self::check(
            self.client
                .get(format!("{}/users/{user_id}/projects", self.base_url))
                .query(&[
                    ("status", status.as_str()),
                    ("deleted", "false"),
                    ("orderBy", "updatedAt"),
                    ("direction", "desc"),
                ])
                .send()
                .await,
        )
        .await?;
        let records = response
            .json::<Vec<ProjectRecord>>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(records.into_iter().map(ProjectRecord::to_domain).collect())
    }

    async fn soft_delete_project(&self, user_id: &str, project_id: &str) -> PortResult<()> {
        let record = self.fetch_project_record(user_id, project_id).await?;
        if record.deleted {
            return Ok(());
        }
        let mut fields = Map::new();
        fields.insert("deleted".to_string(), json!(true));
        fields.insert("deletedAt".to_string(), json!(Utc::now()));
        self.patch_project(user_id, project_id, fields).await
    }

    async fn list_all_projects(&self) -> PortResult<Vec<Project>> {
        let response = Self::check(
            self.client
                .get(format!("{}/projects", self.base_url))
                .send()
                .await,
        )
        .await?;
        let records = response
            .json::<Vec<ProjectRecord>>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(records.into_iter().map(ProjectRecord::to_domain).collect())
    }

    async fn list_pages(&self, user_id: &str, project_id: &str) -> PortResult<Vec<Page>> {
        // Probe the subcollection first; fall back to the embedded array.
        let subcollection = self.fetch_subcollection_pages(user_id, project_id).await?;
        if !subcollection.is_empty() {
            return Ok(subcollection.into_iter().map(PageRecord::to_domain).collect());
        }
        let record = self.fetch_project_record(user_id, project_id).await?;
        Ok(record.pages.into_iter().map(PageRecord::to_domain).collect())
    }

    async fn write_pages(
        &self,
        user_id: &str,
        project_id: &str,
        pages: Vec<Page>,
    ) -> PortResult<()> {
        let records: Vec<PageRecord> = pages.iter().map(PageRecord::from_domain).collect();
        let subcollection = self.fetch_subcollection_pages(user_id, project_id).await?;
        if !subcollection.is_empty() {
            Self::check(
                self.client
                    .put(self.pages_url(user_id, project_id))
                    .json(&records)
                    .send()
                    .await,
            )
            .await?;
            // Keep the parent's updated-at stamp moving as well.
            return self.patch_project(user_id, project_id, Map::new()).await;
        }
        let mut fields = Map::new();
        fields.insert(
            "pages".to_string(),
            serde_json::to_value(records).map_err(|e| PortError::Unexpected(e.to_string()))?,
        );
        self.patch_project(user_id, project_id, fields).await
    }

    async fn get_user_profile(&self, user_id: &str) -> PortResult<UserProfile> {
        let response = Self::check(
            self.client
                .get(format!("{}/users/{user_id}", self.base_url))
                .send()
                .await,
        )
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => PortError::NotFound(format!("User {user_id} not found")),
            other => other,
        })?;
        let record = response
            .json::<UserRecord>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(UserProfile {
            user_id: if record.user_id.is_empty() {
                user_id.to_string()
            } else {
                record.user_id
            },
            email: record.email,
            display_name: record.display_name,
            deleted: record.deleted,
            deleted_at: record.deleted_at,
        })
    }

    async fn upsert_user_profile(&self, profile: &UserProfile) -> PortResult<()> {
        let record = UserRecord {
            user_id: profile.user_id.clone(),
            email: profile.email.clone(),
            display_name: profile.display_name.clone(),
            deleted: profile.deleted,
            deleted_at: profile.deleted_at,
        };
        Self::check(
            self.client
                .put(format!("{}/users/{}", self.base_url, profile.user_id))
                .json(&record)
                .send()
                .await,
        )
        .await?;
        Ok(())
    }

    async fn soft_delete_user(&self, user_id: &str) -> PortResult<()> {
        match self.get_user_profile(user_id).await {
            Ok(mut profile) => {
                if profile.deleted {
                    return Ok(());
                }
                profile.deleted = true;
                profile.deleted_at = Some(Utc::now());
                self.upsert_user_profile(&profile).await
            }
            // No profile document means there is nothing to mark.
            Err(PortError::NotFound(_)) => Ok(()),
            Err(other) => Err(other),
        }
    }
}
