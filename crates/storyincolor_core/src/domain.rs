//! crates/storyincolor_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

/// The product a coloring book is ordered as. Determines page limits and price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductType {
    Standard,
    Premium,
    Pdf,
}

impl ProductType {
    /// Lenient parse: unknown or missing input falls back to `Standard`,
    /// matching how stored documents are read back.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "premium" => ProductType::Premium,
            "pdf" | "digital" => ProductType::Pdf,
            _ => ProductType::Standard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Standard => "standard",
            ProductType::Premium => "premium",
            ProductType::Pdf => "pdf",
        }
    }

    /// Hard ceiling on pages per book. Submission truncates to this, it never rejects.
    pub fn max_pages(&self) -> usize {
        match self {
            ProductType::Standard => 10,
            ProductType::Premium => 30,
            ProductType::Pdf => 10,
        }
    }

    /// Photos required before the wizard allows leaving the upload step.
    pub fn required_photos(&self) -> usize {
        match self {
            ProductType::Standard => 10,
            ProductType::Premium => 30,
            ProductType::Pdf => 10,
        }
    }

    /// Fixed display price for checkout and the preview screen.
    pub fn price(&self) -> &'static str {
        match self {
            ProductType::Standard => "$24.90",
            ProductType::Premium => "$39.50",
            ProductType::Pdf => "$9.90",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProductType::Standard => "Standard Coloring Book",
            ProductType::Premium => "Premium Coloring Book",
            ProductType::Pdf => "Digital Coloring Book",
        }
    }
}

/// The artistic style the external pipeline converts photos into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtStyle {
    Classic,
    Ghibli,
}

impl ArtStyle {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "ghibli" => ArtStyle::Ghibli,
            _ => ArtStyle::Classic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtStyle::Classic => "classic",
            ArtStyle::Ghibli => "ghibli",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectStatus {
    Draft,
    Preview,
    PaymentPending,
    Ordered,
}

impl ProjectStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "preview" => ProjectStatus::Preview,
            "payment_pending" => ProjectStatus::PaymentPending,
            "ordered" => ProjectStatus::Ordered,
            _ => ProjectStatus::Draft,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::Preview => "preview",
            ProjectStatus::PaymentPending => "payment_pending",
            ProjectStatus::Ordered => "ordered",
        }
    }
}

/// One image slot within a project.
///
/// Page numbers are always a contiguous 1..N sequence matching array order;
/// every insert/remove/reorder renumbers.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub id: String,
    pub page_number: u32,
    pub photo_id: Option<String>,
    pub photo_path: Option<String>,
    pub photo_url: Option<String>,
    pub photo_name: Option<String>,
    /// Set when the submission-time upload of this page failed; the page is
    /// kept so the user can see and retry it.
    pub upload_error: bool,
    pub is_blank: bool,
    pub processed: bool,
    pub processed_image_path: Option<String>,
    pub processed_image_url: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// One coloring-book order-in-progress or completed order.
#[derive(Debug, Clone)]
pub struct Project {
    /// Generated client-side, stable across edit sessions.
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub product_type: ProductType,
    pub art_style: ArtStyle,
    pub status: ProjectStatus,
    pub thumbnail_path: Option<String>,
    /// Pages embedded inline in the document. Some projects keep pages in a
    /// subcollection instead; readers go through `ProjectStore::list_pages`.
    pub pages: Vec<Page>,
    pub has_processed_image: bool,
    pub processed_image_path: Option<String>,
    pub processed_image_url: Option<String>,
    pub notification_sent: bool,
    pub notification_sent_at: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    // Populated only by the checkout webhook, never by this service.
    pub order_number: Option<String>,
    pub order_date: Option<DateTime<Utc>>,
    pub estimated_delivery: Option<String>,
    pub payment_id: Option<String>,
}

impl Project {
    pub fn new(user_id: &str, title: &str, product_type: ProductType, art_style: ArtStyle) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            product_type,
            art_style,
            status: ProjectStatus::Draft,
            thumbnail_path: None,
            pages: Vec::new(),
            has_processed_image: false,
            processed_image_path: None,
            processed_image_url: None,
            notification_sent: false,
            notification_sent_at: None,
            deleted: false,
            deleted_at: None,
            created_at: None,
            updated_at: None,
            order_number: None,
            order_date: None,
            estimated_delivery: None,
            payment_id: None,
        }
    }
}

/// Partial project update. `None` fields are left untouched by the store;
/// the store always stamps `updated_at` and never overwrites `created_at`.
#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub product_type: Option<ProductType>,
    pub art_style: Option<ArtStyle>,
    pub status: Option<ProjectStatus>,
    pub thumbnail_path: Option<String>,
    pub pages: Option<Vec<Page>>,
    pub has_processed_image: Option<bool>,
    pub processed_image_path: Option<String>,
    pub processed_image_url: Option<String>,
    pub notification_sent: Option<bool>,
    pub notification_sent_at: Option<DateTime<Utc>>,
}

// Represents the authenticated user as issued by the identity provider.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>, // may be absent pending propagation
    pub display_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Profile fields mirrored lazily into a document keyed by user id, for data
/// the auth record does not carry (e.g. the soft-delete flag).
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A successfully stored object: the storage path plus a download URL.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub url: String,
    pub path: String,
}

/// An opaque pending-purchase token from the payment collaborator.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub project_id: String,
    pub product_type: ProductType,
    pub title: String,
}

/// The set of identities allowed into the admin fulfillment workflow.
/// Injected from configuration at startup so it is testable and
/// environment-specific.
#[derive(Debug, Clone, Default)]
pub struct AdminPolicy {
    emails: HashSet<String>,
}

impl AdminPolicy {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn is_admin(&self, email: Option<&str>) -> bool {
        match email {
            Some(e) => self.emails.contains(&e.trim().to_lowercase()),
            None => false,
        }
    }
}

/// Deterministic storage layout under the object store.
pub mod paths {
    /// Where a page's original photo is uploaded at submission time.
    pub fn photo(user_id: &str, project_id: &str, photo_id: &str) -> String {
        format!("users/{user_id}/projects/{project_id}/photos/{photo_id}.jpg")
    }

    /// Where the admin workflow stores the processed (AI-converted) image.
    pub fn processed(user_id: &str, project_id: &str, photo_id: &str) -> String {
        format!("users/{user_id}/projects/{project_id}/processed/{photo_id}.jpg")
    }

    /// Prefix covering every asset a project owns.
    pub fn project_prefix(user_id: &str, project_id: &str) -> String {
        format!("users/{user_id}/projects/{project_id}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_type_limits_are_constant() {
        assert_eq!(ProductType::Standard.max_pages(), 10);
        assert_eq!(ProductType::Premium.max_pages(), 30);
        assert_eq!(ProductType::Pdf.max_pages(), 10);
        assert_eq!(ProductType::Standard.required_photos(), 10);
        assert_eq!(ProductType::Premium.required_photos(), 30);
    }

    #[test]
    fn product_type_parse_defaults_to_standard() {
        assert_eq!(ProductType::parse("premium"), ProductType::Premium);
        assert_eq!(ProductType::parse("PDF"), ProductType::Pdf);
        assert_eq!(ProductType::parse("digital"), ProductType::Pdf);
        assert_eq!(ProductType::parse("hardcover"), ProductType::Standard);
        assert_eq!(ProductType::parse(""), ProductType::Standard);
    }

    #[test]
    fn prices_match_the_product_table() {
        assert_eq!(ProductType::Standard.price(), "$24.90");
        assert_eq!(ProductType::Premium.price(), "$39.50");
        assert_eq!(ProductType::Pdf.price(), "$9.90");
        // Unknown products are priced as standard.
        assert_eq!(ProductType::parse("unknown").price(), "$24.90");
    }

    #[test]
    fn admin_policy_matches_case_insensitively() {
        let policy = AdminPolicy::new(["Ops@Example.Com", "  "]);
        assert!(policy.is_admin(Some("ops@example.com")));
        assert!(policy.is_admin(Some("OPS@EXAMPLE.COM")));
        assert!(!policy.is_admin(Some("user@example.com")));
        assert!(!policy.is_admin(None));
    }

    #[test]
    fn photo_paths_are_deterministic() {
        assert_eq!(
            paths::photo("u1", "p1", "ph1"),
            "users/u1/projects/p1/photos/ph1.jpg"
        );
        assert_eq!(
            paths::processed("u1", "p1", "ph1"),
            "users/u1/projects/p1/processed/ph1.jpg"
        );
    }
}
