//! crates/storyincolor_core/src/wizard.rs
//!
//! The create-project wizard as a pure state machine: product options, art
//! style, photo ingestion and page arrangement, with the step guards that
//! gate each forward transition. All I/O (preview generation, uploads,
//! persistence) happens in the service layer; this module only owns the
//! state and its invariants.

use uuid::Uuid;

use crate::domain::{ArtStyle, ProductType};
use crate::ports::{PortError, PortResult};

/// The wizard's steps, in order. Navigation is strictly linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    ProductOptions,
    ArtStyle,
    UploadPhotos,
    ArrangePages,
}

impl WizardStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WizardStep::ProductOptions => "options",
            WizardStep::ArtStyle => "style",
            WizardStep::UploadPhotos => "upload",
            WizardStep::ArrangePages => "arrange",
        }
    }

    /// Lenient parse for restored state; unknown input lands on the first step.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "style" => WizardStep::ArtStyle,
            "upload" => WizardStep::UploadPhotos,
            "arrange" => WizardStep::ArrangePages,
            _ => WizardStep::ProductOptions,
        }
    }

    fn next(&self) -> Option<WizardStep> {
        match self {
            WizardStep::ProductOptions => Some(WizardStep::ArtStyle),
            WizardStep::ArtStyle => Some(WizardStep::UploadPhotos),
            WizardStep::UploadPhotos => Some(WizardStep::ArrangePages),
            WizardStep::ArrangePages => None,
        }
    }

    fn previous(&self) -> Option<WizardStep> {
        match self {
            WizardStep::ProductOptions => None,
            WizardStep::ArtStyle => Some(WizardStep::ProductOptions),
            WizardStep::UploadPhotos => Some(WizardStep::ArtStyle),
            WizardStep::ArrangePages => Some(WizardStep::UploadPhotos),
        }
    }
}

/// An accepted photo: its bounded preview bytes live only in this session and
/// are what gets uploaded at submission time.
#[derive(Debug, Clone)]
pub struct PhotoAttachment {
    pub id: String,
    pub name: String,
    pub preview: Vec<u8>,
}

/// One slot in the in-progress page list.
#[derive(Debug, Clone)]
pub struct WizardPage {
    pub id: String,
    pub page_number: u32,
    pub photo: Option<PhotoAttachment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Left,
    Right,
}

/// Result of offering a file to the wizard. Non-image files are skipped
/// silently: not an error, not counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingest {
    Accepted { photo_id: String, page_id: String },
    Skipped,
}

/// Ephemeral, per-tab wizard state. Not authoritative; flushed into a
/// Project write only on explicit submission.
#[derive(Debug, Clone)]
pub struct WizardSession {
    /// Becomes the project id on submission; stable across edit sessions.
    pub project_id: String,
    pub title: String,
    pub product_type: ProductType,
    pub art_style: ArtStyle,
    pub step: WizardStep,
    pub pages: Vec<WizardPage>,
    pub upload_progress: f64,
}

impl WizardSession {
    pub fn new() -> Self {
        Self::for_project(&Uuid::new_v4().to_string())
    }

    /// Resume editing an existing project under its stable id.
    pub fn for_project(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            title: String::new(),
            product_type: ProductType::Standard,
            art_style: ArtStyle::Classic,
            step: WizardStep::ProductOptions,
            pages: Vec::new(),
            upload_progress: 0.0,
        }
    }

    pub fn accepts_content_type(content_type: &str) -> bool {
        content_type.trim().to_lowercase().starts_with("image/")
    }

    /// Offer a file to the wizard. Accepted photos each become a new page at
    /// the end of the list.
    pub fn ingest_photo(&mut self, name: &str, content_type: &str, preview: Vec<u8>) -> Ingest {
        if !Self::accepts_content_type(content_type) {
            return Ingest::Skipped;
        }

        let photo_id = Uuid::new_v4().to_string();
        let page_id = Uuid::new_v4().to_string();
        self.pages.push(WizardPage {
            id: page_id.clone(),
            page_number: self.pages.len() as u32 + 1,
            photo: Some(PhotoAttachment {
                id: photo_id.clone(),
                name: name.to_string(),
                preview,
            }),
        });
        Ingest::Accepted { photo_id, page_id }
    }

    /// Removes the photo's page entirely and renumbers the remainder.
    pub fn remove_photo(&mut self, photo_id: &str) -> bool {
        let before = self.pages.len();
        self.pages
            .retain(|page| page.photo.as_ref().map(|p| p.id.as_str()) != Some(photo_id));
        let removed = self.pages.len() != before;
        if removed {
            self.renumber();
        }
        removed
    }

    pub fn remove_page(&mut self, page_id: &str) -> bool {
        let before = self.pages.len();
        self.pages.retain(|page| page.id != page_id);
        let removed = self.pages.len() != before;
        if removed {
            self.renumber();
        }
        removed
    }

    /// Swaps the page with its immediate neighbor. A move off either end is a
    /// no-op, not an error.
    pub fn move_page(&mut self, page_id: &str, direction: MoveDirection) -> bool {
        let Some(index) = self.pages.iter().position(|p| p.id == page_id) else {
            return false;
        };
        match direction {
            MoveDirection::Left if index > 0 => self.pages.swap(index, index - 1),
            MoveDirection::Right if index + 1 < self.pages.len() => {
                self.pages.swap(index, index + 1)
            }
            _ => return false,
        }
        self.renumber();
        true
    }

    pub fn photo_count(&self) -> usize {
        self.pages.iter().filter(|p| p.photo.is_some()).count()
    }

    /// Forward navigation, with the guard for the step being left.
    pub fn advance(&mut self) -> PortResult<WizardStep> {
        match self.step {
            WizardStep::ProductOptions => {
                if self.title.trim().is_empty() {
                    return Err(PortError::Validation(
                        "A book title is required before choosing a style".to_string(),
                    ));
                }
            }
            WizardStep::ArtStyle => {}
            WizardStep::UploadPhotos => {
                let count = self.photo_count();
                let required = self.product_type.required_photos();
                let max = self.product_type.max_pages();
                if count < required {
                    return Err(PortError::Validation(format!(
                        "A {} book requires {} photos; {} uploaded",
                        self.product_type.as_str(),
                        required,
                        count
                    )));
                }
                if count > max {
                    return Err(PortError::Validation(format!(
                        "A {} book allows at most {} photos; remove {}",
                        self.product_type.as_str(),
                        max,
                        count - max
                    )));
                }
            }
            WizardStep::ArrangePages => {
                return Err(PortError::Validation(
                    "Already at the final step".to_string(),
                ));
            }
        }

        if let Some(next) = self.step.next() {
            self.step = next;
        }
        Ok(self.step)
    }

    /// Backward navigation has no guard.
    pub fn back(&mut self) -> WizardStep {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    /// Submission is only offered from the terminal step with at least one page.
    pub fn can_submit(&self) -> bool {
        self.step == WizardStep::ArrangePages && !self.pages.is_empty()
    }

    /// The pages that actually get persisted: truncated to the product's
    /// maximum, never rejected.
    pub fn pages_for_submission(&self) -> &[WizardPage] {
        let max = self.product_type.max_pages();
        &self.pages[..self.pages.len().min(max)]
    }

    fn renumber(&mut self) {
        for (index, page) in self.pages.iter_mut().enumerate() {
            page.page_number = index as u32 + 1;
        }
    }
}

impl Default for WizardSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_photos(count: usize) -> WizardSession {
        let mut session = WizardSession::new();
        for i in 0..count {
            let ingested = session.ingest_photo(&format!("photo-{i}.jpg"), "image/jpeg", vec![i as u8]);
            assert!(matches!(ingested, Ingest::Accepted { .. }));
        }
        session
    }

    fn assert_contiguous(session: &WizardSession) {
        for (index, page) in session.pages.iter().enumerate() {
            assert_eq!(page.page_number as usize, index + 1);
        }
    }

    #[test]
    fn non_image_files_are_silently_skipped() {
        let mut session = WizardSession::new();
        assert_eq!(
            session.ingest_photo("notes.pdf", "application/pdf", vec![1]),
            Ingest::Skipped
        );
        assert_eq!(
            session.ingest_photo("video.mp4", "video/mp4", vec![2]),
            Ingest::Skipped
        );
        assert_eq!(session.photo_count(), 0);
        assert!(session.pages.is_empty());
    }

    #[test]
    fn title_guard_blocks_the_first_transition() {
        let mut session = WizardSession::new();
        assert!(matches!(
            session.advance(),
            Err(PortError::Validation(_))
        ));
        session.title = "   ".to_string();
        assert!(session.advance().is_err());
        session.title = "Beach Trip".to_string();
        assert_eq!(session.advance().unwrap(), WizardStep::ArtStyle);
    }

    #[test]
    fn photo_count_guard_blocks_under_and_over() {
        let mut session = session_with_photos(5);
        session.title = "Beach Trip".to_string();
        session.advance().unwrap();
        session.advance().unwrap();
        assert_eq!(session.step, WizardStep::UploadPhotos);

        // 5 of 10 required: blocked.
        assert!(session.advance().is_err());
        assert_eq!(session.step, WizardStep::UploadPhotos);

        for i in 5..11 {
            session.ingest_photo(&format!("p{i}.jpg"), "image/png", vec![]);
        }
        // 11 exceeds the standard maximum of 10: also blocked.
        assert!(session.advance().is_err());

        let last = session.pages.last().unwrap().id.clone();
        session.remove_page(&last);
        assert_eq!(session.advance().unwrap(), WizardStep::ArrangePages);
    }

    #[test]
    fn backward_navigation_is_unguarded() {
        let mut session = WizardSession::new();
        session.title = "T".to_string();
        session.advance().unwrap();
        assert_eq!(session.back(), WizardStep::ProductOptions);
        // Backing off the first step stays put.
        assert_eq!(session.back(), WizardStep::ProductOptions);
    }

    #[test]
    fn removal_and_moves_keep_numbering_contiguous() {
        let mut session = session_with_photos(6);

        let third = session.pages[2].id.clone();
        session.remove_page(&third);
        assert_eq!(session.pages.len(), 5);
        assert_contiguous(&session);

        let first_photo = session.pages[0].photo.as_ref().unwrap().id.clone();
        session.remove_photo(&first_photo);
        assert_eq!(session.pages.len(), 4);
        assert_contiguous(&session);

        let second = session.pages[1].id.clone();
        assert!(session.move_page(&second, MoveDirection::Left));
        assert_eq!(session.pages[0].id, second);
        assert_contiguous(&session);

        // Moving the first page further left is a no-op.
        assert!(!session.move_page(&second, MoveDirection::Left));
        assert_contiguous(&session);
    }

    #[test]
    fn numbering_survives_arbitrary_operation_sequences() {
        let mut session = session_with_photos(12);
        // Cheap deterministic pseudo-random op stream.
        let mut seed: u64 = 0x2545f4914f6cdd1d;
        for _ in 0..200 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let op = (seed >> 33) % 4;
            let pick = |s: &WizardSession, seed: u64| -> Option<String> {
                if s.pages.is_empty() {
                    None
                } else {
                    Some(s.pages[(seed % s.pages.len() as u64) as usize].id.clone())
                }
            };
            match op {
                0 => {
                    session.ingest_photo("extra.jpg", "image/jpeg", vec![]);
                }
                1 => {
                    if let Some(id) = pick(&session, seed >> 7) {
                        session.remove_page(&id);
                    }
                }
                2 => {
                    if let Some(id) = pick(&session, seed >> 7) {
                        session.move_page(&id, MoveDirection::Left);
                    }
                }
                _ => {
                    if let Some(id) = pick(&session, seed >> 7) {
                        session.move_page(&id, MoveDirection::Right);
                    }
                }
            }
            assert_contiguous(&session);
        }
    }

    #[test]
    fn submission_pages_are_truncated_to_the_product_maximum() {
        let mut session = session_with_photos(14);
        session.product_type = ProductType::Standard;
        assert_eq!(session.pages_for_submission().len(), 10);

        session.product_type = ProductType::Premium;
        assert_eq!(session.pages_for_submission().len(), 14);
    }
}
