//! services/api/src/web/wizard_cache.rs
//!
//! The wizard's per-tab persistence: a bounded local cache mirroring the
//! in-progress state after every change. Preview bytes are deliberately
//! excluded (replaced with a presence marker) to stay inside the byte quota;
//! only metadata survives a reload. When even the metadata shape exceeds the
//! quota the cache degrades to a minimal shape, and past that to a bare
//! mid-edit marker, so the "am I mid-edit" signal is never silently lost.
//! Writes are debounced so rapid changes coalesce into a single save.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use storyincolor_core::wizard::WizardSession;
use tracing::{debug, warn};

/// How long rapid changes coalesce before a single write happens.
pub const DEBOUNCE: Duration = Duration::from_millis(300);

//=========================================================================================
// Persisted shapes, in degradation order
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedPhoto {
    pub id: String,
    pub name: String,
    /// Presence marker; the preview bytes themselves are never persisted.
    pub has_preview: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedPage {
    pub id: String,
    pub page_number: u32,
    pub photo: Option<PersistedPhoto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinimalPage {
    pub id: String,
    pub page_number: u32,
    pub has_photo: bool,
}

/// The persisted wizard state, from richest to barest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "camelCase")]
pub enum PersistedWizard {
    #[serde(rename_all = "camelCase")]
    Full {
        project_id: String,
        title: String,
        product_type: String,
        art_style: String,
        step: String,
        upload_progress: f64,
        pages: Vec<PersistedPage>,
    },
    #[serde(rename_all = "camelCase")]
    Minimal {
        project_id: String,
        product_type: String,
        art_style: String,
        pages: Vec<MinimalPage>,
    },
    /// Only records that an edit is in progress.
    #[serde(rename_all = "camelCase")]
    Marker { project_id: String, page_count: usize },
}

impl PersistedWizard {
    fn full(session: &WizardSession) -> Self {
        PersistedWizard::Full {
            project_id: session.project_id.clone(),
            title: session.title.clone(),
            product_type: session.product_type.as_str().to_string(),
            art_style: session.art_style.as_str().to_string(),
            step: session.step.as_str().to_string(),
            upload_progress: session.upload_progress,
            pages: session
                .pages
                .iter()
                .map(|page| PersistedPage {
                    id: page.id.clone(),
                    page_number: page.page_number,
                    photo: page.photo.as_ref().map(|photo| PersistedPhoto {
                        id: photo.id.clone(),
                        name: photo.name.clone(),
                        has_preview: !photo.preview.is_empty(),
                    }),
                })
                .collect(),
        }
    }

    fn minimal(session: &WizardSession) -> Self {
        PersistedWizard::Minimal {
            project_id: session.project_id.clone(),
            product_type: session.product_type.as_str().to_string(),
            art_style: session.art_style.as_str().to_string(),
            pages: session
                .pages
                .iter()
                .map(|page| MinimalPage {
                    id: page.id.clone(),
                    page_number: page.page_number,
                    has_photo: page.photo.is_some(),
                })
                .collect(),
        }
    }

    fn marker(session: &WizardSession) -> Self {
        PersistedWizard::Marker {
            project_id: session.project_id.clone(),
            page_count: session.pages.len(),
        }
    }

    pub fn shape_name(&self) -> &'static str {
        match self {
            PersistedWizard::Full { .. } => "full",
            PersistedWizard::Minimal { .. } => "minimal",
            PersistedWizard::Marker { .. } => "marker",
        }
    }
}

//=========================================================================================
// The cache
//=========================================================================================

struct CacheInner {
    entries: RwLock<HashMap<String, String>>,
    quota_bytes: usize,
    debounce: Duration,
    pending: Mutex<HashSet<String>>,
}

#[derive(Clone)]
pub struct WizardCache {
    inner: Arc<CacheInner>,
}

impl WizardCache {
    pub fn new(quota_bytes: usize) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: RwLock::new(HashMap::new()),
                quota_bytes,
                debounce: DEBOUNCE,
                pending: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.debounce = debounce;
        }
        self
    }

    /// Persist a snapshot immediately, degrading full -> minimal -> marker
    /// until the entry fits the quota. Returns the shape that was stored.
    pub fn save(&self, wizard_id: &str, session: &WizardSession) -> &'static str {
        self.inner.save(wizard_id, session)
    }

    pub fn load(&self, wizard_id: &str) -> Option<PersistedWizard> {
        let entries = self.inner.entries.read().unwrap();
        let payload = entries.get(wizard_id)?;
        serde_json::from_str(payload).ok()
    }

    pub fn forget(&self, wizard_id: &str) {
        self.inner.entries.write().unwrap().remove(wizard_id);
        self.inner.pending.lock().unwrap().remove(wizard_id);
    }

    /// Rebuild a wizard session from the persisted metadata. Preview bytes
    /// are never persisted, so restored photos come back empty and must be
    /// re-uploaded by the user.
    pub fn restore(&self, wizard_id: &str) -> Option<WizardSession> {
        use storyincolor_core::domain::{ArtStyle, ProductType};
        use storyincolor_core::wizard::{PhotoAttachment, WizardPage, WizardStep};

        let persisted = self.load(wizard_id)?;
        let session = match persisted {
            PersistedWizard::Full {
                project_id,
                title,
                product_type,
                art_style,
                step,
                upload_progress,
                pages,
            } => {
                let mut session = WizardSession::for_project(&project_id);
                session.title = title;
                session.product_type = ProductType::parse(&product_type);
                session.art_style = ArtStyle::parse(&art_style);
                session.step = WizardStep::parse(&step);
                session.upload_progress = upload_progress;
                session.pages = pages
                    .into_iter()
                    .map(|page| WizardPage {
                        id: page.id,
                        page_number: page.page_number,
                        photo: page.photo.map(|photo| PhotoAttachment {
                            id: photo.id,
                            name: photo.name,
                            preview: Vec::new(),
                        }),
                    })
                    .collect();
                session
            }
            PersistedWizard::Minimal {
                project_id,
                product_type,
                art_style,
                pages,
            } => {
                let mut session = WizardSession::for_project(&project_id);
                session.product_type = ProductType::parse(&product_type);
                session.art_style = ArtStyle::parse(&art_style);
                session.pages = pages
                    .into_iter()
                    .map(|page| WizardPage {
                        id: page.id.clone(),
                        page_number: page.page_number,
                        photo: page.has_photo.then(|| PhotoAttachment {
                            id: page.id,
                            name: String::new(),
                            preview: Vec::new(),
                        }),
                    })
                    .collect();
                session
            }
            // The marker only proves an edit was in progress.
            PersistedWizard::Marker { project_id, .. } => WizardSession::for_project(&project_id),
        };
        Some(session)
    }

    /// Schedule a debounced save: the first call in a window spawns the
    /// writer, later calls within the window coalesce into it. The snapshot
    /// is taken when the window closes, so it reflects the latest state.
    pub fn save_debounced(
        &self,
        wizard_id: &str,
        session: &Arc<tokio::sync::Mutex<WizardSession>>,
    ) {
        {
            let mut pending = self.inner.pending.lock().unwrap();
            if !pending.insert(wizard_id.to_string()) {
                return; // a write is already scheduled
            }
        }
        let inner = Arc::clone(&self.inner);
        let session = Arc::clone(session);
        let wizard_id = wizard_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            inner.pending.lock().unwrap().remove(&wizard_id);
            let snapshot = session.lock().await.clone();
            inner.save(&wizard_id, &snapshot);
        });
    }
}

impl CacheInner {
    fn save(&self, wizard_id: &str, session: &WizardSession) -> &'static str {
        let candidates = [
            PersistedWizard::full(session),
            PersistedWizard::minimal(session),
            PersistedWizard::marker(session),
        ];
        for candidate in &candidates {
            let Ok(payload) = serde_json::to_string(candidate) else {
                continue;
            };
            let is_marker = matches!(candidate, PersistedWizard::Marker { .. });
            if payload.len() <= self.quota_bytes || is_marker {
                if is_marker && payload.len() > self.quota_bytes {
                    warn!(wizard_id, "Wizard state exceeds the cache quota even in minimal form");
                }
                self.entries
                    .write()
                    .unwrap()
                    .insert(wizard_id.to_string(), payload);
                debug!(wizard_id, shape = candidate.shape_name(), "Wizard state persisted");
                return candidate.shape_name();
            }
        }
        // Unreachable: the marker branch above always stores.
        "marker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyincolor_core::wizard::Ingest;

    fn session_with_photos(count: usize) -> WizardSession {
        let mut session = WizardSession::new();
        session.title = "Beach Trip".to_string();
        for i in 0..count {
            let ingested =
                session.ingest_photo(&format!("photo-{i}.jpg"), "image/jpeg", vec![0u8; 64]);
            assert!(matches!(ingested, Ingest::Accepted { .. }));
        }
        session
    }

    #[test]
    fn full_shape_fits_a_generous_quota() {
        let cache = WizardCache::new(64 * 1024);
        let session = session_with_photos(10);
        assert_eq!(cache.save("w1", &session), "full");

        let Some(PersistedWizard::Full { pages, .. }) = cache.load("w1") else {
            panic!("expected the full shape");
        };
        assert_eq!(pages.len(), 10);
        // Preview bytes are replaced by the presence marker.
        assert!(pages.iter().all(|p| p.photo.as_ref().unwrap().has_preview));
    }

    #[test]
    fn quota_pressure_degrades_to_the_minimal_shape() {
        let session = session_with_photos(10);
        let full_len = serde_json::to_string(&PersistedWizard::full(&session))
            .unwrap()
            .len();
        let cache = WizardCache::new(full_len - 1);
        assert_eq!(cache.save("w1", &session), "minimal");

        let Some(PersistedWizard::Minimal { pages, .. }) = cache.load("w1") else {
            panic!("expected the minimal shape");
        };
        assert_eq!(pages.len(), 10);
        assert!(pages.iter().all(|p| p.has_photo));
    }

    #[test]
    fn the_mid_edit_marker_is_never_dropped() {
        // A quota nothing reasonable fits into still records the marker.
        let cache = WizardCache::new(4);
        let session = session_with_photos(3);
        assert_eq!(cache.save("w1", &session), "marker");
        let Some(PersistedWizard::Marker { page_count, .. }) = cache.load("w1") else {
            panic!("expected the marker shape");
        };
        assert_eq!(page_count, 3);
    }

    #[test]
    fn restored_sessions_keep_metadata_but_not_preview_bytes() {
        let cache = WizardCache::new(64 * 1024);
        let session = session_with_photos(3);
        cache.save("w1", &session);

        let restored = cache.restore("w1").unwrap();
        assert_eq!(restored.project_id, session.project_id);
        assert_eq!(restored.title, "Beach Trip");
        assert_eq!(restored.pages.len(), 3);
        // The bytes themselves are gone; only the metadata survives.
        assert!(restored
            .pages
            .iter()
            .all(|page| page.photo.as_ref().unwrap().preview.is_empty()));
    }

    #[tokio::test]
    async fn rapid_changes_coalesce_into_one_debounced_write() {
        let cache = Arc::new(WizardCache::new(64 * 1024).with_debounce(Duration::from_millis(20)));
        let session = Arc::new(tokio::sync::Mutex::new(session_with_photos(1)));

        for _ in 0..5 {
            cache.save_debounced("w1", &session);
        }
        // Nothing is written until the window closes.
        assert!(cache.load("w1").is_none());

        // Mutate before the flush: the write reflects the latest state.
        session.lock().await.ingest_photo("late.jpg", "image/jpeg", vec![1]);

        tokio::time::sleep(Duration::from_millis(60)).await;
        let Some(PersistedWizard::Full { pages, .. }) = cache.load("w1") else {
            panic!("expected a flushed full shape");
        };
        assert_eq!(pages.len(), 2);
    }
}
