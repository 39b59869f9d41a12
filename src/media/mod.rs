pub mod cloudinary;

use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Gif,
}

/// Reference to a file held by the external media store. The forum never
/// looks inside the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub external_id: String,
    pub url: String,
    pub kind: MediaKind,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn delete(&self, media: &MediaRef) -> Result<(), String>;
}

/// Used when no media backend is configured.
pub struct DisabledMedia;

#[async_trait]
impl MediaStore for DisabledMedia {
    async fn delete(&self, media: &MediaRef) -> Result<(), String> {
        info!(
            "Media backend disabled, leaving {} in place",
            media.external_id
        );
        Ok(())
    }
}

/// Best-effort deletion: failures are logged and never surface to the caller.
pub async fn purge_media(store: &dyn MediaStore, media: &[MediaRef]) -> usize {
    let mut failed = 0;
    for item in media.iter().filter(|m| !m.external_id.is_empty()) {
        if let Err(e) = store.delete(item).await {
            failed += 1;
            warn!("Failed to delete media {}: {}", item.external_id, e);
        }
    }
    failed
}
