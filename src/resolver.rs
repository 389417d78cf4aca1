use crate::error::StoreError;
use crate::ledger::Reference;
use crate::media_store::{MediaKind, MediaRecord, MediaStore};
use tracing::{debug, instrument};

/// A highlight reference resolved into playable bytes
#[derive(Debug, Clone)]
pub struct ResolvedHighlight {
    pub video_id: String,
    pub over: u32,
    pub ball: u32,
    pub content_type: String,
    pub payload: Vec<u8>,
}

/// A stored video resolved for gallery display
#[derive(Debug, Clone)]
pub struct GalleryItem {
    pub record: MediaRecord,
    pub payload: Vec<u8>,
}

/// Resolve a sequence of references into playable media.
///
/// Each reference is looked up independently; a missing or purged record
/// drops that single item from the output, so the result may be shorter than
/// the input but keeps the surviving inputs in their original order. The call
/// itself always succeeds.
#[instrument(skip(store, refs), fields(count = refs.len()))]
pub async fn resolve_all(store: &MediaStore, refs: &[Reference]) -> Vec<ResolvedHighlight> {
    let mut resolved = Vec::with_capacity(refs.len());

    for reference in refs {
        match store.get_with_payload(&reference.video_id).await {
            Some((record, payload)) => resolved.push(ResolvedHighlight {
                video_id: reference.video_id.clone(),
                over: reference.over,
                ball: reference.ball,
                content_type: record.content_type,
                payload,
            }),
            None => {
                debug!(video_id = %reference.video_id, "Highlight unavailable, dropped from result")
            }
        }
    }

    resolved
}

/// Resolve every stored video for preview display, skipping records whose
/// payload can no longer be read
pub async fn gallery(store: &MediaStore) -> Result<Vec<GalleryItem>, StoreError> {
    let records = store.list_all(MediaKind::Video).await?;
    let mut items = Vec::with_capacity(records.len());

    for record in records {
        if let Some((record, payload)) = store.get_with_payload(&record.id).await {
            items.push(GalleryItem { record, payload });
        }
    }

    Ok(items)
}
