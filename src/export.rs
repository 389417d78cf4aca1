use crate::error::StoreError;
use crate::media_store::{write_atomic, MediaKind, MediaRecord, MediaStore};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

/// Portable export bundle: every stored video plus its payload, as one JSON
/// document. Payloads are base64 inside the bundle only; they never travel
/// through the ledger in any encoded form.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportBundle {
    pub exported_at: DateTime<Utc>,
    pub video_count: usize,
    pub videos: Vec<ExportedRecord>,
}

/// One record in a bundle
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportedRecord {
    #[serde(flatten)]
    pub record: MediaRecord,
    pub payload_base64: String,
}

/// Collect every stored video into a bundle, skipping records whose payload
/// can no longer be read
pub async fn export_bundle(store: &MediaStore) -> Result<ExportBundle, StoreError> {
    let records = store.list_all(MediaKind::Video).await?;
    let mut videos = Vec::with_capacity(records.len());

    for record in records {
        match store.get_with_payload(&record.id).await {
            Some((record, payload)) => videos.push(ExportedRecord {
                record,
                payload_base64: BASE64.encode(payload),
            }),
            None => warn!(id = %record.id, "Record unreadable, left out of export"),
        }
    }

    Ok(ExportBundle {
        exported_at: Utc::now(),
        video_count: videos.len(),
        videos,
    })
}

/// Export every stored video to a bundle file
#[instrument(skip(store), fields(path = %path.display()))]
pub async fn write_bundle(store: &MediaStore, path: &Path) -> Result<usize, StoreError> {
    let bundle = export_bundle(store).await?;
    let bytes = serde_json::to_vec_pretty(&bundle)
        .map_err(|e| StoreError::Write(format!("cannot encode export bundle: {e}")))?;

    write_atomic(path, &bytes)
        .await
        .map_err(|e| StoreError::Write(format!("bundle write aborted: {e}")))?;

    info!(videos = bundle.video_count, "Export bundle written");
    Ok(bundle.video_count)
}

/// Restore records from a bundle file into the store under their original
/// ids. Ids already present are left untouched; entries whose payload does
/// not decode are skipped. Returns the number of records imported.
#[instrument(skip(store), fields(path = %path.display()))]
pub async fn import_bundle(store: &MediaStore, path: &Path) -> Result<usize, StoreError> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| StoreError::Unavailable(format!("cannot read bundle: {e}")))?;
    let bundle: ExportBundle = serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::Write(format!("invalid export bundle: {e}")))?;

    let mut imported = 0;
    for entry in bundle.videos {
        if store.get(&entry.record.id).await.is_some() {
            continue;
        }
        let payload = match BASE64.decode(&entry.payload_base64) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(id = %entry.record.id, error = %e, "Undecodable payload, entry skipped");
                continue;
            }
        };
        store.restore(&entry.record, &payload).await?;
        imported += 1;
    }

    info!(imported, "Export bundle imported");
    Ok(imported)
}
