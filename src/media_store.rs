use crate::error::StoreError;
use crate::id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Current on-disk schema version. Opening a store persisted under an older
/// version triggers a one-time migration that creates missing containers.
pub const SCHEMA_VERSION: u32 = 2;

const VERSION_MARKER: &str = "VERSION";

/// The container a media record lives in. Each kind has its own directory
/// and id prefix, so an identifier alone locates its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
    Recording,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Video, MediaKind::Image, MediaKind::Recording];

    /// Id prefix for records of this kind
    pub fn prefix(&self) -> &'static str {
        match self {
            MediaKind::Video => "vid",
            MediaKind::Image => "img",
            MediaKind::Recording => "rec",
        }
    }

    /// Container directory name for records of this kind
    pub fn container(&self) -> &'static str {
        match self {
            MediaKind::Video => "videos",
            MediaKind::Image => "images",
            MediaKind::Recording => "recordings",
        }
    }

    /// Resolve the kind an identifier belongs to from its prefix
    pub fn of_id(id: &str) -> Option<MediaKind> {
        match id.split('_').next() {
            Some("vid") => Some(MediaKind::Video),
            Some("img") => Some(MediaKind::Image),
            Some("rec") => Some(MediaKind::Recording),
            _ => None,
        }
    }
}

/// Stored media record envelope. Immutable once written; the payload lives in
/// a sibling file and never appears inside the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Unique record ID, minted at save time
    pub id: String,
    /// Container kind
    pub kind: MediaKind,
    /// Payload content type (e.g. video/webm)
    pub content_type: String,
    /// Payload size in bytes
    pub size_bytes: u64,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// Descriptive fields attached at save time (ball, player, over, inning)
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Durable filesystem store for binary media payloads.
///
/// Layout under the root directory:
///
/// ```text
/// <root>/VERSION                 schema version marker
/// <root>/videos/<id>.json        record envelope
/// <root>/videos/<id>.bin         payload bytes
/// <root>/images/…                same layout
/// <root>/recordings/…            same layout
/// ```
///
/// Every save is its own two-phase transaction: the payload lands first, then
/// the envelope is renamed into place. The envelope rename is the commit
/// point, so a torn write is never visible to readers. The store handle is
/// opened once and shared process-wide; records are independent and immutable
/// after creation, so no cross-record locking exists.
#[derive(Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    /// Open the store at the given root, creating and migrating it as needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::Unavailable(format!("cannot create store root: {e}")))?;

        let store = Self { root };
        store.migrate().await?;
        Ok(store)
    }

    /// Create missing containers and persist the schema version marker
    async fn migrate(&self) -> Result<(), StoreError> {
        let marker = self.root.join(VERSION_MARKER);
        let persisted = match fs::read_to_string(&marker).await {
            Ok(text) => text.trim().parse::<u32>().ok(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(StoreError::Unavailable(format!(
                    "cannot read schema version marker: {e}"
                )))
            }
        };

        if persisted == Some(SCHEMA_VERSION) {
            return Ok(());
        }

        for kind in MediaKind::ALL {
            fs::create_dir_all(self.root.join(kind.container()))
                .await
                .map_err(|e| {
                    StoreError::Unavailable(format!(
                        "cannot create container {}: {e}",
                        kind.container()
                    ))
                })?;
        }

        // Marker write is the migration commit point
        write_atomic(&marker, SCHEMA_VERSION.to_string().as_bytes())
            .await
            .map_err(|e| StoreError::Unavailable(format!("cannot persist schema version: {e}")))?;

        info!(
            from = persisted,
            to = SCHEMA_VERSION,
            root = %self.root.display(),
            "Media store migrated"
        );
        Ok(())
    }

    /// Persist a payload in one atomic transaction and return its record.
    ///
    /// Mints an id, writes the payload, then commits the envelope. If the
    /// transaction aborts mid-write nothing becomes visible.
    #[instrument(skip(self, payload, metadata), fields(kind = ?kind, size_bytes = payload.len()))]
    pub async fn save(
        &self,
        kind: MediaKind,
        payload: &[u8],
        content_type: &str,
        metadata: serde_json::Value,
    ) -> Result<MediaRecord, StoreError> {
        let record = MediaRecord {
            id: id::mint(kind.prefix()),
            kind,
            content_type: content_type.to_string(),
            size_bytes: payload.len() as u64,
            created_at: Utc::now(),
            metadata,
        };

        self.restore(&record, payload).await?;

        debug!(id = %record.id, "Media record saved");
        metrics::counter!("vault.records.saved").increment(1);
        Ok(record)
    }

    /// Write a record under its existing id (used by save and by bundle
    /// import, which must preserve previously-minted ids).
    pub async fn restore(&self, record: &MediaRecord, payload: &[u8]) -> Result<(), StoreError> {
        let container = self.root.join(record.kind.container());
        let payload_path = container.join(format!("{}.bin", record.id));
        let envelope_path = container.join(format!("{}.json", record.id));

        write_atomic(&payload_path, payload)
            .await
            .map_err(|e| StoreError::Write(format!("payload write aborted: {e}")))?;

        let envelope = serde_json::to_vec(record)
            .map_err(|e| StoreError::Write(format!("cannot encode envelope: {e}")))?;

        // Envelope rename is the commit point; on failure the orphan payload
        // is removed so the aborted transaction leaves nothing behind.
        if let Err(e) = write_atomic(&envelope_path, &envelope).await {
            let _ = fs::remove_file(&payload_path).await;
            return Err(StoreError::Write(format!("envelope write aborted: {e}")));
        }

        Ok(())
    }

    /// Fetch a record envelope. Absence is an expected case and returns
    /// `None`; unreadable envelopes are logged and treated as absent.
    pub async fn get(&self, id: &str) -> Option<MediaRecord> {
        let kind = MediaKind::of_id(id)?;
        let path = self.root.join(kind.container()).join(format!("{id}.json"));

        match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(id, error = %e, "Unreadable record envelope, treating as absent");
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(id, error = %e, "Envelope read failed, treating as absent");
                None
            }
        }
    }

    /// Fetch a record together with its payload bytes. A record whose payload
    /// is missing or unreadable counts as absent.
    pub async fn get_with_payload(&self, id: &str) -> Option<(MediaRecord, Vec<u8>)> {
        let record = self.get(id).await?;
        let path = self
            .root
            .join(record.kind.container())
            .join(format!("{id}.bin"));

        match fs::read(&path).await {
            Ok(payload) => Some((record, payload)),
            Err(e) => {
                warn!(id, error = %e, "Payload read failed, treating record as absent");
                None
            }
        }
    }

    /// Delete a record. Idempotent; deleting a non-existent id succeeds.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let Some(kind) = MediaKind::of_id(id) else {
            return Ok(());
        };
        let container = self.root.join(kind.container());

        // Envelope goes first so a crash mid-delete still reads as absent
        remove_if_present(&container.join(format!("{id}.json")))
            .await
            .map_err(|e| StoreError::Write(format!("envelope delete failed: {e}")))?;
        remove_if_present(&container.join(format!("{id}.bin")))
            .await
            .map_err(|e| StoreError::Write(format!("payload delete failed: {e}")))?;

        debug!(id, "Media record deleted");
        metrics::counter!("vault.records.deleted").increment(1);
        Ok(())
    }

    /// Remove every record of one kind
    #[instrument(skip(self), fields(kind = ?kind))]
    pub async fn clear(&self, kind: MediaKind) -> Result<(), StoreError> {
        let container = self.root.join(kind.container());
        let mut entries = fs::read_dir(&container)
            .await
            .map_err(|e| StoreError::Write(format!("cannot list container for clear: {e}")))?;

        let mut removed = 0u64;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Write(format!("container walk failed: {e}")))?
        {
            remove_if_present(&entry.path())
                .await
                .map_err(|e| StoreError::Write(format!("clear failed: {e}")))?;
            removed += 1;
        }

        info!(kind = ?kind, removed, "Container cleared");
        Ok(())
    }

    /// Remove every record in the store
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        for kind in MediaKind::ALL {
            self.clear(kind).await?;
        }
        Ok(())
    }

    /// List every record envelope of one kind. No ordering guarantee beyond
    /// "all records present at call time"; unreadable envelopes are skipped.
    pub async fn list_all(&self, kind: MediaKind) -> Result<Vec<MediaRecord>, StoreError> {
        let container = self.root.join(kind.container());
        let mut entries = fs::read_dir(&container)
            .await
            .map_err(|e| StoreError::Unavailable(format!("cannot list container: {e}")))?;

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Unavailable(format!("container walk failed: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<MediaRecord>(&bytes) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping unreadable envelope")
                    }
                },
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable envelope"),
            }
        }

        Ok(records)
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Write a file through a temp sibling and an atomic rename
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn open_store(dir: &tempfile::TempDir) -> MediaStore {
        MediaStore::open(dir.path().join("media")).await.unwrap()
    }

    #[tokio::test]
    async fn test_save_get_round_trip() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        let payload = b"fake webm bytes".to_vec();
        let record = store
            .save(
                MediaKind::Video,
                &payload,
                "video/webm",
                serde_json::json!({ "over": 2, "ball": 3 }),
            )
            .await
            .unwrap();

        assert!(record.id.starts_with("vid_"));
        assert_eq!(record.size_bytes, payload.len() as u64);

        let (fetched, bytes) = store.get_with_payload(&record.id).await.unwrap();
        assert_eq!(fetched.id, record.id);
        assert_eq!(fetched.content_type, "video/webm");
        assert_eq!(bytes, payload);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        assert!(store.get("vid_123_zzzzzzz").await.is_none());
        assert!(store.get("not-even-an-id").await.is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        let record = store
            .save(MediaKind::Video, b"x", "video/webm", serde_json::Value::Null)
            .await
            .unwrap();

        store.delete(&record.id).await.unwrap();
        assert!(store.get(&record.id).await.is_none());

        // Second delete is a no-op
        store.delete(&record.id).await.unwrap();
        store.delete("vid_0_aaaaaaa").await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_empties_list_all() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        for _ in 0..3 {
            store
                .save(MediaKind::Video, b"v", "video/webm", serde_json::Value::Null)
                .await
                .unwrap();
        }
        store
            .save(MediaKind::Image, b"i", "image/png", serde_json::Value::Null)
            .await
            .unwrap();

        assert_eq!(store.list_all(MediaKind::Video).await.unwrap().len(), 3);

        store.clear(MediaKind::Video).await.unwrap();
        assert!(store.list_all(MediaKind::Video).await.unwrap().is_empty());
        // Other containers untouched
        assert_eq!(store.list_all(MediaKind::Image).await.unwrap().len(), 1);

        store.clear_all().await.unwrap();
        assert!(store.list_all(MediaKind::Image).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_torn_write_is_invisible() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        // A payload without a committed envelope must read as absent
        let orphan = dir.path().join("media/videos/vid_1_abcdefg.bin");
        tokio::fs::write(&orphan, b"torn").await.unwrap();

        assert!(store.get("vid_1_abcdefg").await.is_none());
        assert!(store.list_all(MediaKind::Video).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reopen_preserves_records() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("media");

        let record = {
            let store = MediaStore::open(&root).await.unwrap();
            store
                .save(MediaKind::Video, b"persisted", "video/webm", serde_json::Value::Null)
                .await
                .unwrap()
        };

        let reopened = MediaStore::open(&root).await.unwrap();
        let (_, payload) = reopened.get_with_payload(&record.id).await.unwrap();
        assert_eq!(payload, b"persisted");
    }

    #[tokio::test]
    async fn test_migration_creates_containers_and_marker() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("media");
        MediaStore::open(&root).await.unwrap();

        for kind in MediaKind::ALL {
            assert!(root.join(kind.container()).is_dir());
        }
        let marker = std::fs::read_to_string(root.join(VERSION_MARKER)).unwrap();
        assert_eq!(marker.trim().parse::<u32>().unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_concurrent_saves_are_independent() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        let mut handles = Vec::new();
        for i in 0..8u8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .save(MediaKind::Video, &[i; 16], "video/webm", serde_json::Value::Null)
                    .await
                    .unwrap()
            }));
        }

        let mut ids = std::collections::HashSet::new();
        for handle in handles {
            let record = handle.await.unwrap();
            assert!(ids.insert(record.id.clone()));
            let (_, payload) = store.get_with_payload(&record.id).await.unwrap();
            assert_eq!(payload.len(), 16);
        }
        assert_eq!(store.list_all(MediaKind::Video).await.unwrap().len(), 8);
    }

    #[test]
    fn test_kind_of_id() {
        assert_eq!(MediaKind::of_id("vid_1_a"), Some(MediaKind::Video));
        assert_eq!(MediaKind::of_id("img_1_a"), Some(MediaKind::Image));
        assert_eq!(MediaKind::of_id("rec_1_a"), Some(MediaKind::Recording));
        assert_eq!(MediaKind::of_id("xyz_1_a"), None);
    }
}
