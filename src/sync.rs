use crate::error::SyncError;
use crate::media_store::{MediaKind, MediaRecord, MediaStore};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Incremental progress reported after each confirmed upload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncProgress {
    pub current: usize,
    pub total: usize,
    pub percentage: f64,
}

/// Result of one sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub uploaded: usize,
    pub total: usize,
}

impl SyncOutcome {
    /// Whether every queued record made it to the remote
    pub fn complete(&self) -> bool {
        self.uploaded == self.total
    }
}

/// Transport seam for the upload relay. Production uses HTTP multipart;
/// tests substitute scripted fakes.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Cheap connectivity check, consulted once before a sync pass starts
    async fn is_online(&self) -> bool;

    /// Upload one record. Must only return `Ok` on a confirmed remote
    /// success response.
    async fn upload(&self, record: &MediaRecord, payload: &[u8]) -> Result<(), SyncError>;
}

/// HTTP multipart transport: `video` file part named `{id}.webm` plus a
/// `metadata` JSON part, matching the remote relay's contract.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    probe_timeout: Duration,
}

impl HttpTransport {
    pub fn new(
        endpoint: impl Into<String>,
        probe_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SyncError::Transport(format!("cannot build http client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            probe_timeout,
        })
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn is_online(&self) -> bool {
        self.client
            .head(&self.endpoint)
            .timeout(self.probe_timeout)
            .send()
            .await
            .is_ok()
    }

    async fn upload(&self, record: &MediaRecord, payload: &[u8]) -> Result<(), SyncError> {
        let metadata = serde_json::to_string(record)
            .map_err(|e| SyncError::Transport(format!("cannot encode metadata: {e}")))?;

        let video = reqwest::multipart::Part::bytes(payload.to_vec())
            .file_name(format!("{}.webm", record.id))
            .mime_str(&record.content_type)
            .map_err(|e| SyncError::Transport(format!("invalid content type: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .part("video", video)
            .text("metadata", metadata);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SyncError::Transport(format!("upload request failed: {e}")))?;

        response
            .error_for_status()
            .map_err(|e| SyncError::Transport(format!("remote rejected upload: {e}")))?;

        Ok(())
    }
}

/// Best-effort relay that drains queued videos to a remote endpoint.
///
/// Purely additive: local scoring and playback never depend on it.
pub struct SyncGateway<T: UploadTransport> {
    store: MediaStore,
    transport: T,
}

impl<T: UploadTransport> SyncGateway<T> {
    pub fn new(store: MediaStore, transport: T) -> Self {
        Self { store, transport }
    }

    /// Upload every queued video one at a time.
    ///
    /// Refuses with [`SyncError::Offline`] before touching any record when
    /// the transport has no connectivity. A confirmed upload frees the local
    /// copy and reports progress; a failed upload leaves its record in place
    /// for a later retry and the pass moves on.
    #[instrument(skip_all)]
    pub async fn sync_all<F>(&self, mut on_progress: F) -> Result<SyncOutcome, SyncError>
    where
        F: FnMut(SyncProgress),
    {
        if !self.transport.is_online().await {
            warn!("Sync refused: transport reports offline");
            return Err(SyncError::Offline);
        }

        let records = self.store.list_all(MediaKind::Video).await?;
        let total = records.len();
        let mut uploaded = 0;

        for record in &records {
            let Some((_, payload)) = self.store.get_with_payload(&record.id).await else {
                warn!(id = %record.id, "Record vanished before upload, skipping");
                continue;
            };

            match self.transport.upload(record, &payload).await {
                Ok(()) => {
                    // Local copy is freed only after the remote confirmed
                    self.store.delete(&record.id).await?;
                    uploaded += 1;
                    metrics::counter!("vault.sync.uploaded").increment(1);
                    on_progress(SyncProgress {
                        current: uploaded,
                        total,
                        percentage: uploaded as f64 / total as f64 * 100.0,
                    });
                }
                Err(e) => {
                    warn!(id = %record.id, error = %e, "Upload failed, record kept for retry");
                    metrics::counter!("vault.sync.failed").increment(1);
                }
            }
        }

        info!(uploaded, total, "Sync pass finished");
        Ok(SyncOutcome { uploaded, total })
    }
}
