use crate::error::StoreError;
use crate::media_store::{MediaKind, MediaStore};
use async_trait::async_trait;
use serde::Serialize;

/// Quota share above which callers should surface a storage warning
pub const WARN_THRESHOLD_PERCENT: f64 = 80.0;

/// Aggregate storage usage snapshot
#[derive(Debug, Clone, Serialize)]
pub struct StorageReport {
    /// Number of stored records across all containers
    pub item_count: usize,
    /// Total payload bytes across all containers
    pub total_bytes: u64,
    /// Share of the device quota in use, when a quota estimate is available
    pub quota_used_percent: Option<f64>,
}

impl StorageReport {
    /// Whether usage has crossed the warning threshold. Reports the number
    /// only; what to do about it is the caller's decision.
    pub fn over_warning_threshold(&self) -> bool {
        self.quota_used_percent
            .map_or(false, |p| p > WARN_THRESHOLD_PERCENT)
    }
}

/// Platform capability that knows the device's storage budget. Estimates can
/// be unavailable (unsupported platform, denied permission); accounting then
/// degrades to a partial report instead of failing.
#[async_trait]
pub trait QuotaEstimator: Send + Sync {
    async fn quota_bytes(&self) -> Option<u64>;
}

/// Estimator backed by a configured byte budget
pub struct ConfiguredQuota {
    quota_bytes: Option<u64>,
}

impl ConfiguredQuota {
    pub fn new(quota_bytes: Option<u64>) -> Self {
        Self { quota_bytes }
    }
}

#[async_trait]
impl QuotaEstimator for ConfiguredQuota {
    async fn quota_bytes(&self) -> Option<u64> {
        self.quota_bytes
    }
}

/// Build a usage report from the store's records plus the quota capability
pub async fn report(
    store: &MediaStore,
    estimator: &dyn QuotaEstimator,
) -> Result<StorageReport, StoreError> {
    let mut item_count = 0;
    let mut total_bytes = 0u64;

    for kind in MediaKind::ALL {
        let records = store.list_all(kind).await?;
        item_count += records.len();
        total_bytes += records.iter().map(|r| r.size_bytes).sum::<u64>();
    }

    let quota_used_percent = match estimator.quota_bytes().await {
        Some(quota) if quota > 0 => Some(total_bytes as f64 / quota as f64 * 100.0),
        _ => None,
    };

    Ok(StorageReport {
        item_count,
        total_bytes,
        quota_used_percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_report_counts_and_sizes() {
        let dir = tempdir().unwrap();
        let store = MediaStore::open(dir.path().join("media")).await.unwrap();

        store
            .save(MediaKind::Video, &[0u8; 600], "video/webm", serde_json::Value::Null)
            .await
            .unwrap();
        store
            .save(MediaKind::Image, &[0u8; 200], "image/png", serde_json::Value::Null)
            .await
            .unwrap();

        let snapshot = report(&store, &ConfiguredQuota::new(Some(1_000)))
            .await
            .unwrap();

        assert_eq!(snapshot.item_count, 2);
        assert_eq!(snapshot.total_bytes, 800);
        let percent = snapshot.quota_used_percent.unwrap();
        assert!((percent - 80.0).abs() < f64::EPSILON);
        assert!(!snapshot.over_warning_threshold());

        store
            .save(MediaKind::Video, &[0u8; 100], "video/webm", serde_json::Value::Null)
            .await
            .unwrap();
        let snapshot = report(&store, &ConfiguredQuota::new(Some(1_000)))
            .await
            .unwrap();
        assert!(snapshot.over_warning_threshold());
    }

    #[tokio::test]
    async fn test_report_degrades_without_quota_estimate() {
        let dir = tempdir().unwrap();
        let store = MediaStore::open(dir.path().join("media")).await.unwrap();

        store
            .save(MediaKind::Video, &[0u8; 64], "video/webm", serde_json::Value::Null)
            .await
            .unwrap();

        let snapshot = report(&store, &ConfiguredQuota::new(None)).await.unwrap();
        assert_eq!(snapshot.item_count, 1);
        assert_eq!(snapshot.total_bytes, 64);
        assert!(snapshot.quota_used_percent.is_none());
        assert!(!snapshot.over_warning_threshold());
    }
}
