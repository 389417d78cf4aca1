use anyhow::{Context, Result};
use gully_vault::accounting::{self, ConfiguredQuota};
use gully_vault::config::Config;
use gully_vault::ledger::LedgerStore;
use gully_vault::media_store::MediaStore;
use gully_vault::sync::{HttpTransport, SyncGateway};
use gully_vault::SyncError;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Maintenance pass: open the stores, report usage, and drain the upload
/// queue when an endpoint is configured. The scoring UI embeds the library
/// directly; this binary covers operational use (cron sync, inspection).
#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        "Starting Gully Vault maintenance pass"
    );

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    // Open stores; opening migrates the media store when the schema moved
    let media_store = MediaStore::open(&config.store.root)
        .await
        .context("Failed to open media store")?;
    let _ledger_store = LedgerStore::open(&config.ledger.root)
        .await
        .context("Failed to open ledger store")?;

    // Report storage usage
    let quota = ConfiguredQuota::new(config.store.quota_bytes);
    let report = accounting::report(&media_store, &quota)
        .await
        .context("Failed to build storage report")?;

    info!(
        item_count = report.item_count,
        total_bytes = report.total_bytes,
        quota_used_percent = report.quota_used_percent,
        "Storage report"
    );
    if report.over_warning_threshold() {
        warn!("Storage usage is over the warning threshold");
    }

    // Drain the upload queue when a remote endpoint is configured
    if let Some(endpoint) = config.sync.endpoint.clone() {
        let transport = HttpTransport::new(
            endpoint,
            config.probe_timeout(),
            config.request_timeout(),
        )
        .context("Failed to build upload transport")?;

        let gateway = SyncGateway::new(media_store, transport);
        match gateway
            .sync_all(|progress| {
                info!(
                    current = progress.current,
                    total = progress.total,
                    percentage = progress.percentage,
                    "Sync progress"
                );
            })
            .await
        {
            Ok(outcome) if outcome.complete() => {
                info!(uploaded = outcome.uploaded, "Sync complete")
            }
            Ok(outcome) => warn!(
                uploaded = outcome.uploaded,
                total = outcome.total,
                "Sync finished with records left for retry"
            ),
            Err(SyncError::Offline) => warn!("Offline, sync skipped; will retry next pass"),
            Err(e) => return Err(e).context("Sync pass failed"),
        }
    } else {
        info!("No sync endpoint configured, upload queue untouched");
    }

    info!("Maintenance pass finished");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}
