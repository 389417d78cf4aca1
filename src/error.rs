use thiserror::Error;

/// Errors surfaced by the durable stores.
///
/// Reads on a missing or unreadable record never produce an error; absence is
/// an expected case and comes back as `None`.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be opened or migrated. Fatal to media features,
    /// but scoring must keep working without highlights.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A write transaction aborted mid-flight. The partial write is never
    /// visible; the caller may retry.
    #[error("Write transaction aborted: {0}")]
    Write(String),
}

/// Errors surfaced by the sync gateway.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The transport reported no connectivity; the sync pass was refused
    /// before touching any record.
    #[error("Network unavailable, sync refused")]
    Offline,

    /// A single upload attempt failed. The record stays local for retry.
    #[error("Upload transport error: {0}")]
    Transport(String),

    /// The local store failed underneath the gateway.
    #[error(transparent)]
    Store(#[from] StoreError),
}
