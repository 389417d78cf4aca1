//! Gully Vault
//!
//! Offline-first highlight storage engine for informal cricket scorekeeping.
//! Large video payloads live in a durable, identifier-keyed media store; the
//! match ledger stays small because it carries only minted identifiers. The
//! two sides meet through a record → reference → resolve protocol: a capture
//! event saves its payload and gets an id back, scoring attaches
//! `{video_id, over, ball}` to the batter's record, and display resolves
//! those references back into playable bytes, tolerating purged entries.
//!
//! ## Architecture
//!
//! ```text
//! Capture stop              Media store (binary)       Ledger store (JSON)
//! ┌──────────────┐          ┌──────────────────┐       ┌──────────────────┐
//! │ video bytes  │─ save ──▶│ videos/<id>.bin  │       │ team1.json       │
//! └──────────────┘          │ videos/<id>.json │       │ team2.json       │
//!        │ id               └──────────────────┘       │ settings.json    │
//!        ▼                          ▲                  └──────────────────┘
//! ┌──────────────┐                  │ get                      ▲
//! │ Scoring      │── {video_id, over, ball} ───────────────────┘
//! └──────────────┘                  │
//!                           ┌──────────────────┐       ┌──────────────────┐
//!                           │ Resolver         │       │ Sync gateway     │
//!                           │ refs → playable  │       │ upload + free    │
//!                           └──────────────────┘       └──────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Durable media store**: versioned filesystem containers, two-phase
//!   atomic saves, null-on-absent reads, idempotent deletes
//! - **Reference ledger**: scoring state that never holds binary data, with
//!   a sanitation pass at the serialization boundary
//! - **Tolerant resolution**: missing highlights drop out of the result
//!   instead of failing the batch
//! - **Storage accounting**: usage report with a quota warning threshold
//! - **Best-effort sync**: one-at-a-time uploads that free local space only
//!   after the remote confirms, plus a portable export/import bundle

pub mod accounting;
pub mod config;
pub mod error;
pub mod export;
pub mod id;
pub mod ledger;
pub mod media_store;
pub mod resolver;
pub mod sync;

pub use accounting::{ConfiguredQuota, QuotaEstimator, StorageReport, WARN_THRESHOLD_PERCENT};
pub use config::Config;
pub use error::{StoreError, SyncError};
pub use export::{export_bundle, import_bundle, write_bundle, ExportBundle};
pub use ledger::{LedgerStore, MatchSettings, PlayerRecord, Reference, TeamLedger};
pub use media_store::{MediaKind, MediaRecord, MediaStore, SCHEMA_VERSION};
pub use resolver::{gallery, resolve_all, GalleryItem, ResolvedHighlight};
pub use sync::{HttpTransport, SyncGateway, SyncOutcome, SyncProgress, UploadTransport};
