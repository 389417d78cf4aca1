use crate::error::StoreError;
use crate::media_store::write_atomic;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, instrument, warn};

/// Any string field longer than this is assumed to be leaked binary data and
/// is replaced before the ledger is persisted.
pub const MAX_FIELD_LEN: usize = 100;

/// Placeholder written over an oversized field
pub const OVERSIZED_PLACEHOLDER: &str = "[ID]";

/// A highlight reference: points at a stored video without carrying any of
/// its payload. The identifier is the only coupling to the media store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub video_id: String,
    pub over: u32,
    pub ball: u32,
}

/// Per-batter scoring record. The `fours`/`sixes` sequences carry only
/// previously-minted identifiers, never media.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub runs: u32,
    pub balls: u32,
    #[serde(default)]
    pub fours: Vec<Reference>,
    #[serde(default)]
    pub sixes: Vec<Reference>,
    #[serde(default)]
    pub dismissed: bool,
}

/// Match settings persisted alongside the team ledgers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSettings {
    pub overs: u32,
    pub inning: u32,
}

/// One team's scoring state. Serialized as plain JSON into the small-value
/// store; it stays small no matter how many videos get recorded, because it
/// only ever holds identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamLedger {
    #[serde(default)]
    pub players: BTreeMap<String, PlayerRecord>,
    pub total_runs: u32,
    pub total_balls: u32,
    pub wickets: u32,
    pub overs: u32,
}

impl TeamLedger {
    /// Record a legal delivery for the striker.
    ///
    /// When the delivery is a boundary and a freshly-minted video id is
    /// available, a Reference is attached to the batter's fours or sixes.
    /// Without an id the highlight is skipped silently; a missing recording
    /// never blocks scoring.
    pub fn record_delivery(&mut self, striker: &str, runs: u32, video_id: Option<&str>) {
        self.total_balls += 1;
        self.total_runs += runs;

        let over = self.overs;
        let ball = (self.total_balls - 1) % 6 + 1;

        let player = self.players.entry(striker.to_string()).or_default();
        player.balls += 1;
        player.runs += runs;

        match (runs, video_id) {
            (4, Some(id)) => player.fours.push(Reference {
                video_id: id.to_string(),
                over,
                ball,
            }),
            (6, Some(id)) => player.sixes.push(Reference {
                video_id: id.to_string(),
                over,
                ball,
            }),
            (4 | 6, None) => {
                debug!(striker, runs, "Boundary without a recorded video, highlight skipped")
            }
            _ => {}
        }

        if self.total_balls % 6 == 0 {
            self.overs += 1;
        }
    }

    /// Record a dismissal off a legal delivery
    pub fn record_wicket(&mut self, batter: &str) {
        self.total_balls += 1;
        self.wickets += 1;

        let player = self.players.entry(batter.to_string()).or_default();
        player.balls += 1;
        player.dismissed = true;

        if self.total_balls % 6 == 0 {
            self.overs += 1;
        }
    }

    /// All highlight references attached to this ledger, fours then sixes,
    /// grouped per batter in roster order
    pub fn all_references(&self) -> Vec<Reference> {
        self.players
            .values()
            .flat_map(|p| p.fours.iter().chain(p.sixes.iter()).cloned())
            .collect()
    }
}

/// Replace any string value longer than [`MAX_FIELD_LEN`] with the
/// placeholder, recursively. A clean document comes back unchanged.
///
/// The typed ledger schema cannot hold a payload field, so this is a
/// defensive check at the serialization boundary only.
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::String(s) if s.len() > MAX_FIELD_LEN => {
            warn!(len = s.len(), "Oversized string field replaced before persist");
            Value::String(OVERSIZED_PLACEHOLDER.to_string())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, sanitize(v))).collect())
        }
        other => other,
    }
}

/// Small-value persistent store for ledger state: one JSON document per named
/// slot (team1, team2, settings), written atomically.
#[derive(Clone)]
pub struct LedgerStore {
    root: PathBuf,
}

impl LedgerStore {
    /// Open the ledger store at the given root, creating it as needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::Unavailable(format!("cannot create ledger root: {e}")))?;
        Ok(Self { root })
    }

    /// Persist a document into a named slot. The sanitation pass runs on the
    /// JSON form right before the bytes hit disk.
    #[instrument(skip(self, document), fields(slot = %slot))]
    pub async fn save<T: Serialize>(&self, slot: &str, document: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(document)
            .map_err(|e| StoreError::Write(format!("cannot encode ledger slot: {e}")))?;
        let value = sanitize(value);
        let bytes = serde_json::to_vec_pretty(&value)
            .map_err(|e| StoreError::Write(format!("cannot encode ledger slot: {e}")))?;

        write_atomic(&self.slot_path(slot), &bytes)
            .await
            .map_err(|e| StoreError::Write(format!("ledger write aborted: {e}")))?;

        debug!(slot, "Ledger slot persisted");
        Ok(())
    }

    /// Load a slot. Absent or unreadable slots come back as `None`.
    pub async fn load<T: DeserializeOwned>(&self, slot: &str) -> Option<T> {
        match fs::read(&self.slot_path(slot)).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(document) => Some(document),
                Err(e) => {
                    warn!(slot, error = %e, "Unreadable ledger slot, treating as absent");
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(slot, error = %e, "Ledger slot read failed, treating as absent");
                None
            }
        }
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.root.join(format!("{slot}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_six_with_video_attaches_reference() {
        let mut ledger = TeamLedger::default();
        // Two completed overs plus two deliveries already bowled
        ledger.overs = 2;
        ledger.total_balls = 14;

        ledger.record_delivery("asha", 6, Some("vid_1700000000000_a1b2c3d"));

        let player = &ledger.players["asha"];
        assert_eq!(player.sixes.len(), 1);
        assert_eq!(
            player.sixes[0],
            Reference {
                video_id: "vid_1700000000000_a1b2c3d".to_string(),
                over: 2,
                ball: 3,
            }
        );
        assert_eq!(player.runs, 6);
        assert_eq!(ledger.total_runs, 6);
    }

    #[test]
    fn test_four_without_video_skips_highlight() {
        let mut ledger = TeamLedger::default();
        ledger.record_delivery("ravi", 4, None);

        let player = &ledger.players["ravi"];
        assert!(player.fours.is_empty());
        // Scoring is never blocked by a missing recording
        assert_eq!(player.runs, 4);
        assert_eq!(ledger.total_runs, 4);
    }

    #[test]
    fn test_over_rolls_after_six_balls() {
        let mut ledger = TeamLedger::default();
        for _ in 0..6 {
            ledger.record_delivery("asha", 1, None);
        }
        assert_eq!(ledger.overs, 1);
        assert_eq!(ledger.total_balls, 6);
    }

    #[test]
    fn test_record_wicket() {
        let mut ledger = TeamLedger::default();
        ledger.record_delivery("ravi", 2, None);
        ledger.record_wicket("ravi");

        assert_eq!(ledger.wickets, 1);
        assert!(ledger.players["ravi"].dismissed);
        assert_eq!(ledger.players["ravi"].balls, 2);
    }

    #[test]
    fn test_sanitize_replaces_oversized_field() {
        let doc = serde_json::json!({
            "name": "asha",
            "leaked": "x".repeat(500),
            "nested": { "also": ["ok", "y".repeat(101)] },
            "runs": 42,
        });

        let clean = sanitize(doc);
        assert_eq!(clean["leaked"], OVERSIZED_PLACEHOLDER);
        assert_eq!(clean["nested"]["also"][1], OVERSIZED_PLACEHOLDER);
        // Everything else untouched
        assert_eq!(clean["name"], "asha");
        assert_eq!(clean["nested"]["also"][0], "ok");
        assert_eq!(clean["runs"], 42);
    }

    #[test]
    fn test_sanitize_clean_document_unchanged() {
        let doc = serde_json::json!({
            "players": { "ravi": { "runs": 10, "fours": [] } },
            "total_runs": 10,
        });
        assert_eq!(sanitize(doc.clone()), doc);
    }

    #[tokio::test]
    async fn test_ledger_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path().join("ledger")).await.unwrap();

        let mut ledger = TeamLedger::default();
        ledger.record_delivery("asha", 4, Some("vid_1_abcdefg"));
        store.save("team1", &ledger).await.unwrap();

        let loaded: TeamLedger = store.load("team1").await.unwrap();
        assert_eq!(loaded, ledger);

        let missing: Option<TeamLedger> = store.load("team2").await;
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_ledger_store_settings_slot() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path().join("ledger")).await.unwrap();

        let settings = MatchSettings { overs: 6, inning: 1 };
        store.save("settings", &settings).await.unwrap();
        let loaded: MatchSettings = store.load("settings").await.unwrap();
        assert_eq!(loaded, settings);
    }
}
