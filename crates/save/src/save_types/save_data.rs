// ---------------------------------------------------------------------------
// SaveData: the aggregate save root
// ---------------------------------------------------------------------------

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::collection::CardCollectionData;
use super::profile::PlayerProfile;
use super::progression_data::ProgressionData;
use super::settings::GameSettings;

/// Current save format version. Bump together with a new entry in the
/// migration registry (`save_migrate::build_migration_registry`).
///
/// History:
///   v0 – legacy unversioned saves
///   v1 – explicit versioning baseline
///   v2 – playtime_hours (f64 hours) -> playtime_seconds; deck win/loss maps
///   v3 – achievement_progress: plain integer map -> structured records
pub const CURRENT_SAVE_VERSION: u32 = 3;

/// Game build version recorded in save metadata. Independent of the save
/// format version.
pub const GAME_VERSION: &str = "1.0.0";

/// The complete save data for one player. Exactly one `SaveData` is
/// canonical in memory per running session, owned by the progression
/// coordinator; the store and backup manager only ever see it as bytes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SaveData {
    /// Save format version. Defaults to 0 for legacy saves that predate
    /// versioning; the migration chain brings it to `CURRENT_SAVE_VERSION`.
    pub save_version: u32,
    pub game_version: String,

    pub player_profile: PlayerProfile,
    pub card_collection: CardCollectionData,
    pub progression: ProgressionData,
    pub settings: GameSettings,

    /// RFC 3339 timestamp of the current session start.
    pub session_start_time: String,
    /// RFC 3339 timestamp the save was first created.
    pub created_at: String,
    /// RFC 3339 timestamp of the last state mutation. Bumped by the
    /// coordinator when state changes, not by saving, so an unchanged save
    /// re-serializes byte-identically.
    pub modified_at: String,

    /// Unknown fields from newer (minor) builds are preserved here rather
    /// than rejected, except at the Paranoid security level where the
    /// validator reports them.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl Default for SaveData {
    /// Serde fill-in for sections absent from older saves. Defaults to v0
    /// so a sectionless document still runs the full migration chain.
    fn default() -> Self {
        Self {
            save_version: 0,
            ..Self::new("", "")
        }
    }
}

impl SaveData {
    /// A fresh save for a new player. The starter card collection is filled
    /// in by the progression crate's reward tables.
    pub fn new(player_name: &str, now: &str) -> Self {
        Self {
            save_version: CURRENT_SAVE_VERSION,
            game_version: GAME_VERSION.to_string(),
            player_profile: PlayerProfile::new(player_name, now),
            card_collection: CardCollectionData::default(),
            progression: ProgressionData::new(now),
            settings: GameSettings::default(),
            session_start_time: now.to_string(),
            created_at: now.to_string(),
            modified_at: now.to_string(),
            extensions: BTreeMap::new(),
        }
    }
}
