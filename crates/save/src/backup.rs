// ---------------------------------------------------------------------------
// backup – Rotating, size-capped snapshot archive for save slots
// ---------------------------------------------------------------------------
//
// Each backup type (auto, manual, daily, ...) rotates independently under a
// strict count cap, oldest-created-first. The index (`backup_index.json`)
// is the source of truth for listings; an index entry is always removed
// before its archive file is deleted, so an eviction interrupted mid-way
// leaves at worst an orphaned file, never a dangling entry.
//
// Archive layout per backup id, under a type-specific directory: gzip JSON
// `{"metadata": {backup fields + the slot's own metadata}, "save_data":
// <raw game state, still encrypted if the slot was>}`. The manager never
// decrypts; summary fields that need the plaintext are taken from the slot
// metadata or, for unencrypted slots, read off the raw game state.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::atomic_write::atomic_write;
use crate::integrity::sha256_hex;
use crate::save_codec::{self, SlotMetadata};
use crate::save_error::SaveError;
use crate::save_store::SaveStore;
use crate::scheduler::Clock;

pub const BACKUP_INDEX_FILENAME: &str = "backup_index.json";
const ARCHIVE_EXTENSION: &str = "bak.gz";

// ============================================================================
// Types
// ============================================================================

/// Scheduling/retention category. Each type rotates independently.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BackupType {
    Auto,
    Manual,
    SessionStart,
    Progression,
    Emergency,
    Daily,
    Weekly,
}

impl BackupType {
    pub const ALL: [BackupType; 7] = [
        BackupType::Auto,
        BackupType::Manual,
        BackupType::SessionStart,
        BackupType::Progression,
        BackupType::Emergency,
        BackupType::Daily,
        BackupType::Weekly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BackupType::Auto => "auto",
            BackupType::Manual => "manual",
            BackupType::SessionStart => "session_start",
            BackupType::Progression => "progression",
            BackupType::Emergency => "emergency",
            BackupType::Daily => "daily",
            BackupType::Weekly => "weekly",
        }
    }
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-type retention caps. Strict count-based eviction, oldest first.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub auto: usize,
    pub manual: usize,
    pub session_start: usize,
    pub progression: usize,
    pub emergency: usize,
    pub daily: usize,
    pub weekly: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            auto: 10,
            manual: 20,
            session_start: 10,
            progression: 10,
            emergency: 5,
            daily: 7,
            weekly: 4,
        }
    }
}

impl RetentionPolicy {
    pub fn cap(&self, backup_type: BackupType) -> usize {
        match backup_type {
            BackupType::Auto => self.auto,
            BackupType::Manual => self.manual,
            BackupType::SessionStart => self.session_start,
            BackupType::Progression => self.progression,
            BackupType::Emergency => self.emergency,
            BackupType::Daily => self.daily,
            BackupType::Weekly => self.weekly,
        }
    }
}

/// One record per backup artifact. Created at backup time, immutable
/// thereafter, removed by rotation or explicit delete.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BackupMetadata {
    /// `{type}_{YYYYmmdd_HHMMSS}`, suffixed on collision.
    pub id: String,
    pub backup_type: BackupType,
    pub created_at: String,
    pub description: String,
    pub size_bytes: u64,
    /// SHA-256 of the archive file bytes.
    pub checksum: String,

    // Denormalized summary for listings, no decompression needed.
    pub player_name: String,
    pub player_level: u32,
    pub playtime_seconds: f64,
    pub chambers_completed: u32,
    pub total_cards: u64,
}

/// Aggregate view over all retained backups.
#[derive(Debug, Clone, Default)]
pub struct BackupSummary {
    pub total_backups: usize,
    pub total_size_bytes: u64,
    pub counts: Vec<(BackupType, usize)>,
    pub newest: Option<String>,
    pub oldest: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct BackupIndex {
    backups: Vec<BackupMetadata>,
}

// ============================================================================
// Manager
// ============================================================================

/// Rotating backup archive over a slot store.
pub struct BackupManager {
    root: PathBuf,
    store: SaveStore,
    retention: RetentionPolicy,
    clock: Arc<dyn Clock>,
    index: BackupIndex,
}

impl BackupManager {
    /// Open (creating if needed) a backup archive rooted at `root`,
    /// snapshotting slots from `store`.
    pub fn new(
        root: impl Into<PathBuf>,
        store: SaveStore,
        retention: RetentionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SaveError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let index = load_index(&root.join(BACKUP_INDEX_FILENAME));
        Ok(Self {
            root,
            store,
            retention,
            clock,
            index,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot the current content of `slot` as a backup of the given
    /// type, then enforce that type's retention cap.
    pub fn create_backup(
        &mut self,
        backup_type: BackupType,
        slot: &str,
        description: &str,
    ) -> Result<BackupMetadata, SaveError> {
        let slot_bytes = self.store.load(slot)?;
        let document = save_codec::read_document(&slot_bytes)?;
        let slot_metadata = save_codec::slot_metadata_of(&document)?;
        let game_state = document
            .get("game_state")
            .cloned()
            .ok_or_else(|| SaveError::Decode("slot document missing game_state".to_string()))?;

        let now = self.clock.now();
        let id = self.fresh_id(backup_type, now);
        let created_at = now.to_rfc3339();

        let (player_level, total_cards) = summarize_game_state(&slot_metadata, &game_state);

        let archive = serde_json::json!({
            "metadata": {
                "backup_id": id,
                "backup_type": backup_type,
                "created_at": created_at,
                "description": description,
                "slot": serde_json::to_value(&slot_metadata)
                    .map_err(|e| SaveError::Encode(e.to_string()))?,
            },
            "save_data": game_state,
        });
        let archive_bytes = save_codec::compress(
            &serde_json::to_vec(&archive).map_err(|e| SaveError::Encode(e.to_string()))?,
        )?;

        let path = self.archive_path(backup_type, &id);
        atomic_write(&path, &archive_bytes)?;

        let metadata = BackupMetadata {
            id: id.clone(),
            backup_type,
            created_at,
            description: description.to_string(),
            size_bytes: archive_bytes.len() as u64,
            checksum: sha256_hex(&archive_bytes),
            player_name: slot_metadata.player_name.clone(),
            player_level,
            playtime_seconds: slot_metadata.playtime_seconds,
            chambers_completed: slot_metadata.floor,
            total_cards,
        };

        self.index.backups.push(metadata.clone());
        self.save_index()?;
        self.enforce_retention(backup_type)?;

        info!(backup_id = %metadata.id, %backup_type, slot, "backup created");
        Ok(metadata)
    }

    /// Restore a backup into `target_slot`. The current content of the
    /// target (if any) is first captured as an Emergency backup, so a
    /// restore is itself undoable.
    pub fn restore_backup(&mut self, id: &str, target_slot: &str) -> Result<(), SaveError> {
        let metadata = self.metadata(id)?.clone();

        if self.store.exists(target_slot) {
            self.create_backup(
                BackupType::Emergency,
                target_slot,
                &format!("pre-restore of '{id}'"),
            )?;
        }

        let archive_bytes = self.read_verified_archive(&metadata)?;
        let slot_bytes = slot_bytes_from_archive(&archive_bytes)?;
        self.store.save(target_slot, &slot_bytes)?;
        info!(backup_id = id, target_slot, "backup restored");
        Ok(())
    }

    /// All retained backups, optionally filtered by type, newest first.
    pub fn list_backups(&self, backup_type: Option<BackupType>) -> Vec<BackupMetadata> {
        let mut backups: Vec<BackupMetadata> = self
            .index
            .backups
            .iter()
            .filter(|b| backup_type.map_or(true, |t| b.backup_type == t))
            .cloned()
            .collect();
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        backups
    }

    /// Creation time of the newest backup of a type, for seeding the
    /// scheduler after a restart.
    pub fn last_backup_time(&self, backup_type: BackupType) -> Option<DateTime<Utc>> {
        self.list_backups(Some(backup_type))
            .first()
            .and_then(|b| DateTime::parse_from_rfc3339(&b.created_at).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    /// Reassembled slot bytes of a backup, after archive verification.
    /// Lets a caller decode a backup in memory without touching any slot,
    /// which `restore_backup` cannot do (it snapshots the target first).
    pub fn slot_bytes(&self, id: &str) -> Result<Vec<u8>, SaveError> {
        let metadata = self.metadata(id)?;
        let archive_bytes = self.read_verified_archive(metadata)?;
        slot_bytes_from_archive(&archive_bytes)
    }

    /// Delete a backup: index entry first, then the archive file.
    pub fn delete_backup(&mut self, id: &str) -> Result<(), SaveError> {
        let position = self
            .index
            .backups
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| SaveError::BackupNotFound(id.to_string()))?;
        let metadata = self.index.backups.remove(position);
        self.save_index()?;

        let path = self.archive_path(metadata.backup_type, &metadata.id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        debug!(backup_id = id, "backup deleted");
        Ok(())
    }

    /// Copy a backup archive to an arbitrary path, verifying its integrity
    /// first.
    pub fn export_backup(&self, id: &str, destination: &Path) -> Result<(), SaveError> {
        let metadata = self.metadata(id)?;
        let archive_bytes = self.read_verified_archive(metadata)?;
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        atomic_write(destination, &archive_bytes)?;
        info!(backup_id = id, destination = %destination.display(), "backup exported");
        Ok(())
    }

    /// Import an archive from an arbitrary path. The payload is
    /// re-validated and the backup gets a fresh id so it can never collide
    /// with local history.
    pub fn import_backup(&mut self, source: &Path) -> Result<BackupMetadata, SaveError> {
        let archive_bytes = fs::read(source)?;

        // Parse and verify before anything is written locally.
        let slot_bytes = slot_bytes_from_archive(&archive_bytes)?;
        let document = save_codec::read_document(&slot_bytes)?;
        let slot_metadata = save_codec::slot_metadata_of(&document)?;
        let game_state = document
            .get("game_state")
            .cloned()
            .ok_or_else(|| SaveError::Decode("archive missing game state".to_string()))?;

        let backup_type = archive_backup_type(&archive_bytes).unwrap_or(BackupType::Manual);
        let now = self.clock.now();
        let id = self.fresh_id(backup_type, now);
        let created_at = now.to_rfc3339();

        let path = self.archive_path(backup_type, &id);
        atomic_write(&path, &archive_bytes)?;

        let (player_level, total_cards) = summarize_game_state(&slot_metadata, &game_state);
        let metadata = BackupMetadata {
            id: id.clone(),
            backup_type,
            created_at,
            description: format!("imported from {}", source.display()),
            size_bytes: archive_bytes.len() as u64,
            checksum: sha256_hex(&archive_bytes),
            player_name: slot_metadata.player_name.clone(),
            player_level,
            playtime_seconds: slot_metadata.playtime_seconds,
            chambers_completed: slot_metadata.floor,
            total_cards,
        };

        self.index.backups.push(metadata.clone());
        self.save_index()?;
        self.enforce_retention(backup_type)?;

        info!(backup_id = %metadata.id, source = %source.display(), "backup imported");
        Ok(metadata)
    }

    /// Aggregate statistics over all retained backups.
    pub fn summary(&self) -> BackupSummary {
        let all = self.list_backups(None);
        let counts = BackupType::ALL
            .iter()
            .map(|t| {
                (
                    *t,
                    all.iter().filter(|b| b.backup_type == *t).count(),
                )
            })
            .filter(|(_, n)| *n > 0)
            .collect();
        BackupSummary {
            total_backups: all.len(),
            total_size_bytes: all.iter().map(|b| b.size_bytes).sum(),
            counts,
            newest: all.first().map(|b| b.created_at.clone()),
            oldest: all.last().map(|b| b.created_at.clone()),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn metadata(&self, id: &str) -> Result<&BackupMetadata, SaveError> {
        self.index
            .backups
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| SaveError::BackupNotFound(id.to_string()))
    }

    fn read_verified_archive(&self, metadata: &BackupMetadata) -> Result<Vec<u8>, SaveError> {
        let path = self.archive_path(metadata.backup_type, &metadata.id);
        if !path.exists() {
            return Err(SaveError::BackupNotFound(metadata.id.clone()));
        }
        let archive_bytes = fs::read(path)?;
        if sha256_hex(&archive_bytes) != metadata.checksum {
            return Err(SaveError::SecurityViolation(format!(
                "backup '{}' archive checksum mismatch",
                metadata.id
            )));
        }
        Ok(archive_bytes)
    }

    /// Drop the oldest backups of a type until it fits its cap. Each
    /// eviction removes the index entry (persisted) before the file.
    fn enforce_retention(&mut self, backup_type: BackupType) -> Result<(), SaveError> {
        let cap = self.retention.cap(backup_type);
        loop {
            let of_type = self.list_backups(Some(backup_type));
            if of_type.len() <= cap {
                return Ok(());
            }
            // list_backups is newest-first; the victim is the last entry.
            let Some(victim) = of_type.last().map(|b| b.id.clone()) else {
                return Ok(());
            };
            debug!(backup_id = %victim, %backup_type, "retention eviction");
            self.delete_backup(&victim)?;
        }
    }

    fn fresh_id(&self, backup_type: BackupType, now: DateTime<Utc>) -> String {
        let base = format!("{}_{}", backup_type, now.format("%Y%m%d_%H%M%S"));
        if !self.id_exists(&base) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.id_exists(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn id_exists(&self, id: &str) -> bool {
        self.index.backups.iter().any(|b| b.id == id)
    }

    fn archive_path(&self, backup_type: BackupType, id: &str) -> PathBuf {
        self.root
            .join(backup_type.as_str())
            .join(format!("{id}.{ARCHIVE_EXTENSION}"))
    }

    fn save_index(&self) -> Result<(), SaveError> {
        let bytes = serde_json::to_vec_pretty(&self.index)
            .map_err(|e| SaveError::Encode(e.to_string()))?;
        atomic_write(&self.root.join(BACKUP_INDEX_FILENAME), &bytes)?;
        Ok(())
    }
}

fn load_index(path: &Path) -> BackupIndex {
    if !path.exists() {
        return BackupIndex::default();
    }
    match fs::read(path).map_err(SaveError::Io).and_then(|bytes| {
        serde_json::from_slice(&bytes).map_err(|e| SaveError::Decode(e.to_string()))
    }) {
        Ok(index) => index,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "backup index unreadable, starting empty");
            BackupIndex::default()
        }
    }
}

/// Level and total card count for the listing summary. Only readable when
/// the game state is stored in the clear; encrypted slots report zeros.
fn summarize_game_state(slot_metadata: &SlotMetadata, game_state: &Value) -> (u32, u64) {
    if slot_metadata.encrypted {
        return (0, 0);
    }
    let level = game_state
        .pointer("/player_profile/level")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    let total_cards = game_state
        .pointer("/card_collection/owned_cards")
        .and_then(Value::as_object)
        .map(|cards| cards.values().filter_map(Value::as_u64).sum())
        .unwrap_or(0);
    (level, total_cards)
}

/// Reassemble the slot bytes embedded in an archive.
fn slot_bytes_from_archive(archive_bytes: &[u8]) -> Result<Vec<u8>, SaveError> {
    let archive = save_codec::read_document(archive_bytes)?;
    let slot_value = archive
        .pointer("/metadata/slot")
        .cloned()
        .ok_or_else(|| SaveError::Decode("archive missing slot metadata".to_string()))?;
    let slot_metadata: SlotMetadata = serde_json::from_value(slot_value)
        .map_err(|e| SaveError::Decode(format!("malformed archive slot metadata: {e}")))?;
    let game_state = archive
        .get("save_data")
        .ok_or_else(|| SaveError::Decode("archive missing save_data".to_string()))?;
    save_codec::assemble_slot(&slot_metadata, game_state)
}

fn archive_backup_type(archive_bytes: &[u8]) -> Option<BackupType> {
    let archive = save_codec::read_document(archive_bytes).ok()?;
    let value = archive.pointer("/metadata/backup_type")?.clone();
    serde_json::from_value(value).ok()
}
