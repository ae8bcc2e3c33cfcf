//! Save persistence core: versioned serialization with migrations,
//! integrity verification (SHA-256 + HMAC, optional encryption), atomic
//! slot storage with backup-on-write, and a rotating backup archive with
//! per-type retention.
//!
//! The progression crate sits on top of this one and owns the canonical
//! in-memory state; everything here treats saves as data.

mod atomic_write;
mod backup;
mod crypto;
mod integrity;
mod levels;
mod save_codec;
mod save_error;
mod save_migrate;
mod save_migrate_registry;
mod save_store;
mod save_types;
mod scheduler;
mod security;
mod validator;

pub use atomic_write::atomic_write;
pub use backup::{
    BackupManager, BackupMetadata, BackupSummary, BackupType, RetentionPolicy,
};
pub use integrity::{sha256_hex, verify_checksum, HmacKey};
pub use levels::{LevelStanding, XpCurve};
pub use save_codec::{decode_slot, encode_slot, peek_metadata, DecodeReport, SlotMetadata};
pub use save_error::SaveError;
pub use save_migrate::{migrate_document, MigrationReport};
pub use save_store::SaveStore;
pub use save_types::{
    AchievementProgress, CardCollectionData, GameSettings, PlayerProfile, ProgressionData,
    ProgressionState, SaveData, CURRENT_SAVE_VERSION, GAME_VERSION,
};
pub use scheduler::{BackupSchedule, Clock, ManualClock, SchedulerHandle, SystemClock};
pub use security::{canonical_bytes, SecurityLevel};
pub use validator::{SaveValidator, ValidationOutcome, ValidatorConfig};
