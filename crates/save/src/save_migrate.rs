// ---------------------------------------------------------------------------
// Save migration logic
// ---------------------------------------------------------------------------
//
// This module defines the concrete migration steps and exposes the
// `migrate_document()` function used by the load pipeline. The migration
// chain is built via `build_migration_registry()` which validates that every
// version transition from v0 to CURRENT_SAVE_VERSION is covered.
//
// Steps rewrite the raw JSON document. New fields added in a version bump
// mostly arrive via `#[serde(default)]` on the typed model; a step only
// touches the document when a field was renamed, rescaled, or restructured.

use serde_json::Value;

use crate::save_error::SaveError;
pub use crate::save_migrate_registry::MigrationReport;
use crate::save_migrate_registry::{MigrationRegistry, MigrationStep};
use crate::save_types::CURRENT_SAVE_VERSION;

/// Build the full migration registry with all version transition steps.
pub(crate) fn build_migration_registry() -> MigrationRegistry {
    let steps = vec![
        // v0 -> v1: Legacy unversioned saves used short section names.
        MigrationStep {
            from_version: 0,
            description: "Legacy unversioned save -> v1 baseline section names",
            migrate_fn: migrate_v0_to_v1,
        },
        // v1 -> v2: Playtime switched from hours to seconds; per-deck
        // win/loss tracking added to the collection.
        MigrationStep {
            from_version: 1,
            description: "playtime_hours -> playtime_seconds, add per-deck win/loss maps",
            migrate_fn: migrate_v1_to_v2,
        },
        // v2 -> v3: Achievement progress became structured records.
        MigrationStep {
            from_version: 2,
            description: "achievement_progress scalar map -> AchievementProgress records",
            migrate_fn: migrate_v2_to_v3,
        },
    ];

    MigrationRegistry::new(steps, CURRENT_SAVE_VERSION)
}

/// Rename the legacy top-level sections to their v1 names.
fn migrate_v0_to_v1(document: &mut Value) {
    let Some(map) = document.as_object_mut() else {
        return;
    };
    for (old, new) in [
        ("player", "player_profile"),
        ("collection", "card_collection"),
        ("stats", "progression"),
    ] {
        if let Some(section) = map.remove(old) {
            map.entry(new.to_string()).or_insert(section);
        }
    }
    // Legacy format marker, superseded by save_version.
    map.remove("save_format");
}

/// Rescale playtime and seed the deck win/loss maps.
fn migrate_v1_to_v2(document: &mut Value) {
    if let Some(profile) = document
        .get_mut("player_profile")
        .and_then(Value::as_object_mut)
    {
        if let Some(hours) = profile.remove("playtime_hours") {
            let seconds = hours.as_f64().unwrap_or(0.0) * 3600.0;
            profile.insert("playtime_seconds".to_string(), Value::from(seconds));
        }
    }
    if let Some(collection) = document
        .get_mut("card_collection")
        .and_then(Value::as_object_mut)
    {
        for field in ["deck_wins", "deck_losses"] {
            collection
                .entry(field.to_string())
                .or_insert_with(|| Value::Object(Default::default()));
        }
    }
}

/// Lift scalar achievement progress values into structured records. A bare
/// number carries no target, so migrated entries get the legacy default
/// target of 100 and completion is taken from the unlocked-achievements set.
fn migrate_v2_to_v3(document: &mut Value) {
    let completed: Vec<String> = document
        .get("progression")
        .and_then(|p| p.get("achievements"))
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let Some(progress) = document
        .get_mut("progression")
        .and_then(|p| p.get_mut("achievement_progress"))
        .and_then(Value::as_object_mut)
    else {
        return;
    };

    for (name, entry) in progress.iter_mut() {
        if entry.is_object() {
            continue; // already structured
        }
        let current_value = entry.as_f64().unwrap_or(0.0);
        let is_completed = completed.iter().any(|c| c == name);
        *entry = serde_json::json!({
            "current_value": current_value,
            "target": 100.0,
            "is_completed": is_completed,
            "completed_at": Value::Null,
        });
    }
}

/// Migrate a raw save document from any older version up to
/// `CURRENT_SAVE_VERSION`, returning a step-by-step report.
///
/// # Errors
///
/// Returns `SaveError::VersionMismatch` if the document was written by a
/// newer version of the game, or `SaveError::MigrationFailed` if it is not
/// a JSON object.
pub fn migrate_document(document: &mut Value) -> Result<MigrationReport, SaveError> {
    let registry = build_migration_registry();
    registry.migrate(document)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::save_types::{SaveData, CURRENT_SAVE_VERSION};

    /// A current-version document as the codec would produce it.
    pub(crate) fn current_document() -> Value {
        let save = SaveData::new("Khenti", "2026-08-29T10:00:00Z");
        serde_json::to_value(&save).unwrap()
    }

    fn legacy_v0_document() -> Value {
        serde_json::json!({
            "save_format": "duat-legacy",
            "player": {
                "name": "Khenti",
                "level": 3,
                "xp": 2500,
                "playtime_hours": 2.5,
            },
            "collection": {
                "owned_cards": { "anubis_guardian": 2 },
            },
            "stats": {
                "battles_won": 12,
                "achievements": ["first_victory"],
                "achievement_progress": { "first_victory": 100, "chamber_crawler": 40 },
            },
        })
    }

    #[test]
    fn test_migrate_rejects_future_version() {
        let mut document = serde_json::json!({ "save_version": CURRENT_SAVE_VERSION + 1 });
        let result = migrate_document(&mut document);
        assert!(matches!(result, Err(SaveError::VersionMismatch { .. })));
    }

    #[test]
    fn test_migrate_accepts_current_version() {
        let mut document = current_document();
        let report = migrate_document(&mut document).unwrap();
        assert_eq!(report.steps_applied, 0);
        assert_eq!(report.original_version, CURRENT_SAVE_VERSION);
    }

    #[test]
    fn test_full_chain_from_legacy_v0() {
        let mut document = legacy_v0_document();
        let report = migrate_document(&mut document).unwrap();
        assert_eq!(report.original_version, 0);
        assert_eq!(report.final_version, CURRENT_SAVE_VERSION);
        assert_eq!(report.steps_applied, CURRENT_SAVE_VERSION);
        assert_eq!(document["save_version"], CURRENT_SAVE_VERSION);

        // Sections renamed.
        assert!(document.get("player").is_none());
        assert!(document.get("save_format").is_none());
        assert_eq!(document["player_profile"]["name"], "Khenti");
        assert_eq!(
            document["card_collection"]["owned_cards"]["anubis_guardian"],
            2
        );
    }

    #[test]
    fn test_playtime_rescaled_to_seconds() {
        let mut document = legacy_v0_document();
        migrate_document(&mut document).unwrap();
        let profile = &document["player_profile"];
        assert!(profile.get("playtime_hours").is_none());
        assert_eq!(profile["playtime_seconds"], 9000.0);
    }

    #[test]
    fn test_deck_record_maps_seeded() {
        let mut document = legacy_v0_document();
        migrate_document(&mut document).unwrap();
        let collection = &document["card_collection"];
        assert!(collection["deck_wins"].as_object().unwrap().is_empty());
        assert!(collection["deck_losses"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_achievement_progress_lifted_to_records() {
        let mut document = legacy_v0_document();
        migrate_document(&mut document).unwrap();
        let progress = &document["progression"]["achievement_progress"];

        // Completed achievement: marked from the unlocked set.
        assert_eq!(progress["first_victory"]["current_value"], 100.0);
        assert_eq!(progress["first_victory"]["is_completed"], true);

        // In-flight achievement: carries its value, not completed.
        assert_eq!(progress["chamber_crawler"]["current_value"], 40.0);
        assert_eq!(progress["chamber_crawler"]["is_completed"], false);
        assert_eq!(progress["chamber_crawler"]["target"], 100.0);
    }

    #[test]
    fn test_migration_is_idempotent_on_structured_progress() {
        let mut document = legacy_v0_document();
        migrate_document(&mut document).unwrap();
        let after_first = document.clone();

        // Force the chain to run again from v2.
        document["save_version"] = Value::from(2);
        migrate_document(&mut document).unwrap();
        assert_eq!(document, after_first);
    }

    #[test]
    fn test_migrated_legacy_save_deserializes() {
        let mut document = legacy_v0_document();
        migrate_document(&mut document).unwrap();
        let save: SaveData = serde_json::from_value(document).unwrap();
        assert_eq!(save.save_version, CURRENT_SAVE_VERSION);
        assert_eq!(save.player_profile.name, "Khenti");
        assert_eq!(save.player_profile.playtime_seconds, 9000.0);
        assert_eq!(save.progression.battles_won, 12);
    }
}
