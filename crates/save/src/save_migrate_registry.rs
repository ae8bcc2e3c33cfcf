// ---------------------------------------------------------------------------
// Save migration registry: structured, validated migration chain
// ---------------------------------------------------------------------------
//
// Each migration step is a function `fn(&mut serde_json::Value)` that rewrites
// the raw save document from version N to version N+1. Steps run on untyped
// JSON so a renamed or restructured field never has to survive a round-trip
// through the current typed model first. The registry validates at
// construction time that the chain is contiguous (no gaps, no duplicates).

use serde_json::Value;

use crate::save_error::SaveError;

/// A single migration step: transforms a save document from `from_version`
/// to `from_version + 1`.
pub(crate) struct MigrationStep {
    pub from_version: u32,
    pub description: &'static str,
    pub migrate_fn: fn(&mut Value),
}

/// Result of running the migration chain on a save document.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    /// The version the save document was originally at.
    pub original_version: u32,
    /// The version the save document is now at.
    pub final_version: u32,
    /// Number of migration steps that were applied.
    pub steps_applied: u32,
    /// Descriptions of each step that was applied, in order.
    pub step_descriptions: Vec<&'static str>,
}

/// Registry holding an ordered, validated chain of migration steps.
pub(crate) struct MigrationRegistry {
    steps: Vec<MigrationStep>,
    current_version: u32,
}

impl MigrationRegistry {
    /// Build a registry from a list of migration steps.
    ///
    /// # Panics
    ///
    /// Panics if:
    /// - The chain has gaps (e.g., v1->v2 is missing)
    /// - The chain has duplicate source versions
    /// - The chain doesn't end at `current_version - 1`
    pub fn new(steps: Vec<MigrationStep>, current_version: u32) -> Self {
        // Validate: no duplicates
        let mut seen = std::collections::HashSet::new();
        for step in &steps {
            assert!(
                seen.insert(step.from_version),
                "Duplicate migration step for version {}",
                step.from_version
            );
        }

        // Validate: contiguous chain from 0 to current_version-1
        if current_version > 0 {
            for v in 0..current_version {
                assert!(
                    seen.contains(&v),
                    "Missing migration step from v{} to v{}. The migration chain must be \
                     contiguous from v0 to v{}.",
                    v,
                    v + 1,
                    current_version - 1
                );
            }
        }

        // Sort by from_version for deterministic application order
        let mut steps = steps;
        steps.sort_by_key(|s| s.from_version);

        Self {
            steps,
            current_version,
        }
    }

    /// Apply all necessary migration steps to bring a save document from its
    /// recorded version up to `current_version`. A document with no
    /// `save_version` field is treated as a v0 legacy save.
    ///
    /// # Errors
    ///
    /// Returns `SaveError::VersionMismatch` if the save is from a future
    /// version, or `SaveError::MigrationFailed` if the document is not a
    /// JSON object.
    pub fn migrate(&self, document: &mut Value) -> Result<MigrationReport, SaveError> {
        if !document.is_object() {
            return Err(SaveError::MigrationFailed(
                "save document is not a JSON object".to_string(),
            ));
        }

        let original_version = document_version(document);

        if original_version > self.current_version {
            return Err(SaveError::VersionMismatch {
                expected_max: self.current_version,
                found: original_version,
            });
        }

        let mut version = original_version;
        let mut steps_applied = 0u32;
        let mut step_descriptions = Vec::new();

        // Apply each step whose from_version matches the document's version
        for step in &self.steps {
            if version >= self.current_version {
                break;
            }
            if step.from_version == version {
                (step.migrate_fn)(document);
                version = step.from_version + 1;
                document["save_version"] = Value::from(version);
                steps_applied += 1;
                step_descriptions.push(step.description);
            }
        }

        debug_assert_eq!(version, self.current_version);

        Ok(MigrationReport {
            original_version,
            final_version: version,
            steps_applied,
            step_descriptions,
        })
    }

    /// Returns the number of registered migration steps.
    #[cfg(test)]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Returns the current (target) version.
    #[cfg(test)]
    pub fn current_version(&self) -> u32 {
        self.current_version
    }
}

/// Read the `save_version` field of a document; missing or non-numeric
/// means a legacy v0 save.
pub(crate) fn document_version(document: &Value) -> u32 {
    document
        .get("save_version")
        .and_then(Value::as_u64)
        .map(|v| v as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save_types::CURRENT_SAVE_VERSION;

    #[test]
    fn test_registry_step_count_matches_current_version() {
        let registry = super::super::save_migrate::build_migration_registry();
        assert_eq!(
            registry.step_count() as u32,
            CURRENT_SAVE_VERSION,
            "Registry should have exactly CURRENT_SAVE_VERSION steps \
             (one for each v0->v1, v1->v2, ..., v(N-1)->vN)"
        );
    }

    #[test]
    fn test_registry_target_version() {
        let registry = super::super::save_migrate::build_migration_registry();
        assert_eq!(registry.current_version(), CURRENT_SAVE_VERSION);
    }

    #[test]
    fn test_registry_rejects_future_version() {
        let registry = super::super::save_migrate::build_migration_registry();
        let mut document = serde_json::json!({ "save_version": CURRENT_SAVE_VERSION + 1 });
        let result = registry.migrate(&mut document);
        assert!(matches!(result, Err(SaveError::VersionMismatch { .. })));
    }

    #[test]
    fn test_registry_rejects_non_object_document() {
        let registry = super::super::save_migrate::build_migration_registry();
        let mut document = serde_json::json!([1, 2, 3]);
        let result = registry.migrate(&mut document);
        assert!(matches!(result, Err(SaveError::MigrationFailed(_))));
    }

    #[test]
    fn test_registry_noop_for_current_version() {
        let registry = super::super::save_migrate::build_migration_registry();
        let mut document = serde_json::json!({ "save_version": CURRENT_SAVE_VERSION });
        let report = registry.migrate(&mut document).unwrap();
        assert_eq!(report.original_version, CURRENT_SAVE_VERSION);
        assert_eq!(report.final_version, CURRENT_SAVE_VERSION);
        assert_eq!(report.steps_applied, 0);
        assert!(report.step_descriptions.is_empty());
    }

    #[test]
    fn test_missing_version_field_is_legacy_v0() {
        assert_eq!(document_version(&serde_json::json!({})), 0);
        assert_eq!(
            document_version(&serde_json::json!({ "save_version": "three" })),
            0
        );
        assert_eq!(
            document_version(&serde_json::json!({ "save_version": 2 })),
            2
        );
    }

    #[test]
    #[should_panic(expected = "Duplicate migration step")]
    fn test_registry_rejects_duplicate_steps() {
        let steps = vec![
            MigrationStep {
                from_version: 0,
                description: "first",
                migrate_fn: |_| {},
            },
            MigrationStep {
                from_version: 0,
                description: "duplicate",
                migrate_fn: |_| {},
            },
        ];
        MigrationRegistry::new(steps, 1);
    }

    #[test]
    #[should_panic(expected = "Missing migration step")]
    fn test_registry_rejects_gaps() {
        let steps = vec![
            MigrationStep {
                from_version: 0,
                description: "v0->v1",
                migrate_fn: |_| {},
            },
            // gap: no v1->v2
            MigrationStep {
                from_version: 2,
                description: "v2->v3",
                migrate_fn: |_| {},
            },
        ];
        MigrationRegistry::new(steps, 3);
    }
}
