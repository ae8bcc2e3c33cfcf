use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Progress toward a single achievement. The persistence core stores these
/// records opaquely on behalf of the achievement collaborator; it never
/// interprets them beyond serialization.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AchievementProgress {
    pub current_value: f64,
    pub target: f64,
    pub is_completed: bool,
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// Chamber completion, boss defeats, achievements, and aggregate battle
/// statistics.
///
/// Invariant (checked by the validator, tolerated and reported on
/// historical corruption rather than crashing the loader):
/// `battles_won == PlayerProfile::total_wins` and the same for losses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ProgressionData {
    pub chambers_completed: BTreeSet<String>,
    /// chamber id -> RFC 3339 first-completion timestamp.
    pub chamber_completion_times: BTreeMap<String, String>,
    /// boss id -> times defeated.
    pub boss_defeats: BTreeMap<String, u32>,
    pub achievements: BTreeSet<String>,
    pub achievement_progress: BTreeMap<String, AchievementProgress>,

    pub battles_won: u32,
    pub battles_lost: u32,
    pub cards_played: u64,
    pub damage_dealt: u64,
    pub damage_taken: u64,

    pub daily_wins: u32,
    pub weekly_wins: u32,
    /// RFC 3339 timestamp of the last daily counter reset.
    pub last_daily_reset: String,
    /// RFC 3339 timestamp of the last weekly counter reset.
    pub last_weekly_reset: String,
}

impl ProgressionData {
    /// Fresh progression data with reset anchors at `now`.
    pub fn new(now: &str) -> Self {
        Self {
            last_daily_reset: now.to_string(),
            last_weekly_reset: now.to_string(),
            ..Self::default()
        }
    }

    /// Whether the chamber has been completed at least once.
    pub fn is_chamber_completed(&self, chamber_id: &str) -> bool {
        self.chambers_completed.contains(chamber_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sets_reset_anchors() {
        let progression = ProgressionData::new("2026-01-01T00:00:00+00:00");
        assert_eq!(progression.last_daily_reset, "2026-01-01T00:00:00+00:00");
        assert_eq!(progression.last_weekly_reset, "2026-01-01T00:00:00+00:00");
        assert_eq!(progression.battles_won, 0);
        assert!(progression.chambers_completed.is_empty());
    }

    #[test]
    fn test_chamber_completion_lookup() {
        let mut progression = ProgressionData::default();
        assert!(!progression.is_chamber_completed("entrance"));
        progression.chambers_completed.insert("entrance".to_string());
        assert!(progression.is_chamber_completed("entrance"));
    }

    #[test]
    fn test_achievement_progress_roundtrip() {
        let progress = AchievementProgress {
            current_value: 12.0,
            target: 50.0,
            is_completed: false,
            completed_at: None,
        };
        let json = serde_json::to_string(&progress).unwrap();
        let back: AchievementProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(progress, back);
    }
}
