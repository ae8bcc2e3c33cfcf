use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Coarse player progression state, from first launch to final victory.
///
/// Serialized as its snake_case string tag so saves stay readable and new
/// variants can be appended without renumbering.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ProgressionState {
    NewPlayer,
    TutorialComplete,
    DeckBuilderUnlocked,
    CombatReady,
    ChamberExplorer,
    TempleMaster,
    PharaohChallenger,
    PharaohVictor,
}

impl Default for ProgressionState {
    fn default() -> Self {
        ProgressionState::NewPlayer
    }
}

/// Player identity and top-line statistics.
///
/// Created once per new game and only ever overwritten on save, never
/// deleted. Mutated exclusively by the progression coordinator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PlayerProfile {
    pub name: String,
    pub level: u32,
    pub xp: u64,
    pub total_wins: u32,
    pub total_losses: u32,
    pub win_streak: u32,
    pub best_win_streak: u32,
    /// Cumulative playtime in seconds (v1 saves stored hours; migrated).
    pub playtime_seconds: f64,
    pub current_chamber: String,
    pub unlocked_chambers: BTreeSet<String>,
    pub progression_state: ProgressionState,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp of the last session.
    pub last_played: String,
}

impl Default for PlayerProfile {
    /// Serde fill-in for fields absent from older saves.
    fn default() -> Self {
        Self::new("", "")
    }
}

impl PlayerProfile {
    /// A fresh profile for a new game, unlocked at the temple entrance.
    pub fn new(name: &str, now: &str) -> Self {
        let mut unlocked = BTreeSet::new();
        unlocked.insert("entrance".to_string());
        Self {
            name: name.to_string(),
            level: 1,
            xp: 0,
            total_wins: 0,
            total_losses: 0,
            win_streak: 0,
            best_win_streak: 0,
            playtime_seconds: 0.0,
            current_chamber: "entrance".to_string(),
            unlocked_chambers: unlocked,
            progression_state: ProgressionState::NewPlayer,
            created_at: now.to_string(),
            last_played: now.to_string(),
        }
    }

    /// Total battles fought.
    pub fn total_battles(&self) -> u32 {
        self.total_wins + self.total_losses
    }

    /// Win rate in percent, 0.0 when no battles have been fought.
    pub fn win_rate(&self) -> f64 {
        let total = self.total_battles();
        if total == 0 {
            return 0.0;
        }
        f64::from(self.total_wins) / f64::from(total) * 100.0
    }
}
