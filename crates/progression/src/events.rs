// ---------------------------------------------------------------------------
// events – Structured results returned by coordinator operations
// ---------------------------------------------------------------------------
//
// These results are the only channel by which UI and achievement
// collaborators learn of state changes; there is no polling interface.

use save::{MigrationReport, ValidationOutcome};

/// XP granted by one event and its effect on the level curve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XpAward {
    pub amount: u64,
    pub new_total: u64,
    pub level_before: u32,
    pub level_after: u32,
    /// Milestone reward ids for every level crossed, in level order.
    pub milestone_rewards: Vec<String>,
}

impl XpAward {
    pub fn leveled_up(&self) -> bool {
        self.level_after > self.level_before
    }
}

/// Everything that changed when a battle result was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleOutcome {
    pub won: bool,
    pub enemy_type: String,
    pub total_wins: u32,
    pub total_losses: u32,
    pub win_streak: u32,
    pub best_win_streak: u32,
    pub xp: XpAward,
}

/// Result of a chamber completion attempt. Idempotent per chamber: a repeat
/// completion reports `already_completed` and changes nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChamberOutcome {
    pub chamber_id: String,
    pub already_completed: bool,
    /// Absent on repeat completions.
    pub xp: Option<XpAward>,
    pub cards_awarded: Vec<String>,
    pub chambers_unlocked: Vec<String>,
}

/// Where a successful load ultimately got its bytes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    /// The slot file itself.
    Primary,
    /// The slot's `.bak` sibling, after the primary failed.
    BakFile,
    /// A backup archive (by id), after both slot files failed.
    Backup(String),
}

/// Everything a caller learns from `load_game` beyond the state itself.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub slot: String,
    pub source: LoadSource,
    pub migration: MigrationReport,
    pub validation: ValidationOutcome,
    /// Integrity and reconciliation warnings, in occurrence order.
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xp_award_level_up_detection() {
        let flat = XpAward {
            amount: 55,
            new_total: 55,
            level_before: 1,
            level_after: 1,
            milestone_rewards: Vec::new(),
        };
        assert!(!flat.leveled_up());

        let up = XpAward {
            amount: 200,
            new_total: 1100,
            level_before: 1,
            level_after: 2,
            milestone_rewards: Vec::new(),
        };
        assert!(up.leveled_up());
    }
}
