// ---------------------------------------------------------------------------
// summary – Read-only save projection for UI/telemetry collaborators
// ---------------------------------------------------------------------------

use save::{ProgressionState, SaveData};
use serde::Serialize;

/// Computed on demand from canonical state; never a mutation channel.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SaveSummary {
    pub player_name: String,
    pub level: u32,
    pub xp: u64,
    /// Percentage, 0.0 with no battles fought.
    pub win_rate: f64,
    pub playtime_seconds: f64,
    pub win_streak: u32,
    pub best_win_streak: u32,
    pub chambers_completed: usize,
    pub achievements_completed: usize,
    pub unique_cards: usize,
    pub total_cards: u64,
    pub progression_state: ProgressionState,
}

impl SaveSummary {
    pub fn of(save: &SaveData) -> Self {
        Self {
            player_name: save.player_profile.name.clone(),
            level: save.player_profile.level,
            xp: save.player_profile.xp,
            win_rate: save.player_profile.win_rate(),
            playtime_seconds: save.player_profile.playtime_seconds,
            win_streak: save.player_profile.win_streak,
            best_win_streak: save.player_profile.best_win_streak,
            chambers_completed: save.progression.chambers_completed.len(),
            achievements_completed: save.progression.achievements.len(),
            unique_cards: save.card_collection.unique_cards(),
            total_cards: save.card_collection.total_cards(),
            progression_state: save.player_profile.progression_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_projection() {
        let mut save = SaveData::new("Khenti", "2026-08-29T10:00:00Z");
        save.player_profile.total_wins = 3;
        save.player_profile.total_losses = 1;
        save.card_collection.add_card("whisper_of_thoth", 3);
        save.progression
            .chambers_completed
            .insert("entrance".to_string());

        let summary = SaveSummary::of(&save);
        assert_eq!(summary.player_name, "Khenti");
        assert_eq!(summary.chambers_completed, 1);
        assert_eq!(summary.unique_cards, 1);
        assert_eq!(summary.total_cards, 3);
        assert!((summary.win_rate - 75.0).abs() < f64::EPSILON);
    }
}
