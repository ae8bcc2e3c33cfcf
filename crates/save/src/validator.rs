// ---------------------------------------------------------------------------
// validator – Schema, range, and consistency checks over a deserialized save
// ---------------------------------------------------------------------------
//
// `validate` never fails on malformed input: it always returns the full list
// of findings. Errors are structural or range violations; warnings are
// advisory anomaly heuristics that must never block a load. Whether errors
// abort a load is the caller's decision, keyed off the security level.

use crate::security::SecurityLevel;
use crate::levels::XpCurve;
use crate::save_types::SaveData;

/// Tunable validation thresholds. The anomaly heuristics in particular have
/// no principled values, so they are configuration rather than constants.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub max_xp: u64,
    pub max_unique_cards: usize,
    pub max_card_count: u32,
    /// Allowed distance between the stored level and the level the XP curve
    /// derives, to tolerate legitimate bonus-XP variance.
    pub level_tolerance: u32,

    // Anomaly heuristics (warnings only).
    pub max_battles_per_hour: f64,
    /// XP totals at or above this that are exact multiples of
    /// `round_xp_modulus` are flagged as suspiciously round.
    pub round_xp_floor: u64,
    pub round_xp_modulus: u64,
    /// Wins with zero losses at or above this count are flagged.
    pub flawless_win_threshold: u32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_xp: 10_000_000,
            max_unique_cards: 500,
            max_card_count: 1000,
            level_tolerance: 2,
            max_battles_per_hour: 60.0,
            round_xp_floor: 10_000,
            round_xp_modulus: 1000,
            flawless_win_threshold: 50,
        }
    }
}

/// All findings from one validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Save structure validator. Stateless apart from its thresholds and the
/// XP curve used for level-plausibility checks.
#[derive(Debug, Clone, Default)]
pub struct SaveValidator {
    config: ValidatorConfig,
    curve: XpCurve,
}

impl SaveValidator {
    pub fn new(config: ValidatorConfig, curve: XpCurve) -> Self {
        Self { config, curve }
    }

    /// Run every check. The security level only affects whether unknown
    /// extension fields are errors (`Paranoid`) or ignored.
    pub fn validate(&self, save: &SaveData, level: SecurityLevel) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();
        self.check_profile(save, &mut outcome);
        self.check_collection(save, &mut outcome);
        self.check_cross_consistency(save, &mut outcome);
        self.check_anomalies(save, &mut outcome);

        if level.rejects_unknown_fields() && !save.extensions.is_empty() {
            let names: Vec<&str> = save.extensions.keys().map(String::as_str).collect();
            outcome.errors.push(format!(
                "unknown fields rejected at paranoid security level: {}",
                names.join(", ")
            ));
        }
        outcome
    }

    fn check_profile(&self, save: &SaveData, outcome: &mut ValidationOutcome) {
        let profile = &save.player_profile;

        if profile.name.trim().is_empty() {
            outcome.errors.push("player name is empty".to_string());
        }
        if profile.level < 1 || profile.level > self.curve.max_level {
            outcome.errors.push(format!(
                "level {} outside valid range [1, {}]",
                profile.level, self.curve.max_level
            ));
        }
        if profile.xp > self.config.max_xp {
            outcome.errors.push(format!(
                "xp {} exceeds maximum {}",
                profile.xp, self.config.max_xp
            ));
        }
        if !profile.playtime_seconds.is_finite() || profile.playtime_seconds < 0.0 {
            outcome.errors.push(format!(
                "playtime_seconds {} is not a non-negative number",
                profile.playtime_seconds
            ));
        }
        if profile.win_streak > profile.total_wins {
            outcome.errors.push(format!(
                "win streak {} exceeds total wins {}",
                profile.win_streak, profile.total_wins
            ));
        }
        if profile.best_win_streak < profile.win_streak {
            outcome.errors.push(format!(
                "best win streak {} is below current streak {}",
                profile.best_win_streak, profile.win_streak
            ));
        }
        if !profile.unlocked_chambers.contains(&profile.current_chamber) {
            outcome.warnings.push(format!(
                "current chamber '{}' is not in the unlocked set",
                profile.current_chamber
            ));
        }

        // Level plausibility: the stored level should sit near the level the
        // curve derives from the stored XP.
        if profile.level >= 1 && profile.level <= self.curve.max_level {
            let derived = self.curve.level_from_xp(profile.xp).level;
            if profile.level.abs_diff(derived) > self.config.level_tolerance {
                outcome.errors.push(format!(
                    "level {} implausible for xp {} (curve derives level {})",
                    profile.level, profile.xp, derived
                ));
            }
        }
    }

    fn check_collection(&self, save: &SaveData, outcome: &mut ValidationOutcome) {
        let collection = &save.card_collection;

        if collection.owned_cards.len() > self.config.max_unique_cards {
            outcome.errors.push(format!(
                "{} unique cards exceeds cap {}",
                collection.owned_cards.len(),
                self.config.max_unique_cards
            ));
        }
        for (card_id, count) in &collection.owned_cards {
            if *count > self.config.max_card_count {
                outcome.errors.push(format!(
                    "card '{card_id}' count {count} exceeds cap {}",
                    self.config.max_card_count
                ));
            }
        }

        for card_id in collection.owned_cards.keys() {
            if !collection.discovered_cards.contains(card_id) {
                outcome
                    .warnings
                    .push(format!("owned card '{card_id}' missing from discovered set"));
            }
        }
        for card_id in &collection.favorite_cards {
            if !collection.owned_cards.contains_key(card_id) {
                outcome
                    .warnings
                    .push(format!("favorite card '{card_id}' is not owned"));
            }
        }

        for (deck_name, cards) in &collection.saved_decks {
            for card_id in cards {
                let owned = collection.owned_cards.get(card_id).copied().unwrap_or(0);
                let in_deck = cards.iter().filter(|c| *c == card_id).count() as u32;
                if in_deck > owned {
                    outcome.warnings.push(format!(
                        "deck '{deck_name}' uses {in_deck}x '{card_id}' but only {owned} owned"
                    ));
                    break;
                }
            }
        }
        if !collection.active_deck.is_empty()
            && !collection.saved_decks.contains_key(&collection.active_deck)
        {
            outcome.warnings.push(format!(
                "active deck '{}' does not exist",
                collection.active_deck
            ));
        }
    }

    fn check_cross_consistency(&self, save: &SaveData, outcome: &mut ValidationOutcome) {
        let profile = &save.player_profile;
        let progression = &save.progression;

        if progression.battles_won != profile.total_wins {
            outcome.errors.push(format!(
                "battles_won {} disagrees with profile total_wins {}",
                progression.battles_won, profile.total_wins
            ));
        }
        if progression.battles_lost != profile.total_losses {
            outcome.errors.push(format!(
                "battles_lost {} disagrees with profile total_losses {}",
                progression.battles_lost, profile.total_losses
            ));
        }
        for chamber in &progression.chambers_completed {
            if !progression.chamber_completion_times.contains_key(chamber) {
                outcome.warnings.push(format!(
                    "completed chamber '{chamber}' has no completion timestamp"
                ));
            }
        }
    }

    /// Tampering heuristics. Advisory only: these populate warnings and
    /// must never block a load.
    fn check_anomalies(&self, save: &SaveData, outcome: &mut ValidationOutcome) {
        let profile = &save.player_profile;

        let hours = profile.playtime_seconds / 3600.0;
        if hours > 0.01 {
            let per_hour = f64::from(profile.total_battles()) / hours;
            if per_hour > self.config.max_battles_per_hour {
                outcome.warnings.push(format!(
                    "{:.0} battles/hour exceeds plausibility threshold {:.0}",
                    per_hour, self.config.max_battles_per_hour
                ));
            }
        }

        if profile.xp >= self.config.round_xp_floor
            && self.config.round_xp_modulus > 0
            && profile.xp % self.config.round_xp_modulus == 0
        {
            outcome
                .warnings
                .push(format!("xp total {} is suspiciously round", profile.xp));
        }

        if profile.total_losses == 0 && profile.total_wins >= self.config.flawless_win_threshold {
            outcome.warnings.push(format!(
                "{} wins with zero losses",
                profile.total_wins
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_save() -> SaveData {
        let mut save = SaveData::new("Khenti", "2026-08-29T10:00:00Z");
        save.player_profile.level = 3;
        save.player_profile.xp = 2151;
        save.player_profile.total_wins = 4;
        save.player_profile.total_losses = 2;
        save.player_profile.win_streak = 1;
        save.player_profile.best_win_streak = 3;
        save.player_profile.playtime_seconds = 7200.0;
        save.progression.battles_won = 4;
        save.progression.battles_lost = 2;
        save
    }

    fn validator() -> SaveValidator {
        SaveValidator::default()
    }

    #[test]
    fn test_valid_save_passes() {
        let outcome = validator().validate(&valid_save(), SecurityLevel::Standard);
        assert!(outcome.is_valid(), "unexpected errors: {:?}", outcome.errors);
        assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    }

    #[test]
    fn test_empty_name_is_an_error() {
        let mut save = valid_save();
        save.player_profile.name = "  ".to_string();
        let outcome = validator().validate(&save, SecurityLevel::Standard);
        assert!(!outcome.is_valid());
    }

    #[test]
    fn test_level_out_of_range() {
        let mut save = valid_save();
        save.player_profile.level = 0;
        assert!(!validator().validate(&save, SecurityLevel::Standard).is_valid());
        save.player_profile.level = 101;
        assert!(!validator().validate(&save, SecurityLevel::Standard).is_valid());
    }

    #[test]
    fn test_level_implausible_for_xp() {
        let mut save = valid_save();
        save.player_profile.level = 50;
        save.player_profile.xp = 100; // curve derives level 1
        let outcome = validator().validate(&save, SecurityLevel::Standard);
        assert!(outcome
            .errors
            .iter()
            .any(|e| e.contains("implausible")));
    }

    #[test]
    fn test_level_tolerance_band() {
        let mut save = valid_save();
        // xp 2151 derives level 3; stored level 5 is within the ±2 band.
        save.player_profile.level = 5;
        let outcome = validator().validate(&save, SecurityLevel::Standard);
        assert!(!outcome.errors.iter().any(|e| e.contains("implausible")));
    }

    #[test]
    fn test_win_loss_disagreement_is_reported_not_fatal() {
        let mut save = valid_save();
        save.progression.battles_won = 99;
        let outcome = validator().validate(&save, SecurityLevel::Standard);
        assert_eq!(
            outcome.errors.len(),
            1,
            "exactly the consistency error: {:?}",
            outcome.errors
        );
        assert!(outcome.errors[0].contains("battles_won"));
    }

    #[test]
    fn test_card_count_caps() {
        let mut save = valid_save();
        save.card_collection
            .owned_cards
            .insert("scarab_swarm".to_string(), 1001);
        save.card_collection
            .discovered_cards
            .insert("scarab_swarm".to_string());
        let outcome = validator().validate(&save, SecurityLevel::Standard);
        assert!(outcome.errors.iter().any(|e| e.contains("scarab_swarm")));
    }

    #[test]
    fn test_heuristics_warn_but_never_fail() {
        let mut save = valid_save();
        // 200 battles in six minutes of playtime.
        save.player_profile.total_wins = 120;
        save.player_profile.total_losses = 80;
        save.progression.battles_won = 120;
        save.progression.battles_lost = 80;
        save.player_profile.playtime_seconds = 360.0;
        save.player_profile.xp = 20_000;
        save.player_profile.level = 8;

        let outcome = validator().validate(&save, SecurityLevel::Standard);
        assert!(outcome.is_valid(), "{:?}", outcome.errors);
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("battles/hour")));
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("suspiciously round")));
    }

    #[test]
    fn test_flawless_record_warns() {
        let mut save = valid_save();
        save.player_profile.total_wins = 60;
        save.player_profile.total_losses = 0;
        save.player_profile.win_streak = 1;
        save.progression.battles_won = 60;
        save.progression.battles_lost = 0;
        let outcome = validator().validate(&save, SecurityLevel::Standard);
        assert!(outcome.is_valid());
        assert!(outcome.warnings.iter().any(|w| w.contains("zero losses")));
    }

    #[test]
    fn test_unknown_fields_rejected_only_at_paranoid() {
        let mut save = valid_save();
        save.extensions
            .insert("future_feature".to_string(), serde_json::json!(1));

        let standard = validator().validate(&save, SecurityLevel::Standard);
        assert!(standard.is_valid());

        let paranoid = validator().validate(&save, SecurityLevel::Paranoid);
        assert!(!paranoid.is_valid());
        assert!(paranoid.errors[0].contains("future_feature"));
    }

    #[test]
    fn test_malformed_structure_collects_all_findings() {
        let mut save = valid_save();
        save.player_profile.name = String::new();
        save.player_profile.level = 0;
        save.player_profile.win_streak = 50;
        save.progression.battles_won = 7;
        let outcome = validator().validate(&save, SecurityLevel::Standard);
        assert!(outcome.errors.len() >= 4, "{:?}", outcome.errors);
    }
}
