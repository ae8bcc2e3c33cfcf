// ---------------------------------------------------------------------------
// reconcile – Post-load state repair
// ---------------------------------------------------------------------------
//
// Runs after a save is decoded and validated, before it becomes canonical.
// Repairs are tolerant: historical corruption is fixed and reported as a
// warning, never a crash. The profile is the authority when profile and
// progression counters disagree.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use save::SaveData;
use tracing::warn;

use crate::catalog::CardCatalog;

/// The Sunday starting the week of `date`; two dates sharing it are in the
/// same weekly-counter period.
fn week_anchor(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

/// Repair invariants and roll daily/weekly counters. Returns warnings for
/// everything that had to be changed.
pub fn reconcile(save: &mut SaveData, catalog: &dyn CardCatalog, now: DateTime<Utc>) -> Vec<String> {
    let mut warnings = Vec::new();

    repair_collection(save, catalog, &mut warnings);
    repair_counters(save, &mut warnings);
    roll_periodic_counters(save, now, &mut warnings);

    for warning in &warnings {
        warn!("load reconciliation: {warning}");
    }
    warnings
}

fn repair_collection(save: &mut SaveData, catalog: &dyn CardCatalog, warnings: &mut Vec<String>) {
    let collection = &mut save.card_collection;

    // Zero counts are equivalent to absent.
    let zeroed: Vec<String> = collection
        .owned_cards
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| id.clone())
        .collect();
    for card_id in zeroed {
        collection.owned_cards.remove(&card_id);
        warnings.push(format!("purged zero-count card '{card_id}'"));
    }

    // Discovery must cover ownership.
    let undiscovered: Vec<String> = collection
        .owned_cards
        .keys()
        .filter(|id| !collection.discovered_cards.contains(*id))
        .cloned()
        .collect();
    for card_id in undiscovered {
        collection.discovered_cards.insert(card_id.clone());
        warnings.push(format!("marked owned card '{card_id}' as discovered"));
    }

    // Favorites must be owned.
    let orphaned: Vec<String> = collection
        .favorite_cards
        .iter()
        .filter(|id| !collection.owned_cards.contains_key(*id))
        .cloned()
        .collect();
    for card_id in orphaned {
        collection.favorite_cards.remove(&card_id);
        warnings.push(format!("dropped unowned favorite '{card_id}'"));
    }

    // Decks referencing cards the catalog does not know are dropped whole,
    // never partially rewritten.
    let invalid_decks: Vec<String> = collection
        .saved_decks
        .iter()
        .filter(|(_, cards)| cards.iter().any(|id| !catalog.contains(id)))
        .map(|(name, _)| name.clone())
        .collect();
    for deck_name in invalid_decks {
        collection.saved_decks.remove(&deck_name);
        warnings.push(format!(
            "dropped deck '{deck_name}': contains cards missing from the catalog"
        ));
        if collection.active_deck == deck_name {
            collection.active_deck.clear();
        }
    }

    if !collection.active_deck.is_empty()
        && !collection.saved_decks.contains_key(&collection.active_deck)
    {
        warnings.push(format!(
            "cleared dangling active deck '{}'",
            collection.active_deck
        ));
        collection.active_deck.clear();
    }
}

fn repair_counters(save: &mut SaveData, warnings: &mut Vec<String>) {
    let profile = &save.player_profile;
    let progression = &mut save.progression;

    if progression.battles_won != profile.total_wins {
        warnings.push(format!(
            "battles_won {} reset to profile total_wins {}",
            progression.battles_won, profile.total_wins
        ));
        progression.battles_won = profile.total_wins;
    }
    if progression.battles_lost != profile.total_losses {
        warnings.push(format!(
            "battles_lost {} reset to profile total_losses {}",
            progression.battles_lost, profile.total_losses
        ));
        progression.battles_lost = profile.total_losses;
    }

    // Every completed chamber gets a completion timestamp, even if only a
    // reconstructed one.
    let missing: Vec<String> = progression
        .chambers_completed
        .iter()
        .filter(|c| !progression.chamber_completion_times.contains_key(*c))
        .cloned()
        .collect();
    for chamber in missing {
        progression
            .chamber_completion_times
            .insert(chamber.clone(), save.created_at.clone());
        warnings.push(format!(
            "reconstructed missing completion time for chamber '{chamber}'"
        ));
    }
}

fn roll_periodic_counters(save: &mut SaveData, now: DateTime<Utc>, warnings: &mut Vec<String>) {
    let progression = &mut save.progression;
    let today = now.date_naive();

    let last_daily = DateTime::parse_from_rfc3339(&progression.last_daily_reset)
        .map(|t| t.with_timezone(&Utc).date_naive())
        .ok();
    match last_daily {
        Some(last) if last == today => {}
        Some(_) => {
            progression.daily_wins = 0;
            progression.last_daily_reset = now.to_rfc3339();
        }
        None => {
            warnings.push("unreadable daily reset anchor, re-anchoring".to_string());
            progression.daily_wins = 0;
            progression.last_daily_reset = now.to_rfc3339();
        }
    }

    let last_weekly = DateTime::parse_from_rfc3339(&progression.last_weekly_reset)
        .map(|t| week_anchor(t.with_timezone(&Utc).date_naive()))
        .ok();
    match last_weekly {
        Some(anchor) if anchor == week_anchor(today) => {}
        Some(_) => {
            progression.weekly_wins = 0;
            progression.last_weekly_reset = now.to_rfc3339();
        }
        None => {
            warnings.push("unreadable weekly reset anchor, re-anchoring".to_string());
            progression.weekly_wins = 0;
            progression.last_weekly_reset = now.to_rfc3339();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn fresh_save(now: &str) -> SaveData {
        let mut save = SaveData::new("Khenti", now);
        save.card_collection = crate::rewards::starter_collection();
        save
    }

    #[test]
    fn test_clean_save_needs_no_repair() {
        let mut save = fresh_save("2026-08-29T10:00:00Z");
        let warnings = reconcile(
            &mut save,
            &StaticCatalog::standard(),
            at("2026-08-29T11:00:00Z"),
        );
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn test_zero_count_cards_purged() {
        let mut save = fresh_save("2026-08-29T10:00:00Z");
        save.card_collection
            .owned_cards
            .insert("healing_ankh".to_string(), 0);
        let warnings = reconcile(
            &mut save,
            &StaticCatalog::standard(),
            at("2026-08-29T11:00:00Z"),
        );
        assert!(!save.card_collection.owned_cards.contains_key("healing_ankh"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_unknown_catalog_card_drops_deck_not_load() {
        let mut save = fresh_save("2026-08-29T10:00:00Z");
        save.card_collection.saved_decks.insert(
            "modded".to_string(),
            vec!["whisper_of_thoth".to_string(), "hacked_card".to_string()],
        );
        save.card_collection.active_deck = "modded".to_string();

        let warnings = reconcile(
            &mut save,
            &StaticCatalog::standard(),
            at("2026-08-29T11:00:00Z"),
        );
        assert!(!save.card_collection.saved_decks.contains_key("modded"));
        assert!(save.card_collection.active_deck.is_empty());
        // The valid starter deck survives.
        assert!(save.card_collection.saved_decks.contains_key("starter_deck"));
        assert!(warnings.iter().any(|w| w.contains("modded")));
    }

    #[test]
    fn test_profile_is_authoritative_for_counters() {
        let mut save = fresh_save("2026-08-29T10:00:00Z");
        save.player_profile.total_wins = 10;
        save.player_profile.total_losses = 4;
        save.progression.battles_won = 3;
        save.progression.battles_lost = 4;

        let warnings = reconcile(
            &mut save,
            &StaticCatalog::standard(),
            at("2026-08-29T11:00:00Z"),
        );
        assert_eq!(save.progression.battles_won, 10);
        assert_eq!(save.progression.battles_lost, 4);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_daily_counter_rolls_on_new_day() {
        let mut save = fresh_save("2026-08-27T10:00:00Z");
        save.progression.daily_wins = 5;
        save.progression.weekly_wins = 9;
        save.progression.last_daily_reset = "2026-08-28T10:00:00Z".to_string();
        save.progression.last_weekly_reset = "2026-08-28T10:00:00Z".to_string();

        // Next calendar day, same Sunday-anchored week (Fri -> Sat).
        reconcile(
            &mut save,
            &StaticCatalog::standard(),
            at("2026-08-29T09:00:00Z"),
        );
        assert_eq!(save.progression.daily_wins, 0);
        assert_eq!(save.progression.weekly_wins, 9);

        // Crossing into Sunday resets the weekly counter.
        reconcile(
            &mut save,
            &StaticCatalog::standard(),
            at("2026-08-30T09:00:00Z"),
        );
        assert_eq!(save.progression.weekly_wins, 0);
    }

    #[test]
    fn test_unparseable_anchors_warn_and_reanchor() {
        let mut save = fresh_save("2026-08-29T10:00:00Z");
        save.progression.last_daily_reset = "not a timestamp".to_string();
        let now = at("2026-08-29T11:00:00Z");
        let warnings = reconcile(&mut save, &StaticCatalog::standard(), now);
        assert!(warnings.iter().any(|w| w.contains("daily")));
        assert_eq!(save.progression.last_daily_reset, now.to_rfc3339());
    }
}
