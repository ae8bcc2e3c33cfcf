// ---------------------------------------------------------------------------
// rewards – Starter collection, battle XP, and the chamber reward table
// ---------------------------------------------------------------------------

use save::CardCollectionData;

/// Base XP for a battle victory.
pub const BATTLE_WIN_BASE_XP: u64 = 50;
/// XP consolation for a loss.
pub const BATTLE_LOSS_XP: u64 = 10;
/// Streak bonus per consecutive win, capped.
pub const STREAK_BONUS_PER_WIN: u64 = 5;
pub const STREAK_BONUS_CAP: u64 = 100;

/// First-ever completion of a chamber doubles its base XP.
pub const FIRST_COMPLETION_XP_MULTIPLIER: u64 = 2;

/// XP for a battle result. `streak` is the streak after the battle, so the
/// first win of a run earns `50 + 5`.
pub fn battle_xp(won: bool, streak: u32) -> u64 {
    if won {
        BATTLE_WIN_BASE_XP + (u64::from(streak) * STREAK_BONUS_PER_WIN).min(STREAK_BONUS_CAP)
    } else {
        BATTLE_LOSS_XP
    }
}

/// Rewards attached to one chamber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChamberReward {
    pub xp: u64,
    pub guaranteed_cards: Vec<&'static str>,
    /// `chamber_*` entries unlock chambers; other entries (card pools) are
    /// stored for the content layer and not interpreted here.
    pub unlocks: Vec<&'static str>,
    /// Extra treasure cards granted only on the first completion.
    pub first_completion_treasures: Vec<&'static str>,
}

/// Reward table for the seven temple chambers. Unknown chamber ids get the
/// fallback reward (base XP, no cards).
pub fn chamber_reward(chamber_id: &str) -> ChamberReward {
    match chamber_id {
        "entrance" => ChamberReward {
            xp: 100,
            guaranteed_cards: vec!["whisper_of_thoth"],
            unlocks: vec!["chamber_antechamber"],
            first_completion_treasures: vec!["desert_map"],
        },
        "antechamber" => ChamberReward {
            xp: 150,
            guaranteed_cards: vec!["ra_solar_flare"],
            unlocks: vec!["chamber_first_trial", "pool_basic_spells"],
            first_completion_treasures: vec!["sacred_tools"],
        },
        "first_trial" => ChamberReward {
            xp: 200,
            guaranteed_cards: vec!["anubis_judgment"],
            unlocks: vec!["chamber_chamber_of_isis", "chamber_chamber_of_horus"],
            first_completion_treasures: vec![],
        },
        "chamber_of_isis" => ChamberReward {
            xp: 300,
            guaranteed_cards: vec!["isis_protection", "healing_ankh"],
            unlocks: vec!["chamber_hall_of_truth", "pool_healing_magic"],
            first_completion_treasures: vec![],
        },
        "chamber_of_horus" => ChamberReward {
            xp: 300,
            guaranteed_cards: vec!["horus_sight", "sky_power"],
            unlocks: vec!["chamber_hall_of_truth", "pool_sky_magic"],
            first_completion_treasures: vec![],
        },
        "hall_of_truth" => ChamberReward {
            xp: 500,
            guaranteed_cards: vec!["maat_judgment", "truth_revelation"],
            unlocks: vec!["chamber_pharaoh_tomb", "pool_divine_magic"],
            first_completion_treasures: vec![],
        },
        "pharaoh_tomb" => ChamberReward {
            xp: 1000,
            guaranteed_cards: vec!["pharaoh_crown", "eternal_power"],
            unlocks: vec!["pool_legendary_artifacts"],
            first_completion_treasures: vec!["pharaoh_crown", "eternal_ankh"],
        },
        _ => ChamberReward {
            xp: 100,
            guaranteed_cards: vec![],
            unlocks: vec![],
            first_completion_treasures: vec![],
        },
    }
}

/// The final chamber; defeating it makes the player a Pharaoh Victor.
pub const FINAL_CHAMBER: &str = "pharaoh_tomb";

/// Milestone rewards for reaching `level`: a card pack every 5 levels
/// (rare at multiples of 10), a card-pool unlock every 10, an extra deck
/// slot every 25. Returned as reward ids for the content layer to
/// interpret; nothing here mutates the collection.
pub fn level_up_rewards(level: u32) -> Vec<String> {
    let mut rewards = Vec::new();
    if level % 5 == 0 {
        let rarity = if level % 10 == 0 { "rare" } else { "uncommon" };
        rewards.push(format!("egyptian_{rarity}_pack"));
    }
    if level % 10 == 0 {
        rewards.push(format!("level_{level}_pool"));
    }
    if level % 25 == 0 {
        rewards.push("extra_deck_slot".to_string());
    }
    rewards
}

/// The starter collection every new game begins with: six card types, a
/// prebuilt deck containing all copies, and that deck active.
pub fn starter_collection() -> CardCollectionData {
    let starter_cards: [(&str, u32); 6] = [
        ("whisper_of_thoth", 3),
        ("anubis_judgment", 3),
        ("isis_protection", 3),
        ("desert_meditation", 3),
        ("ra_solar_flare", 2),
        ("mummification_ritual", 2),
    ];

    let mut collection = CardCollectionData::default();
    let mut deck = Vec::new();
    for (card_id, count) in starter_cards {
        collection.add_card(card_id, count);
        deck.extend(std::iter::repeat(card_id.to_string()).take(count as usize));
    }
    collection
        .saved_decks
        .insert("starter_deck".to_string(), deck);
    collection.active_deck = "starter_deck".to_string();
    collection
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battle_xp_win_with_streak() {
        assert_eq!(battle_xp(true, 1), 55);
        assert_eq!(battle_xp(true, 10), 100);
        // Streak bonus caps at 100.
        assert_eq!(battle_xp(true, 25), 150);
        assert_eq!(battle_xp(true, 100), 150);
    }

    #[test]
    fn test_battle_xp_loss() {
        assert_eq!(battle_xp(false, 0), 10);
        assert_eq!(battle_xp(false, 99), 10);
    }

    #[test]
    fn test_chamber_table() {
        assert_eq!(chamber_reward("entrance").xp, 100);
        assert_eq!(chamber_reward("pharaoh_tomb").xp, 1000);
        assert_eq!(
            chamber_reward("hall_of_truth").guaranteed_cards,
            vec!["maat_judgment", "truth_revelation"]
        );
        // Unknown chambers get the fallback.
        let fallback = chamber_reward("secret_dev_room");
        assert_eq!(fallback.xp, 100);
        assert!(fallback.guaranteed_cards.is_empty());
    }

    #[test]
    fn test_level_up_milestones() {
        assert!(level_up_rewards(3).is_empty());
        assert_eq!(level_up_rewards(5), vec!["egyptian_uncommon_pack"]);
        assert_eq!(
            level_up_rewards(10),
            vec!["egyptian_rare_pack", "level_10_pool"]
        );
        assert_eq!(
            level_up_rewards(50),
            vec!["egyptian_rare_pack", "level_50_pool", "extra_deck_slot"]
        );
    }

    #[test]
    fn test_starter_collection_shape() {
        let collection = starter_collection();
        assert_eq!(collection.unique_cards(), 6);
        assert_eq!(collection.total_cards(), 16);
        assert_eq!(collection.active_deck, "starter_deck");
        let deck = &collection.saved_decks["starter_deck"];
        assert_eq!(deck.len(), 16);
        // Discovery covers everything owned.
        for card_id in collection.owned_cards.keys() {
            assert!(collection.discovered_cards.contains(card_id));
        }
    }
}
