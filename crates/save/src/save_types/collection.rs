use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// The player's card collection and deck data.
///
/// Invariants maintained by the coordinator (and repaired during load
/// reconciliation, never enforced by panicking):
/// - counts in `owned_cards` are never zero; a zero-count entry is purged
/// - `discovered_cards` is a superset of owned
/// - `favorite_cards` is a subset of owned
/// - deck card ids must resolve against the external card catalog at load
///   time, else the deck is dropped with a recorded warning
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct CardCollectionData {
    /// card id -> owned count.
    pub owned_cards: BTreeMap<String, u32>,
    pub discovered_cards: BTreeSet<String>,
    pub favorite_cards: BTreeSet<String>,
    /// deck name -> ordered card id list (duplicates allowed up to the
    /// owned count of that card).
    pub saved_decks: BTreeMap<String, Vec<String>>,
    pub active_deck: String,
    pub deck_wins: BTreeMap<String, u32>,
    pub deck_losses: BTreeMap<String, u32>,
}

impl CardCollectionData {
    /// Add `count` copies of a card, marking it discovered.
    pub fn add_card(&mut self, card_id: &str, count: u32) {
        if count == 0 {
            return;
        }
        *self.owned_cards.entry(card_id.to_string()).or_insert(0) += count;
        self.discovered_cards.insert(card_id.to_string());
    }

    /// Remove up to `count` copies; a count reaching zero removes the entry
    /// (count 0 is equivalent to absent). Favorites of a fully removed card
    /// are dropped to keep the subset invariant.
    pub fn remove_card(&mut self, card_id: &str, count: u32) {
        if let Some(owned) = self.owned_cards.get_mut(card_id) {
            *owned = owned.saturating_sub(count);
            if *owned == 0 {
                self.owned_cards.remove(card_id);
                self.favorite_cards.remove(card_id);
            }
        }
    }

    /// Number of distinct owned card ids.
    pub fn unique_cards(&self) -> usize {
        self.owned_cards.len()
    }

    /// Total copies owned across all cards.
    pub fn total_cards(&self) -> u64 {
        self.owned_cards.values().map(|&c| u64::from(c)).sum()
    }
}
