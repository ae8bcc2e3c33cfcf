// ---------------------------------------------------------------------------
// catalog – Card catalog collaborator interface
// ---------------------------------------------------------------------------
//
// The persistence core stores card ids and counts, never card definitions.
// The catalog is the authority on which ids exist; decks referencing ids it
// does not know are dropped with a warning during load reconciliation.

use std::collections::BTreeSet;

/// Resolves card ids. Implemented by the game's content layer; the
/// coordinator only asks "does this id exist".
pub trait CardCatalog: Send + Sync {
    fn contains(&self, card_id: &str) -> bool;
}

/// Fixed-set catalog backed by an id list.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    ids: BTreeSet<String>,
}

impl StaticCatalog {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Every card id the reward tables and starter collection can produce.
    pub fn standard() -> Self {
        Self::new([
            // Starter collection.
            "whisper_of_thoth",
            "anubis_judgment",
            "isis_protection",
            "desert_meditation",
            "ra_solar_flare",
            "mummification_ritual",
            // Chamber guaranteed rewards.
            "healing_ankh",
            "horus_sight",
            "sky_power",
            "maat_judgment",
            "truth_revelation",
            "pharaoh_crown",
            "eternal_power",
            // First-completion treasures.
            "desert_map",
            "sacred_tools",
            "eternal_ankh",
        ])
    }
}

impl CardCatalog for StaticCatalog {
    fn contains(&self, card_id: &str) -> bool {
        self.ids.contains(card_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_contains_starter_cards() {
        let catalog = StaticCatalog::standard();
        assert!(catalog.contains("whisper_of_thoth"));
        assert!(catalog.contains("pharaoh_crown"));
        assert!(!catalog.contains("modded_mega_card"));
    }
}
