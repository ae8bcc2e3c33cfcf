// ---------------------------------------------------------------------------
// levels – XP curve shared by the validator and the progression coordinator
// ---------------------------------------------------------------------------
//
// The curve lives in the save crate because achievement and reward
// thresholds depend on level boundaries being byte-for-byte reproducible:
// the validator checks persisted levels against it, and the coordinator
// recomputes levels from it after every XP award.

/// Geometric XP curve: reaching level N costs
/// `sum(trunc(base * scaling^(l - 2)) for l in 2..=N)` total XP.
#[derive(Debug, Clone)]
pub struct XpCurve {
    pub base: u64,
    pub scaling: f64,
    pub max_level: u32,
}

impl Default for XpCurve {
    fn default() -> Self {
        Self {
            base: 1000,
            scaling: 1.15,
            max_level: 100,
        }
    }
}

/// Where a given XP total sits on the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelStanding {
    pub level: u32,
    /// XP accumulated past the current level's threshold.
    pub xp_into_level: u64,
    /// XP remaining until the next level (0 at max level).
    pub xp_to_next: u64,
}

impl XpCurve {
    /// Total XP required to reach `level`. Level 1 and below cost 0.
    pub fn xp_for_level(&self, level: u32) -> u64 {
        if level <= 1 {
            return 0;
        }
        let mut total = 0u64;
        for lvl in 2..=level {
            let step = (self.base as f64 * self.scaling.powi(lvl as i32 - 2)) as u64;
            total += step;
        }
        total
    }

    /// The level a given XP total corresponds to, by scanning the cumulative
    /// curve. Capped at `max_level`.
    pub fn level_from_xp(&self, xp: u64) -> LevelStanding {
        let mut level = 1u32;
        let mut threshold = 0u64;

        while level < self.max_level {
            let next_threshold = self.xp_for_level(level + 1);
            if xp < next_threshold {
                break;
            }
            level += 1;
            threshold = next_threshold;
        }

        let xp_into_level = xp - threshold;
        let xp_to_next = if level >= self.max_level {
            0
        } else {
            self.xp_for_level(level + 1) - xp
        };

        LevelStanding {
            level,
            xp_into_level,
            xp_to_next,
        }
    }
}
