// ---------------------------------------------------------------------------
// progression – Gameplay progression built on the save layer
// ---------------------------------------------------------------------------
//
// The save crate owns persistence mechanics (codec, integrity, backups);
// this crate owns game meaning: XP and level rewards, chamber completion,
// collection reconciliation, and the coordinator that ties a play session
// to a save slot.

mod catalog;
mod coordinator;
mod events;
mod reconcile;
mod rewards;
mod summary;


pub use catalog::{CardCatalog, StaticCatalog};
pub use coordinator::{spawn_scheduler, CoordinatorConfig, ProgressionCoordinator};
pub use events::{BattleOutcome, ChamberOutcome, LoadReport, LoadSource, XpAward};
pub use reconcile::reconcile;
pub use rewards::{
    battle_xp, chamber_reward, level_up_rewards, starter_collection, ChamberReward,
};
pub use summary::SaveSummary;
