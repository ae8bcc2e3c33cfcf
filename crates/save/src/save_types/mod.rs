// ---------------------------------------------------------------------------
// save_types – The serializable save data model
// ---------------------------------------------------------------------------
//
// Every struct here derives serde traits and uses BTreeMap/BTreeSet for
// collections, so canonical (sorted-key) JSON serialization falls out of the
// types themselves rather than from ad hoc field-name lists. Sets are
// encoded as sorted arrays, enums as their snake_case string tag.

mod collection;
mod profile;
mod progression_data;
mod save_data;
mod settings;

pub use collection::CardCollectionData;
pub use profile::{PlayerProfile, ProgressionState};
pub use progression_data::{AchievementProgress, ProgressionData};
pub use save_data::{SaveData, CURRENT_SAVE_VERSION, GAME_VERSION};
pub use settings::GameSettings;
