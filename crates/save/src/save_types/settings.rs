use serde::{Deserialize, Serialize};

/// Player preferences. Pure configuration: the only invariant is value-range
/// clamping, applied by [`GameSettings::clamp`] before each save and after
/// each load.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GameSettings {
    pub audio_volume: f32,
    pub music_volume: f32,
    pub sfx_volume: f32,
    /// "windowed", "fullscreen", or "borderless".
    pub display_mode: String,
    pub resolution: String,
    pub vsync: bool,

    pub auto_save: bool,
    /// Seconds between coordinator auto-saves.
    pub auto_save_interval_seconds: u32,
    /// "slow", "normal", or "fast".
    pub combat_speed: String,

    pub ui_scale: f32,
    pub show_card_tooltips: bool,
    pub confirm_card_plays: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            audio_volume: 0.8,
            music_volume: 0.6,
            sfx_volume: 0.8,
            display_mode: "windowed".to_string(),
            resolution: "1280x720".to_string(),
            vsync: true,
            auto_save: true,
            auto_save_interval_seconds: 300,
            combat_speed: "normal".to_string(),
            ui_scale: 1.0,
            show_card_tooltips: true,
            confirm_card_plays: false,
        }
    }
}

impl GameSettings {
    /// Clamp all numeric fields into their valid ranges.
    pub fn clamp(&mut self) {
        self.audio_volume = self.audio_volume.clamp(0.0, 1.0);
        self.music_volume = self.music_volume.clamp(0.0, 1.0);
        self.sfx_volume = self.sfx_volume.clamp(0.0, 1.0);
        self.ui_scale = self.ui_scale.clamp(0.5, 2.0);
        self.auto_save_interval_seconds = self.auto_save_interval_seconds.clamp(30, 3600);
    }
}
