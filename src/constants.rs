use crate::types::BoosterKind;

pub const TICK_RATE: u32 = 20;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const SUCCESS_THRESHOLD: f32 = 0.60;
pub const SPUTTER_THRESHOLD: f32 = 0.40;

pub const STRENGTH_MIN: f32 = 0.0;
pub const STRENGTH_MAX: f32 = 100.0;
pub const DEFAULT_STARTING_STRENGTH: f32 = 70.0;
pub const DEFAULT_COUNTDOWN_MS: u64 = 3_000;
pub const DEFAULT_SECTION_TIMEOUT_MS: u64 = 10_000;

// Strength deltas, keyed by the previous section's state.
pub const MOMENTUM_BUILD_GAIN: f32 = 5.0;
pub const SUCCESS_TO_SPUTTER_PENALTY: f32 = 15.0;
pub const SUCCESS_TO_DEATH_PENALTY: f32 = 30.0;
pub const SPUTTER_RECOVERY_GAIN: f32 = 10.0;
pub const SPUTTER_STRUGGLE_PENALTY: f32 = 8.0;
pub const SPUTTER_CASCADE_PENALTY: f32 = 25.0;
pub const DEATH_RECOVERY_GAIN: f32 = 15.0;
pub const DEATH_PARTIAL_PENALTY: f32 = 10.0;
pub const DEATH_FLOOR_PENALTY: f32 = 5.0;

pub const ENHANCED_RECOVERY_POWER: f32 = 6.0;

pub const SECTION_SUCCESS_SCORE: i32 = 100;
pub const MULTIPLIER_STEP: f32 = 0.5;

pub const COLUMN_LOG_CAPACITY: usize = 32;
pub const PARTICIPATION_WINDOW: usize = 2;

pub const FAN_BASE_CHANCE: f32 = 0.15;
pub const FAN_STRENGTH_WEIGHT: f32 = 0.55;
pub const FAN_HAPPINESS_WEIGHT: f32 = 0.25;
pub const FAN_ATTENTION_WEIGHT: f32 = 0.15;
pub const FAN_THIRST_PENALTY: f32 = 0.20;

pub fn get_booster_percent(kind: BoosterKind) -> f32 {
    match kind {
        BoosterKind::Momentum => 0.25,
        BoosterKind::Recovery => 0.5,
        BoosterKind::Participation => 0.2,
        BoosterKind::None => 0.0,
    }
}

pub fn default_section_ids() -> Vec<String> {
    ["A", "B", "C"].iter().map(|id| id.to_string()).collect()
}
