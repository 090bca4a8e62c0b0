use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classification::ClassificationThresholds;
use crate::constants::{
    default_section_ids, get_booster_percent, DEFAULT_COUNTDOWN_MS, DEFAULT_SECTION_TIMEOUT_MS,
    DEFAULT_STARTING_STRENGTH, ENHANCED_RECOVERY_POWER, SECTION_SUCCESS_SCORE, SPUTTER_THRESHOLD,
    STRENGTH_MAX, STRENGTH_MIN, SUCCESS_THRESHOLD,
};
use crate::error::WaveError;
use crate::types::BoosterKind;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterPercents {
    pub momentum: f32,
    pub recovery: f32,
    pub participation: f32,
}

impl Default for BoosterPercents {
    fn default() -> Self {
        Self {
            momentum: get_booster_percent(BoosterKind::Momentum),
            recovery: get_booster_percent(BoosterKind::Recovery),
            participation: get_booster_percent(BoosterKind::Participation),
        }
    }
}

impl BoosterPercents {
    pub fn percent_for(&self, kind: BoosterKind) -> f32 {
        match kind {
            BoosterKind::Momentum => self.momentum,
            BoosterKind::Recovery => self.recovery,
            BoosterKind::Participation => self.participation,
            BoosterKind::None => 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    #[serde(rename = "sectionIds")]
    pub section_ids: Vec<String>,
    #[serde(rename = "startingStrength")]
    pub starting_strength: f32,
    #[serde(rename = "countdownMs")]
    pub countdown_ms: u64,
    #[serde(rename = "successThreshold")]
    pub success_threshold: f32,
    #[serde(rename = "sputterThreshold")]
    pub sputter_threshold: f32,
    #[serde(rename = "recoveryPower")]
    pub recovery_power: f32,
    #[serde(rename = "boosterPercents")]
    pub booster_percents: BoosterPercents,
    #[serde(rename = "sectionTimeoutMs")]
    pub section_timeout_ms: Option<u64>,
    #[serde(rename = "successScore")]
    pub success_score: i32,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            section_ids: default_section_ids(),
            starting_strength: DEFAULT_STARTING_STRENGTH,
            countdown_ms: DEFAULT_COUNTDOWN_MS,
            success_threshold: SUCCESS_THRESHOLD,
            sputter_threshold: SPUTTER_THRESHOLD,
            recovery_power: ENHANCED_RECOVERY_POWER,
            booster_percents: BoosterPercents::default(),
            section_timeout_ms: Some(DEFAULT_SECTION_TIMEOUT_MS),
            success_score: SECTION_SUCCESS_SCORE,
        }
    }
}

impl WaveConfig {
    pub fn from_json_str(json: &str) -> Result<Self, WaveError> {
        let config: WaveConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, WaveError> {
        let contents = fs::read_to_string(path).map_err(|source| WaveError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn thresholds(&self) -> ClassificationThresholds {
        ClassificationThresholds {
            success: self.success_threshold,
            sputter: self.sputter_threshold,
        }
    }

    pub fn section_timeout(&self) -> Option<Duration> {
        self.section_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), WaveError> {
        if self.section_ids.is_empty() {
            return Err(WaveError::EmptySectionList);
        }
        let mut seen = HashSet::new();
        for id in &self.section_ids {
            if id.trim().is_empty() {
                return Err(WaveError::Config("section id must not be blank".to_string()));
            }
            if !seen.insert(id.as_str()) {
                return Err(WaveError::Config(format!("duplicate section id {id:?}")));
            }
        }
        if !self.thresholds().is_valid() {
            return Err(WaveError::Config(format!(
                "thresholds must satisfy 0 <= sputter < success <= 1 (sputter={}, success={})",
                self.sputter_threshold, self.success_threshold
            )));
        }
        if !self.starting_strength.is_finite()
            || !(STRENGTH_MIN..=STRENGTH_MAX).contains(&self.starting_strength)
        {
            return Err(WaveError::Config(format!(
                "starting strength {} outside [{STRENGTH_MIN}, {STRENGTH_MAX}]",
                self.starting_strength
            )));
        }
        if !self.recovery_power.is_finite() || self.recovery_power < 0.0 {
            return Err(WaveError::Config(format!(
                "recovery power must be a non-negative number, got {}",
                self.recovery_power
            )));
        }
        if self.section_timeout_ms == Some(0) {
            return Err(WaveError::Config(
                "sectionTimeoutMs must be positive; use null to wait indefinitely".to_string(),
            ));
        }
        let percents = self.booster_percents;
        for (name, value) in [
            ("momentum", percents.momentum),
            ("recovery", percents.recovery),
            ("participation", percents.participation),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(WaveError::Config(format!(
                    "{name} booster percent must be non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}
