use serde::{Deserialize, Serialize};

use crate::constants::{SPUTTER_THRESHOLD, SUCCESS_THRESHOLD};
use crate::types::{ColumnOutcome, WaveState};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationThresholds {
    #[serde(rename = "successThreshold")]
    pub success: f32,
    #[serde(rename = "sputterThreshold")]
    pub sputter: f32,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        Self {
            success: SUCCESS_THRESHOLD,
            sputter: SPUTTER_THRESHOLD,
        }
    }
}

impl ClassificationThresholds {
    pub fn classify(&self, participation_rate: f32) -> WaveState {
        classify(participation_rate, self.success, self.sputter)
    }

    pub fn is_valid(&self) -> bool {
        self.success.is_finite()
            && self.sputter.is_finite()
            && self.sputter >= 0.0
            && self.sputter < self.success
            && self.success <= 1.0
    }
}

/// NaN rates fall through to `Death`.
pub fn classify(participation_rate: f32, success_threshold: f32, sputter_threshold: f32) -> WaveState {
    if participation_rate >= success_threshold {
        WaveState::Success
    } else if participation_rate >= sputter_threshold {
        WaveState::Sputter
    } else {
        WaveState::Death
    }
}

/// Strength bonus for a column that snaps back from sputter to success.
/// Recovery from death is rewarded at section level only.
pub fn enhanced_recovery_bonus(
    previous: Option<WaveState>,
    current: WaveState,
    recovery_power_multiplier: f32,
) -> f32 {
    match (previous, current) {
        (Some(WaveState::Sputter), WaveState::Success) => recovery_power_multiplier,
        _ => 0.0,
    }
}

pub fn participation_rate(participating: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    participating as f32 / total as f32
}

/// Majority vote across column states. Ties go to the higher-priority state
/// (`Success` > `Sputter` > `Death`); no columns votes `Death`.
pub fn majority_state<I>(states: I) -> WaveState
where
    I: IntoIterator<Item = WaveState>,
{
    let mut counts = [0usize; 3];
    for state in states {
        counts[state.priority() as usize] += 1;
    }
    if counts.iter().all(|count| *count == 0) {
        return WaveState::Death;
    }

    let mut winner = WaveState::Success;
    for state in [WaveState::Sputter, WaveState::Death] {
        if counts[state.priority() as usize] > counts[winner.priority() as usize] {
            winner = state;
        }
    }
    winner
}

pub fn classify_section(columns: &[ColumnOutcome]) -> WaveState {
    majority_state(columns.iter().map(|column| column.state))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(success: usize, sputter: usize, death: usize) -> Vec<ColumnOutcome> {
        let mut out = Vec::new();
        for (state, count) in [
            (WaveState::Success, success),
            (WaveState::Sputter, sputter),
            (WaveState::Death, death),
        ] {
            for _ in 0..count {
                out.push(ColumnOutcome {
                    column_index: out.len(),
                    participation_rate: 0.5,
                    state,
                });
            }
        }
        out
    }

    #[test]
    fn classify_uses_inclusive_lower_bounds() {
        let thresholds = ClassificationThresholds::default();
        assert_eq!(thresholds.classify(0.60), WaveState::Success);
        assert_eq!(thresholds.classify(0.95), WaveState::Success);
        assert_eq!(thresholds.classify(0.59), WaveState::Sputter);
        assert_eq!(thresholds.classify(0.40), WaveState::Sputter);
        assert_eq!(thresholds.classify(0.39), WaveState::Death);
        assert_eq!(thresholds.classify(0.0), WaveState::Death);
    }

    #[test]
    fn classify_honors_custom_thresholds() {
        assert_eq!(classify(0.7, 0.8, 0.5), WaveState::Sputter);
        assert_eq!(classify(0.45, 0.8, 0.5), WaveState::Death);
        assert_eq!(classify(0.8, 0.8, 0.5), WaveState::Success);
    }

    #[test]
    fn nan_rate_classifies_as_death() {
        assert_eq!(classify(f32::NAN, 0.6, 0.4), WaveState::Death);
    }

    #[test]
    fn recovery_bonus_only_rewards_sputter_to_success() {
        assert_eq!(
            enhanced_recovery_bonus(Some(WaveState::Sputter), WaveState::Success, 0.5),
            0.5
        );
        assert_eq!(
            enhanced_recovery_bonus(Some(WaveState::Success), WaveState::Success, 0.5),
            0.0
        );
        assert_eq!(
            enhanced_recovery_bonus(Some(WaveState::Death), WaveState::Success, 0.5),
            0.0
        );
        assert_eq!(
            enhanced_recovery_bonus(Some(WaveState::Sputter), WaveState::Sputter, 0.5),
            0.0
        );
        assert_eq!(enhanced_recovery_bonus(None, WaveState::Success, 0.5), 0.0);
    }

    #[test]
    fn tie_between_success_and_sputter_goes_to_success() {
        assert_eq!(classify_section(&columns(3, 3, 2)), WaveState::Success);
    }

    #[test]
    fn tie_between_sputter_and_death_goes_to_sputter() {
        assert_eq!(classify_section(&columns(0, 4, 4)), WaveState::Sputter);
    }

    #[test]
    fn clear_majority_wins_regardless_of_priority() {
        assert_eq!(classify_section(&columns(1, 2, 5)), WaveState::Death);
        assert_eq!(classify_section(&columns(2, 5, 1)), WaveState::Sputter);
    }

    #[test]
    fn empty_column_list_votes_death() {
        assert_eq!(classify_section(&[]), WaveState::Death);
    }

    #[test]
    fn participation_rate_handles_empty_population() {
        assert_eq!(participation_rate(0, 0), 0.0);
        assert_eq!(participation_rate(3, 4), 0.75);
    }

    #[test]
    fn threshold_validation_rejects_inverted_bounds() {
        assert!(ClassificationThresholds::default().is_valid());
        assert!(!ClassificationThresholds {
            success: 0.4,
            sputter: 0.6
        }
        .is_valid());
        assert!(!ClassificationThresholds {
            success: 1.2,
            sputter: 0.4
        }
        .is_valid());
    }
}
