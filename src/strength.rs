use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::classification::ClassificationThresholds;
use crate::constants::{
    DEATH_FLOOR_PENALTY, DEATH_PARTIAL_PENALTY, DEATH_RECOVERY_GAIN, MOMENTUM_BUILD_GAIN,
    PARTICIPATION_WINDOW, SPUTTER_CASCADE_PENALTY, SPUTTER_RECOVERY_GAIN,
    SPUTTER_STRUGGLE_PENALTY, STRENGTH_MAX, STRENGTH_MIN, SUCCESS_TO_DEATH_PENALTY,
    SUCCESS_TO_SPUTTER_PENALTY,
};
use crate::types::{ParticipationTrend, WaveState};

pub fn clamp_strength(value: f32) -> f32 {
    if value.is_nan() {
        return STRENGTH_MIN;
    }
    value.clamp(STRENGTH_MIN, STRENGTH_MAX)
}

/// Strength delta for moving from `last` to `current`.
///
/// Coming out of a success the delta depends only on the new state; coming out
/// of a sputter or death it is graded by the section's participation rate.
/// Without a previous state there is nothing to compare against and the delta is zero.
pub fn transition_delta(
    current: WaveState,
    participation_rate: f32,
    last: Option<WaveState>,
    momentum_multiplier: f32,
    thresholds: &ClassificationThresholds,
) -> f32 {
    let Some(last) = last else {
        return 0.0;
    };
    let rate_tier = thresholds.classify(participation_rate);
    match last {
        WaveState::Success => match current {
            WaveState::Success => MOMENTUM_BUILD_GAIN * momentum_multiplier,
            WaveState::Sputter => -SUCCESS_TO_SPUTTER_PENALTY,
            WaveState::Death => -SUCCESS_TO_DEATH_PENALTY,
        },
        WaveState::Sputter => match rate_tier {
            WaveState::Success => SPUTTER_RECOVERY_GAIN * momentum_multiplier,
            WaveState::Sputter => -SPUTTER_STRUGGLE_PENALTY,
            WaveState::Death => -SPUTTER_CASCADE_PENALTY,
        },
        WaveState::Death => match rate_tier {
            WaveState::Success => DEATH_RECOVERY_GAIN * momentum_multiplier,
            WaveState::Sputter => -DEATH_PARTIAL_PENALTY,
            WaveState::Death => -DEATH_FLOOR_PENALTY,
        },
    }
}

/// Owns the wave strength scalar. `adjust_strength` is the only mutator on
/// the committed path; `set_strength` exists for debug tooling.
#[derive(Clone, Debug)]
pub struct StrengthLedger {
    strength: f32,
    thresholds: ClassificationThresholds,
}

impl StrengthLedger {
    pub fn new(initial: f32, thresholds: ClassificationThresholds) -> Self {
        Self {
            strength: clamp_strength(initial),
            thresholds,
        }
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn thresholds(&self) -> &ClassificationThresholds {
        &self.thresholds
    }

    pub fn adjust_strength(
        &mut self,
        current: WaveState,
        participation_rate: f32,
        last: Option<WaveState>,
        momentum_multiplier: f32,
    ) -> f32 {
        let momentum_multiplier = if momentum_multiplier.is_finite() && momentum_multiplier >= 0.0
        {
            momentum_multiplier
        } else {
            warn!(momentum_multiplier, "ignoring invalid momentum multiplier");
            1.0
        };
        let delta = transition_delta(
            current,
            participation_rate,
            last,
            momentum_multiplier,
            &self.thresholds,
        );
        let before = self.strength;
        self.strength = clamp_strength(before + delta);
        debug!(
            ?last,
            ?current,
            participation_rate,
            delta,
            before,
            after = self.strength,
            "strength adjusted"
        );
        self.strength
    }

    pub fn set_strength(&mut self, value: f32) -> f32 {
        self.strength = clamp_strength(value);
        self.strength
    }
}

/// Column-level participation history, carried across sections of one wave.
#[derive(Clone, Debug, Default)]
pub struct TransitionMemory {
    last_column_rate: Option<f32>,
    window: VecDeque<f32>,
}

impl TransitionMemory {
    pub fn clear(&mut self) {
        self.last_column_rate = None;
        self.window.clear();
    }

    pub fn record_column(&mut self, participation_rate: f32) {
        self.last_column_rate = Some(participation_rate);
        if self.window.len() == PARTICIPATION_WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(participation_rate);
    }

    pub fn last_column_rate(&self) -> Option<f32> {
        self.last_column_rate
    }

    pub fn window(&self) -> Vec<f32> {
        self.window.iter().copied().collect()
    }

    pub fn last_column_state(&self, thresholds: &ClassificationThresholds) -> Option<WaveState> {
        self.last_column_rate.map(|rate| thresholds.classify(rate))
    }

    pub fn trend(&self) -> ParticipationTrend {
        if self.window.len() < PARTICIPATION_WINDOW {
            return ParticipationTrend::Flat;
        }
        let older = self.window[0];
        let newer = self.window[self.window.len() - 1];
        if newer - older > f32::EPSILON {
            ParticipationTrend::Rising
        } else if older - newer > f32::EPSILON {
            ParticipationTrend::Falling
        } else {
            ParticipationTrend::Flat
        }
    }
}
