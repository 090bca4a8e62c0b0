use tracing::debug;

use crate::types::{BoosterKind, BoosterSnapshot, ForcedFlags};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Booster {
    kind: BoosterKind,
    multiplier: f32,
}

/// Holds at most one active booster plus the one-shot forced-outcome flags.
///
/// Applying a booster replaces the previous one; multipliers never compound.
#[derive(Clone, Debug, Default)]
pub struct BoosterRegistry {
    active: Option<Booster>,
    forced: ForcedFlags,
}

impl BoosterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the multiplier now in effect.
    pub fn apply_booster(&mut self, kind: BoosterKind, percent: f32) -> f32 {
        if kind == BoosterKind::None {
            self.clear_booster();
            return 1.0;
        }
        let percent = if percent.is_finite() { percent.max(0.0) } else { 0.0 };
        let booster = Booster {
            kind,
            multiplier: 1.0 + percent,
        };
        if let Some(previous) = self.active.replace(booster) {
            debug!(previous = ?previous.kind, next = ?kind, "booster replaced");
        }
        booster.multiplier
    }

    pub fn clear_booster(&mut self) {
        self.active = None;
    }

    pub fn has_booster(&self) -> bool {
        self.active.is_some()
    }

    pub fn get_multiplier(&self) -> f32 {
        self.active.map(|booster| booster.multiplier).unwrap_or(1.0)
    }

    pub fn active_kind(&self) -> BoosterKind {
        self.active
            .map(|booster| booster.kind)
            .unwrap_or(BoosterKind::None)
    }

    /// Momentum gains are only amplified by a momentum booster.
    pub fn momentum_multiplier(&self) -> f32 {
        self.snapshot().multiplier_for(BoosterKind::Momentum)
    }

    pub fn snapshot(&self) -> BoosterSnapshot {
        match self.active {
            Some(booster) => BoosterSnapshot {
                kind: booster.kind,
                multiplier: booster.multiplier,
            },
            None => BoosterSnapshot::neutral(),
        }
    }

    pub fn set_force_sputter(&mut self, value: bool) {
        self.forced.sputter = value;
    }

    pub fn set_force_death(&mut self, value: bool) {
        self.forced.death = value;
    }

    pub fn forced_flags(&self) -> ForcedFlags {
        self.forced
    }

    pub fn consume_forced_flags(&mut self) -> ForcedFlags {
        std::mem::take(&mut self.forced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_neutral() {
        let registry = BoosterRegistry::new();
        assert_eq!(registry.get_multiplier(), 1.0);
        assert_eq!(registry.active_kind(), BoosterKind::None);
        assert_eq!(registry.momentum_multiplier(), 1.0);
        assert!(!registry.has_booster());
    }

    #[test]
    fn second_booster_replaces_first() {
        let mut registry = BoosterRegistry::new();
        registry.apply_booster(BoosterKind::Participation, 0.2);
        registry.apply_booster(BoosterKind::Momentum, 0.5);
        assert_eq!(registry.get_multiplier(), 1.5);
        assert_eq!(registry.active_kind(), BoosterKind::Momentum);

        registry.apply_booster(BoosterKind::Momentum, 0.5);
        assert_eq!(registry.get_multiplier(), 1.5);
    }

    #[test]
    fn momentum_multiplier_requires_momentum_kind() {
        let mut registry = BoosterRegistry::new();
        registry.apply_booster(BoosterKind::Recovery, 0.5);
        assert_eq!(registry.get_multiplier(), 1.5);
        assert_eq!(registry.momentum_multiplier(), 1.0);

        registry.apply_booster(BoosterKind::Momentum, 0.25);
        assert_eq!(registry.momentum_multiplier(), 1.25);
    }

    #[test]
    fn clear_booster_resets_to_neutral() {
        let mut registry = BoosterRegistry::new();
        registry.apply_booster(BoosterKind::Momentum, 0.25);
        registry.clear_booster();
        assert_eq!(registry.snapshot(), BoosterSnapshot::neutral());
    }

    #[test]
    fn applying_none_kind_clears() {
        let mut registry = BoosterRegistry::new();
        registry.apply_booster(BoosterKind::Participation, 0.2);
        assert_eq!(registry.apply_booster(BoosterKind::None, 0.9), 1.0);
        assert!(!registry.has_booster());
    }

    #[test]
    fn negative_percent_never_drops_below_neutral() {
        let mut registry = BoosterRegistry::new();
        assert_eq!(registry.apply_booster(BoosterKind::Participation, -0.7), 1.0);
        assert_eq!(registry.apply_booster(BoosterKind::Participation, f32::NAN), 1.0);
    }

    #[test]
    fn forced_flags_are_consumed_once() {
        let mut registry = BoosterRegistry::new();
        registry.set_force_sputter(true);
        registry.set_force_death(true);
        assert_eq!(
            registry.consume_forced_flags(),
            ForcedFlags {
                sputter: true,
                death: true
            }
        );
        assert_eq!(registry.consume_forced_flags(), ForcedFlags::default());
        assert!(!registry.forced_flags().any());
    }

    #[test]
    fn forced_flags_survive_booster_changes() {
        let mut registry = BoosterRegistry::new();
        registry.set_force_death(true);
        registry.apply_booster(BoosterKind::Momentum, 0.25);
        registry.clear_booster();
        assert!(registry.forced_flags().death);
    }
}
