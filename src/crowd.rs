use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::classification::{classify_section, enhanced_recovery_bonus, participation_rate};
use crate::constants::{
    FAN_ATTENTION_WEIGHT, FAN_BASE_CHANCE, FAN_HAPPINESS_WEIGHT, FAN_STRENGTH_WEIGHT,
    FAN_THIRST_PENALTY,
};
use crate::handshake::{ColumnAggregator, SectionReport, SectionRequest};
use crate::strength::clamp_strength;
use crate::types::{BoosterKind, ColumnOutcome, WaveState};

/// Keeps forced rates strictly inside their tier.
const FORCED_BAND_MARGIN: f32 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fan {
    pub happiness: f32,
    pub attention: f32,
    pub thirst: f32,
}

impl Fan {
    pub fn participation_chance(&self, strength: f32, participation_multiplier: f32) -> f32 {
        let s = clamp_strength(strength) / 100.0;
        let h = self.happiness.clamp(0.0, 100.0) / 100.0;
        let a = self.attention.clamp(0.0, 100.0) / 100.0;
        let t = self.thirst.clamp(0.0, 100.0) / 100.0;
        let chance = FAN_BASE_CHANCE + FAN_STRENGTH_WEIGHT * s + FAN_HAPPINESS_WEIGHT * h
            + FAN_ATTENTION_WEIGHT * a
            - FAN_THIRST_PENALTY * t;
        (chance * participation_multiplier.max(0.0)).clamp(0.0, 1.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CrowdColumn {
    pub fans: Vec<Fan>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CrowdSection {
    pub id: String,
    pub columns: Vec<CrowdColumn>,
}

impl CrowdSection {
    pub fn fan_count(&self) -> usize {
        self.columns.iter().map(|column| column.fans.len()).sum()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CrowdOptions {
    pub seed: u64,
    pub columns_per_section: usize,
    pub fans_per_column: usize,
    pub column_delay_ms: u64,
}

impl Default for CrowdOptions {
    fn default() -> Self {
        Self {
            seed: 1,
            columns_per_section: 8,
            fans_per_column: 12,
            column_delay_ms: 0,
        }
    }
}

/// Runs one section's columns in order. `draw` yields uniform samples in `[0, 1)`;
/// a fan joins the wave when the sample falls below its chance.
pub fn run_section<F>(section: &CrowdSection, request: &SectionRequest, mut draw: F) -> SectionReport
where
    F: FnMut() -> f32,
{
    let thresholds = request.thresholds;
    let participation_boost = request.booster.multiplier_for(BoosterKind::Participation);
    let recovery_power =
        request.recovery_power * request.booster.multiplier_for(BoosterKind::Recovery);

    // Column-level recovery only moves this section's working strength;
    // the committed strength is the ledger's business.
    let mut working_strength = clamp_strength(request.strength);
    let mut previous = request.previous_column_state;
    let mut columns = Vec::with_capacity(section.columns.len());
    let mut participating_total = 0usize;
    let mut fans_total = 0usize;

    for (column_index, column) in section.columns.iter().enumerate() {
        let participating = column
            .fans
            .iter()
            .filter(|fan| draw() < fan.participation_chance(working_strength, participation_boost))
            .count();
        let rate = participation_rate(participating, column.fans.len());
        let state = thresholds.classify(rate);
        working_strength = clamp_strength(
            working_strength + enhanced_recovery_bonus(previous, state, recovery_power),
        );

        columns.push(ColumnOutcome {
            column_index,
            participation_rate: rate,
            state,
        });
        participating_total += participating;
        fans_total += column.fans.len();
        previous = Some(state);
    }

    let mut state = classify_section(&columns);
    let mut rate = participation_rate(participating_total, fans_total);
    if let Some(forced) = request.forced.forced_state() {
        state = forced;
        rate = match forced {
            WaveState::Death => rate.min((thresholds.sputter - FORCED_BAND_MARGIN).max(0.0)),
            WaveState::Sputter => rate
                .max(thresholds.sputter)
                .min((thresholds.success - FORCED_BAND_MARGIN).max(thresholds.sputter)),
            WaveState::Success => rate,
        };
    }

    SectionReport {
        state,
        participation_rate: rate,
        columns,
    }
}

/// Seedable stand-in for the visualization layer's column aggregation.
pub struct CrowdSimulator {
    sections: Vec<CrowdSection>,
    rng: StdRng,
    column_delay: Duration,
}

impl CrowdSimulator {
    pub fn new(sections: Vec<CrowdSection>, seed: u64) -> Self {
        Self {
            sections,
            rng: StdRng::seed_from_u64(seed),
            column_delay: Duration::ZERO,
        }
    }

    pub fn generate(section_ids: &[String], options: CrowdOptions) -> Self {
        let mut rng = StdRng::seed_from_u64(options.seed);
        let sections = section_ids
            .iter()
            .map(|id| CrowdSection {
                id: id.clone(),
                columns: (0..options.columns_per_section)
                    .map(|_| CrowdColumn {
                        fans: (0..options.fans_per_column)
                            .map(|_| Fan {
                                happiness: rng.random_range(35.0..95.0),
                                attention: rng.random_range(30.0..95.0),
                                thirst: rng.random_range(0.0..70.0),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        Self {
            sections,
            rng,
            column_delay: Duration::from_millis(options.column_delay_ms),
        }
    }

    pub fn sections(&self) -> &[CrowdSection] {
        &self.sections
    }

    pub fn simulate_section(&mut self, request: &SectionRequest) -> SectionReport {
        let Some(section) = self
            .sections
            .iter()
            .find(|section| section.id == request.section_id)
        else {
            warn!(section_id = %request.section_id, "no crowd seated in section");
            return run_section(
                &CrowdSection {
                    id: request.section_id.clone(),
                    columns: Vec::new(),
                },
                request,
                || 1.0,
            );
        };
        let rng = &mut self.rng;
        run_section(section, request, || rng.random::<f32>())
    }
}

impl ColumnAggregator for CrowdSimulator {
    async fn aggregate(&mut self, request: SectionRequest) -> SectionReport {
        let report = self.simulate_section(&request);
        if !self.column_delay.is_zero() {
            for _ in &report.columns {
                tokio::time::sleep(self.column_delay).await;
            }
        }
        report
    }
}
