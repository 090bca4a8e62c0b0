use tracing::{debug, info, warn};

use crate::booster::BoosterRegistry;
use crate::column_log::ColumnLog;
use crate::config::WaveConfig;
use crate::error::WaveError;
use crate::strength::{StrengthLedger, TransitionMemory};
use crate::types::{
    BoosterKind, ColumnClassificationRecord, ForcedFlags, ParticipationTrend, SectionResult,
    WaveEvent, WavePhase, WaveSnapshot, WaveState,
};

mod section_system;
mod utils;

pub use self::section_system::PropagationCursor;

const SNAPSHOT_COLUMN_RECORDS: usize = 8;

/// Drives one wave at a time through its sections: `idle -> countdown ->
/// propagating -> complete`. Section processing is split into request and
/// commit steps so the caller can await the column aggregator in between
/// without holding the engine.
#[derive(Clone, Debug)]
pub struct WaveEngine {
    config: WaveConfig,
    phase: WavePhase,
    countdown_ms: f64,
    current_section_index: usize,
    ledger: StrengthLedger,
    score: i32,
    multiplier: f32,
    results: Vec<SectionResult>,
    last_section_state: Option<WaveState>,

    failed: bool,
    consecutive_failures: u32,
    sputter_active: bool,
    memory: TransitionMemory,
    boosters: BoosterRegistry,
    column_log: ColumnLog,
    events: Vec<WaveEvent>,

    propagation_running: bool,
    pending_section: Option<usize>,
    pending_forced: ForcedFlags,

    sections_succeeded_total: u64,
    waves_completed: u64,
}

impl WaveEngine {
    pub fn new(config: WaveConfig) -> Result<Self, WaveError> {
        config.validate()?;
        let ledger = StrengthLedger::new(config.starting_strength, config.thresholds());
        Ok(Self {
            config,
            phase: WavePhase::Idle,
            countdown_ms: 0.0,
            current_section_index: 0,
            ledger,
            score: 0,
            multiplier: 1.0,
            results: Vec::new(),
            last_section_state: None,
            failed: false,
            consecutive_failures: 0,
            sputter_active: false,
            memory: TransitionMemory::default(),
            boosters: BoosterRegistry::new(),
            column_log: ColumnLog::default(),
            events: Vec::new(),
            propagation_running: false,
            pending_section: None,
            pending_forced: ForcedFlags::default(),
            sections_succeeded_total: 0,
            waves_completed: 0,
        })
    }

    pub fn config(&self) -> &WaveConfig {
        &self.config
    }

    pub fn phase(&self) -> WavePhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, WavePhase::Countdown | WavePhase::Propagating)
    }

    pub fn is_propagating(&self) -> bool {
        self.propagation_running
    }

    pub fn strength(&self) -> f32 {
        self.ledger.strength()
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn multiplier(&self) -> f32 {
        self.multiplier
    }

    pub fn results(&self) -> &[SectionResult] {
        &self.results
    }

    pub fn last_section_state(&self) -> Option<WaveState> {
        self.last_section_state
    }

    pub fn section_count(&self) -> usize {
        self.config.section_ids.len()
    }

    pub fn sections_succeeded_total(&self) -> u64 {
        self.sections_succeeded_total
    }

    pub fn participation_trend(&self) -> ParticipationTrend {
        self.memory.trend()
    }

    pub fn column_records(&self) -> Vec<ColumnClassificationRecord> {
        self.column_log.all()
    }

    /// Starts a fresh wave session. Boosters and forced flags are left alone.
    pub fn start_wave(&mut self) -> Result<(), WaveError> {
        if self.section_count() == 0 {
            return Err(WaveError::EmptySectionList);
        }
        if self.propagation_running || self.phase == WavePhase::Propagating {
            return Err(WaveError::AlreadyPropagating);
        }

        self.phase = WavePhase::Countdown;
        self.countdown_ms = self.config.countdown_ms as f64;
        self.current_section_index = 0;
        self.ledger.set_strength(self.config.starting_strength);
        self.score = 0;
        self.multiplier = 1.0;
        self.results.clear();
        self.last_section_state = None;
        self.failed = false;
        self.consecutive_failures = 0;
        self.sputter_active = false;
        self.memory.clear();
        self.pending_section = None;
        self.pending_forced = ForcedFlags::default();

        info!(
            strength = self.ledger.strength(),
            countdown_ms = self.config.countdown_ms,
            sections = self.section_count(),
            "wave started"
        );
        self.events.push(WaveEvent::WaveStarted {
            strength: self.ledger.strength(),
            countdown_ms: self.config.countdown_ms,
        });
        Ok(())
    }

    /// Advances the countdown. Returns true exactly once, when the wave
    /// becomes ready to propagate.
    pub fn tick(&mut self, dt_ms: u64) -> bool {
        if self.phase != WavePhase::Countdown {
            return false;
        }
        self.countdown_ms -= dt_ms as f64;
        if self.countdown_ms > 0.0 {
            return false;
        }
        self.countdown_ms = 0.0;
        self.phase = WavePhase::Propagating;
        debug!("countdown finished");
        self.events.push(WaveEvent::CountdownFinished);
        true
    }

    pub fn apply_booster(&mut self, kind: BoosterKind, percent: f32) -> f32 {
        let multiplier = self.boosters.apply_booster(kind, percent);
        self.events.push(match kind {
            BoosterKind::None => WaveEvent::BoosterCleared,
            _ => WaveEvent::BoosterApplied { kind, multiplier },
        });
        multiplier
    }

    /// Applies the configured percentage for `kind`, replacing any active booster.
    pub fn apply_wave_booster(&mut self, kind: BoosterKind) -> f32 {
        let percent = self.config.booster_percents.percent_for(kind);
        self.apply_booster(kind, percent)
    }

    pub fn clear_booster(&mut self) {
        self.boosters.clear_booster();
        self.events.push(WaveEvent::BoosterCleared);
    }

    pub fn get_multiplier(&self) -> f32 {
        self.boosters.get_multiplier()
    }

    pub fn active_booster_kind(&self) -> BoosterKind {
        self.boosters.active_kind()
    }

    pub fn set_force_sputter(&mut self, value: bool) {
        self.boosters.set_force_sputter(value);
    }

    pub fn set_force_death(&mut self, value: bool) {
        self.boosters.set_force_death(value);
    }

    /// Debug override; bypasses the transition table.
    pub fn set_strength(&mut self, value: f32) -> f32 {
        let clamped = self.ledger.set_strength(value);
        if clamped != value {
            warn!(requested = value, clamped, "debug strength override clamped");
        }
        clamped
    }

    pub fn drain_events(&mut self) -> Vec<WaveEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> WaveSnapshot {
        WaveSnapshot {
            phase: self.phase,
            active: self.is_active(),
            countdown_ms: self.countdown_ms,
            current_section_index: self.current_section_index,
            strength: self.ledger.strength(),
            score: self.score,
            multiplier: self.multiplier,
            results: self.results.clone(),
            last_section_state: self.last_section_state,
            booster: self.boosters.snapshot(),
            forced: self.boosters.forced_flags(),
            consecutive_failures: self.consecutive_failures,
            sputter_active: self.sputter_active,
            sections_succeeded_total: self.sections_succeeded_total,
            waves_completed: self.waves_completed,
            participation_trend: self.memory.trend(),
            recent_columns: self.column_log.recent(SNAPSHOT_COLUMN_RECORDS),
        }
    }
}
