use super::utils::{round_to_tenths, sanitize_rate};
use super::*;
use crate::handshake::{SectionReport, SectionRequest};

/// Position in the section sequence plus the previous section's outcome,
/// threaded through the propagation loop by its driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropagationCursor {
    index: usize,
    last_state: Option<WaveState>,
}

impl PropagationCursor {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn last_state(&self) -> Option<WaveState> {
        self.last_state
    }
}

impl WaveEngine {
    /// Claims the propagation loop. Returns `None` when a loop is already
    /// running or no wave is waiting to propagate; duplicate triggers are no-ops.
    pub fn begin_propagation(&mut self) -> Option<PropagationCursor> {
        if self.propagation_running {
            warn!("propagation already running; ignoring duplicate trigger");
            return None;
        }
        match self.phase {
            WavePhase::Countdown => {
                debug!(
                    remaining_ms = self.countdown_ms,
                    "countdown skipped by manual trigger"
                );
                self.countdown_ms = 0.0;
                self.phase = WavePhase::Propagating;
                self.events.push(WaveEvent::CountdownFinished);
            }
            WavePhase::Propagating => {}
            WavePhase::Idle | WavePhase::Complete => {
                debug!(phase = ?self.phase, "no wave waiting to propagate");
                return None;
            }
        }
        self.propagation_running = true;
        self.pending_section = None;
        self.pending_forced = ForcedFlags::default();
        Some(PropagationCursor {
            index: 0,
            last_state: None,
        })
    }

    /// Builds the request for the cursor's section and consumes the forced
    /// flags. Returns `None` once every section has been committed.
    pub fn next_section_request(&mut self, cursor: &PropagationCursor) -> Option<SectionRequest> {
        if !self.propagation_running {
            return None;
        }
        let section_id = self.config.section_ids.get(cursor.index)?.clone();
        if let Some(pending) = self.pending_section {
            warn!(pending, requested = cursor.index, "section already awaiting a report");
            return None;
        }

        let forced = self.boosters.consume_forced_flags();
        if forced.any() {
            debug!(section_id = %section_id, ?forced, "forced override consumed");
            self.events.push(WaveEvent::ForcedOverrideConsumed {
                section_id: section_id.clone(),
                forced,
            });
        }

        let strength = self.ledger.strength();
        self.pending_section = Some(cursor.index);
        self.pending_forced = forced;
        self.current_section_index = cursor.index;
        self.events.push(WaveEvent::SectionBegins {
            section_id: section_id.clone(),
            strength,
        });

        Some(SectionRequest {
            section_id,
            section_index: cursor.index,
            strength,
            booster: self.boosters.snapshot(),
            forced,
            thresholds: *self.ledger.thresholds(),
            recovery_power: self.config.recovery_power,
            previous_column_state: self.memory.last_column_state(self.ledger.thresholds()),
        })
    }

    /// Commits the aggregator's report for the cursor's section and returns
    /// the cursor for the next one. Reports for any other section are ignored.
    pub fn commit_section(
        &mut self,
        cursor: PropagationCursor,
        report: SectionReport,
    ) -> PropagationCursor {
        if self.pending_section != Some(cursor.index) {
            warn!(
                section_index = cursor.index,
                pending = ?self.pending_section,
                "ignoring report for a section that was not requested"
            );
            return cursor;
        }
        let Some(section_id) = self.config.section_ids.get(cursor.index).cloned() else {
            return cursor;
        };
        self.pending_section = None;
        let forced = std::mem::take(&mut self.pending_forced);

        let state = report.state;
        let participation_rate = sanitize_rate(report.participation_rate);
        if participation_rate != report.participation_rate {
            warn!(
                section_id = %section_id,
                reported = report.participation_rate,
                participation_rate,
                "section participation rate clamped"
            );
        }

        self.column_log.record_section(&section_id, &report.columns);
        if forced.any() {
            // A forced outcome overrides what the columns did, so the next
            // section continues from the forced tier.
            self.memory.record_column(participation_rate);
        } else {
            for column in &report.columns {
                self.memory
                    .record_column(sanitize_rate(column.participation_rate));
            }
        }

        self.results.push(SectionResult {
            section_id: section_id.clone(),
            success: state == WaveState::Success,
        });

        match state {
            WaveState::Death => {
                self.multiplier = 1.0;
                self.failed = true;
            }
            WaveState::Sputter => {
                self.multiplier = 1.0;
            }
            WaveState::Success if !self.failed => {
                self.score += self.config.success_score;
                self.multiplier += crate::constants::MULTIPLIER_STEP;
                self.sections_succeeded_total += 1;
            }
            WaveState::Success => {}
        }
        if state == WaveState::Success {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
        }
        self.sputter_active = state == WaveState::Sputter;

        let momentum_multiplier = self.boosters.momentum_multiplier();
        let strength = self.ledger.adjust_strength(
            state,
            participation_rate,
            cursor.last_state,
            momentum_multiplier,
        );
        self.last_section_state = Some(state);
        self.current_section_index = cursor.index + 1;

        debug!(
            section_id = %section_id,
            ?state,
            participation_rate,
            strength,
            score = self.score,
            "section committed"
        );
        self.events.push(WaveEvent::SectionCompleted {
            section_id,
            state,
            participation_rate,
            strength,
        });

        PropagationCursor {
            index: cursor.index + 1,
            last_state: Some(state),
        }
    }

    /// Closes the wave and releases the propagation guard.
    pub fn finish_propagation(&mut self, cursor: PropagationCursor) -> Vec<SectionResult> {
        if !self.propagation_running {
            return self.results.clone();
        }
        self.pending_forced = ForcedFlags::default();
        if cursor.index < self.section_count() {
            warn!(
                committed = cursor.index,
                sections = self.section_count(),
                "wave finished before every section committed"
            );
        }
        self.propagation_running = false;
        self.pending_section = None;
        self.phase = WavePhase::Complete;
        self.waves_completed += 1;

        self.boosters.clear_booster();
        self.events.push(WaveEvent::BoosterCleared);

        info!(
            score = self.score,
            strength = round_to_tenths(self.ledger.strength()),
            successes = self.results.iter().filter(|result| result.success).count(),
            sections = self.results.len(),
            "wave complete"
        );
        self.events.push(WaveEvent::WaveCompleted {
            results: self.results.clone(),
            score: self.score,
            strength: self.ledger.strength(),
        });
        self.results.clone()
    }
}
