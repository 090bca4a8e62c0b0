use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use crate::engine::WaveEngine;
use crate::error::WaveError;
use crate::handshake::{SectionLink, SectionReport};
use crate::types::{SectionResult, WavePhase};

pub type SharedEngine = Arc<Mutex<WaveEngine>>;

/// Couples a shared engine to its column aggregator. The engine lock is
/// released while a section is out with the aggregator, so debug and booster
/// calls keep working mid-wave.
#[derive(Clone)]
pub struct WaveRunner {
    engine: SharedEngine,
    link: SectionLink,
}

impl WaveRunner {
    pub fn new(engine: WaveEngine, link: SectionLink) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            link,
        }
    }

    pub fn engine(&self) -> SharedEngine {
        self.engine.clone()
    }

    pub async fn start_wave(&self) -> Result<(), WaveError> {
        self.engine.lock().await.start_wave()
    }

    /// Advances the countdown and, when it expires, propagates the wave to completion.
    pub async fn tick(&self, dt_ms: u64) -> Option<Vec<SectionResult>> {
        let ready = self.engine.lock().await.tick(dt_ms);
        if !ready {
            return None;
        }
        self.propagate().await
    }

    /// Runs every section in order. Returns `None` without side effects when
    /// another propagation holds the guard or no wave is pending.
    pub async fn propagate(&self) -> Option<Vec<SectionResult>> {
        let (mut cursor, timeout) = {
            let mut engine = self.engine.lock().await;
            let cursor = engine.begin_propagation()?;
            (cursor, engine.config().section_timeout())
        };

        loop {
            let request = {
                let mut engine = self.engine.lock().await;
                engine.next_section_request(&cursor)
            };
            let Some(request) = request else {
                break;
            };

            let report = match self.link.request(request, timeout).await {
                Ok(report) => report,
                Err(error) => {
                    warn!(%error, section_index = cursor.index(), "section committed as death");
                    SectionReport::missing()
                }
            };

            let mut engine = self.engine.lock().await;
            cursor = engine.commit_section(cursor, report);
        }

        Some(self.engine.lock().await.finish_propagation(cursor))
    }

    /// Starts a wave and ticks it until propagation finishes.
    pub async fn run_wave(&self, tick_ms: u64) -> Result<Vec<SectionResult>, WaveError> {
        self.start_wave().await?;
        self.drive_wave(tick_ms).await
    }

    /// Ticks an already started wave through its countdown and propagation.
    /// Fails with `AlreadyPropagating` when another caller claimed the
    /// propagation loop first.
    pub async fn drive_wave(&self, tick_ms: u64) -> Result<Vec<SectionResult>, WaveError> {
        let tick_ms = tick_ms.max(1);
        loop {
            if let Some(results) = self.tick(tick_ms).await {
                return Ok(results);
            }
            if self.engine.lock().await.phase() != WavePhase::Countdown {
                return Err(WaveError::AlreadyPropagating);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::WaveConfig;
    use crate::crowd::{CrowdColumn, CrowdSection, CrowdSimulator, Fan};
    use crate::handshake::{section_channel, spawn_column_aggregator, SectionJob};
    use crate::types::{BoosterKind, WaveEvent, WaveState};
    use tokio::sync::mpsc;

    fn config(sections: &[&str]) -> WaveConfig {
        WaveConfig {
            section_ids: sections.iter().map(|id| id.to_string()).collect(),
            starting_strength: 50.0,
            countdown_ms: 200,
            ..WaveConfig::default()
        }
    }

    fn scripted(outcomes: Vec<(WaveState, f32)>, mut jobs: mpsc::Receiver<SectionJob>) {
        tokio::spawn(async move {
            for (state, rate) in outcomes {
                let Some(job) = jobs.recv().await else {
                    return;
                };
                job.respond(SectionReport {
                    state,
                    participation_rate: rate,
                    columns: Vec::new(),
                });
            }
        });
    }

    #[tokio::test]
    async fn concurrent_propagation_runs_once() {
        let (link, jobs) = section_channel();
        scripted(
            vec![
                (WaveState::Success, 0.8),
                (WaveState::Success, 0.8),
                (WaveState::Success, 0.8),
            ],
            jobs,
        );
        let runner = WaveRunner::new(
            WaveEngine::new(config(&["A", "B", "C"])).expect("engine"),
            link,
        );
        runner.start_wave().await.expect("wave starts");

        let (first, second) = tokio::join!(runner.propagate(), runner.propagate());
        let produced: Vec<Vec<SectionResult>> = [first, second].into_iter().flatten().collect();
        assert_eq!(produced.len(), 1);
        assert_eq!(produced[0].len(), 3);

        let engine = runner.engine();
        let engine = engine.lock().await;
        assert_eq!(engine.results().len(), 3);
        assert_eq!(engine.score(), 300);
    }

    #[tokio::test]
    async fn tick_triggers_propagation_after_countdown() {
        let (link, jobs) = section_channel();
        scripted(
            vec![(WaveState::Sputter, 0.5), (WaveState::Success, 0.65)],
            jobs,
        );
        let runner = WaveRunner::new(WaveEngine::new(config(&["A", "B"])).expect("engine"), link);
        runner.start_wave().await.expect("wave starts");
        assert!(runner.tick(100).await.is_none());
        let results = runner.tick(100).await.expect("wave propagated");
        assert_eq!(
            results.iter().map(|r| r.success).collect::<Vec<_>>(),
            vec![false, true]
        );
        let engine = runner.engine();
        let engine = engine.lock().await;
        assert_eq!(engine.strength(), 60.0);
        assert_eq!(engine.phase(), WavePhase::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_aggregator_commits_death_and_continues() {
        let (link, _jobs) = section_channel();
        let runner = WaveRunner::new(
            WaveEngine::new(WaveConfig {
                section_timeout_ms: Some(500),
                ..config(&["A"])
            })
            .expect("engine"),
            link,
        );
        let results = runner.run_wave(50).await.expect("wave runs");
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        let engine = runner.engine();
        assert_eq!(engine.lock().await.multiplier(), 1.0);
    }

    #[tokio::test]
    async fn closed_aggregator_fails_every_section() {
        let (link, jobs) = section_channel();
        drop(jobs);
        let runner = WaveRunner::new(
            WaveEngine::new(config(&["A", "B", "C"])).expect("engine"),
            link,
        );
        let results = runner.run_wave(50).await.expect("wave runs");
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|result| !result.success));
        let engine = runner.engine();
        let engine = engine.lock().await;
        // First section sets no delta, then two floor penalties.
        assert_eq!(engine.strength(), 40.0);
    }

    #[tokio::test]
    async fn drive_wave_reports_propagation_claimed_elsewhere() {
        let (link, jobs) = section_channel();
        scripted(
            vec![(WaveState::Success, 0.8), (WaveState::Success, 0.8)],
            jobs,
        );
        let runner = WaveRunner::new(WaveEngine::new(config(&["A", "B"])).expect("engine"), link);
        runner.start_wave().await.expect("wave starts");

        let (manual, driven) = tokio::join!(runner.propagate(), runner.drive_wave(50));
        assert_eq!(manual.expect("manual trigger propagates").len(), 2);
        assert!(matches!(driven, Err(WaveError::AlreadyPropagating)));

        let engine = runner.engine();
        let mut engine = engine.lock().await;
        assert!(engine.begin_propagation().is_none());
        assert_eq!(engine.phase(), WavePhase::Complete);
    }

    #[tokio::test]
    async fn start_wave_is_refused_while_propagating() {
        let (link, mut jobs) = section_channel();
        let runner = WaveRunner::new(WaveEngine::new(config(&["A"])).expect("engine"), link);
        runner.start_wave().await.expect("wave starts");

        let restart = runner.clone();
        let responder = tokio::spawn(async move {
            let job = jobs.recv().await.expect("job");
            let refused = restart.start_wave().await;
            job.respond(SectionReport {
                state: WaveState::Success,
                participation_rate: 0.9,
                columns: Vec::new(),
            });
            refused
        });

        runner.propagate().await.expect("propagated");
        assert!(matches!(
            responder.await.expect("responder"),
            Err(WaveError::AlreadyPropagating)
        ));
    }

    #[tokio::test]
    async fn engine_stays_usable_while_section_is_out() {
        let (link, mut jobs) = section_channel();
        let runner = WaveRunner::new(WaveEngine::new(config(&["A", "B"])).expect("engine"), link);
        runner.start_wave().await.expect("wave starts");

        let engine = runner.engine();
        let responder = tokio::spawn(async move {
            let first = jobs.recv().await.expect("first job");
            // Booster applied mid-wave lands on the next request.
            engine.lock().await.apply_wave_booster(BoosterKind::Participation);
            first.respond(SectionReport {
                state: WaveState::Success,
                participation_rate: 0.9,
                columns: Vec::new(),
            });
            let second = jobs.recv().await.expect("second job");
            let kind = second.request.booster.kind;
            second.respond(SectionReport {
                state: WaveState::Success,
                participation_rate: 0.9,
                columns: Vec::new(),
            });
            kind
        });

        let results = runner.propagate().await.expect("propagated");
        assert_eq!(results.len(), 2);
        assert_eq!(
            responder.await.expect("responder"),
            BoosterKind::Participation
        );
    }

    #[tokio::test]
    async fn crowd_simulator_drives_full_wave() {
        let hot = Fan {
            happiness: 100.0,
            attention: 100.0,
            thirst: 0.0,
        };
        let sections = ["A", "B", "C"]
            .iter()
            .map(|id| CrowdSection {
                id: id.to_string(),
                columns: vec![CrowdColumn { fans: vec![hot; 6] }; 4],
            })
            .collect();
        let (link, _handle) = spawn_column_aggregator(CrowdSimulator::new(sections, 11));
        let runner = WaveRunner::new(
            WaveEngine::new(WaveConfig {
                starting_strength: 100.0,
                ..config(&["A", "B", "C"])
            })
            .expect("engine"),
            link,
        );
        let results = tokio::time::timeout(Duration::from_secs(5), runner.run_wave(50))
            .await
            .expect("wave finishes")
            .expect("wave runs");
        assert!(results.iter().all(|result| result.success));

        let engine = runner.engine();
        let mut engine = engine.lock().await;
        assert_eq!(engine.score(), 300);
        assert_eq!(engine.strength(), 100.0);
        let completed = engine
            .drain_events()
            .into_iter()
            .filter(|event| matches!(event, WaveEvent::SectionCompleted { .. }))
            .count();
        assert_eq!(completed, 3);
    }
}
