use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::classification::ClassificationThresholds;
use crate::error::HandshakeError;
use crate::types::{BoosterSnapshot, ColumnOutcome, ForcedFlags, WaveState};

/// Everything the column aggregator needs to compute one section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionRequest {
    #[serde(rename = "sectionId")]
    pub section_id: String,
    #[serde(rename = "sectionIndex")]
    pub section_index: usize,
    pub strength: f32,
    pub booster: BoosterSnapshot,
    pub forced: ForcedFlags,
    pub thresholds: ClassificationThresholds,
    #[serde(rename = "recoveryPower")]
    pub recovery_power: f32,
    #[serde(rename = "previousColumnState")]
    pub previous_column_state: Option<WaveState>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionReport {
    pub state: WaveState,
    #[serde(rename = "participationRate")]
    pub participation_rate: f32,
    pub columns: Vec<ColumnOutcome>,
}

impl SectionReport {
    /// Stand-in committed when the aggregator never answers.
    pub fn missing() -> Self {
        Self {
            state: WaveState::Death,
            participation_rate: 0.0,
            columns: Vec::new(),
        }
    }
}

/// The visualization-side collaborator that turns a section request into a
/// classified report. Implementations may take as long as their animation needs.
pub trait ColumnAggregator: Send + 'static {
    fn aggregate(&mut self, request: SectionRequest) -> impl Future<Output = SectionReport> + Send;
}

#[derive(Debug)]
pub struct SectionJob {
    pub request: SectionRequest,
    reply: oneshot::Sender<SectionReport>,
}

impl SectionJob {
    /// Returns false when the engine stopped waiting for this section.
    pub fn respond(self, report: SectionReport) -> bool {
        self.reply.send(report).is_ok()
    }
}

/// Engine-side end of the request/response channel.
#[derive(Clone, Debug)]
pub struct SectionLink {
    jobs: mpsc::Sender<SectionJob>,
}

impl SectionLink {
    pub async fn request(
        &self,
        request: SectionRequest,
        timeout: Option<Duration>,
    ) -> Result<SectionReport, HandshakeError> {
        let section_id = request.section_id.clone();
        let round_trip = self.round_trip(request);
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, round_trip).await {
                Ok(result) => result,
                Err(_) => Err(HandshakeError::TimedOut {
                    section_id,
                    timeout_ms: limit.as_millis() as u64,
                }),
            },
            None => round_trip.await,
        }
    }

    async fn round_trip(&self, request: SectionRequest) -> Result<SectionReport, HandshakeError> {
        let (reply, response) = oneshot::channel();
        self.jobs
            .send(SectionJob { request, reply })
            .await
            .map_err(|_| HandshakeError::AggregatorClosed)?;
        response.await.map_err(|_| HandshakeError::AggregatorClosed)
    }
}

/// Creates a link whose jobs are answered by whoever holds the receiver.
pub fn section_channel() -> (SectionLink, mpsc::Receiver<SectionJob>) {
    let (jobs, receiver) = mpsc::channel(1);
    (SectionLink { jobs }, receiver)
}

/// Serves section jobs in arrival order on a background task.
pub fn spawn_column_aggregator<A>(mut aggregator: A) -> (SectionLink, JoinHandle<()>)
where
    A: ColumnAggregator,
{
    let (link, mut jobs) = section_channel();
    let handle = tokio::spawn(async move {
        while let Some(SectionJob { request, reply }) = jobs.recv().await {
            let report = aggregator.aggregate(request).await;
            if reply.send(report).is_err() {
                tracing::debug!("section report dropped; engine stopped waiting");
            }
        }
    });
    (link, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoosterKind;

    fn request(section_id: &str) -> SectionRequest {
        SectionRequest {
            section_id: section_id.to_string(),
            section_index: 0,
            strength: 50.0,
            booster: BoosterSnapshot::neutral(),
            forced: ForcedFlags::default(),
            thresholds: ClassificationThresholds::default(),
            recovery_power: 6.0,
            previous_column_state: None,
        }
    }

    struct Echo;

    impl ColumnAggregator for Echo {
        async fn aggregate(&mut self, request: SectionRequest) -> SectionReport {
            let rate = request.strength / 100.0;
            SectionReport {
                state: request.thresholds.classify(rate),
                participation_rate: rate,
                columns: Vec::new(),
            }
        }
    }

    #[tokio::test]
    async fn spawned_aggregator_answers_requests_in_order() {
        let (link, _handle) = spawn_column_aggregator(Echo);
        let first = link.request(request("A"), None).await.expect("report");
        assert_eq!(first.state, WaveState::Sputter);
        let mut hot = request("B");
        hot.strength = 90.0;
        let second = link
            .request(hot, Some(Duration::from_secs(1)))
            .await
            .expect("report");
        assert_eq!(second.state, WaveState::Success);
    }

    #[tokio::test]
    async fn scripted_channel_delivers_request_fields() {
        let (link, mut jobs) = section_channel();
        let responder = tokio::spawn(async move {
            let job = jobs.recv().await.expect("job");
            assert_eq!(job.request.section_id, "C");
            assert_eq!(job.request.booster.kind, BoosterKind::None);
            job.respond(SectionReport {
                state: WaveState::Death,
                participation_rate: 0.1,
                columns: Vec::new(),
            })
        });
        let report = link.request(request("C"), None).await.expect("report");
        assert_eq!(report.state, WaveState::Death);
        assert!(responder.await.expect("responder"));
    }

    #[tokio::test]
    async fn dropped_receiver_reports_closed() {
        let (link, jobs) = section_channel();
        drop(jobs);
        let result = link.request(request("A"), None).await;
        assert!(matches!(result, Err(HandshakeError::AggregatorClosed)));
    }

    #[tokio::test]
    async fn dropped_job_reports_closed() {
        let (link, mut jobs) = section_channel();
        tokio::spawn(async move {
            let job = jobs.recv().await.expect("job");
            drop(job);
        });
        let result = link.request(request("A"), None).await;
        assert!(matches!(result, Err(HandshakeError::AggregatorClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_aggregator_times_out() {
        let (link, _jobs) = section_channel();
        let result = link
            .request(request("B"), Some(Duration::from_millis(250)))
            .await;
        match result {
            Err(HandshakeError::TimedOut {
                section_id,
                timeout_ms,
            }) => {
                assert_eq!(section_id, "B");
                assert_eq!(timeout_ms, 250);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
