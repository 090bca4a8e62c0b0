use chrono::{SecondsFormat, Utc};
use clap::Parser;
use serde::Serialize;
use serde_json::{json, Value};
use stadium_wave_server::config::WaveConfig;
use stadium_wave_server::constants::TICK_MS;
use stadium_wave_server::crowd::{CrowdOptions, CrowdSimulator};
use stadium_wave_server::engine::WaveEngine;
use stadium_wave_server::handshake::spawn_column_aggregator;
use stadium_wave_server::runner::WaveRunner;
use stadium_wave_server::types::{BoosterKind, ParticipationTrend, SectionResult, WaveEvent, WaveState};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long, default_value_t = 5)]
    waves: u32,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    columns: Option<usize>,
    #[arg(long)]
    fans: Option<usize>,
    #[arg(long)]
    booster: Option<String>,
    #[arg(long)]
    force_sputter: bool,
    #[arg(long)]
    force_death: bool,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct SectionLine {
    #[serde(rename = "sectionId")]
    section_id: String,
    state: WaveState,
    #[serde(rename = "participationRate")]
    participation_rate: f32,
    strength: f32,
}

#[derive(Clone, Debug, Serialize)]
struct WaveResultLine {
    wave: u32,
    seed: u64,
    booster: BoosterKind,
    results: Vec<SectionResult>,
    sections: Vec<SectionLine>,
    score: i32,
    #[serde(rename = "finalStrength")]
    final_strength: f32,
    successes: usize,
    #[serde(rename = "participationTrend")]
    participation_trend: ParticipationTrend,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    wave: u32,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "generatedAtIso")]
    generated_at_iso: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "waveCount")]
    wave_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageScore")]
    average_score: f64,
    #[serde(rename = "stateCounts")]
    state_counts: BTreeMap<String, usize>,
    waves: Vec<WaveResultLine>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    timestamp_ms: u64,
    level: String,
    event: String,
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    wave: Option<u32>,
    details: Value,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let run_started_at_ms = now_ms();
    let seed = cli.seed.unwrap_or(run_started_at_ms);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(seed, run_started_at_ms));

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            emit_log(
                "error",
                "config_invalid",
                &match_id,
                None,
                json!({ "error": error.to_string() }),
            );
            std::process::exit(2);
        }
    };
    let booster = match cli.booster.as_deref() {
        None => BoosterKind::None,
        Some(raw) => match BoosterKind::parse(raw) {
            Some(kind) => kind,
            None => {
                emit_log(
                    "error",
                    "booster_unknown",
                    &match_id,
                    None,
                    json!({ "booster": raw }),
                );
                std::process::exit(2);
            }
        },
    };

    let defaults = CrowdOptions::default();
    let crowd = CrowdSimulator::generate(
        &config.section_ids,
        CrowdOptions {
            seed,
            columns_per_section: cli.columns.unwrap_or(defaults.columns_per_section).max(1),
            fans_per_column: cli.fans.unwrap_or(defaults.fans_per_column).max(1),
            column_delay_ms: 0,
        },
    );
    let section_count = config.section_ids.len();
    let engine = match WaveEngine::new(config) {
        Ok(engine) => engine,
        Err(error) => {
            emit_log(
                "error",
                "engine_invalid",
                &match_id,
                None,
                json!({ "error": error.to_string() }),
            );
            std::process::exit(2);
        }
    };
    let (link, _aggregator) = spawn_column_aggregator(crowd);
    let runner = WaveRunner::new(engine, link);

    emit_log(
        "info",
        "run_started",
        &match_id,
        None,
        json!({
            "waves": cli.waves,
            "seed": seed,
            "sections": section_count,
            "booster": booster,
        }),
    );

    let mut wave_lines = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut state_counts: BTreeMap<String, usize> = BTreeMap::new();

    for wave in 1..=cli.waves {
        {
            let engine = runner.engine();
            let mut engine = engine.lock().await;
            if booster != BoosterKind::None {
                engine.apply_wave_booster(booster);
            }
            engine.set_force_sputter(cli.force_sputter);
            engine.set_force_death(cli.force_death);
        }

        let results = match runner.run_wave(TICK_MS).await {
            Ok(results) => results,
            Err(error) => {
                emit_log(
                    "error",
                    "wave_failed",
                    &match_id,
                    Some(wave),
                    json!({ "error": error.to_string() }),
                );
                std::process::exit(2);
            }
        };

        let (score, final_strength, participation_trend, events) = {
            let engine = runner.engine();
            let mut engine = engine.lock().await;
            (
                engine.score(),
                engine.strength(),
                engine.participation_trend(),
                engine.drain_events(),
            )
        };
        let sections = collect_section_lines(&events);
        for line in &sections {
            *state_counts
                .entry(state_key(line.state).to_string())
                .or_insert(0) += 1;
        }

        let mut anomalies = Vec::new();
        for message in collect_wave_anomalies(&results, &sections, final_strength, section_count)
        {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                wave,
                message,
            );
        }
        for anomaly in anomaly_records.iter().filter(|record| record.wave == wave) {
            emit_log(
                "warn",
                "anomaly_detected",
                &match_id,
                Some(wave),
                json!({ "message": anomaly.message }),
            );
        }

        let line = WaveResultLine {
            wave,
            seed,
            booster,
            successes: results.iter().filter(|result| result.success).count(),
            results,
            sections,
            score,
            final_strength,
            participation_trend,
            anomalies,
        };
        emit_log(
            "info",
            "wave_finished",
            &match_id,
            Some(wave),
            json!({
                "score": line.score,
                "successes": line.successes,
                "finalStrength": line.final_strength,
            }),
        );
        match serde_json::to_string(&line) {
            Ok(text) => println!("{text}"),
            Err(error) => emit_log(
                "error",
                "wave_line_serialize_failed",
                &match_id,
                Some(wave),
                json!({ "error": error.to_string() }),
            ),
        }
        wave_lines.push(line);
    }

    let summary = build_run_summary(
        match_id.clone(),
        run_started_at_ms,
        now_ms(),
        wave_lines,
        state_counts,
        anomaly_records.len(),
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &match_id,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        "info",
        "run_finished",
        &match_id,
        None,
        json!({
            "waveCount": summary.wave_count,
            "anomalyCount": summary.anomaly_count,
            "averageScore": summary.average_score,
            "stateCounts": summary.state_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if summary.anomaly_count > 0 {
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<WaveConfig, stadium_wave_server::error::WaveError> {
    match path {
        Some(path) => WaveConfig::from_file(path),
        None => Ok(WaveConfig::default()),
    }
}

fn collect_section_lines(events: &[WaveEvent]) -> Vec<SectionLine> {
    events
        .iter()
        .filter_map(|event| match event {
            WaveEvent::SectionCompleted {
                section_id,
                state,
                participation_rate,
                strength,
            } => Some(SectionLine {
                section_id: section_id.clone(),
                state: *state,
                participation_rate: *participation_rate,
                strength: *strength,
            }),
            _ => None,
        })
        .collect()
}

fn collect_wave_anomalies(
    results: &[SectionResult],
    sections: &[SectionLine],
    final_strength: f32,
    section_count: usize,
) -> Vec<String> {
    let mut anomalies = Vec::new();
    if !final_strength.is_finite() || !(0.0..=100.0).contains(&final_strength) {
        anomalies.push(format!("strength out of range: {final_strength}"));
    }
    if results.len() != section_count {
        anomalies.push(format!(
            "result count mismatch: {} of {section_count} sections",
            results.len()
        ));
    }
    for line in sections {
        if !(0.0..=100.0).contains(&line.strength) {
            anomalies.push(format!(
                "section {} left strength out of range: {}",
                line.section_id, line.strength
            ));
        }
        if !(0.0..=1.0).contains(&line.participation_rate) {
            anomalies.push(format!(
                "section {} participation out of range: {}",
                line.section_id, line.participation_rate
            ));
        }
    }
    anomalies
}

fn state_key(state: WaveState) -> &'static str {
    match state {
        WaveState::Success => "success",
        WaveState::Sputter => "sputter",
        WaveState::Death => "death",
    }
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    wave: u32,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        wave,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u64, timestamp_ms: u64) -> String {
    format!("wave-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    waves: Vec<WaveResultLine>,
    state_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
) -> RunSummary {
    let wave_count = waves.len();
    let average_score = if wave_count == 0 {
        0.0
    } else {
        waves.iter().map(|wave| wave.score as f64).sum::<f64>() / wave_count as f64
    };
    RunSummary {
        match_id,
        generated_at_iso: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        started_at_ms,
        finished_at_ms,
        wave_count,
        anomaly_count,
        average_score,
        state_counts,
        waves,
    }
}

fn emit_log(level: &str, event: &str, match_id: &str, wave: Option<u32>, details: Value) {
    let log_line = StructuredLogLine {
        timestamp_ms: now_ms(),
        level: level.to_string(),
        event: event.to_string(),
        match_id: match_id.to_string(),
        wave,
        details,
    };
    match serde_json::to_string(&log_line) {
        Ok(text) => eprintln!("{text}"),
        Err(error) => eprintln!("[simulate] failed to serialize log line {event}: {error}"),
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
    std::fs::write(path, summary_text)
}
