use serde::{Deserialize, Serialize};

/// Outcome tier of a completed section or column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveState {
    Success,
    Sputter,
    Death,
}

impl WaveState {
    /// Tie-break priority for majority votes; lower wins.
    pub fn priority(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Sputter => 1,
            Self::Death => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoosterKind {
    Momentum,
    Recovery,
    Participation,
    None,
}

impl BoosterKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "momentum" => Some(Self::Momentum),
            "recovery" => Some(Self::Recovery),
            "participation" => Some(Self::Participation),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WavePhase {
    Idle,
    Countdown,
    Propagating,
    Complete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationTrend {
    Rising,
    Falling,
    Flat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcedFlags {
    pub sputter: bool,
    pub death: bool,
}

impl ForcedFlags {
    pub fn any(&self) -> bool {
        self.sputter || self.death
    }

    /// Forced death outranks forced sputter when both are set.
    pub fn forced_state(&self) -> Option<WaveState> {
        if self.death {
            Some(WaveState::Death)
        } else if self.sputter {
            Some(WaveState::Sputter)
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoosterSnapshot {
    pub kind: BoosterKind,
    pub multiplier: f32,
}

impl BoosterSnapshot {
    pub fn neutral() -> Self {
        Self {
            kind: BoosterKind::None,
            multiplier: 1.0,
        }
    }

    /// Multiplier to apply for an effect of `kind`, or neutral when another booster is active.
    pub fn multiplier_for(&self, kind: BoosterKind) -> f32 {
        if self.kind == kind {
            self.multiplier
        } else {
            1.0
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionResult {
    #[serde(rename = "sectionId")]
    pub section_id: String,
    pub success: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnOutcome {
    #[serde(rename = "columnIndex")]
    pub column_index: usize,
    #[serde(rename = "participationRate")]
    pub participation_rate: f32,
    pub state: WaveState,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnClassificationRecord {
    #[serde(rename = "sectionId")]
    pub section_id: String,
    #[serde(rename = "columnIndex")]
    pub column_index: usize,
    #[serde(rename = "participationRate")]
    pub participation_rate: f32,
    pub state: WaveState,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WaveEvent {
    WaveStarted {
        strength: f32,
        #[serde(rename = "countdownMs")]
        countdown_ms: u64,
    },
    CountdownFinished,
    SectionBegins {
        #[serde(rename = "sectionId")]
        section_id: String,
        strength: f32,
    },
    ForcedOverrideConsumed {
        #[serde(rename = "sectionId")]
        section_id: String,
        forced: ForcedFlags,
    },
    SectionCompleted {
        #[serde(rename = "sectionId")]
        section_id: String,
        state: WaveState,
        #[serde(rename = "participationRate")]
        participation_rate: f32,
        strength: f32,
    },
    BoosterApplied {
        kind: BoosterKind,
        multiplier: f32,
    },
    BoosterCleared,
    WaveCompleted {
        results: Vec<SectionResult>,
        score: i32,
        strength: f32,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct WaveSnapshot {
    pub phase: WavePhase,
    pub active: bool,
    #[serde(rename = "countdownMs")]
    pub countdown_ms: f64,
    #[serde(rename = "currentSectionIndex")]
    pub current_section_index: usize,
    pub strength: f32,
    pub score: i32,
    pub multiplier: f32,
    pub results: Vec<SectionResult>,
    #[serde(rename = "lastSectionState")]
    pub last_section_state: Option<WaveState>,
    pub booster: BoosterSnapshot,
    pub forced: ForcedFlags,
    #[serde(rename = "consecutiveFailures")]
    pub consecutive_failures: u32,
    #[serde(rename = "sputterActive")]
    pub sputter_active: bool,
    #[serde(rename = "sectionsSucceededTotal")]
    pub sections_succeeded_total: u64,
    #[serde(rename = "wavesCompleted")]
    pub waves_completed: u64,
    #[serde(rename = "participationTrend")]
    pub participation_trend: ParticipationTrend,
    #[serde(rename = "recentColumns")]
    pub recent_columns: Vec<ColumnClassificationRecord>,
}
