//! Stage sequencing: the run state machine and per-stage timing capture.
//!
//! ```text
//! Fetching → Parsing → Optimizing → Analyzing → Delivering → Done
//!     └──────────┴──────────┴───────────┴───────────┴──────→ Failed
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// One step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetching,
    Parsing,
    Optimizing,
    Analyzing,
    Delivering,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Fetching,
        Stage::Parsing,
        Stage::Optimizing,
        Stage::Analyzing,
        Stage::Delivering,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::Optimizing => "optimizing",
            Self::Analyzing => "analyzing",
            Self::Delivering => "delivering",
        }
    }

    /// Whether the stage performs storage I/O.
    pub fn does_io(&self) -> bool {
        matches!(self, Self::Fetching | Self::Delivering)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a single run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PipelineState {
    #[default]
    Fetching,
    Parsing,
    Optimizing,
    Analyzing,
    Delivering,
    Done,
    Failed,
}

impl PipelineState {
    /// The state after the current stage succeeds. Terminal states are sticky.
    pub fn advance(self) -> Self {
        match self {
            Self::Fetching => Self::Parsing,
            Self::Parsing => Self::Optimizing,
            Self::Optimizing => Self::Analyzing,
            Self::Analyzing => Self::Delivering,
            Self::Delivering | Self::Done => Self::Done,
            Self::Failed => Self::Failed,
        }
    }

    /// The state after the current stage fails. `Done` stays `Done`.
    pub fn fail(self) -> Self {
        match self {
            Self::Done => Self::Done,
            _ => Self::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// The stage this state executes, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Fetching => Some(Stage::Fetching),
            Self::Parsing => Some(Stage::Parsing),
            Self::Optimizing => Some(Stage::Optimizing),
            Self::Analyzing => Some(Stage::Analyzing),
            Self::Delivering => Some(Stage::Delivering),
            Self::Done | Self::Failed => None,
        }
    }
}

/// Wall-clock record of one stage that ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    #[serde(rename = "stageName")]
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
}

/// Running clock for a stage; [`StageTimer::finish`] yields its [`StageTiming`].
#[derive(Debug)]
pub struct StageTimer {
    stage: Stage,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl StageTimer {
    pub fn start(stage: Stage) -> Self {
        Self {
            stage,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn finish(self) -> StageTiming {
        StageTiming {
            stage: self.stage,
            started_at: self.started_at,
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
        }
    }
}
