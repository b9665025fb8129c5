//! Per-stage progress of an assistant turn.
//!
//! Each of the three council stages is tracked on its own. A stage never gates
//! another; the backend is merely expected to run them in order.

use snafu::Snafu;

use crate::turn::TurnId;

/// One of the three council processing phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Individual,
    Ranking,
    Synthesis,
}

impl Stage {
    /// Stages in display order.
    pub const ALL: [Stage; 3] = [Stage::Individual, Stage::Ranking, Stage::Synthesis];

    pub const fn number(self) -> u8 {
        match self {
            Self::Individual => 1,
            Self::Ranking => 2,
            Self::Synthesis => 3,
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::Individual => "Stage 1: Individual Responses",
            Self::Ranking => "Stage 2: Peer Rankings",
            Self::Synthesis => "Stage 3: Final Council Answer",
        }
    }

    /// Label shown while the stage is in flight.
    pub const fn progress_label(self) -> &'static str {
        match self {
            Self::Individual => "Running Stage 1: Collecting individual responses...",
            Self::Ranking => "Running Stage 2: Peer rankings...",
            Self::Synthesis => "Running Stage 3: Final synthesis...",
        }
    }
}

/// Lifecycle of one stage of one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StageStatus {
    /// Not started, or skipped by the backend.
    #[default]
    Pending,
    InFlight,
    Complete,
}

/// Addresses one stage of one assistant turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageKey {
    pub turn: TurnId,
    pub stage: Stage,
}

impl StageKey {
    pub const fn new(turn: TurnId, stage: Stage) -> Self {
        Self { turn, stage }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageTransition {
    Start,
    Complete,
    /// The run ended without a result; an in-flight stage falls back to pending.
    Abandon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum StageTransitionRejection {
    #[snafu(display("{} already has a result", stage.title()))]
    AlreadyComplete { stage: Stage },
}

impl StageStatus {
    /// Applies one transition. A completed stage never changes again.
    pub fn apply(
        self,
        stage: Stage,
        transition: StageTransition,
    ) -> Result<Self, StageTransitionRejection> {
        match (self, transition) {
            (Self::Complete, StageTransition::Start | StageTransition::Complete) => {
                Err(StageTransitionRejection::AlreadyComplete { stage })
            }
            (Self::Complete, StageTransition::Abandon) => Ok(Self::Complete),
            (Self::Pending | Self::InFlight, StageTransition::Start) => Ok(Self::InFlight),
            (Self::Pending | Self::InFlight, StageTransition::Complete) => Ok(Self::Complete),
            (Self::Pending | Self::InFlight, StageTransition::Abandon) => Ok(Self::Pending),
        }
    }
}
