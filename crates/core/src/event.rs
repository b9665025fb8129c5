use serde::{Deserialize, Serialize};

use crate::payload::{CouncilMetadata, Stage1Response, Stage2Ranking, Stage3Synthesis};
use crate::stage::Stage;

/// Progress event streamed by the backend for the turn being answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouncilEvent {
    Stage1Start,
    Stage1Complete {
        data: Vec<Stage1Response>,
    },
    Stage2Start,
    Stage2Complete {
        data: Vec<Stage2Ranking>,
        #[serde(default)]
        metadata: Option<CouncilMetadata>,
    },
    Stage3Start,
    Stage3Complete {
        data: Stage3Synthesis,
    },
    TitleComplete {
        data: TitleData,
    },
    Complete,
    Error {
        #[serde(default)]
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleData {
    pub title: String,
}

impl CouncilEvent {
    /// The stage this event moves, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage1Start | Self::Stage1Complete { .. } => Some(Stage::Individual),
            Self::Stage2Start | Self::Stage2Complete { .. } => Some(Stage::Ranking),
            Self::Stage3Start | Self::Stage3Complete { .. } => Some(Stage::Synthesis),
            Self::TitleComplete { .. } | Self::Complete | Self::Error { .. } => None,
        }
    }

    /// True for events after which the backend sends nothing more.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error { .. })
    }
}
