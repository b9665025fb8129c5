use std::fmt;

use serde::{Deserialize, Serialize};

use crate::content::MessageContent;
use crate::payload::{CouncilMetadata, Stage1Response, Stage2Ranking, Stage3Synthesis};
use crate::stage::{Stage, StageStatus};

/// Backend-assigned conversation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-side identifier for one turn, assigned by the conversation store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(pub u64);

impl TurnId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// In-flight flags for the three stages of an assistant turn. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageLoading {
    pub stage1: bool,
    pub stage2: bool,
    pub stage3: bool,
}

impl StageLoading {
    pub fn get(&self, stage: Stage) -> bool {
        match stage {
            Stage::Individual => self.stage1,
            Stage::Ranking => self.stage2,
            Stage::Synthesis => self.stage3,
        }
    }

    pub fn set(&mut self, stage: Stage, loading: bool) {
        match stage {
            Stage::Individual => self.stage1 = loading,
            Stage::Ranking => self.stage2 = loading,
            Stage::Synthesis => self.stage3 = loading,
        }
    }

    pub fn any(&self) -> bool {
        self.stage1 || self.stage2 || self.stage3
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTurn {
    #[serde(skip)]
    pub id: TurnId,
    pub content: MessageContent,
}

/// Assistant turn filled in stage by stage by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantTurn {
    #[serde(skip)]
    pub id: TurnId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage1: Option<Vec<Stage1Response>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage2: Option<Vec<Stage2Ranking>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage3: Option<Stage3Synthesis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CouncilMetadata>,
    #[serde(skip)]
    pub loading: StageLoading,
    #[serde(skip)]
    pub error: Option<String>,
}

impl AssistantTurn {
    pub fn new(id: TurnId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn has_result(&self, stage: Stage) -> bool {
        match stage {
            Stage::Individual => self.stage1.is_some(),
            Stage::Ranking => self.stage2.is_some(),
            Stage::Synthesis => self.stage3.is_some(),
        }
    }

    /// Derives the state of one stage. A present result wins over a stale loading flag.
    pub fn stage_status(&self, stage: Stage) -> StageStatus {
        if self.has_result(stage) {
            StageStatus::Complete
        } else if self.loading.get(stage) {
            StageStatus::InFlight
        } else {
            StageStatus::Pending
        }
    }

    /// True once any stage has started or finished.
    pub fn has_stage_activity(&self) -> bool {
        Stage::ALL
            .iter()
            .any(|stage| self.stage_status(*stage) != StageStatus::Pending)
    }
}

/// One entry in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    User(UserTurn),
    Assistant(AssistantTurn),
}

impl Turn {
    pub fn id(&self) -> TurnId {
        match self {
            Self::User(turn) => turn.id,
            Self::Assistant(turn) => turn.id,
        }
    }

    pub(crate) fn set_id(&mut self, id: TurnId) {
        match self {
            Self::User(turn) => turn.id = id,
            Self::Assistant(turn) => turn.id = id,
        }
    }

    pub fn as_assistant(&self) -> Option<&AssistantTurn> {
        match self {
            Self::Assistant(turn) => Some(turn),
            Self::User(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub messages: Vec<Turn>,
}

impl Conversation {
    pub fn new(id: ConversationId) -> Self {
        Self {
            id,
            title: String::new(),
            created_at: String::new(),
            messages: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_assistant(&self) -> Option<&AssistantTurn> {
        self.messages.iter().rev().find_map(Turn::as_assistant)
    }

    pub(crate) fn last_assistant_mut(&mut self) -> Option<&mut AssistantTurn> {
        self.messages.iter_mut().rev().find_map(|turn| match turn {
            Turn::Assistant(assistant) => Some(assistant),
            Turn::User(_) => None,
        })
    }
}

/// Sidebar entry as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_conversation() {
        let conversation: Conversation = serde_json::from_str(
            r#"{
                "id": "c-1",
                "created_at": "2026-01-02T03:04:05",
                "title": "Rust lifetimes",
                "messages": [
                    {"role": "user", "content": "why?"},
                    {"role": "assistant",
                     "stage1": [{"model": "openai/gpt-4o", "response": "because"}],
                     "stage2": [{"model": "openai/gpt-4o", "ranking": "1. Response A", "parsed_ranking": ["Response A"]}],
                     "stage3": {"model": "google/gemini", "response": "final"}}
                ]
            }"#,
        )
        .expect("parse conversation");

        assert_eq!(conversation.id, ConversationId::new("c-1"));
        assert_eq!(conversation.messages.len(), 2);
        let assistant = conversation.last_assistant().expect("assistant turn");
        for stage in Stage::ALL {
            assert_eq!(assistant.stage_status(stage), StageStatus::Complete);
        }
        assert!(assistant.metadata.is_none());
    }

    #[test]
    fn result_wins_over_loading_flag() {
        let mut turn = AssistantTurn::new(TurnId::new(2));
        assert!(!turn.has_stage_activity());

        turn.loading.set(Stage::Ranking, true);
        assert_eq!(turn.stage_status(Stage::Ranking), StageStatus::InFlight);
        assert_eq!(turn.stage_status(Stage::Individual), StageStatus::Pending);
        assert!(turn.has_stage_activity());

        turn.stage2 = Some(Vec::new());
        assert_eq!(turn.stage_status(Stage::Ranking), StageStatus::Complete);
    }

    #[test]
    fn loading_flags_are_not_serialized() {
        let mut turn = AssistantTurn::new(TurnId::new(1));
        turn.loading.stage1 = true;
        let json = serde_json::to_value(Turn::Assistant(turn)).expect("serialize");
        assert_eq!(json, serde_json::json!({"role": "assistant"}));
    }
}
