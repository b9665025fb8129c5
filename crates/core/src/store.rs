//! Conversation log observed by the view.
//!
//! The store is the only place turns are mutated. The view reads conversations
//! from it on every render and feeds it backend events as they arrive.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::content::MessageContent;
use crate::event::CouncilEvent;
use crate::stage::{Stage, StageKey, StageStatus, StageTransition, StageTransitionRejection};
use crate::turn::{AssistantTurn, Conversation, ConversationId, Turn, TurnId, UserTurn};

/// What applying one backend event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    TitleChanged(String),
    /// The send is over, successfully or not.
    Finished,
    /// The event had nothing to act on.
    Ignored,
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: HashMap<ConversationId, Conversation>,
    sending: HashSet<ConversationId>,
    next_turn_id: u64,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, conversation_id: &ConversationId) -> Option<&Conversation> {
        self.conversations.get(conversation_id)
    }

    /// True while a send for this conversation is outstanding.
    pub fn is_loading(&self, conversation_id: &ConversationId) -> bool {
        self.sending.contains(conversation_id)
    }

    /// Installs a conversation fetched from the backend, replacing any local copy.
    pub fn replace(&mut self, mut conversation: Conversation) {
        for turn in &mut conversation.messages {
            let id = self.alloc_turn_id();
            turn.set_id(id);
        }
        self.conversations
            .insert(conversation.id.clone(), conversation);
    }

    /// Optimistically appends the user turn and an empty assistant turn.
    ///
    /// Returns the assistant turn id, or `None` when the conversation is unknown.
    pub fn begin_send(
        &mut self,
        conversation_id: &ConversationId,
        content: MessageContent,
    ) -> Option<TurnId> {
        if !self.conversations.contains_key(conversation_id) {
            tracing::warn!(%conversation_id, "cannot send to an unknown conversation");
            return None;
        }

        let user_id = self.alloc_turn_id();
        let assistant_id = self.alloc_turn_id();
        let conversation = self.conversations.get_mut(conversation_id)?;

        conversation.messages.push(Turn::User(UserTurn {
            id: user_id,
            content,
        }));
        conversation
            .messages
            .push(Turn::Assistant(AssistantTurn::new(assistant_id)));
        self.sending.insert(conversation_id.clone());

        Some(assistant_id)
    }

    /// Applies one backend event to the conversation's latest assistant turn.
    ///
    /// Events that would reopen or overwrite a completed stage are rejected and
    /// leave the turn untouched.
    pub fn apply_event(
        &mut self,
        conversation_id: &ConversationId,
        event: CouncilEvent,
    ) -> Result<EventOutcome, StageTransitionRejection> {
        let Some(conversation) = self.conversations.get_mut(conversation_id) else {
            tracing::debug!(%conversation_id, "dropping event for an unloaded conversation");
            return Ok(EventOutcome::Ignored);
        };

        match event {
            CouncilEvent::TitleComplete { data } => {
                conversation.title = data.title.clone();
                Ok(EventOutcome::TitleChanged(data.title))
            }
            CouncilEvent::Complete => {
                self.sending.remove(conversation_id);
                Ok(EventOutcome::Finished)
            }
            CouncilEvent::Error { message } => {
                if let Some(turn) = conversation.last_assistant_mut() {
                    // Abandon: in-flight stages fall back to pending, results stay.
                    for stage in Stage::ALL {
                        turn.loading.set(stage, false);
                    }
                    turn.error = Some(message.clone());
                }
                tracing::warn!(%conversation_id, error = %message, "council run failed");
                self.sending.remove(conversation_id);
                Ok(EventOutcome::Finished)
            }
            stage_event => {
                let Some(turn) = conversation.last_assistant_mut() else {
                    tracing::warn!(%conversation_id, "stage event arrived without an assistant turn");
                    return Ok(EventOutcome::Ignored);
                };
                apply_stage_event(turn, stage_event)?;
                Ok(EventOutcome::Applied)
            }
        }
    }

    /// Per-stage state of every assistant turn in the conversation.
    pub fn stage_states(&self, conversation_id: &ConversationId) -> BTreeMap<StageKey, StageStatus> {
        let Some(conversation) = self.conversations.get(conversation_id) else {
            return BTreeMap::new();
        };

        conversation
            .messages
            .iter()
            .filter_map(Turn::as_assistant)
            .flat_map(|turn| {
                Stage::ALL
                    .into_iter()
                    .map(move |stage| (StageKey::new(turn.id, stage), turn.stage_status(stage)))
            })
            .collect()
    }

    fn alloc_turn_id(&mut self) -> TurnId {
        self.next_turn_id = self.next_turn_id.saturating_add(1);
        TurnId::new(self.next_turn_id)
    }
}

fn apply_stage_event(
    turn: &mut AssistantTurn,
    event: CouncilEvent,
) -> Result<(), StageTransitionRejection> {
    let Some(stage) = event.stage() else {
        return Ok(());
    };
    let transition = match event {
        CouncilEvent::Stage1Start | CouncilEvent::Stage2Start | CouncilEvent::Stage3Start => {
            StageTransition::Start
        }
        _ => StageTransition::Complete,
    };

    // Validate first so a rejected event never mutates the turn.
    turn.stage_status(stage).apply(stage, transition)?;

    match event {
        CouncilEvent::Stage1Start | CouncilEvent::Stage2Start | CouncilEvent::Stage3Start => {
            turn.loading.set(stage, true);
        }
        CouncilEvent::Stage1Complete { data } => {
            turn.stage1 = Some(data);
            turn.loading.set(stage, false);
        }
        CouncilEvent::Stage2Complete { data, metadata } => {
            turn.stage2 = Some(data);
            turn.metadata = metadata;
            turn.loading.set(stage, false);
        }
        CouncilEvent::Stage3Complete { data } => {
            turn.stage3 = Some(data);
            turn.loading.set(stage, false);
        }
        CouncilEvent::TitleComplete { .. } | CouncilEvent::Complete | CouncilEvent::Error { .. } => {}
    }

    Ok(())
}
