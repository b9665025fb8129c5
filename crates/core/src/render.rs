use std::collections::BTreeMap;

use crate::content::{ContentPart, MessageContent};
use crate::payload::{AggregateRanking, Stage1Response, Stage2Ranking, Stage3Synthesis};
use crate::stage::{Stage, StageStatus};
use crate::turn::{AssistantTurn, Conversation, Turn, TurnId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkdownFlavor {
    /// Tables, strikethrough and task lists enabled.
    GitHub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkdownBlock<'a> {
    pub text: &'a str,
    pub flavor: MarkdownFlavor,
}

impl<'a> MarkdownBlock<'a> {
    pub fn github(text: &'a str) -> Self {
        Self {
            text,
            flavor: MarkdownFlavor::GitHub,
        }
    }
}

/// One visual block of a user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentBlock<'a> {
    Markdown(MarkdownBlock<'a>),
    Image { url: &'a str },
}

/// One visual block of an assistant turn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageBlock<'a> {
    Progress {
        stage: Stage,
        label: &'static str,
    },
    Individual(&'a [Stage1Response]),
    Ranking {
        rankings: &'a [Stage2Ranking],
        label_to_model: Option<&'a BTreeMap<String, String>>,
        aggregate_rankings: &'a [AggregateRanking],
    },
    Synthesis(&'a Stage3Synthesis),
    Error(&'a str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnPlan<'a> {
    User(Vec<ContentBlock<'a>>),
    Assistant(Vec<StageBlock<'a>>),
}

/// Everything the conversation view draws, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationPlan<'a> {
    NoConversation,
    Empty {
        composer: bool,
    },
    Turns {
        turns: Vec<(TurnId, TurnPlan<'a>)>,
        /// A send is outstanding and the newest turn shows no stage yet.
        consulting: bool,
        composer: bool,
    },
}

impl ConversationPlan<'_> {
    pub fn shows_composer(&self) -> bool {
        match self {
            Self::NoConversation => false,
            Self::Empty { composer } | Self::Turns { composer, .. } => *composer,
        }
    }
}

/// Derives the display plan for the selected conversation.
///
/// The composer is offered only while the conversation has no turns.
pub fn plan_conversation(
    conversation: Option<&Conversation>,
    is_loading: bool,
) -> ConversationPlan<'_> {
    let Some(conversation) = conversation else {
        return ConversationPlan::NoConversation;
    };
    if conversation.is_empty() {
        return ConversationPlan::Empty { composer: true };
    }

    let turns = conversation
        .messages
        .iter()
        .map(|turn| (turn.id(), plan_turn(turn)))
        .collect();
    let stage_info_shown = conversation
        .messages
        .last()
        .and_then(Turn::as_assistant)
        .is_some_and(|turn| turn.has_stage_activity() || turn.error.is_some());

    ConversationPlan::Turns {
        turns,
        consulting: is_loading && !stage_info_shown,
        composer: false,
    }
}

pub fn plan_turn(turn: &Turn) -> TurnPlan<'_> {
    match turn {
        Turn::User(user) => TurnPlan::User(plan_content(&user.content)),
        Turn::Assistant(assistant) => TurnPlan::Assistant(plan_stages(assistant)),
    }
}

fn plan_content(content: &MessageContent) -> Vec<ContentBlock<'_>> {
    match content {
        MessageContent::PlainText(text) => vec![ContentBlock::Markdown(MarkdownBlock::github(text))],
        MessageContent::Multimodal(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => ContentBlock::Markdown(MarkdownBlock::github(text)),
                ContentPart::Image { url } => ContentBlock::Image { url },
            })
            .collect(),
    }
}

fn plan_stages(turn: &AssistantTurn) -> Vec<StageBlock<'_>> {
    let mut blocks = Vec::new();

    for stage in Stage::ALL {
        match turn.stage_status(stage) {
            StageStatus::Pending => {}
            StageStatus::InFlight => blocks.push(StageBlock::Progress {
                stage,
                label: stage.progress_label(),
            }),
            StageStatus::Complete => blocks.extend(completed_block(turn, stage)),
        }
    }

    if let Some(message) = &turn.error {
        blocks.push(StageBlock::Error(message));
    }

    blocks
}

fn completed_block(turn: &AssistantTurn, stage: Stage) -> Option<StageBlock<'_>> {
    match stage {
        Stage::Individual => turn.stage1.as_deref().map(StageBlock::Individual),
        Stage::Ranking => turn.stage2.as_deref().map(|rankings| {
            let metadata = turn.metadata.as_ref();
            StageBlock::Ranking {
                rankings,
                label_to_model: metadata.map(|metadata| &metadata.label_to_model),
                aggregate_rankings: metadata
                    .map(|metadata| metadata.aggregate_rankings.as_slice())
                    .unwrap_or_default(),
            }
        }),
        Stage::Synthesis => turn.stage3.as_ref().map(StageBlock::Synthesis),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::CouncilMetadata;
    use crate::turn::{ConversationId, UserTurn};

    fn conversation(messages: Vec<Turn>) -> Conversation {
        let mut conversation = Conversation::new(ConversationId::new("c"));
        conversation.messages = messages;
        conversation
    }

    fn assistant(build: impl FnOnce(&mut AssistantTurn)) -> Turn {
        let mut turn = AssistantTurn::new(TurnId::new(2));
        build(&mut turn);
        Turn::Assistant(turn)
    }

    fn user(content: MessageContent) -> Turn {
        Turn::User(UserTurn {
            id: TurnId::new(1),
            content,
        })
    }

    fn assistant_blocks<'a>(plan: &'a ConversationPlan<'a>) -> &'a [StageBlock<'a>] {
        let ConversationPlan::Turns { turns, .. } = plan else {
            panic!("expected turns");
        };
        match turns.last() {
            Some((_, TurnPlan::Assistant(blocks))) => blocks,
            _ => panic!("expected an assistant turn last"),
        }
    }

    #[test]
    fn no_conversation_and_empty_conversation_differ() {
        assert_eq!(plan_conversation(None, false), ConversationPlan::NoConversation);
        assert!(!ConversationPlan::NoConversation.shows_composer());

        let empty = conversation(Vec::new());
        let plan = plan_conversation(Some(&empty), false);
        assert_eq!(plan, ConversationPlan::Empty { composer: true });
        assert!(plan.shows_composer());
    }

    #[test]
    fn composer_disappears_once_a_turn_exists() {
        let one_turn = conversation(vec![user("hi".into())]);
        let plan = plan_conversation(Some(&one_turn), false);
        assert!(!plan.shows_composer());
    }

    #[test]
    fn user_content_renders_in_part_order() {
        let convo = conversation(vec![user(MessageContent::Multimodal(vec![
            ContentPart::image("data:image/png;base64,AA"),
            ContentPart::text("caption"),
        ]))]);
        let plan = plan_conversation(Some(&convo), false);
        let ConversationPlan::Turns { turns, .. } = plan else {
            panic!("expected turns");
        };
        assert_eq!(
            turns[0].1,
            TurnPlan::User(vec![
                ContentBlock::Image {
                    url: "data:image/png;base64,AA"
                },
                ContentBlock::Markdown(MarkdownBlock::github("caption")),
            ])
        );

        let plain = conversation(vec![user("**bold**".into())]);
        let ConversationPlan::Turns { turns, .. } = plan_conversation(Some(&plain), false) else {
            panic!("expected turns");
        };
        assert_eq!(
            turns[0].1,
            TurnPlan::User(vec![ContentBlock::Markdown(MarkdownBlock {
                text: "**bold**",
                flavor: MarkdownFlavor::GitHub,
            })])
        );
    }

    #[test]
    fn stage_one_in_flight_shows_only_its_progress() {
        let convo = conversation(vec![
            user("q".into()),
            assistant(|turn| turn.loading.stage1 = true),
        ]);
        let plan = plan_conversation(Some(&convo), true);
        assert_eq!(
            assistant_blocks(&plan),
            &[StageBlock::Progress {
                stage: Stage::Individual,
                label: "Running Stage 1: Collecting individual responses...",
            }]
        );
        let ConversationPlan::Turns { consulting, .. } = plan else {
            panic!("expected turns");
        };
        assert!(!consulting);
    }

    #[test]
    fn completed_stages_render_and_missing_stage_renders_nothing() {
        let responses = vec![Stage1Response {
            model: "openai/gpt-4o".to_string(),
            response: "a".to_string(),
        }];
        let rankings = vec![Stage2Ranking {
            model: "openai/gpt-4o".to_string(),
            ranking: "1. Response A".to_string(),
            parsed_ranking: vec!["Response A".to_string()],
        }];
        let metadata = CouncilMetadata {
            label_to_model: BTreeMap::from([(
                "Response A".to_string(),
                "openai/gpt-4o".to_string(),
            )]),
            aggregate_rankings: vec![AggregateRanking {
                model: "openai/gpt-4o".to_string(),
                average_rank: 1.0,
                rankings_count: 1,
            }],
        };

        let convo = conversation(vec![
            user("q".into()),
            assistant(|turn| {
                turn.stage1 = Some(responses.clone());
                turn.stage2 = Some(rankings.clone());
                turn.metadata = Some(metadata.clone());
            }),
        ]);
        let plan = plan_conversation(Some(&convo), false);
        assert_eq!(
            assistant_blocks(&plan),
            &[
                StageBlock::Individual(&responses),
                StageBlock::Ranking {
                    rankings: &rankings,
                    label_to_model: Some(&metadata.label_to_model),
                    aggregate_rankings: &metadata.aggregate_rankings,
                },
            ]
        );
    }

    #[test]
    fn stages_render_independently() {
        let convo = conversation(vec![
            user("q".into()),
            assistant(|turn| {
                turn.stage3 = Some(Stage3Synthesis {
                    model: "google/gemini".to_string(),
                    response: "final".to_string(),
                });
                turn.loading.stage2 = true;
            }),
        ]);
        let plan = plan_conversation(Some(&convo), true);
        let blocks = assistant_blocks(&plan);
        assert_eq!(blocks.len(), 2);
        assert!(matches!(
            blocks[0],
            StageBlock::Progress {
                stage: Stage::Ranking,
                ..
            }
        ));
        assert!(matches!(blocks[1], StageBlock::Synthesis(_)));
    }

    #[test]
    fn consulting_until_the_first_stage_starts() {
        let convo = conversation(vec![user("q".into()), assistant(|_| {})]);
        let ConversationPlan::Turns { consulting, .. } = plan_conversation(Some(&convo), true)
        else {
            panic!("expected turns");
        };
        assert!(consulting);

        let ConversationPlan::Turns { consulting, .. } = plan_conversation(Some(&convo), false)
        else {
            panic!("expected turns");
        };
        assert!(!consulting);
    }

    #[test]
    fn recorded_error_follows_finished_stages() {
        let convo = conversation(vec![
            user("q".into()),
            assistant(|turn| turn.error = Some("backend unavailable".to_string())),
        ]);
        let plan = plan_conversation(Some(&convo), false);
        assert_eq!(
            assistant_blocks(&plan),
            &[StageBlock::Error("backend unavailable")]
        );
    }
}
