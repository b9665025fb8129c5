#![deny(unsafe_code)]

//! Client-side model for the council chat surface.
//!
//! Holds everything the desktop view needs that is not drawing: message
//! content, staged image attachments, per-stage progress of assistant turns,
//! the observed conversation log and the render plan derived from it.

/// Image staging before submission.
pub mod attachments;
/// Draft text, staged images and submit-time packaging.
pub mod composer;
/// Message content shapes shared with the backend.
pub mod content;
pub mod data_url;
/// Backend events that drive stage progress.
pub mod event;
pub mod payload;
/// Display plan derived from a conversation.
pub mod render;
pub mod stage;
pub mod store;
pub mod turn;

pub use attachments::{
    AttachmentError, AttachmentPipeline, AttachmentResult, FileHandle, PathFile,
};
pub use composer::{Composer, ComposerNotice, KeyOutcome, KeyPress, MessageSink, SubmitKey};
pub use content::{ContentPart, MessageContent, StagedImage, build_outgoing_content};
pub use data_url::DataUrlError;
pub use event::{CouncilEvent, TitleData};
pub use payload::{
    AggregateRanking, CouncilMetadata, Stage1Response, Stage2Ranking, Stage3Synthesis,
    deanonymize, short_model_name,
};
pub use render::{
    ContentBlock, ConversationPlan, MarkdownBlock, MarkdownFlavor, StageBlock, TurnPlan,
    plan_conversation,
};
pub use stage::{Stage, StageKey, StageStatus, StageTransition, StageTransitionRejection};
pub use store::{ConversationStore, EventOutcome};
pub use turn::{
    AssistantTurn, Conversation, ConversationId, ConversationSummary, StageLoading, Turn, TurnId,
    UserTurn,
};
