use council_core::{ComposerNotice, ConversationId};

/// Emitted when sidebar selection changes the active conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationSelected {
    pub conversation_id: ConversationId,
}

/// Emitted when the user asks for a fresh conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewConversationRequested;

/// Emitted when something needs to be shown as a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserNotice {
    Composer(ComposerNotice),
    Error(String),
}

impl UserNotice {
    pub fn message(&self) -> String {
        match self {
            Self::Composer(notice) => notice.message().to_string(),
            Self::Error(message) => message.clone(),
        }
    }

    /// Composer notices stay up until closed; backend errors fade on their own.
    pub fn needs_dismissal(&self) -> bool {
        matches!(self, Self::Composer(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_attachment_failures_wait_for_dismissal() {
        let attachment = UserNotice::Composer(ComposerNotice::AttachmentLoadFailed { file_count: 2 });
        assert!(attachment.needs_dismissal());
        assert_eq!(attachment.message(), "Failed to load images. Please try again.");

        assert!(!UserNotice::Error("backend unreachable".to_string()).needs_dismissal());
    }
}
