use council_core::{ConversationId, ConversationSummary};
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    list::ListItem,
    v_flex,
};

use crate::chat::events::{ConversationSelected, NewConversationRequested};

pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

/// Conversations known to the backend, newest first.
pub struct ConversationSidebar {
    conversations: Vec<ConversationSummary>,
    selected_conversation: Option<ConversationId>,
}

impl EventEmitter<ConversationSelected> for ConversationSidebar {}
impl EventEmitter<NewConversationRequested> for ConversationSidebar {}

impl ConversationSidebar {
    pub fn new(_cx: &mut Context<Self>) -> Self {
        Self {
            conversations: Vec::new(),
            selected_conversation: None,
        }
    }

    pub fn set_conversations(
        &mut self,
        mut conversations: Vec<ConversationSummary>,
        cx: &mut Context<Self>,
    ) {
        conversations.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        self.conversations = conversations;
        cx.notify();
    }

    pub fn select_conversation(&mut self, conversation_id: ConversationId, cx: &mut Context<Self>) {
        self.selected_conversation = Some(conversation_id.clone());
        cx.emit(ConversationSelected { conversation_id });
        cx.notify();
    }

    fn render_toolbar(&mut self, cx: &mut Context<Self>) -> impl IntoElement {
        h_flex()
            .w_full()
            .min_w_0()
            .justify_between()
            .items_center()
            .px_3()
            .pt(px(8.))
            .pb_2()
            .child(Label::new("LLM Council").text_sm())
            .child(
                Button::new("new-conversation")
                    .small()
                    .primary()
                    .icon(IconName::Plus)
                    .child("New")
                    .on_click(cx.listener(|_, _, _window, cx| {
                        cx.emit(NewConversationRequested);
                    })),
            )
    }

    fn render_empty_state(&mut self, cx: &mut Context<Self>) -> AnyElement {
        let theme = cx.theme();

        v_flex()
            .flex_1()
            .items_center()
            .justify_center()
            .px_4()
            .child(
                Label::new("No conversations yet")
                    .text_sm()
                    .text_color(theme.foreground.opacity(0.55)),
            )
            .into_any_element()
    }

    fn render_conversation_list(&mut self, cx: &mut Context<Self>) -> AnyElement {
        if self.conversations.is_empty() {
            return self.render_empty_state(cx);
        }

        let theme = cx.theme();
        let muted = theme.foreground.opacity(0.5);
        let selected = self.selected_conversation.clone();

        v_flex()
            .id("conversation-list")
            .flex_1()
            .min_h_0()
            .px_2()
            .gap_1()
            .overflow_y_scroll()
            .children(
                self.conversations
                    .iter()
                    .enumerate()
                    .map(|(index, conversation)| {
                        let conversation_id = conversation.id.clone();
                        let is_selected = selected.as_ref() == Some(&conversation.id);
                        let title = if conversation.title.trim().is_empty() {
                            DEFAULT_CONVERSATION_TITLE.to_string()
                        } else {
                            conversation.title.clone()
                        };

                        ListItem::new(("conversation", index))
                            .w_full()
                            .px_3()
                            .py_2()
                            .rounded_md()
                            .selected(is_selected)
                            .on_click(cx.listener(move |this, _event: &ClickEvent, _window, cx| {
                                this.select_conversation(conversation_id.clone(), cx);
                            }))
                            .child(
                                v_flex()
                                    .w_full()
                                    .min_w_0()
                                    .child(div().truncate().child(Label::new(title).text_sm()))
                                    .child(
                                        Label::new(message_count_label(conversation.message_count))
                                            .text_xs()
                                            .text_color(muted),
                                    ),
                            )
                    }),
            )
            .into_any_element()
    }
}

fn message_count_label(count: usize) -> String {
    if count == 1 {
        "1 message".to_string()
    } else {
        format!("{count} messages")
    }
}

impl Render for ConversationSidebar {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .size_full()
            .min_w_0()
            .overflow_hidden()
            .bg(theme.background)
            .child(self.render_toolbar(cx))
            .child(self.render_conversation_list(cx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_count_is_pluralized() {
        assert_eq!(message_count_label(0), "0 messages");
        assert_eq!(message_count_label(1), "1 message");
        assert_eq!(message_count_label(4), "4 messages");
    }
}
