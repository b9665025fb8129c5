use std::collections::HashMap;
use std::rc::Rc;

use council_core::{
    ContentBlock, ConversationPlan, MarkdownFlavor, Stage, StageBlock, StageKey, TurnId, TurnPlan,
};
use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{ActiveTheme, h_flex, label::Label, v_flex};

use crate::chat::images::InlineImages;
use crate::chat::view::ConversationView;
use crate::stages::{self, TabSelectHandler, stage2::RankingInput};

const USER_BUBBLE_MAX_WIDTH: Pixels = px(540.);
const INLINE_IMAGE_MAX_WIDTH: Pixels = px(320.);

/// View state the plan renderer needs besides the plan itself.
pub(crate) struct ListState<'a> {
    pub images: &'a mut InlineImages,
    pub tab_selection: &'a HashMap<StageKey, usize>,
    pub view: WeakEntity<ConversationView>,
}

impl ListState<'_> {
    fn tab_handler(&self, key: StageKey) -> TabSelectHandler {
        let view = self.view.clone();
        Rc::new(move |index, _window, cx| {
            let _ = view.update(cx, |view, cx| view.select_tab(key, index, cx));
        })
    }

    fn selected_tab(&self, key: StageKey) -> usize {
        self.tab_selection.get(&key).copied().unwrap_or(0)
    }
}

pub(crate) fn render_plan(
    plan: &ConversationPlan<'_>,
    state: &mut ListState<'_>,
    cx: &App,
) -> AnyElement {
    match plan {
        ConversationPlan::NoConversation => render_placeholder(
            "Welcome to LLM Council",
            "Create a new conversation to get started",
            cx,
        ),
        ConversationPlan::Empty { .. } => render_placeholder(
            "Start a conversation",
            "Ask a question to consult the LLM Council",
            cx,
        ),
        ConversationPlan::Turns {
            turns, consulting, ..
        } => v_flex()
            .w_full()
            .gap_6()
            .children(turns.iter().map(|(turn_id, turn)| match turn {
                TurnPlan::User(blocks) => render_user_turn(*turn_id, blocks, state, cx),
                TurnPlan::Assistant(blocks) => render_assistant_turn(*turn_id, blocks, state, cx),
            }))
            .when(*consulting, |column| column.child(render_consulting(cx)))
            .into_any_element(),
    }
}

fn render_placeholder(title: &'static str, hint: &'static str, cx: &App) -> AnyElement {
    let theme = cx.theme();

    v_flex()
        .size_full()
        .items_center()
        .justify_center()
        .gap_2()
        .child(Label::new(title).text_lg())
        .child(
            Label::new(hint)
                .text_sm()
                .text_color(theme.foreground.opacity(0.55)),
        )
        .into_any_element()
}

fn render_user_turn(
    turn_id: TurnId,
    blocks: &[ContentBlock<'_>],
    state: &mut ListState<'_>,
    cx: &App,
) -> AnyElement {
    let theme = cx.theme();

    let content = blocks.iter().enumerate().map(|(index, block)| match block {
        ContentBlock::Markdown(block) => match block.flavor {
            MarkdownFlavor::GitHub => stages::markdown(
                ElementId::Name(SharedString::from(format!("user-{}-{index}", turn_id.0))),
                block.text.to_string(),
            ),
        },
        ContentBlock::Image { url } => match state.images.get(url) {
            Some(image) => img(image)
                .max_w(INLINE_IMAGE_MAX_WIDTH)
                .rounded_md()
                .into_any_element(),
            None => Label::new("[image unavailable]").text_xs().into_any_element(),
        },
    });

    v_flex()
        .w_full()
        .items_end()
        .gap_1()
        .child(
            Label::new("You")
                .text_xs()
                .text_color(theme.foreground.opacity(0.5)),
        )
        .child(
            v_flex()
                .max_w(USER_BUBBLE_MAX_WIDTH)
                .gap_2()
                .px(px(14.))
                .py(px(10.))
                .rounded_lg()
                .bg(theme.accent)
                .text_color(theme.accent_foreground)
                .children(content.collect::<Vec<_>>()),
        )
        .into_any_element()
}

fn render_assistant_turn(
    turn_id: TurnId,
    blocks: &[StageBlock<'_>],
    state: &mut ListState<'_>,
    cx: &App,
) -> AnyElement {
    let theme = cx.theme();

    let content = blocks
        .iter()
        .map(|block| render_stage_block(turn_id, block, state, cx))
        .collect::<Vec<_>>();

    v_flex()
        .w_full()
        .gap_3()
        .child(
            Label::new("LLM Council")
                .text_xs()
                .text_color(theme.foreground.opacity(0.5)),
        )
        .children(content)
        .into_any_element()
}

fn render_stage_block(
    turn_id: TurnId,
    block: &StageBlock<'_>,
    state: &mut ListState<'_>,
    cx: &App,
) -> AnyElement {
    match *block {
        StageBlock::Progress { label, .. } => render_progress(label, cx),
        StageBlock::Individual(responses) => {
            let key = StageKey::new(turn_id, Stage::Individual);
            stages::stage1::render(
                turn_id,
                responses,
                state.selected_tab(key),
                state.tab_handler(key),
                cx,
            )
        }
        StageBlock::Ranking {
            rankings,
            label_to_model,
            aggregate_rankings,
        } => {
            let key = StageKey::new(turn_id, Stage::Ranking);
            stages::stage2::render(
                RankingInput {
                    turn_id,
                    rankings,
                    label_to_model,
                    aggregate_rankings,
                },
                state.selected_tab(key),
                state.tab_handler(key),
                cx,
            )
        }
        StageBlock::Synthesis(synthesis) => stages::stage3::render(turn_id, synthesis, cx),
        StageBlock::Error(message) => {
            let theme = cx.theme();
            Label::new(format!("Error: {message}"))
                .text_sm()
                .text_color(theme.danger)
                .into_any_element()
        }
    }
}

fn render_progress(label: &'static str, cx: &App) -> AnyElement {
    let theme = cx.theme();

    h_flex()
        .w_full()
        .gap_2()
        .items_center()
        .p_3()
        .rounded_lg()
        .bg(theme.muted)
        .child(div().size(px(8.)).rounded_full().bg(theme.primary))
        .child(
            Label::new(label)
                .text_sm()
                .text_color(theme.foreground.opacity(0.65)),
        )
        .into_any_element()
}

fn render_consulting(cx: &App) -> AnyElement {
    render_progress("Consulting the council...", cx)
}
