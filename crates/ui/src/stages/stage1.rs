use council_core::{Stage, Stage1Response, TurnId, short_model_name};
use gpui::*;
use gpui_component::{ActiveTheme, label::Label, v_flex};

use super::{TabSelectHandler, clamp_tab, markdown, render_tabs, stage_card};

/// One tab per council member, showing that member's full answer.
pub fn render(
    turn_id: TurnId,
    responses: &[Stage1Response],
    selected: usize,
    on_select: TabSelectHandler,
    cx: &App,
) -> AnyElement {
    let theme = cx.theme();
    let id_prefix = format!("stage1-{}", turn_id.0);

    let body = match responses.get(clamp_tab(selected, responses.len())) {
        Some(active) => v_flex()
            .w_full()
            .gap_3()
            .child(render_tabs(
                &id_prefix,
                responses
                    .iter()
                    .map(|response| short_model_name(&response.model).to_string())
                    .collect(),
                clamp_tab(selected, responses.len()),
                on_select,
            ))
            .child(
                Label::new(active.model.clone())
                    .text_xs()
                    .text_color(theme.muted_foreground),
            )
            .child(markdown(
                ElementId::Name(SharedString::from(format!("{id_prefix}-response"))),
                active.response.clone(),
            ))
            .into_any_element(),
        None => Label::new("No responses were collected.")
            .text_sm()
            .text_color(theme.muted_foreground)
            .into_any_element(),
    };

    stage_card(Stage::Individual.title(), body, cx)
}
