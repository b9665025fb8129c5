use council_core::{Stage, Stage3Synthesis, TurnId, short_model_name};
use gpui::*;
use gpui_component::{ActiveTheme, label::Label, v_flex};

use super::{markdown, stage_card};

pub fn render(turn_id: TurnId, synthesis: &Stage3Synthesis, cx: &App) -> AnyElement {
    let theme = cx.theme();

    let body = v_flex()
        .w_full()
        .gap_2()
        .child(
            Label::new(format!("Chairman: {}", short_model_name(&synthesis.model)))
                .text_xs()
                .text_color(theme.muted_foreground),
        )
        .child(markdown(
            ElementId::Name(SharedString::from(format!("stage3-{}-answer", turn_id.0))),
            synthesis.response.clone(),
        ));

    stage_card(Stage::Synthesis.title(), body, cx)
}
