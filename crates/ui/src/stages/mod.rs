use std::rc::Rc;

use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    text::TextView,
    v_flex,
};

pub mod stage1;
pub mod stage2;
pub mod stage3;

/// Invoked with the index of the tab the user picked.
pub type TabSelectHandler = Rc<dyn Fn(usize, &mut Window, &mut App)>;

pub(crate) fn markdown(id: impl Into<ElementId>, text: impl Into<SharedString>) -> AnyElement {
    TextView::markdown(id, text).selectable(true).into_any_element()
}

/// Card framing one stage, titled like "Stage 1: Individual Responses".
pub(crate) fn stage_card(title: &'static str, body: impl IntoElement, cx: &App) -> AnyElement {
    let theme = cx.theme();

    v_flex()
        .w_full()
        .gap_3()
        .p_4()
        .rounded_lg()
        .border_1()
        .border_color(theme.border)
        .bg(theme.background)
        .child(
            Label::new(title)
                .text_sm()
                .text_color(theme.foreground.opacity(0.75)),
        )
        .child(body)
        .into_any_element()
}

pub(crate) fn render_tabs(
    id_prefix: &str,
    labels: Vec<String>,
    selected: usize,
    on_select: TabSelectHandler,
) -> AnyElement {
    h_flex()
        .w_full()
        .gap_1()
        .flex_wrap()
        .children(labels.into_iter().enumerate().map(|(index, label)| {
            let on_select = on_select.clone();
            Button::new(ElementId::Name(SharedString::from(format!(
                "{id_prefix}-tab-{index}"
            ))))
            .small()
            .when(index == selected, |button| button.primary())
            .when(index != selected, |button| button.ghost())
            .child(label)
            .on_click(move |_, window, cx| on_select(index, window, cx))
        }))
        .into_any_element()
}

/// Keeps a remembered tab index inside the current tab count.
pub(crate) fn clamp_tab(selected: usize, len: usize) -> usize {
    selected.min(len.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_index_is_clamped() {
        assert_eq!(clamp_tab(0, 0), 0);
        assert_eq!(clamp_tab(5, 3), 2);
        assert_eq!(clamp_tab(1, 3), 1);
    }
}
