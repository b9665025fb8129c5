use std::path::PathBuf;
use std::sync::Arc;

use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::notification::{Notification, NotificationList};
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};

use crate::chat::{ConversationView, UserNotice};
use crate::settings::SettingsStore;

const SIDEBAR_WIDTH: Pixels = px(260.);

pub fn default_themes_path() -> PathBuf {
    PathBuf::from("./themes")
}

gpui::actions!(shell, [NewConversation, ToggleSidebar, Quit]);

/// Window root: conversation list beside the active conversation, with
/// notices stacked on top.
pub struct CouncilAppShell {
    conversation_view: Entity<ConversationView>,
    notification_list: Entity<NotificationList>,
    settings: Arc<SettingsStore>,
    show_sidebar: bool,
}

impl CouncilAppShell {
    pub fn new(
        notification_list: Entity<NotificationList>,
        settings: Arc<SettingsStore>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let conversation_view =
            cx.new(|cx| ConversationView::new(settings.clone(), window, cx));

        cx.subscribe_in(
            &conversation_view,
            window,
            |this, _, notice: &UserNotice, window, cx| {
                this.push_notice(notice, window, cx);
            },
        )
        .detach();

        Self {
            conversation_view,
            notification_list,
            settings,
            show_sidebar: true,
        }
    }

    fn push_notice(&mut self, notice: &UserNotice, window: &mut Window, cx: &mut Context<Self>) {
        let notification = Notification::error(notice.message()).autohide(!notice.needs_dismissal());
        self.notification_list.update(cx, |list, cx| {
            list.push(notification, window, cx);
        });
    }

    fn new_conversation(&mut self, cx: &mut Context<Self>) {
        self.conversation_view
            .update(cx, |view, cx| view.create_conversation(cx));
    }

    fn toggle_sidebar(&mut self, cx: &mut Context<Self>) {
        self.show_sidebar = !self.show_sidebar;
        cx.notify();
    }

    fn toggle_theme_mode(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let next = self.settings.settings().with_toggled_theme_mode();
        if let Err(error) = self.settings.update(next.clone()) {
            tracing::error!(error = %error, "failed to persist theme mode");
            self.push_notice(
                &UserNotice::Error(format!("Failed to save settings: {error}")),
                window,
                cx,
            );
        }
        next.apply_theme(Some(window), cx);
        cx.notify();
    }

    fn render_header(&self, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let backend_url = self.conversation_view.read(cx).backend_url().to_string();
        let sidebar_icon = if self.show_sidebar {
            IconName::PanelLeftClose
        } else {
            IconName::PanelLeftOpen
        };
        let theme_icon = if self.settings.settings().theme_mode.is_dark() {
            IconName::Sun
        } else {
            IconName::Moon
        };

        h_flex()
            .id("council-header")
            .w_full()
            .flex_shrink_0()
            .items_center()
            .gap_1()
            .px_3()
            .py_1()
            .border_b_1()
            .border_color(theme.border)
            .child(
                Button::new("toggle-sidebar")
                    .ghost()
                    .small()
                    .icon(sidebar_icon)
                    .on_click(cx.listener(|this, _, _window, cx| this.toggle_sidebar(cx))),
            )
            .when(!self.show_sidebar, |header| {
                header.child(
                    Button::new("header-new-conversation")
                        .ghost()
                        .small()
                        .icon(IconName::Plus)
                        .on_click(cx.listener(|this, _, _window, cx| this.new_conversation(cx))),
                )
            })
            .child(div().flex_1())
            .child(
                div()
                    .px_2()
                    .rounded_full()
                    .bg(theme.muted)
                    .text_xs()
                    .text_color(theme.muted_foreground)
                    .child(backend_url),
            )
            .child(
                Button::new("toggle-theme-mode")
                    .ghost()
                    .small()
                    .icon(theme_icon)
                    .on_click(cx.listener(|this, _, window, cx| this.toggle_theme_mode(window, cx))),
            )
    }
}

impl Render for CouncilAppShell {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let sidebar = self
            .show_sidebar
            .then(|| self.conversation_view.read(cx).sidebar().clone());

        let body = h_flex()
            .size_full()
            .on_action(cx.listener(|this, _: &NewConversation, _window, cx| {
                this.new_conversation(cx);
            }))
            .on_action(cx.listener(|this, _: &ToggleSidebar, _window, cx| {
                this.toggle_sidebar(cx);
            }))
            .when_some(sidebar, |row, sidebar| {
                row.child(
                    div()
                        .h_full()
                        .w(SIDEBAR_WIDTH)
                        .flex_shrink_0()
                        .border_r_1()
                        .border_color(theme.border)
                        .child(sidebar),
                )
            })
            .child(
                v_flex()
                    .flex_1()
                    .h_full()
                    .min_w_0()
                    .child(self.render_header(cx))
                    .child(
                        div()
                            .flex_1()
                            .min_h_0()
                            .overflow_hidden()
                            .child(self.conversation_view.clone()),
                    ),
            );

        div()
            .size_full()
            .relative()
            .bg(theme.background)
            .child(body)
            .child(self.notification_list.clone())
    }
}
