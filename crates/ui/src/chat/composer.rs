use std::path::{Path, PathBuf};

use council_core::{
    AttachmentError, AttachmentPipeline, Composer, KeyOutcome, KeyPress, MessageContent, PathFile,
    data_url,
};
use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, Disableable, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
    label::Label,
    v_flex,
};
use gpui_tokio_bridge::Tokio;
use tokio::sync::mpsc::UnboundedSender;

use crate::chat::events::UserNotice;
use crate::chat::images::InlineImages;

const THUMBNAIL_SIZE: Pixels = px(64.);

/// Message input with image attachments. Submitted content goes to `sink`.
pub struct ComposerView {
    composer: Composer,
    input_state: Entity<InputState>,
    sink: UnboundedSender<MessageContent>,
    is_loading: bool,
    pending_newline: bool,
    images: InlineImages,
}

impl EventEmitter<UserNotice> for ComposerView {}

impl ComposerView {
    pub fn new(
        sink: UnboundedSender<MessageContent>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let input_state = cx.new(|cx| {
            InputState::new(window, cx)
                .placeholder("Ask your question... (Shift+Enter for new line, Enter to send)")
                .auto_grow(3, 10)
        });

        cx.subscribe_in(
            &input_state,
            window,
            |this, _, event: &InputEvent, window, cx| {
                this.composer
                    .set_text(this.input_state.read(cx).value().to_string());

                if let InputEvent::PressEnter { secondary } = event {
                    if *secondary {
                        this.pending_newline = false;
                        return;
                    }

                    if this.pending_newline {
                        // Shift+Enter already inserted the newline; swallow the enter that follows.
                        this.pending_newline = false;
                    } else {
                        this.submit_on_enter(window, cx);
                    }
                }
                cx.notify();
            },
        )
        .detach();

        Self {
            composer: Composer::new(),
            input_state,
            sink,
            is_loading: false,
            pending_newline: false,
            images: InlineImages::default(),
        }
    }

    pub fn set_loading(&mut self, loading: bool, cx: &mut Context<Self>) {
        self.is_loading = loading;
        if !loading {
            self.pending_newline = false;
        }
        cx.notify();
    }

    fn handle_key_down(&mut self, event: &KeyDownEvent, window: &mut Window, cx: &mut Context<Self>) {
        if event.keystroke.key != "enter" {
            return;
        }

        let press = KeyPress::enter(event.keystroke.modifiers.shift);
        if self.composer.handle_key(press) == KeyOutcome::InsertLineBreak && !self.is_loading {
            self.pending_newline = true;
            self.input_state.update(cx, |state, cx| {
                state.insert("\n", window, cx);
            });
            cx.notify();
        }
    }

    /// The input has already applied the enter as a line break by the time it
    /// reports it, so the draft is restored before submitting.
    fn submit_on_enter(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        if self.composer.revert_line_break() {
            let draft = self.composer.text().to_string();
            self.input_state.update(cx, |state, cx| {
                state.set_value(draft, window, cx);
            });
        }
        self.handle_submit(window, cx);
    }

    fn handle_submit(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        if !self.composer.submit(&self.sink, self.is_loading) {
            return;
        }

        self.input_state.update(cx, |state, cx| {
            state.set_value("", window, cx);
        });
        self.pending_newline = false;
        self.images.clear();
        cx.notify();
    }

    fn open_file_picker(&mut self, cx: &mut Context<Self>) {
        let paths = cx.prompt_for_paths(PathPromptOptions {
            files: true,
            directories: false,
            multiple: true,
            prompt: Some("Attach".into()),
        });

        cx.spawn(async move |this, cx| {
            let paths = match paths.await {
                Ok(Ok(Some(paths))) => paths,
                Ok(Ok(None)) | Err(_) => return,
                Ok(Err(error)) => {
                    tracing::warn!(error = %error, "file picker failed");
                    return;
                }
            };

            let _ = this.update(cx, |this, cx| this.load_paths(paths, cx));
        })
        .detach();
    }

    fn load_paths(&mut self, paths: Vec<PathBuf>, cx: &mut Context<Self>) {
        let files = paths
            .into_iter()
            .filter(|path| is_image_path(path))
            .map(PathFile::new)
            .collect::<Vec<_>>();
        if files.is_empty() {
            tracing::debug!("no image files in selection");
            return;
        }

        let file_count = files.len();
        let load = Tokio::spawn(cx, async move { AttachmentPipeline::load_batch(&files).await });

        cx.spawn(async move |this, cx| {
            let batch = load.await.unwrap_or_else(|error| {
                Err(AttachmentError::Interrupted {
                    stage: "join-image-batch",
                    details: error.to_string(),
                })
            });

            let _ = this.update(cx, |this, cx| {
                this.composer.finish_batch(file_count, batch);
                for notice in this.composer.take_notices() {
                    cx.emit(UserNotice::Composer(notice));
                }
                cx.notify();
            });
        })
        .detach();
    }

    fn remove_image(&mut self, index: usize, cx: &mut Context<Self>) {
        self.composer.remove_image(index);
        cx.notify();
    }

    fn render_staged_images(&mut self, cx: &mut Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let border = theme.border;
        let muted = theme.muted;
        let staged = self.composer.staged_images().to_vec();

        h_flex()
            .id("composer-staged-images")
            .w_full()
            .gap_2()
            .flex_wrap()
            .children(staged.into_iter().enumerate().map(|(index, image)| {
                let thumbnail = match self.images.get(&image.data_url) {
                    Some(decoded) => img(decoded)
                        .size(THUMBNAIL_SIZE)
                        .object_fit(ObjectFit::Cover)
                        .into_any_element(),
                    None => Label::new(image.name.clone()).text_xs().into_any_element(),
                };

                div()
                    .relative()
                    .size(THUMBNAIL_SIZE)
                    .rounded_md()
                    .overflow_hidden()
                    .border_1()
                    .border_color(border)
                    .bg(muted)
                    .child(thumbnail)
                    .child(
                        div().absolute().top_0().right_0().child(
                            Button::new(("remove-staged-image", index))
                                .ghost()
                                .xsmall()
                                .icon(IconName::Close)
                                .on_click(cx.listener(move |this, _, _window, cx| {
                                    this.remove_image(index, cx);
                                })),
                        ),
                    )
            }))
            .into_any_element()
    }
}

fn is_image_path(path: &Path) -> bool {
    data_url::mime_type_for(path).starts_with("image/")
}

impl Render for ComposerView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let is_loading = self.is_loading;
        let can_submit = self.composer.can_submit(is_loading);
        let has_images = !self.composer.staged_images().is_empty();
        let staged_images = has_images.then(|| self.render_staged_images(cx));
        let theme = cx.theme();

        v_flex()
            .bg(theme.background)
            .gap_2()
            .p_3()
            .when_some(staged_images, |column, images| column.child(images))
            .child(
                div()
                    .w_full()
                    .px_3()
                    .py_2()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.background)
                    .on_key_down(cx.listener(|this, event: &KeyDownEvent, window, cx| {
                        this.handle_key_down(event, window, cx);
                    }))
                    .child(Input::new(&self.input_state).w_full().disabled(is_loading)),
            )
            .child(
                h_flex()
                    .w_full()
                    .justify_between()
                    .child(
                        Button::new("attach-images")
                            .small()
                            .ghost()
                            .icon(IconName::Plus)
                            .child("Attach")
                            .disabled(is_loading)
                            .on_click(cx.listener(|this, _, _window, cx| {
                                this.open_file_picker(cx);
                            })),
                    )
                    .child(
                        Button::new("send")
                            .small()
                            .primary()
                            .icon(IconName::ArrowUp)
                            .child("Send")
                            .disabled(!can_submit)
                            .on_click(cx.listener(|this, _, window, cx| {
                                this.handle_submit(window, cx);
                            })),
                    ),
            )
    }
}
