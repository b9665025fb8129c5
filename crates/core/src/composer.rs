use tokio::sync::mpsc::UnboundedSender;

use crate::attachments::{AttachmentPipeline, AttachmentResult, FileHandle};
use crate::content::{MessageContent, StagedImage, build_outgoing_content};

/// Receives submitted messages. Dispatch is fire-and-forget.
pub trait MessageSink {
    fn dispatch(&self, content: MessageContent);
}

impl MessageSink for UnboundedSender<MessageContent> {
    fn dispatch(&self, content: MessageContent) {
        if self.send(content).is_err() {
            tracing::warn!("message receiver is gone; submitted content dropped");
        }
    }
}

/// User-facing notices raised by the composer, drained by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerNotice {
    AttachmentLoadFailed { file_count: usize },
}

impl ComposerNotice {
    pub fn message(&self) -> &'static str {
        match self {
            Self::AttachmentLoadFailed { .. } => "Failed to load images. Please try again.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitKey {
    Enter,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: SubmitKey,
    pub shift: bool,
}

impl KeyPress {
    pub const fn enter(shift: bool) -> Self {
        Self {
            key: SubmitKey::Enter,
            shift,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Submit and suppress the key's default newline.
    Submit,
    InsertLineBreak,
    Passthrough,
}

/// Draft state of the message input: text, staged images and pending notices.
#[derive(Debug, Default)]
pub struct Composer {
    text: String,
    text_before_edit: Option<String>,
    attachments: AttachmentPipeline,
    notices: Vec<ComposerNotice>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrors the input's value. The previous value is kept until the next edit.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text != self.text {
            self.text_before_edit = Some(std::mem::replace(&mut self.text, text));
        }
    }

    /// Restores the draft from before the last edit if that edit only inserted a
    /// line break, wherever the cursor was.
    pub fn revert_line_break(&mut self) -> bool {
        let Some(before) = self.text_before_edit.take() else {
            return false;
        };
        if !inserted_line_break(&before, &self.text) {
            return false;
        }

        self.text = before;
        true
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn staged_images(&self) -> &[StagedImage] {
        self.attachments.staged()
    }

    pub fn remove_image(&mut self, index: usize) -> Option<StagedImage> {
        self.attachments.remove_image(index)
    }

    /// Converts and stages a file selection.
    ///
    /// A failed batch stages nothing and records one notice.
    pub async fn select_files<F>(&mut self, files: &[F]) -> usize
    where
        F: FileHandle,
    {
        let batch = AttachmentPipeline::load_batch(files).await;
        self.finish_batch(files.len(), batch)
    }

    /// Applies a batch converted elsewhere; returns how many images were staged.
    pub fn finish_batch(
        &mut self,
        file_count: usize,
        batch: AttachmentResult<Vec<StagedImage>>,
    ) -> usize {
        match batch {
            Ok(images) => {
                let added = images.len();
                self.attachments.append(images);
                added
            }
            Err(error) => {
                tracing::warn!(file_count, error = %error, "image selection failed");
                self.notices
                    .push(ComposerNotice::AttachmentLoadFailed { file_count });
                0
            }
        }
    }

    pub fn take_notices(&mut self) -> Vec<ComposerNotice> {
        std::mem::take(&mut self.notices)
    }

    pub fn can_submit(&self, is_loading: bool) -> bool {
        !is_loading && (!self.text.trim().is_empty() || !self.attachments.is_empty())
    }

    /// Packages the draft, hands it to `sink` and resets the draft.
    ///
    /// Returns `false` without touching anything when submission is not allowed.
    /// The reset does not wait on the sink's eventual outcome.
    pub fn submit<S>(&mut self, sink: &S, is_loading: bool) -> bool
    where
        S: MessageSink + ?Sized,
    {
        if !self.can_submit(is_loading) {
            return false;
        }

        let content = build_outgoing_content(&self.text, self.attachments.staged());
        tracing::debug!(image_count = content.image_count(), "submitting message");
        sink.dispatch(content);

        self.text.clear();
        self.text_before_edit = None;
        self.attachments.clear();
        true
    }

    pub fn handle_key(&self, press: KeyPress) -> KeyOutcome {
        match press {
            KeyPress {
                key: SubmitKey::Enter,
                shift: false,
            } => KeyOutcome::Submit,
            KeyPress {
                key: SubmitKey::Enter,
                shift: true,
            } => KeyOutcome::InsertLineBreak,
            KeyPress {
                key: SubmitKey::Other,
                ..
            } => KeyOutcome::Passthrough,
        }
    }
}

fn inserted_line_break(before: &str, after: &str) -> bool {
    let (before, after) = (before.as_bytes(), after.as_bytes());
    let prefix = before
        .iter()
        .zip(after)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = before[prefix..]
        .iter()
        .rev()
        .zip(after[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let inserted = &after[prefix..after.len() - suffix];
    inserted.first() == Some(&b'\n') && inserted.iter().all(u8::is_ascii_whitespace)
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::attachments::tests::ScriptedFile;
    use crate::content::ContentPart;
    use crate::data_url;

    #[tokio::test(start_paused = true)]
    async fn select_remove_type_and_submit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut composer = Composer::new();

        let staged = composer
            .select_files(&[
                ScriptedFile::ok("a.png", b"A", 30),
                ScriptedFile::ok("b.png", b"B", 10),
            ])
            .await;
        assert_eq!(staged, 2);

        composer.remove_image(0);
        composer.set_text("hello");
        assert!(composer.submit(&tx, false));

        let sent = rx.try_recv().expect("content dispatched");
        assert_eq!(
            sent,
            MessageContent::Multimodal(vec![
                ContentPart::text("hello"),
                ContentPart::image(data_url::encode(b"B", "image/png")),
            ])
        );
        assert_eq!(composer.text(), "");
        assert!(composer.staged_images().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_selection_raises_exactly_one_notice() {
        let mut composer = Composer::new();
        let staged = composer
            .select_files(&[
                ScriptedFile::failing("x.png", 5),
                ScriptedFile::failing("y.png", 10),
                ScriptedFile::ok("z.png", b"Z", 1),
            ])
            .await;

        assert_eq!(staged, 0);
        assert!(composer.staged_images().is_empty());
        assert_eq!(
            composer.take_notices(),
            vec![ComposerNotice::AttachmentLoadFailed { file_count: 3 }]
        );
        assert!(composer.take_notices().is_empty());
    }

    #[test]
    fn submit_is_guarded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut composer = Composer::new();

        composer.set_text("   \n");
        assert!(!composer.can_submit(false));
        assert!(!composer.submit(&tx, false));

        composer.set_text("question");
        assert!(!composer.submit(&tx, true));
        assert_eq!(composer.text(), "question");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn plain_text_submit_sends_untrimmed_text() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut composer = Composer::new();
        composer.set_text(" spaced ");

        assert!(composer.submit(&tx, false));
        assert_eq!(
            rx.try_recv().expect("dispatched"),
            MessageContent::PlainText(" spaced ".to_string())
        );
    }

    #[test]
    fn reset_does_not_depend_on_the_receiver() {
        let (tx, rx) = mpsc::unbounded_channel::<MessageContent>();
        drop(rx);
        let mut composer = Composer::new();
        composer.set_text("lost");

        assert!(composer.submit(&tx, false));
        assert_eq!(composer.text(), "");
    }

    #[test]
    fn images_alone_can_be_submitted() {
        let mut composer = Composer::new();
        composer.finish_batch(
            1,
            Ok(vec![StagedImage::new("data:image/png;base64,AA", "a.png")]),
        );
        assert!(composer.can_submit(false));
        assert!(!composer.can_submit(true));
    }

    #[test]
    fn enter_submits_and_shift_enter_breaks_line() {
        let composer = Composer::new();
        assert_eq!(composer.handle_key(KeyPress::enter(false)), KeyOutcome::Submit);
        assert_eq!(
            composer.handle_key(KeyPress::enter(true)),
            KeyOutcome::InsertLineBreak
        );
        assert_eq!(
            composer.handle_key(KeyPress {
                key: SubmitKey::Other,
                shift: true,
            }),
            KeyOutcome::Passthrough
        );
    }

    #[test]
    fn enter_mid_text_submits_the_draft_without_the_break() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut composer = Composer::new();
        composer.set_text("hello");
        composer.set_text("hel\nlo");

        assert!(composer.revert_line_break());
        assert_eq!(composer.text(), "hello");
        assert!(composer.submit(&tx, false));
        assert_eq!(
            rx.try_recv().expect("dispatched"),
            MessageContent::PlainText("hello".to_string())
        );
    }

    #[test]
    fn indented_break_is_reverted_once() {
        let mut composer = Composer::new();
        composer.set_text("  a");
        composer.set_text("  a\n  ");

        assert!(composer.revert_line_break());
        assert_eq!(composer.text(), "  a");
        assert!(!composer.revert_line_break());
        assert_eq!(composer.text(), "  a");
    }

    #[test]
    fn ordinary_edits_are_not_reverted() {
        let mut composer = Composer::new();
        composer.set_text("hell");
        composer.set_text("hello");

        assert!(!composer.revert_line_break());
        assert_eq!(composer.text(), "hello");

        composer.set_text("hello\nworld");
        composer.set_text("hello\nworld!");
        assert!(!composer.revert_line_break());
        assert_eq!(composer.text(), "hello\nworld!");
    }
}
