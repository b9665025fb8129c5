use serde::{Deserialize, Serialize};

/// One atomic unit of a multimodal message. Order within a message is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    #[serde(rename = "image_url")]
    Image {
        #[serde(rename = "image_url", with = "image_url_wire")]
        url: String,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates an image part. `url` is expected to be a self-contained data URL.
    pub fn image(url: impl Into<String>) -> Self {
        Self::Image { url: url.into() }
    }
}

/// Content of a user turn.
///
/// Serialized as a bare string for plain text and as an array of typed parts
/// otherwise, which is the shape the council backend accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    PlainText(String),
    Multimodal(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenated text of the message, ignoring image parts.
    pub fn text(&self) -> String {
        match self {
            Self::PlainText(text) => text.clone(),
            Self::Multimodal(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn image_count(&self) -> usize {
        match self {
            Self::PlainText(_) => 0,
            Self::Multimodal(parts) => parts
                .iter()
                .filter(|part| matches!(part, ContentPart::Image { .. }))
                .count(),
        }
    }
}

impl From<String> for MessageContent {
    fn from(value: String) -> Self {
        Self::PlainText(value)
    }
}

impl From<&str> for MessageContent {
    fn from(value: &str) -> Self {
        Self::PlainText(value.to_string())
    }
}

/// An image selected by the user but not yet submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedImage {
    pub data_url: String,
    pub name: String,
}

impl StagedImage {
    pub fn new(data_url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            data_url: data_url.into(),
            name: name.into(),
        }
    }
}

/// Packages draft text and staged images into the content sent to the backend.
///
/// Without images the result is always plain text, even when `text` is empty;
/// callers must not submit when both the trimmed text and `staged_images` are empty.
/// With images, a leading text part carrying the untrimmed `text` is added only when
/// the trimmed text is non-empty, followed by one image part per staged image in order.
pub fn build_outgoing_content(text: &str, staged_images: &[StagedImage]) -> MessageContent {
    if staged_images.is_empty() {
        return MessageContent::PlainText(text.to_string());
    }

    let mut parts = Vec::with_capacity(staged_images.len() + 1);
    if !text.trim().is_empty() {
        parts.push(ContentPart::text(text));
    }
    parts.extend(
        staged_images
            .iter()
            .map(|image| ContentPart::image(image.data_url.clone())),
    );

    MessageContent::Multimodal(parts)
}

mod image_url_wire {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct ImageUrl<T> {
        url: T,
    }

    pub fn serialize<S>(url: &str, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ImageUrl { url }.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        ImageUrl::<String>::deserialize(deserializer).map(|wire| wire.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images(names: &[&str]) -> Vec<StagedImage> {
        names
            .iter()
            .map(|name| StagedImage::new(format!("data:image/png;base64,{name}"), *name))
            .collect()
    }

    #[test]
    fn no_images_yields_plain_text_verbatim() {
        for text in ["", "   ", "hello", "  padded \n"] {
            assert_eq!(
                build_outgoing_content(text, &[]),
                MessageContent::PlainText(text.to_string())
            );
        }
    }

    #[test]
    fn text_with_images_leads_with_untrimmed_text() {
        let staged = images(&["a", "b", "c"]);
        let content = build_outgoing_content("  look at these \n", &staged);

        let MessageContent::Multimodal(parts) = content else {
            panic!("expected multimodal content");
        };
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], ContentPart::text("  look at these \n"));
        for (part, image) in parts[1..].iter().zip(&staged) {
            assert_eq!(part, &ContentPart::image(image.data_url.clone()));
        }
    }

    #[test]
    fn blank_text_with_images_has_only_image_parts() {
        let staged = images(&["first", "second"]);
        for text in ["", " \t\n "] {
            let content = build_outgoing_content(text, &staged);
            assert_eq!(
                content,
                MessageContent::Multimodal(vec![
                    ContentPart::image("data:image/png;base64,first"),
                    ContentPart::image("data:image/png;base64,second"),
                ])
            );
        }
    }

    #[test]
    fn multimodal_wire_shape_matches_backend() {
        let content = MessageContent::Multimodal(vec![
            ContentPart::text("hi"),
            ContentPart::image("data:image/png;base64,AAAA"),
        ]);

        let json = serde_json::to_value(&content).expect("serialize content");
        assert_eq!(
            json,
            serde_json::json!([
                {"type": "text", "text": "hi"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}},
            ])
        );

        let plain = serde_json::to_value(MessageContent::from("plain")).expect("serialize");
        assert_eq!(plain, serde_json::json!("plain"));
    }

    #[test]
    fn parses_both_content_shapes() {
        let plain: MessageContent = serde_json::from_str("\"hello\"").expect("plain");
        assert_eq!(plain, MessageContent::PlainText("hello".to_string()));

        let parts: MessageContent = serde_json::from_str(
            r#"[{"type":"image_url","image_url":{"url":"data:image/gif;base64,R0"}},{"type":"text","text":"after"}]"#,
        )
        .expect("parts");
        assert_eq!(
            parts,
            MessageContent::Multimodal(vec![
                ContentPart::image("data:image/gif;base64,R0"),
                ContentPart::text("after"),
            ])
        );
        assert_eq!(parts.image_count(), 1);
        assert_eq!(parts.text(), "after");
    }
}
