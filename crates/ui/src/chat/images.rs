use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use council_core::data_url;
use gpui::{Image, ImageFormat};

/// Decoded data-URL images, so a frame never re-decodes base64.
#[derive(Default)]
pub(crate) struct InlineImages {
    decoded: HashMap<u64, Option<Arc<Image>>>,
}

impl InlineImages {
    pub(crate) fn get(&mut self, url: &str) -> Option<Arc<Image>> {
        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);

        self.decoded
            .entry(hasher.finish())
            .or_insert_with(|| decode(url))
            .clone()
    }

    pub(crate) fn clear(&mut self) {
        self.decoded.clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.decoded.len()
    }
}

fn decode(url: &str) -> Option<Arc<Image>> {
    let (mime_type, bytes) = match data_url::decode(url) {
        Ok(decoded) => decoded,
        Err(error) => {
            tracing::warn!(error = %error, "cannot display inline image");
            return None;
        }
    };

    let Some(format) = ImageFormat::from_mime_type(&mime_type) else {
        tracing::warn!(%mime_type, "unsupported inline image format");
        return None;
    };

    Some(Arc::new(Image::from_bytes(format, bytes)))
}
