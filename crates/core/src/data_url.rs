//! Data URL encoding for staged images.

use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD};
use snafu::{OptionExt, ResultExt, Snafu};

const DATA_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DataUrlError {
    #[snafu(display("value is not a data URL on `{stage}`"))]
    NotDataUrl { stage: &'static str },
    #[snafu(display("data URL is not base64 encoded on `{stage}`"))]
    NotBase64 { stage: &'static str },
    #[snafu(display("data URL payload failed to decode on `{stage}`: {source}"))]
    DecodePayload {
        stage: &'static str,
        source: base64::DecodeError,
    },
}

/// Guesses the MIME type from a file name, falling back to `application/octet-stream`.
pub fn mime_type_for(name: impl AsRef<Path>) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Encodes raw bytes as `data:<mime>;base64,<payload>`.
pub fn encode(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

/// Splits a base64 data URL into its MIME type and decoded bytes.
pub fn decode(url: &str) -> Result<(String, Vec<u8>), DataUrlError> {
    let rest = url
        .strip_prefix(DATA_SCHEME)
        .context(NotDataUrlSnafu {
            stage: "strip-scheme",
        })?;
    let (header, payload) = rest.split_once(',').context(NotDataUrlSnafu {
        stage: "split-header",
    })?;
    let mime_type = header.strip_suffix(BASE64_MARKER).context(NotBase64Snafu {
        stage: "strip-base64-marker",
    })?;

    let bytes = STANDARD.decode(payload.trim()).context(DecodePayloadSnafu {
        stage: "decode-payload",
    })?;

    Ok((mime_type.to_string(), bytes))
}
