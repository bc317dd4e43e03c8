//! Attachment codec for text-only stores.
//!
//! # Responsibility
//! - Encode an in-memory `Attachment` as a self-describing data URL.
//! - Decode data URLs (ours and plain browser-produced ones) back into
//!   attachments.
//!
//! # Invariants
//! - `decode_attachment(encode_attachment(a), _)` reproduces `bytes`,
//!   `mime_type` and `filename` exactly.
//! - The fallback filename is used only when no `name=` parameter exists.
//!
//! Format: `data:<mime>;name=<percent-encoded filename>;base64,<payload>`.
//! A mime type that is not a plain token is percent-encoded as well.

use crate::model::document::Attachment;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DATA_URL_PREFIX: &str = "data:";
const BASE64_MARKER: &str = "base64";
const NAME_PARAM_PREFIX: &str = "name=";

/// Attachment encode/decode failure.
///
/// Callers treat this as loss of one attachment, never of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    MissingDataPrefix,
    MissingPayloadSeparator,
    UnsupportedEncoding,
    InvalidBase64(String),
    InvalidParameter(String),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDataPrefix => write!(f, "encoded attachment must start with `data:`"),
            Self::MissingPayloadSeparator => {
                write!(f, "encoded attachment has no `,` payload separator")
            }
            Self::UnsupportedEncoding => {
                write!(f, "encoded attachment must use base64 payload encoding")
            }
            Self::InvalidBase64(message) => write!(f, "invalid base64 payload: {message}"),
            Self::InvalidParameter(value) => {
                write!(f, "invalid encoded attachment parameter `{value}`")
            }
        }
    }
}

impl Error for CodecError {}

/// Encodes an attachment into its textual store form.
pub fn encode_attachment(attachment: &Attachment) -> String {
    let mime = if is_plain_mime(&attachment.mime_type) {
        attachment.mime_type.clone()
    } else {
        urlencoding::encode(&attachment.mime_type).into_owned()
    };
    let name = urlencoding::encode(&attachment.filename);
    let payload = STANDARD.encode(&attachment.bytes);

    format!("{DATA_URL_PREFIX}{mime};{NAME_PARAM_PREFIX}{name};{BASE64_MARKER},{payload}")
}

/// Decodes the textual store form back into an attachment.
///
/// # Errors
/// - Returns `CodecError` for anything that is not a base64 data URL with
///   a decodable payload and well-formed parameters.
pub fn decode_attachment(encoded: &str, fallback_filename: &str) -> Result<Attachment, CodecError> {
    let rest = encoded
        .trim()
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or(CodecError::MissingDataPrefix)?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or(CodecError::MissingPayloadSeparator)?;

    let mut params: Vec<&str> = header.split(';').collect();
    match params.pop() {
        Some(marker) if marker.eq_ignore_ascii_case(BASE64_MARKER) => {}
        _ => return Err(CodecError::UnsupportedEncoding),
    }

    let mut params = params.into_iter();
    let mut mime_type = match params.next() {
        Some(raw) => percent_decode(raw)?,
        None => String::new(),
    };
    let mut filename = None;
    for param in params {
        if let Some(raw_name) = param.strip_prefix(NAME_PARAM_PREFIX) {
            filename = Some(percent_decode(raw_name)?);
        } else {
            // Foreign parameters such as `charset=` belong to the media type.
            mime_type.push(';');
            mime_type.push_str(param);
        }
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|err| CodecError::InvalidBase64(err.to_string()))?;

    Ok(Attachment {
        bytes,
        mime_type,
        filename: filename.unwrap_or_else(|| fallback_filename.to_string()),
    })
}

fn percent_decode(raw: &str) -> Result<String, CodecError> {
    urlencoding::decode(raw)
        .map(|value| value.into_owned())
        .map_err(|_| CodecError::InvalidParameter(raw.to_string()))
}

fn is_plain_mime(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/+-.!#$&^_".contains(c))
}

#[cfg(test)]
mod tests {
    use super::{decode_attachment, encode_attachment, CodecError};
    use crate::model::document::Attachment;

    #[test]
    fn encode_produces_data_url_with_name() {
        let attachment = Attachment::new(b"abc".to_vec(), "image/png", "my plot.png");
        let encoded = encode_attachment(&attachment);
        assert_eq!(encoded, "data:image/png;name=my%20plot.png;base64,YWJj");
    }

    #[test]
    fn decode_restores_bytes_mime_and_embedded_name() {
        let attachment = Attachment::new(vec![0, 255, 10, 13, 44], "image/jpeg", "a;b,c.jpg");
        let decoded = decode_attachment(&encode_attachment(&attachment), "fallback.png")
            .expect("round trip should decode");
        assert_eq!(decoded, attachment);
    }

    #[test]
    fn mime_with_parameters_survives_round_trip() {
        let attachment = Attachment::new(b"x".to_vec(), "text/plain;charset=utf-8", "n.txt");
        let decoded = decode_attachment(&encode_attachment(&attachment), "f")
            .expect("round trip should decode");
        assert_eq!(decoded.mime_type, "text/plain;charset=utf-8");
    }

    #[test]
    fn empty_payload_and_mime_round_trip() {
        let attachment = Attachment::new(Vec::new(), "", "");
        let decoded = decode_attachment(&encode_attachment(&attachment), "unused")
            .expect("round trip should decode");
        assert_eq!(decoded, attachment);
    }

    #[test]
    fn browser_data_url_uses_fallback_filename() {
        let decoded = decode_attachment("data:image/png;base64,YWJj", "restored_image.png")
            .expect("plain data url should decode");
        assert_eq!(decoded.bytes, b"abc");
        assert_eq!(decoded.mime_type, "image/png");
        assert_eq!(decoded.filename, "restored_image.png");
    }

    #[test]
    fn malformed_inputs_fail_with_codec_error() {
        assert_eq!(
            decode_attachment("image/png;base64,YWJj", "f").unwrap_err(),
            CodecError::MissingDataPrefix
        );
        assert_eq!(
            decode_attachment("data:image/png;base64", "f").unwrap_err(),
            CodecError::MissingPayloadSeparator
        );
        assert_eq!(
            decode_attachment("data:image/png,abc", "f").unwrap_err(),
            CodecError::UnsupportedEncoding
        );
        assert!(matches!(
            decode_attachment("data:image/png;base64,@@not-base64@@", "f").unwrap_err(),
            CodecError::InvalidBase64(_)
        ));
    }
}
