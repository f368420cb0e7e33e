//! Raw content as submitted by a user, before canonicalization.

use bytes::Bytes;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CanonicalizeError;

/// MIME type recorded for text submissions.
pub const TEXT_CONTENT_TYPE: &str = "text/plain";

/// Which canonicalization path a piece of content takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Text => f.write_str("text"),
            ContentKind::Image => f.write_str("image"),
        }
    }
}

/// User-supplied content.
#[derive(Clone, PartialEq, Eq)]
pub enum ContentInput {
    /// A text document.
    Text(String),

    /// An encoded raster image. `content_type` is the sniffed or declared
    /// MIME type of the source container.
    Image { bytes: Bytes, content_type: String },
}

impl ContentInput {
    /// Wrap a text document.
    pub fn text(text: impl Into<String>) -> Self {
        ContentInput::Text(text.into())
    }

    /// Classify raw bytes by sniffing their signature.
    ///
    /// Recognized image containers become [`ContentInput::Image`]. Anything
    /// else must be valid UTF-8 and becomes [`ContentInput::Text`].
    ///
    /// Some signatures are only two printable bytes ("BM", "P1"), so UTF-8
    /// input that carries one but does not decode as that image is text.
    pub fn from_bytes(bytes: Bytes) -> Result<Self, CanonicalizeError> {
        if let Ok(format) = image::guess_format(&bytes) {
            if let Ok(text) = std::str::from_utf8(&bytes) {
                if image::load_from_memory_with_format(&bytes, format).is_err() {
                    return Ok(ContentInput::Text(text.to_string()));
                }
            }
            return Ok(ContentInput::Image {
                content_type: format.to_mime_type().to_string(),
                bytes,
            });
        }

        String::from_utf8(bytes.to_vec())
            .map(ContentInput::Text)
            .map_err(|_| CanonicalizeError::Decode("content is neither an image nor UTF-8 text".into()))
    }

    /// Classify raw bytes by a declared MIME type.
    ///
    /// `image/*` takes the image path; every other type is read as UTF-8 text.
    pub fn with_content_type(bytes: Bytes, content_type: &str) -> Result<Self, CanonicalizeError> {
        if content_type.starts_with("image/") {
            return Ok(ContentInput::Image {
                bytes,
                content_type: content_type.to_string(),
            });
        }

        String::from_utf8(bytes.to_vec())
            .map(ContentInput::Text)
            .map_err(|e| CanonicalizeError::Decode(format!("text is not valid UTF-8: {}", e)))
    }

    /// Which canonicalization path applies.
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentInput::Text(_) => ContentKind::Text,
            ContentInput::Image { .. } => ContentKind::Image,
        }
    }

    /// MIME type recorded in proof metadata.
    pub fn content_type(&self) -> &str {
        match self {
            ContentInput::Text(_) => TEXT_CONTENT_TYPE,
            ContentInput::Image { content_type, .. } => content_type,
        }
    }

    /// The text, if this is a text submission.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentInput::Text(text) => Some(text),
            ContentInput::Image { .. } => None,
        }
    }

    /// Guess the image container from a file extension.
    pub fn image_type_for_extension(ext: &str) -> Option<&'static str> {
        ImageFormat::from_extension(ext).map(|f| f.to_mime_type())
    }
}

impl fmt::Debug for ContentInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentInput::Text(text) => write!(f, "Text({} chars)", text.chars().count()),
            ContentInput::Image { bytes, content_type } => {
                write!(f, "Image({}, {} bytes)", content_type, bytes.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];

    #[test]
    fn test_sniffs_png_signature() {
        let input = ContentInput::from_bytes(Bytes::from_static(PNG_SIGNATURE)).unwrap();
        assert_eq!(input.kind(), ContentKind::Image);
        assert_eq!(input.content_type(), "image/png");
    }

    #[test]
    fn test_plain_utf8_is_text() {
        let input = ContentInput::from_bytes(Bytes::from_static("héllo".as_bytes())).unwrap();
        assert_eq!(input.kind(), ContentKind::Text);
        assert_eq!(input.content_type(), TEXT_CONTENT_TYPE);
        assert_eq!(input.as_text(), Some("héllo"));
    }

    #[test]
    fn test_text_starting_with_image_magic_is_text() {
        for text in ["BMI is a body mass index.", "P1 tickets first", "GIF89a was a good year"] {
            let input = ContentInput::from_bytes(Bytes::from(text)).unwrap();
            assert_eq!(input.kind(), ContentKind::Text, "{text}");
            assert_eq!(input.as_text(), Some(text));
        }
    }

    #[test]
    fn test_real_bmp_is_still_an_image() {
        let img = image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
        let mut bmp = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bmp), ImageFormat::Bmp).unwrap();

        let input = ContentInput::from_bytes(Bytes::from(bmp)).unwrap();
        assert_eq!(input.kind(), ContentKind::Image);
        assert_eq!(input.content_type(), "image/bmp");
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        let err = ContentInput::from_bytes(Bytes::from_static(&[0xff, 0xfe, 0x00, 0x80])).unwrap_err();
        assert!(matches!(err, CanonicalizeError::Decode(_)));
    }

    #[test]
    fn test_declared_content_type() {
        let image = ContentInput::with_content_type(Bytes::from_static(b"xx"), "image/jpeg").unwrap();
        assert_eq!(image.kind(), ContentKind::Image);
        assert_eq!(image.content_type(), "image/jpeg");

        let text = ContentInput::with_content_type(Bytes::from_static(b"# hi"), "text/markdown").unwrap();
        assert_eq!(text.kind(), ContentKind::Text);
        assert_eq!(text.content_type(), TEXT_CONTENT_TYPE);
    }

    #[test]
    fn test_extension_lookup() {
        assert_eq!(ContentInput::image_type_for_extension("png"), Some("image/png"));
        assert_eq!(ContentInput::image_type_for_extension("JPG"), Some("image/jpeg"));
        assert_eq!(ContentInput::image_type_for_extension("txt"), None);
    }

    #[test]
    fn test_debug_does_not_dump_content() {
        let debug = format!("{:?}", ContentInput::text("secret prompt"));
        assert_eq!(debug, "Text(13 chars)");
    }
}
