//! Content canonicalization.
//!
//! Reduces text and raster images to a byte sequence that is identical for
//! inputs differing only in incidental ways:
//!
//! - **Text**: surrounding whitespace, line-ending convention, trailing
//!   whitespace on each line, and runs of blank lines.
//! - **Images**: container format, compression settings and metadata
//!   (EXIF, timestamps). The pixel raster is kept exactly, at 8 bits per
//!   channel for 8-bit sources and 16 bits for deeper ones.
//!
//! Anything else (lossy recompression, cropping, resizing, rewording) changes
//! the output, and therefore the fingerprint.
//!
//! **This encoding is FROZEN.** Changing it changes every digest already
//! anchored on the ledger.

use bytes::Bytes;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder};

use crate::content::{ContentInput, ContentKind};
use crate::error::CanonicalizeError;

/// MIME type of every canonical image.
pub const CANONICAL_IMAGE_MIME: &str = "image/png";

/// Canonical bytes of a piece of content, ready for fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalContent {
    kind: ContentKind,
    bytes: Bytes,
}

impl CanonicalContent {
    /// Which canonicalization path produced these bytes.
    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// The canonical bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Consume and return the canonical bytes.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// Canonical text, if this came from the text path.
    pub fn as_text(&self) -> Option<&str> {
        match self.kind {
            ContentKind::Text => std::str::from_utf8(&self.bytes).ok(),
            ContentKind::Image => None,
        }
    }
}

/// Canonicalize any supported content.
pub fn canonicalize(input: &ContentInput) -> Result<CanonicalContent, CanonicalizeError> {
    match input {
        ContentInput::Text(text) => Ok(CanonicalContent {
            kind: ContentKind::Text,
            bytes: Bytes::from(canonicalize_text(text)),
        }),
        ContentInput::Image { bytes, .. } => Ok(CanonicalContent {
            kind: ContentKind::Image,
            bytes: Bytes::from(canonicalize_image(bytes)?),
        }),
    }
}

/// Unicode `White_Space` plus the byte-order mark.
fn is_space(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// Canonicalize a text document.
///
/// In order:
/// 1. trim whitespace from both ends of the document,
/// 2. convert `\r\n` and lone `\r` to `\n`,
/// 3. strip trailing whitespace from every line,
/// 4. collapse three or more consecutive newlines to exactly two, leaving at
///    most one blank line between paragraphs.
///
/// The result is idempotent: canonicalizing canonical text is a no-op.
pub fn canonicalize_text(text: &str) -> String {
    let trimmed = text.trim_matches(is_space);
    let unified = trimmed.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len());
    let mut blank_run = 0usize;

    for (i, line) in unified.split('\n').enumerate() {
        let line = line.trim_end_matches(is_space);

        if line.is_empty() {
            blank_run += 1;
            // A second consecutive blank line would be the third newline.
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }

        if i > 0 {
            out.push('\n');
        }
        out.push_str(line);
    }

    out
}

/// Canonicalize an encoded raster image.
///
/// Decodes the image at native resolution and re-encodes it as RGBA PNG with
/// fixed compression and filter settings. Rasters with at most 8 bits per
/// channel become 8-bit RGBA; deeper rasters become 16-bit RGBA, so their low
/// bits still count. Float rasters are quantized to 16 bits. Pixel-identical
/// images stored in different containers canonicalize to the same bytes.
pub fn canonicalize_image(encoded: &[u8]) -> Result<Vec<u8>, CanonicalizeError> {
    let decoded = image::load_from_memory(encoded)
        .map_err(|e| CanonicalizeError::Decode(format!("invalid image: {}", e)))?;

    let (width, height) = (decoded.width(), decoded.height());
    let color = decoded.color();
    let deep = color.bytes_per_pixel() > color.channel_count();

    let (raster, layout) = if deep {
        (
            DynamicImage::ImageRgba16(decoded.to_rgba16()),
            ExtendedColorType::Rgba16,
        )
    } else {
        (
            DynamicImage::ImageRgba8(decoded.to_rgba8()),
            ExtendedColorType::Rgba8,
        )
    };

    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, CompressionType::Default, FilterType::Adaptive)
        .write_image(raster.as_bytes(), width, height, layout)
        .map_err(|e| CanonicalizeError::Decode(format!("re-encode failed: {}", e)))?;

    Ok(out)
}
