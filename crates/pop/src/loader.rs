//! Loading content from files.

use std::path::Path;

use bytes::Bytes;
use tracing::debug;

use pop_core::{CanonicalizeError, ContentInput};

/// Read a file as registrable content.
///
/// Bytes that sniff as a supported image become an image input; anything
/// else must be UTF-8 text. Unreadable files give
/// [`CanonicalizeError::Io`], undecodable ones [`CanonicalizeError::Decode`].
pub async fn load_content(path: impl AsRef<Path>) -> Result<ContentInput, CanonicalizeError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    debug!(path = %path.display(), size = bytes.len(), "loaded content file");
    ContentInput::from_bytes(Bytes::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pop_core::{ContentKind, TEXT_CONTENT_TYPE};

    #[tokio::test]
    async fn test_load_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poem.txt");
        std::fs::write(&path, "line one  \r\nline two\n").unwrap();

        let input = load_content(&path).await.unwrap();
        assert_eq!(input.kind(), ContentKind::Text);
        assert_eq!(input.content_type(), TEXT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_content(dir.path().join("absent.txt")).await.unwrap_err();
        assert!(matches!(err, CanonicalizeError::Io(_)));
    }

    #[tokio::test]
    async fn test_binary_garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x80, 0x81]).unwrap();

        let err = load_content(&path).await.unwrap_err();
        assert!(matches!(err, CanonicalizeError::Decode(_)));
    }
}
