//! MIME type detection

use std::path::Path;

const OCTET_STREAM: &str = "application/octet-stream";

/// Detect a MIME type from the content, falling back to the file extension
pub fn detect_mime_type(path: &Path, content: &[u8]) -> String {
    if let Some(kind) = infer::get(content) {
        return kind.mime_type().to_string();
    }

    mime_guess::from_path(path)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

/// MIME type for a published asset
///
/// Scripts and stylesheets are pinned explicitly since sniffing text content
/// cannot tell them apart.
pub fn asset_mime_type(path: &Path, content: &[u8]) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("js") => "text/javascript".to_string(),
        Some("css") => "text/css".to_string(),
        _ => detect_mime_type(path, content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_content_wins_over_extension() {
        let mime = detect_mime_type(Path::new("photo.txt"), PNG_HEADER);
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(detect_mime_type(Path::new("notes.txt"), b"hello"), "text/plain");
        assert_eq!(
            detect_mime_type(Path::new("no-extension"), b"hello"),
            OCTET_STREAM
        );
    }

    #[test]
    fn test_asset_overrides() {
        assert_eq!(
            asset_mime_type(Path::new("js/app.js"), b"console.log(1)"),
            "text/javascript"
        );
        assert_eq!(asset_mime_type(Path::new("css/app.css"), b"a{}"), "text/css");
        assert_eq!(asset_mime_type(Path::new("img/logo.png"), PNG_HEADER), "image/png");
    }
}
