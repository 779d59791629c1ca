//! Manifest vs. segment classification.

/// MIME type of HLS playlists.
pub const HLS_MIME_TYPE: &str = "application/vnd.apple.mpegurl";

/// File extension of HLS playlists.
pub const MANIFEST_EXTENSION: &str = ".m3u8";

/// Decide whether a fetched resource is an HLS manifest.
///
/// Either the URL mentions the playlist extension or the content type names
/// one of the mpegurl MIME types (`application/vnd.apple.mpegurl`,
/// `application/x-mpegurl`, `audio/mpegurl`).
pub fn is_manifest(url: &str, content_type: Option<&str>) -> bool {
    if url.to_ascii_lowercase().contains(MANIFEST_EXTENSION) {
        return true;
    }
    content_type
        .map(|ct| ct.to_ascii_lowercase().contains("mpegurl"))
        .unwrap_or(false)
}
