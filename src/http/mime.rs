//! MIME type detection module
//!
//! Maps a filename extension to its Content-Type. Unknown extensions yield
//! `None` so the caller can fall back to the configured `DefaultType`.

use std::path::Path;

/// Content type for a file extension (case-insensitive)
///
/// # Examples
/// ```
/// use scopehttpd::http::mime::lookup;
/// assert_eq!(lookup("html"), Some("text/html"));
/// assert_eq!(lookup("MP4"), Some("video/mp4"));
/// assert_eq!(lookup("nosuchext"), None);
/// ```
pub fn lookup(extension: &str) -> Option<&'static str> {
    let content_type = match extension.to_ascii_lowercase().as_str() {
        // Text
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "txt" | "text" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "xml" => "application/xml",

        // JavaScript/WASM
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "wasm" => "application/wasm",

        // Images
        "png" => "image/png",
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",

        // Video
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "ogv" => "video/ogg",
        "mov" | "qt" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mpeg" | "mpg" => "video/mpeg",

        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/x-wav",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",

        // Fonts
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",

        // Documents and archives
        "pdf" => "application/pdf",
        "ps" | "eps" => "application/postscript",
        "zip" => "application/zip",
        "gz" | "gzip" => "application/gzip",
        "tar" => "application/x-tar",
        "bin" | "exe" => "application/octet-stream",

        _ => return None,
    };
    Some(content_type)
}

/// Content type for a path by its final extension
pub fn for_path(path: &Path) -> Option<&'static str> {
    path.extension().and_then(|e| e.to_str()).and_then(lookup)
}
