//! MIME types of linked assets.
//!
//! Copyright (c) 2025 Posit, PBC

/// Fallback for extensions not in the table.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Extensions commonly referenced from stylesheets.
const LINKED_EXTENSIONS: &[(&str, &str)] = &[
    // Fonts
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("otf", "font/otf"),
    ("eot", "application/vnd.ms-fontobject"),
    // Images
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("cur", "image/x-icon"),
    ("bmp", "image/bmp"),
    // Audio/Video
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("ogg", "audio/ogg"),
    ("wav", "audio/wav"),
];

/// Get MIME type from file extension, falling back to `application/octet-stream`.
pub fn mime_type_from_extension(ext: &str) -> &'static str {
    let ext_lower = ext.to_lowercase();
    LINKED_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext_lower)
        .map_or(OCTET_STREAM, |(_, mime)| *mime)
}
