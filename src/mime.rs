use mime_guess::from_path;
use std::path::Path;

/// Application subtypes that are served as opaque bytes. Matched as prefixes,
/// so every `vnd.openxmlformats-officedocument.*` flavour is covered.
const BINARY_APPLICATION_TYPES: &[&str] = &[
    "application/octet-stream",
    "application/pdf",
    "application/zip",
    "application/gzip",
    "application/x-gzip",
    "application/x-7z-compressed",
    "application/x-tar",
    "application/java-archive",
    "application/msword",
    "application/vnd.ms-excel",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument",
];

const BINARY_MAIN_TYPES: &[&str] = &["image", "audio", "video", "font"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeInfo {
    pub mime_type: String,
    pub is_binary: bool,
}

impl MimeInfo {
    /// `Content-Type` header value; binary types never carry a charset.
    pub fn content_type(&self, charset: &str) -> String {
        if self.is_binary {
            self.mime_type.clone()
        } else {
            format!("{}; charset={}", self.mime_type, charset)
        }
    }
}

/// Content type from the file extension, `text/plain` when unknown.
pub fn classify(path: &Path) -> MimeInfo {
    let mime_type = from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "text/plain".to_string());
    let is_binary = is_binary_mime_type(&mime_type);
    MimeInfo {
        mime_type,
        is_binary,
    }
}

pub fn is_binary_mime_type(mime_type: &str) -> bool {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    let main_type = match mime_type.split_once('/') {
        Some((main, _)) => main,
        None => return false,
    };

    if BINARY_MAIN_TYPES.contains(&main_type) {
        return true;
    }

    main_type == "application"
        && BINARY_APPLICATION_TYPES
            .iter()
            .any(|binary| mime_type.starts_with(binary))
}
