use std::io;
use std::path::PathBuf;

pub const DEFAULT_INDEX: &[&str] = &["index", "default", "main", "app"];
pub const DEFAULT_EXTENSIONS: &[&str] = &["html", "htm", "js"];
pub const DEFAULT_STATUS_PARAM: &str = "magik-status";
pub const DEFAULT_DELAY_PARAM: &str = "magik-time";

/// Serving policy for one server process. Built once, never mutated by the
/// request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub document_root: PathBuf,
    pub address: String,
    pub port: u16,
    pub protocol: String,
    /// Base names tried, in order, when a directory is requested.
    pub index_candidates: Vec<String>,
    /// Suffixes (without the dot) tried after each base name. The bare name
    /// is always tried last.
    pub extension_candidates: Vec<String>,
    pub show_directory_listing: bool,
    pub show_hidden_files: bool,
    pub not_found_base_name: String,
    pub cors_enabled: bool,
    pub forced_status_code: Option<u16>,
    pub status_query_param: String,
    pub forced_delay_ms: u64,
    pub delay_query_param: String,
    /// Honour the status and delay query parameters at all.
    pub query_overrides: bool,
    pub charset: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            document_root: PathBuf::from("."),
            address: "localhost".to_string(),
            port: 8080,
            protocol: "http".to_string(),
            index_candidates: DEFAULT_INDEX.iter().map(|s| s.to_string()).collect(),
            extension_candidates: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            show_directory_listing: true,
            show_hidden_files: false,
            not_found_base_name: "404".to_string(),
            cors_enabled: false,
            forced_status_code: None,
            status_query_param: DEFAULT_STATUS_PARAM.to_string(),
            forced_delay_ms: 0,
            delay_query_param: DEFAULT_DELAY_PARAM.to_string(),
            query_overrides: true,
            charset: "utf-8".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn new(document_root: impl Into<PathBuf>) -> Self {
        Self {
            document_root: document_root.into(),
            ..Self::default()
        }
    }

    /// Checks the invariants the request pipeline relies on.
    pub fn validate(&self) -> io::Result<()> {
        let metadata = std::fs::metadata(&self.document_root).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!(
                    "document root {} is not accessible: {}",
                    self.document_root.display(),
                    e
                ),
            )
        })?;
        if !metadata.is_dir() {
            return Err(invalid_input(format!(
                "document root {} is not a directory",
                self.document_root.display()
            )));
        }

        if let Some(code) = self.forced_status_code {
            if !is_valid_status(code) {
                return Err(invalid_input(format!("invalid status code: {}", code)));
            }
        }

        if self.not_found_base_name.is_empty() {
            return Err(invalid_input("not-found page name must not be empty"));
        }

        let names = self
            .index_candidates
            .iter()
            .chain(std::iter::once(&self.not_found_base_name));
        for name in names {
            if name.contains('/') || name.contains('\\') {
                return Err(invalid_input(format!("invalid file name: {}", name)));
            }
        }

        if self.charset.trim().is_empty() {
            return Err(invalid_input("charset must not be empty"));
        }

        Ok(())
    }
}

pub fn is_valid_status(code: u16) -> bool {
    (100..=999).contains(&code)
}

pub(crate) fn invalid_input(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg.into())
}
