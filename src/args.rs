use clap::Parser;
use std::io;
use std::path::PathBuf;

use crate::config::{
    invalid_input, is_valid_status, ServerConfig, DEFAULT_DELAY_PARAM, DEFAULT_EXTENSIONS,
    DEFAULT_INDEX, DEFAULT_STATUS_PARAM,
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Configurable static file server", long_about = None)]
pub struct Args {
    /// IP address the server is bound to
    #[arg(short, long, default_value = "localhost")]
    pub address: String,

    /// Port number
    #[arg(short, long, default_value = "8080", value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Document root
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Index file names, comma separated; tried before the defaults
    #[arg(short, long)]
    pub index: Option<String>,

    /// Extensions for index and not-found lookups, comma separated
    #[arg(short, long)]
    pub extensions: Option<String>,

    /// Base name of a custom 404 page in the document root
    #[arg(short, long, default_value = "404")]
    pub not_found: String,

    /// Do not show directory listings
    #[arg(short = 'D', long)]
    pub no_dirs: bool,

    /// Serve .dot (hidden) files
    #[arg(short = 'H', long)]
    pub hidden: bool,

    /// Add CORS headers to every response
    #[arg(long)]
    pub cors: bool,

    /// Global status code (number) or the status query parameter name
    #[arg(short, long, default_value = DEFAULT_STATUS_PARAM)]
    pub status: String,

    /// Global response time in ms (number) or the response time query parameter name
    #[arg(short, long, default_value = DEFAULT_DELAY_PARAM)]
    pub time: String,

    /// Charset announced for text responses
    #[arg(short = 'u', long, default_value = "utf-8")]
    pub encoding: String,

    /// Ignore the status and response time query parameters
    #[arg(long)]
    pub no_query_overrides: bool,
}

impl Args {
    pub fn into_config(self) -> io::Result<ServerConfig> {
        let mut config = ServerConfig {
            document_root: self.root,
            address: self.address,
            port: self.port,
            index_candidates: merge_list(self.index.as_deref(), DEFAULT_INDEX),
            extension_candidates: merge_list(self.extensions.as_deref(), DEFAULT_EXTENSIONS)
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_string())
                .collect(),
            not_found_base_name: self.not_found,
            show_directory_listing: !self.no_dirs,
            show_hidden_files: self.hidden,
            cors_enabled: self.cors,
            query_overrides: !self.no_query_overrides,
            charset: self.encoding,
            ..ServerConfig::default()
        };

        match self.status.trim().parse::<u16>() {
            Ok(code) if is_valid_status(code) => config.forced_status_code = Some(code),
            Ok(code) => return Err(invalid_input(format!("invalid status code: {}", code))),
            Err(_) => config.status_query_param = non_empty(&self.status, DEFAULT_STATUS_PARAM),
        }

        match self.time.trim().parse::<u64>() {
            Ok(ms) => config.forced_delay_ms = ms,
            Err(_) => config.delay_query_param = non_empty(&self.time, DEFAULT_DELAY_PARAM),
        }

        config.validate()?;
        Ok(config)
    }
}

/// User supplied entries first, then the defaults, without duplicates.
fn merge_list(user: Option<&str>, defaults: &[&str]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    let user_items = user.into_iter().flat_map(|list| list.split(','));
    for item in user_items.chain(defaults.iter().copied()) {
        let item = item.trim();
        if !item.is_empty() && !merged.iter().any(|m| m == item) {
            merged.push(item.to_string());
        }
    }
    merged
}

fn non_empty(value: &str, default: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}
