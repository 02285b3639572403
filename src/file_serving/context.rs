use log::debug;
use percent_encoding::percent_decode_str;
use std::fs::Metadata;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::path_utils::sanitize_path;
use crate::config::{is_valid_status, ServerConfig};
use crate::http::Request;

/// Per-request state threaded through routing and the response pipeline.
/// Never shared between requests.
pub struct RequestContext<'a> {
    pub config: &'a ServerConfig,
    pub method: String,
    /// Request target as received, for logging.
    pub raw_target: String,
    /// Still percent-encoded path, used to build redirect locations.
    pub raw_path: String,
    /// Decoded URL path.
    pub request_path: String,
    pub query: Option<String>,
    /// `None` when the path could not be mapped inside the document root.
    pub fs_path: Option<PathBuf>,
    /// Status computed by routing: 200, 301 or 404.
    pub status: u16,
    /// Caller forced status, global config first, then query parameter.
    pub status_override: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub is_binary: bool,
    pub file_stats: Option<Metadata>,
    pub streamed: bool,
    pub payload_size: u64,
    /// Total latency the caller asked for; responses are padded up to it.
    pub response_time: Duration,
    pub start: Instant,
    /// Reports whether the client has gone away. Checked while delaying.
    pub client_gone: &'a dyn Fn() -> bool,
}

fn never_gone() -> bool {
    false
}

impl<'a> RequestContext<'a> {
    pub fn new(config: &'a ServerConfig, request: &Request) -> Self {
        let start = Instant::now();
        let raw_path = request.path().to_string();
        let request_path = percent_decode_str(&raw_path)
            .decode_utf8_lossy()
            .into_owned();
        let query = request.query().map(str::to_string);

        let fs_path = match sanitize_path(&config.document_root, &request_path) {
            Ok(path) => path,
            Err(e) => {
                debug!("Could not map {} to the document root: {}", request_path, e);
                None
            }
        };

        let query_status = query
            .as_deref()
            .filter(|_| config.query_overrides)
            .and_then(|q| query_param(q, &config.status_query_param))
            .and_then(|value| value.trim().parse::<u16>().ok())
            .filter(|code| is_valid_status(*code));
        let status_override = config.forced_status_code.or(query_status);

        let response_time = query
            .as_deref()
            .filter(|_| config.query_overrides)
            .and_then(|q| query_param(q, &config.delay_query_param))
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(config.forced_delay_ms);

        let mut headers = vec![("X-Powered-By".to_string(), crate::powered_by())];
        if config.cors_enabled {
            headers.extend(cors_headers());
        }

        Self {
            config,
            method: request.method.clone(),
            raw_target: request.target.clone(),
            raw_path,
            request_path,
            query,
            fs_path,
            status: 200,
            status_override,
            headers,
            is_binary: false,
            file_stats: None,
            streamed: false,
            payload_size: 0,
            response_time: Duration::from_millis(response_time),
            start,
            client_gone: &never_gone,
        }
    }

    pub fn with_disconnect_check(mut self, client_gone: &'a dyn Fn() -> bool) -> Self {
        self.client_gone = client_gone;
        self
    }

    /// Status actually sent: forced global, then query parameter, then computed.
    pub fn final_status(&self) -> u16 {
        self.status_override.unwrap_or(self.status)
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Time still to wait so the whole exchange takes `response_time`.
    pub fn remaining_delay(&self) -> Duration {
        self.response_time.saturating_sub(self.start.elapsed())
    }

    pub fn summary(&self) -> ResponseSummary {
        ResponseSummary {
            status: self.final_status(),
            headers: self.headers.clone(),
            streamed: self.streamed,
            payload_size: self.payload_size,
        }
    }
}

/// What was sent for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSummary {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub streamed: bool,
    pub payload_size: u64,
}

impl ResponseSummary {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

fn cors_headers() -> Vec<(String, String)> {
    [
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Credentials", "true"),
        (
            "Access-Control-Allow-Methods",
            "GET,PUT,POST,DELETE,OPTIONS,HEAD",
        ),
        (
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization, Content-Length, X-Requested-With, Accept, x-csrf-token, origin",
        ),
    ]
    .iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect()
}

/// First value of `name` in a raw query string, percent-decoded.
pub fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = percent_decode_str(&key.replace('+', " "))
            .decode_utf8_lossy()
            .into_owned();
        (key == name).then(|| {
            percent_decode_str(&value.replace('+', " "))
                .decode_utf8_lossy()
                .into_owned()
        })
    })
}
