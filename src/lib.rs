pub mod args;
pub mod config;
pub mod file_serving;
pub mod format;
pub mod http;
pub mod logging;
pub mod mime;
pub mod server;

pub use config::ServerConfig;
pub use server::Server;

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const HOMEPAGE: &str = env!("CARGO_PKG_HOMEPAGE");

/// Value of the `X-Powered-By` header.
pub fn powered_by() -> String {
    format!("{} (v.{})", NAME, VERSION)
}
