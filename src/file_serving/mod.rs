pub mod context;
pub mod handlers;
pub mod listing;
pub mod path_utils;
pub mod pipeline;
pub mod transform;

pub use context::{RequestContext, ResponseSummary};
pub use handlers::{handle_request, handle_request_cancellable};

/// Built-in assets, shipped with the binary rather than the document root.
pub const NOT_FOUND_PAGE: &[u8] = include_bytes!("../../assets/404.html");
pub const LISTING_PAGE: &[u8] = include_bytes!("../../assets/listing.html");
pub const FAVICON: &[u8] = include_bytes!("../../assets/favicon.ico");
