use std::fs::{self, Metadata};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::context::{RequestContext, ResponseSummary};
use super::listing;
use super::path_utils::find_candidate;
use super::pipeline::{read_and_send, send_redirect, Source};
use super::transform::Transform;
use super::{FAVICON, LISTING_PAGE, NOT_FOUND_PAGE};
use crate::config::ServerConfig;
use crate::http::{Request, ResponseWriter};
use crate::log_request;
use crate::logging::LoggingExt;
use crate::mime;

/// Serves one request and reports what was sent.
pub fn handle_request<W: Write>(
    config: &ServerConfig,
    request: &Request,
    out: &mut ResponseWriter<W>,
) -> io::Result<ResponseSummary> {
    handle_request_cancellable(config, request, out, &|| false)
}

/// Like [`handle_request`], but a pending response delay is abandoned as soon
/// as `client_gone` reports the client disconnected.
pub fn handle_request_cancellable<W: Write>(
    config: &ServerConfig,
    request: &Request,
    out: &mut ResponseWriter<W>,
    client_gone: &dyn Fn() -> bool,
) -> io::Result<ResponseSummary> {
    log_request!(request.method, request.target);
    for (name, value) in &request.headers {
        log::debug!("  {}: {}", name, value);
    }

    let mut ctx = RequestContext::new(config, request).with_disconnect_check(client_gone);
    route(&mut ctx, out)?;
    Ok(ctx.summary())
}

/// Classifies the resolved path and dispatches. Any stat failure is reported
/// to the client as not found; the cause is only logged.
pub fn route<W: Write>(ctx: &mut RequestContext, out: &mut ResponseWriter<W>) -> io::Result<()> {
    let fs_path = match ctx.fs_path.clone() {
        Some(path) => path,
        None => return send_not_found(ctx, out),
    };

    let metadata = match fs_path.log_operation("stat", || fs::metadata(&fs_path)) {
        Ok(metadata) => metadata,
        Err(_) => return send_not_found(ctx, out),
    };

    if metadata.is_dir() {
        handle_directory(ctx, fs_path, metadata, out)
    } else if metadata.is_file() && !ctx.request_path.ends_with('/') {
        handle_file(ctx, fs_path, metadata, out)
    } else {
        log::debug!("Not a servable file: {}", fs_path.display());
        send_not_found(ctx, out)
    }
}

fn handle_directory<W: Write>(
    ctx: &mut RequestContext,
    dir: PathBuf,
    metadata: Metadata,
    out: &mut ResponseWriter<W>,
) -> io::Result<()> {
    ctx.file_stats = Some(metadata);

    // Relative links in listings and index pages need a directory URL
    if !ctx.request_path.ends_with('/') {
        let mut location = format!("{}/", ctx.raw_path);
        if let Some(query) = &ctx.query {
            location.push('?');
            location.push_str(query);
        }
        return send_redirect(ctx, location, out);
    }

    let config = ctx.config;
    if let Some(index) = find_candidate(
        &dir,
        &config.index_candidates,
        &config.extension_candidates,
    ) {
        log::debug!("Serving index {}", index.path.display());
        set_content_type(ctx, &index.path);
        ctx.file_stats = Some(index.metadata);
        return read_and_send(ctx, Source::File(index.path), None, out);
    }

    if config.show_directory_listing {
        let table = listing::generate(&dir, &ctx.request_path, config.show_hidden_files);
        ctx.is_binary = false;
        ctx.set_header("Content-Type", format!("text/html; charset={}", config.charset));
        return read_and_send(
            ctx,
            Source::Embedded(LISTING_PAGE),
            Some(Transform::DirectoryListing(table)),
            out,
        );
    }

    send_not_found(ctx, out)
}

fn handle_file<W: Write>(
    ctx: &mut RequestContext,
    path: PathBuf,
    metadata: Metadata,
    out: &mut ResponseWriter<W>,
) -> io::Result<()> {
    let hidden = ctx
        .request_path
        .rsplit('/')
        .next()
        .is_some_and(|name| name.starts_with('.'));

    // Hidden files must look exactly like missing ones
    if hidden && !ctx.config.show_hidden_files {
        log::debug!("Refusing hidden file {}", path.display());
        return send_not_found(ctx, out);
    }

    ctx.file_stats = Some(metadata);
    set_content_type(ctx, &path);
    read_and_send(ctx, Source::File(path), None, out)
}

fn set_content_type(ctx: &mut RequestContext, path: &Path) {
    let info = mime::classify(path);
    ctx.is_binary = info.is_binary;
    ctx.set_header("Content-Type", info.content_type(&ctx.config.charset));
}

/// Not-found handling: a browser's favicon request gets the built-in icon, everything
/// else a 404 page, custom from the document root when one exists.
pub fn send_not_found<W: Write>(
    ctx: &mut RequestContext,
    out: &mut ResponseWriter<W>,
) -> io::Result<()> {
    if ctx.request_path == "/favicon.ico" {
        return send_favicon(ctx, out);
    }

    let config = ctx.config;
    ctx.status = 404;
    ctx.is_binary = false;
    ctx.file_stats = None;
    ctx.set_header("Content-Type", format!("text/html; charset={}", config.charset));

    let custom = find_candidate(
        &config.document_root,
        std::slice::from_ref(&config.not_found_base_name),
        &config.extension_candidates,
    );

    let source = match custom {
        Some(page) => {
            log::debug!("Using custom not-found page {}", page.path.display());
            Source::File(page.path)
        }
        None => Source::Embedded(NOT_FOUND_PAGE),
    };

    read_and_send(ctx, source, Some(Transform::NotFoundPage), out)
}

fn send_favicon<W: Write>(ctx: &mut RequestContext, out: &mut ResponseWriter<W>) -> io::Result<()> {
    ctx.is_binary = true;
    ctx.set_header("Content-Type", "image/x-icon");
    read_and_send(ctx, Source::Embedded(FAVICON), None, out)
}
