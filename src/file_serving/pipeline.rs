use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use super::context::RequestContext;
use super::handlers::send_not_found;
use super::transform::{TemplateVars, Transform};
use super::NOT_FOUND_PAGE;
use crate::http::ResponseWriter;
use crate::{log_error, log_response};

/// Text files at or above this size are streamed instead of buffered.
pub const LARGE_FILE: u64 = 1024 * 1024;

/// A disconnect during a response delay is noticed within one slice.
const DELAY_SLICE: Duration = Duration::from_millis(25);

/// Where a response body comes from.
#[derive(Debug, Clone)]
pub enum Source {
    File(PathBuf),
    /// Built-in asset compiled into the binary; always buffered.
    Embedded(&'static [u8]),
}

/// Terminal step for every located body: picks buffered or streamed delivery,
/// pads the response time and writes the response.
pub fn read_and_send<W: Write>(
    ctx: &mut RequestContext,
    source: Source,
    transform: Option<Transform>,
    out: &mut ResponseWriter<W>,
) -> io::Result<()> {
    let path = match source {
        Source::Embedded(bytes) => return send_buffered(ctx, bytes.to_vec(), transform, out),
        Source::File(path) => path,
    };

    // Open first and stat the handle, so the size used below belongs to the
    // file that is actually read.
    let opened = File::open(&path).and_then(|file| {
        let metadata = file.metadata()?;
        Ok((file, metadata))
    });
    let (mut file, metadata) = match opened {
        Ok(opened) => opened,
        Err(e) => return transfer_failed(ctx, &path, e, transform, out),
    };

    let size = metadata.len();
    ctx.file_stats = Some(metadata);

    let buffer = transform.is_some() || (!ctx.is_binary && size < LARGE_FILE);
    if buffer {
        let mut content = Vec::with_capacity(size as usize);
        if let Err(e) = file.read_to_end(&mut content) {
            drop(file);
            return transfer_failed(ctx, &path, e, transform, out);
        }
        drop(file);
        send_buffered(ctx, content, transform, out)
    } else {
        send_streamed(ctx, file, &path, size, out)
    }
}

/// Until the head is out a failure still becomes a not-found response, with a
/// broken custom not-found page falling back to the built-in one. Afterwards
/// the response can only be cut short.
fn transfer_failed<W: Write>(
    ctx: &mut RequestContext,
    path: &Path,
    error: io::Error,
    transform: Option<Transform>,
    out: &mut ResponseWriter<W>,
) -> io::Result<()> {
    if out.headers_sent() {
        log_error!(error, format!("Transfer of {} aborted", path.display()));
        log_exchange(ctx);
        return Ok(());
    }

    log_error!(error, format!("Failed to read {}", path.display()));
    ctx.file_stats = None;

    match transform {
        Some(Transform::NotFoundPage) => {
            ctx.status = 404;
            send_buffered(
                ctx,
                NOT_FOUND_PAGE.to_vec(),
                Some(Transform::NotFoundPage),
                out,
            )
        }
        _ => send_not_found(ctx, out),
    }
}

fn send_buffered<W: Write>(
    ctx: &mut RequestContext,
    content: Vec<u8>,
    transform: Option<Transform>,
    out: &mut ResponseWriter<W>,
) -> io::Result<()> {
    let payload = match transform {
        Some(transform) => {
            let template = String::from_utf8_lossy(&content);
            let vars = TemplateVars {
                url: &ctx.request_path,
                version: crate::VERSION,
                link: crate::HOMEPAGE,
            };
            transform.apply(&template, &vars).into_bytes()
        }
        None => content,
    };

    ctx.streamed = false;
    ctx.payload_size = payload.len() as u64;
    ctx.set_header("Content-Length", payload.len().to_string());

    if !wait_for_response_time(ctx) {
        return Ok(());
    }

    out.write_head(ctx.final_status(), &ctx.headers)?;
    out.write_body(&payload)?;
    out.flush()?;

    log_exchange(ctx);
    Ok(())
}

fn send_streamed<W: Write>(
    ctx: &mut RequestContext,
    file: File,
    path: &Path,
    size: u64,
    out: &mut ResponseWriter<W>,
) -> io::Result<()> {
    ctx.streamed = true;
    ctx.set_header("Content-Length", size.to_string());

    // Returning drops `file`, so an abandoned delay does not keep it open
    if !wait_for_response_time(ctx) {
        return Ok(());
    }

    out.write_head(ctx.final_status(), &ctx.headers)?;

    let copied = io::copy(&mut file.take(size), out.body_mut()).and_then(|copied| {
        out.flush()?;
        Ok(copied)
    });
    match copied {
        Ok(copied) => {
            if copied < size {
                log::warn!(
                    "File shrank while streaming {}: sent {} of {} bytes",
                    path.display(),
                    copied,
                    size
                );
            }
            ctx.payload_size = copied;
        }
        Err(e) => {
            ctx.payload_size = 0;
            return transfer_failed(ctx, path, e, None, out);
        }
    }

    log_exchange(ctx);
    Ok(())
}

/// Bodiless permanent redirect.
pub fn send_redirect<W: Write>(
    ctx: &mut RequestContext,
    location: String,
    out: &mut ResponseWriter<W>,
) -> io::Result<()> {
    ctx.status = 301;
    ctx.streamed = false;
    ctx.payload_size = 0;
    ctx.set_header("Location", location);
    ctx.set_header("Content-Length", "0");

    out.write_head(ctx.final_status(), &ctx.headers)?;
    out.flush()?;

    log_exchange(ctx);
    Ok(())
}

/// Sleeps until the exchange has taken the requested response time. Never
/// shortens a response. Returns `false` if the client disconnected while
/// waiting, in which case nothing must be sent.
fn wait_for_response_time(ctx: &RequestContext) -> bool {
    let wait = ctx.remaining_delay();
    if wait.is_zero() {
        return true;
    }
    log::debug!("Delaying response by {:?}", wait);

    loop {
        if (ctx.client_gone)() {
            log::info!(
                "{} {} abandoned after {} ms: client disconnected",
                ctx.method,
                ctx.raw_target,
                ctx.start.elapsed().as_millis()
            );
            return false;
        }

        let remaining = ctx.remaining_delay();
        if remaining.is_zero() {
            return true;
        }
        thread::sleep(remaining.min(DELAY_SLICE));
    }
}

fn log_exchange(ctx: &RequestContext) {
    log_response!(
        ctx.method,
        ctx.raw_target,
        ctx.final_status(),
        ctx.start.elapsed(),
        ctx.payload_size,
        ctx.header("Content-Type").unwrap_or("-"),
        ctx.streamed
    );
}
