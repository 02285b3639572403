use std::fs::{self, Metadata};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use crate::logging::LoggingExt;

/// Maps a decoded URL path into the document root. `Ok(None)` when the result
/// would escape the root (for example through a symlink).
pub fn sanitize_path(base_dir: &Path, request_path: &str) -> io::Result<Option<PathBuf>> {
    let start_time = Instant::now();
    log::trace!(
        "Sanitizing path - base: {}, request: {}",
        base_dir.display(),
        request_path
    );

    let canonical_base = base_dir.log_operation("canonicalize", || fs::canonicalize(base_dir))?;

    let cleaned_path = Path::new(request_path)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect::<PathBuf>();

    let requested_path = canonical_base.join(&cleaned_path);

    match fs::canonicalize(&requested_path) {
        Ok(path) => {
            log::trace!(
                "Path sanitization complete in {:?} - result: {}",
                start_time.elapsed(),
                path.display()
            );

            if path.starts_with(&canonical_base) {
                Ok(Some(path))
            } else {
                log::warn!("Path escapes document root: {}", path.display());
                Ok(None)
            }
        }
        // Missing, or not a directory on the way: routing's stat reports it
        Err(e) => {
            log::trace!(
                "Using non-canonicalized path ({}): {}",
                e,
                requested_path.display()
            );
            Ok(Some(requested_path))
        }
    }
}

/// A regular file found by [`find_candidate`].
#[derive(Debug)]
pub struct Candidate {
    pub path: PathBuf,
    /// File name relative to the searched directory, e.g. `index.html`.
    pub name: String,
    pub metadata: Metadata,
}

/// File names tried for one base name: every extension in order, then the
/// bare name.
pub fn candidate_names(base_name: &str, extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.'))
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!("{}.{}", base_name, ext))
        .chain(std::iter::once(base_name.to_string()))
        .collect()
}

/// First existing regular file in `dir`. Base names dominate extensions: all
/// extensions of the first base name are tried before the second base name.
pub fn find_candidate<S: AsRef<str>>(
    dir: &Path,
    base_names: &[S],
    extensions: &[String],
) -> Option<Candidate> {
    let start_time = Instant::now();

    for base_name in base_names {
        for name in candidate_names(base_name.as_ref(), extensions) {
            let path = dir.join(&name);
            // A failed stat of a candidate is the same as an absent candidate
            match path.log_operation("stat", || fs::metadata(&path)) {
                Ok(metadata) if metadata.is_file() => {
                    log::debug!(
                        "Found candidate {} in {:?}",
                        path.display(),
                        start_time.elapsed()
                    );
                    return Some(Candidate {
                        path,
                        name,
                        metadata,
                    });
                }
                Ok(_) => log::trace!("Skipping non-file candidate {}", path.display()),
                Err(_) => {}
            }
        }
    }

    log::debug!(
        "No candidate found in {} after {:?}",
        dir.display(),
        start_time.elapsed()
    );
    None
}
