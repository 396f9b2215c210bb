//! Proxy list loading.

use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, instrument};

/// Reads one proxy URL per line. Blank lines are ignored and a missing file
/// is an empty list.
///
/// # Errors
///
/// Returns the I/O error if the file exists but cannot be read.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_proxies(path: impl AsRef<Path>) -> std::io::Result<Vec<String>> {
    let raw = match std::fs::read_to_string(path.as_ref()) {
        Ok(raw) => raw,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            debug!("no proxy list found");
            return Ok(Vec::new());
        }
        Err(error) => return Err(error),
    };

    let proxies: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect();
    debug!(count = proxies.len(), "loaded proxy list");
    Ok(proxies)
}
