//! Small helpers shared across the scrapers, the pipeline and the outputs.
//!
//! - Error formatting for error-tagged posts
//! - Duration rounding for batch metadata
//! - String truncation for logging
//! - File system validation for the output directory

use std::error::Error;
use std::fs as stdfs;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};

use crate::error::ParserError;

/// Render an error together with every error in its `source()` chain.
///
/// `reqwest` errors only print their outermost layer ("error sending
/// request for url ..."), so the underlying cause (DNS, connection refused,
/// timeout) has to be pulled out of the chain.
///
/// # Examples
///
/// ```ignore
/// let e = std::io::Error::new(std::io::ErrorKind::Other, "boom");
/// assert_eq!(error_chain(&e), "boom");
/// ```
pub fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

/// Seconds in `elapsed`, rounded to two decimal places.
pub fn round_secs(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100.0).round() / 100.0
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes (backing off to the nearest
/// char boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then creates and immediately
/// deletes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), ParserError> {
    fs::create_dir_all(path).await?;
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}
