//! JSON output for one-shot runs.
//!
//! Files are organized by date, one file per run:
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── 08-00-12.json
//!     └── 14-31-05.json
//! ```

use chrono::{DateTime, Local};
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

use crate::error::ParserError;
use crate::models::ParseResult;

/// Write a [`ParseResult`] to a JSON file with date-based directory structure.
///
/// # Arguments
///
/// * `result` - The finished parse to serialize
/// * `json_output_dir` - Base directory for JSON output
/// * `at` - Local time that names the directory and the file
///
/// # Returns
///
/// The path written, or an error if directory creation or file writing fails.
///
/// # Output Path
///
/// The file is written to: `{json_output_dir}/{YYYY-MM-DD}/{HH-MM-SS}.json`
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_parse_result(
    result: &ParseResult,
    json_output_dir: &str,
    at: DateTime<Local>,
) -> Result<PathBuf, ParserError> {
    let json = serde_json::to_string_pretty(result)?;

    let full_json_dir = PathBuf::from(json_output_dir).join(at.format("%Y-%m-%d").to_string());
    info!(full_json_dir = %full_json_dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&full_json_dir).await {
        error!(full_json_dir = %full_json_dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = full_json_dir.join(format!("{}.json", at.format("%H-%M-%S")));
    fs::write(&path, json).await?;
    info!(path = %path.display(), posts = result.posts.len(), "Wrote parse result");

    Ok(path)
}
