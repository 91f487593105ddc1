//! Output generation for one-shot runs.
//!
//! - [`json`]: writes a `ParseResult` to a dated JSON file

pub mod json;
