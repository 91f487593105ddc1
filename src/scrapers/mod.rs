//! Post scraping for the vc.ru/money feed.
//!
//! Scraping follows a two-phase pattern:
//!
//! 1. **Listing**: scroll the feed in a headless browser and collect post
//!    summaries (title + link)
//! 2. **Details**: fetch every post page concurrently and extract its text
//!
//! | Module | Role |
//! |--------|------|
//! | [`listing`] | Browser-driven scroll loop producing `PostSummary` values |
//! | [`details`] | Bounded-concurrency fetcher producing `DetailedPost` values |
//! | [`extract`] | Pure title/paragraph extraction from a post page |
//!
//! Failed post fetches are returned as error-tagged posts rather than
//! dropped; only listing failures abort a run.

pub mod details;
pub mod extract;
pub mod listing;
