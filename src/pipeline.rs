//! Batch orchestration: listing → details → timed result.

use std::time::Instant;
use tracing::{info, instrument};

use crate::error::ParserError;
use crate::models::BatchResult;
use crate::scrapers::details::DetailGatherer;
use crate::scrapers::listing::ListingSource;
use crate::utils::round_secs;

/// Runs one parse: collects summaries from the listing source, then fetches
/// every post through the gatherer.
#[derive(Debug)]
pub struct Orchestrator<L> {
    listing: L,
    gatherer: DetailGatherer,
}

impl<L: ListingSource> Orchestrator<L> {
    pub fn new(listing: L, gatherer: DetailGatherer) -> Self {
        Self { listing, gatherer }
    }

    pub fn listing(&self) -> &L {
        &self.listing
    }

    /// Collect up to `desired_count` posts and fetch their details.
    ///
    /// A count of zero returns an empty result without touching the browser
    /// or the network.
    ///
    /// # Returns
    ///
    /// A [`BatchResult`] with one post per collected summary. Its
    /// `duration_seconds` covers the fetch phase only. Individual fetch
    /// failures are carried inside the result.
    ///
    /// # Errors
    ///
    /// Whatever the listing source returns, typically
    /// [`ParserError::Browser`].
    #[instrument(level = "info", skip_all, fields(desired_count = desired_count))]
    pub async fn run(&self, desired_count: usize) -> Result<BatchResult, ParserError> {
        if desired_count == 0 {
            info!("Nothing to parse");
            return Ok(BatchResult::empty());
        }

        let summaries = self.listing.collect(desired_count).await?;
        let links: Vec<String> = summaries.into_iter().map(|s| s.link).collect();
        info!(count = links.len(), "Fetching post details");

        let start = Instant::now();
        let posts = self.gatherer.gather_all(links).await;
        let duration_seconds = round_secs(start.elapsed());

        let batch = BatchResult::new(posts, duration_seconds);
        info!(
            parsed = batch.parsed_count,
            failed = batch.failed_count(),
            duration_seconds,
            "Batch complete"
        );
        Ok(batch)
    }
}
