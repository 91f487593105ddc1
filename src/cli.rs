//! Command-line interface definitions.
//!
//! Every option can also be supplied through the environment variable named
//! next to it, which is how the container deployment configures the service.

use clap::builder::TypedValueParser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::scrapers::details::{DEFAULT_MAX_CONCURRENT, DEFAULT_REQUEST_TIMEOUT};
use crate::scrapers::listing::{
    ChromeBinary, DEFAULT_BASE_ORIGIN, DEFAULT_CHROME_DOCKER_PATH, DEFAULT_LISTING_URL,
    DEFAULT_SCROLL_PAUSE, ListingConfig,
};

/// Command-line arguments for the post parser.
///
/// # Examples
///
/// ```sh
/// # Serve the HTTP API
/// vc_money_parser serve --port 8000
///
/// # Parse 20 posts once and write the result to ./json
/// vc_money_parser run --count 20 --json-output-dir ./json
///
/// # Inside the container image
/// ENV=DOCKER vc_money_parser serve --host 0.0.0.0
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub scraper: ScraperArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API
    Serve {
        /// Address to bind
        #[arg(long, env = "SERVER_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port to bind
        #[arg(long, env = "SERVER_PORT", default_value_t = 8000)]
        port: u16,

        /// Enable the background `/parser/*` routes
        #[arg(long, env = "PARSER_ENABLED", default_value_t = true, action = clap::ArgAction::Set)]
        parser_enabled: bool,
    },
    /// Parse posts once and exit
    Run {
        /// Number of posts to collect (1-500)
        #[arg(short, long, default_value_t = 10)]
        count: u32,

        /// Output directory for the JSON result
        #[arg(short, long)]
        json_output_dir: Option<String>,
    },
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ScraperArgs {
    /// Listing page to scroll
    #[arg(long, global = true, env = "LISTING_URL", default_value = DEFAULT_LISTING_URL)]
    pub listing_url: String,

    /// Origin that relative post links are resolved against
    #[arg(long, global = true, env = "BASE_ORIGIN", default_value = DEFAULT_BASE_ORIGIN)]
    pub base_origin: Url,

    /// Maximum number of post fetches in flight
    #[arg(
        long,
        global = true,
        env = "MAX_CONCURRENT",
        default_value_t = DEFAULT_MAX_CONCURRENT,
        value_parser = clap::value_parser!(u64).range(1..).map(|v| v as usize)
    )]
    pub max_concurrent: usize,

    /// Response timeout shared by all post fetches of a batch, in seconds
    #[arg(long, global = true, env = "REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    pub request_timeout_secs: u64,

    /// Wait after each scroll of the listing page, in milliseconds
    #[arg(long, global = true, env = "SCROLL_PAUSE_MS", default_value_t = DEFAULT_SCROLL_PAUSE.as_millis() as u64)]
    pub scroll_pause_ms: u64,

    /// Deployment environment; `DOCKER` selects the container Chromium binary
    #[arg(long = "env", global = true, env = "ENV")]
    pub deploy_env: Option<String>,

    /// Chromium binary used when running in the container
    #[arg(long, global = true, env = "CHROME_DOCKER_PATH", default_value = DEFAULT_CHROME_DOCKER_PATH)]
    pub chrome_docker_path: PathBuf,

    /// Chromium binary to use outside the container (auto-detected if unset)
    #[arg(long, global = true, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,
}

impl ScraperArgs {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn listing_config(&self) -> ListingConfig {
        ListingConfig {
            listing_url: self.listing_url.clone(),
            base_origin: self.base_origin.clone(),
            scroll_pause: Duration::from_millis(self.scroll_pause_ms),
            chrome: ChromeBinary::select(
                self.deploy_env.as_deref(),
                self.chrome_docker_path.clone(),
                self.chrome_path.clone(),
            ),
        }
    }
}
