//! EXPRESS ENTRY DRAW SCRAPER
//! Loads the rounds-of-invitations page in headless Chrome, reads the CRS score
//! distribution table and upserts today's numbers into `data.csv`.

mod error;
mod macros;
pub mod normalize;
pub mod parse;
pub mod process;
pub mod request;
pub mod store;

use std::time::Duration;

pub use error::{Error, Result};

pub const TARGET_URL: &str = "https://www.canada.ca/en/immigration-refugees-citizenship/services/immigrate-canada/express-entry/rounds-invitations.html";
pub const FILE_PATH: &str = "data.csv";
/// The score table sits inside a collapsed `<details>`; clicking its summary renders it.
pub const EXPAND_SELECTOR: &str = "summary";
pub const WAIT_SELECTOR: &str = ".table-responsive table tbody tr";
pub const ROW_SELECTOR: &str = ".table-responsive tbody tr";
pub const SETTLE_DELAY: Duration = Duration::from_secs(5);
/// Retries after the first attempt, so a run makes at most `MAX_RETRIES + 1` attempts.
pub const MAX_RETRIES: usize = 10;

/// Everything a single scrape needs to know about the page.
#[derive(Debug, Clone)]
pub struct Target {
    pub url: String,
    pub expand_selector: String,
    pub wait_selector: String,
    pub row_selector: String,
    pub settle_delay: Duration,
    pub max_retries: usize,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            url: TARGET_URL.into(),
            expand_selector: EXPAND_SELECTOR.into(),
            wait_selector: WAIT_SELECTOR.into(),
            row_selector: ROW_SELECTOR.into(),
            settle_delay: SETTLE_DELAY,
            max_retries: MAX_RETRIES,
        }
    }
}
