use std::fmt;
use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use tracing::{info, warn};

use crate::normalize::DrawRecord;
use crate::parse::{parse_table, RawRow};
use crate::request::{request_page_html, ChromeLauncher, PageLauncher};
use crate::store::{CsvStore, DrawStore, Upsert};
use crate::{info_time, Result, Target, FILE_PATH};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Written(Upsert),
    /// Every attempt came back without a single row; the store was left alone.
    NoData { attempts: usize },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Written(upsert) => write!(f, "record {upsert}"),
            Outcome::NoData { attempts } => write!(f, "no data after {attempts} attempts"),
        }
    }
}

/// Scrapes today's (UTC) distribution from the live page into `data.csv`.
pub async fn process_site() -> Result<Outcome> {
    let store = CsvStore::new(FILE_PATH);
    let today = Utc::now().date_naive();
    process_draw(Arc::new(ChromeLauncher), &store, Target::default(), today).await
}

/// The whole run: scrape with retries, normalize, upsert under `date`.
pub async fn process_draw<L, S>(launcher: Arc<L>, store: &S, target: Target, date: NaiveDate) -> Result<Outcome>
where
    L: PageLauncher,
    S: DrawStore,
{
    let start_time = Local::now();
    info_time!("Scraping draw data for {}", date);

    let attempts = target.max_retries + 1;
    let Some(rows) = scrape_rows(launcher, Arc::new(target)).await? else {
        warn!(attempts, "failed to extract data, giving up");
        return Ok(Outcome::NoData { attempts });
    };

    let record = DrawRecord::from_rows(date, &rows);
    let upsert = store.upsert(&record)?;
    info_time!(start_time, "Finished: {} record for {}, total {}", upsert, date, record.total());

    Ok(Outcome::Written(upsert))
}

/// Runs fetch + extract until the table yields rows, with a fresh browser each time.
/// Returns `None` once `max_retries` retries have also come back empty.
/// Browser failures use up an attempt just like an empty table does, anything else ends the run.
pub async fn scrape_rows<L: PageLauncher>(launcher: Arc<L>, target: Arc<Target>) -> Result<Option<Vec<RawRow>>> {
    let row_selector: Arc<str> = Arc::from(target.row_selector.as_str());

    for attempt in 0..=target.max_retries {
        let start_attempt_time = Local::now();

        let rows = match request_page_html(launcher.clone(), target.clone()).await {
            Ok(html) => parse_table(Arc::new(html), row_selector.clone()).await?,
            Err(e) if e.is_retryable() => {
                warn!(attempt = attempt + 1, error = %e, "browser attempt failed");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        if !rows.is_empty() {
            info_time!(start_attempt_time, "Data extracted: {} rows", rows.len());
            return Ok(Some(rows));
        }

        if attempt < target.max_retries {
            info!(
                "No data extracted. Retrying... ({}/{})",
                attempt + 1,
                target.max_retries
            );
        }
    }

    Ok(None)
}
