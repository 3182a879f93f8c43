use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};
use tokio::task::spawn_blocking;
use tracing::debug;

use crate::{Error, Result};

/// A single row of the score distribution table, as it appears on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub score_range: String,
    pub num_candidates: u32,
}

impl RawRow {
    pub fn new(score_range: impl Into<String>, num_candidates: u32) -> Self {
        Self {
            score_range: score_range.into(),
            num_candidates,
        }
    }
}

/// Attempts to parse the rendered page, extracting every `(score range, candidates)` row
/// matched by `row_selector`, in document order.
/// Rows missing either cell, or whose count isn't a number that fits `u32`, are skipped.
/// A page without the table yields an empty `Vec`; deciding what to do about that is up to the caller.
pub async fn parse_table(html: Arc<String>, row_selector: Arc<str>) -> Result<Vec<RawRow>> {
    let rows = spawn_blocking(move || parse_table_blocking(&html, &row_selector)).await??;
    Ok(rows)
}

pub(crate) fn parse_table_blocking(html: &str, row_selector: &str) -> Result<Vec<RawRow>> {
    let doc = Html::parse_document(html);

    // Create selectors.
    let row_selector = create_selector(row_selector)?;
    let cell_selector = create_selector("td")?;

    let mut rows = Vec::with_capacity(16);
    for row in doc.select(&row_selector) {
        let mut cells = row.select(&cell_selector);
        let score_range = cells.next().map(cell_text).unwrap_or_default();
        let num_candidates = cells
            .next()
            .map(|cell| cell_text(cell).replace(',', ""))
            .unwrap_or_default();
        debug!(%score_range, %num_candidates, "row data");

        if score_range.is_empty() || num_candidates.is_empty() {
            continue;
        }
        // Anything past u32 isn't a real candidate count.
        let Ok(num_candidates) = num_candidates.parse::<u32>() else {
            debug!(%score_range, "skipping row with a malformed count");
            continue;
        };
        rows.push(RawRow {
            score_range,
            num_candidates,
        });
    }
    Ok(rows)
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}

/// Text content of a cell with runs of whitespace collapsed, close to what `innerText` gives.
#[inline]
fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
